//! Mapping of file offsets to data blocks.
//! Files only have direct pointers and never have holes: the first
//! `ceil(size / BLOCK_SIZE)` pointers are allocated, the rest are NULL_BLOCK.

use log::{debug, warn};

use crate::bitmap::Bitmap;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::{BlockDevice, Inode};

/// Number of blocks a file of `size` bytes occupies.
pub fn blocks_needed(size: usize) -> usize {
    size.div_ceil(BLOCK_SIZE)
}

/// Block IDs covering bytes `offset..offset + len` of the file.
pub fn blocks_for(inode: &Inode, offset: usize, len: usize) -> Vec<u32> {
    let first = offset / BLOCK_SIZE;
    if len == 0 || first >= NUM_DIRECT_PTRS {
        return Vec::new();
    }
    let last = ((offset + len - 1) / BLOCK_SIZE).min(NUM_DIRECT_PTRS - 1);
    inode.direct_ptrs[first..=last].to_vec()
}

/// Frees blocks handed out during a failed operation.
pub(crate) fn release(bitmap: &mut Bitmap, blocks: &[u32]) {
    for &block_id in blocks {
        if let Err(e) = bitmap.free(block_id) {
            warn!("could not release block {}: {}", block_id, e);
        }
    }
}

/// Allocates blocks so that the file can hold `new_size` bytes, filling pointer slots in order.
/// Returns the newly allocated blocks. On failure nothing stays allocated and the
/// pointers are as before. Does not change `inode.size`.
pub fn grow(bitmap: &mut Bitmap, inode: &mut Inode, new_size: usize) -> Result<Vec<u32>> {
    if new_size > MAX_FILE_SIZE {
        return Err(FsError::NoSpace);
    }
    let have = blocks_needed(inode.size as usize);
    let need = blocks_needed(new_size);

    let mut fresh = Vec::with_capacity(need.saturating_sub(have));
    for slot in have..need {
        match bitmap.allocate() {
            Ok(block_id) => {
                inode.direct_ptrs[slot] = block_id;
                fresh.push(block_id);
            }
            Err(e) => {
                debug!("grow to {} failed after {} new blocks, rolling back", new_size, fresh.len());
                release(bitmap, &fresh);
                inode.direct_ptrs[have..slot].fill(NULL_BLOCK);
                return Err(e);
            }
        }
    }
    Ok(fresh)
}

/// Frees every data block of the file and sets its size to zero.
/// Returns the number of blocks freed.
pub fn shrink_to_zero(bitmap: &mut Bitmap, inode: &mut Inode) -> Result<usize> {
    let mut freed = 0;
    for ptr in inode.direct_ptrs.iter_mut() {
        if *ptr != NULL_BLOCK {
            bitmap.free(*ptr)?;
            *ptr = NULL_BLOCK;
            freed += 1;
        }
    }
    inode.size = 0;
    Ok(freed)
}

/// Reads file data starting at `offset` into `buffer`.
/// Stops at end of file; returns the number of bytes read.
pub fn fread(
    device: &impl BlockDevice,
    inode: &Inode,
    offset: usize,
    buffer: &mut [u8],
) -> Result<usize> {
    let size = inode.size as usize;
    if offset >= size {
        return Ok(0);
    }
    let len = buffer.len().min(size - offset);
    let end = offset + len;
    let first = offset / BLOCK_SIZE;
    let ptrs = blocks_for(inode, offset, len);

    // Physically consecutive blocks are fetched with a single device read.
    let mut i = 0;
    while i < ptrs.len() {
        let mut run = 1;
        while i + run < ptrs.len() && ptrs[i + run] == ptrs[i] + run as u32 {
            run += 1;
        }
        let mut chunk = vec![0u8; run * BLOCK_SIZE];
        device.read_blocks(ptrs[i], &mut chunk)?;

        let run_start = (first + i) * BLOCK_SIZE;
        let from = offset.max(run_start);
        let to = end.min(run_start + run * BLOCK_SIZE);
        buffer[from - offset..to - offset].copy_from_slice(&chunk[from - run_start..to - run_start]);
        i += run;
    }

    Ok(len)
}

/// Writes `data` at `offset` into blocks that are already mapped.
/// Blocks listed in `fresh` were just allocated and are not read back first.
pub fn fwrite(
    device: &impl BlockDevice,
    inode: &Inode,
    offset: usize,
    data: &[u8],
    fresh: &[u32],
) -> Result<()> {
    let first = offset / BLOCK_SIZE;
    let end = offset + data.len();
    let mut block_buf = Box::new([0u8; BLOCK_SIZE]);

    for (i, block_id) in blocks_for(inode, offset, data.len()).into_iter().enumerate() {
        let block_start = (first + i) * BLOCK_SIZE;
        let from = offset.max(block_start);
        let to = end.min(block_start + BLOCK_SIZE);

        if fresh.contains(&block_id) {
            block_buf.fill(0);
        } else if to - from < BLOCK_SIZE {
            device.read_block(block_id, &mut block_buf)?;
        }
        block_buf[from - block_start..to - block_start].copy_from_slice(&data[from - offset..to - offset]);
        device.write_block(block_id, &block_buf)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::superblock::layout;

    fn file_with(blocks: &[u32], size: u32) -> Inode {
        let mut inode = Inode::new(S_IFREG | 0o644, 0, 0, 0);
        inode.direct_ptrs[..blocks.len()].copy_from_slice(blocks);
        inode.size = size;
        inode
    }

    #[test]
    fn test_blocks_for() {
        let inode = file_with(&[10, 11, 20], 3 * BLOCK_SIZE as u32);
        assert_eq!(blocks_for(&inode, 0, 0), Vec::<u32>::new());
        assert_eq!(blocks_for(&inode, 0, 1), vec![10]);
        assert_eq!(blocks_for(&inode, BLOCK_SIZE - 1, 2), vec![10, 11]);
        assert_eq!(blocks_for(&inode, BLOCK_SIZE, 2 * BLOCK_SIZE), vec![11, 20]);
    }

    #[test]
    fn test_grow_and_shrink() {
        let sb = layout(64, 32).unwrap();
        let mut bitmap = Bitmap::format(&sb);
        let free = bitmap.count_free();
        let mut inode = file_with(&[], 0);

        let fresh = grow(&mut bitmap, &mut inode, BLOCK_SIZE + 1).unwrap();
        assert_eq!(fresh.len(), 2);
        assert_eq!(&inode.direct_ptrs[..2], fresh.as_slice());
        assert_eq!(inode.direct_ptrs[2], NULL_BLOCK);
        inode.size = BLOCK_SIZE as u32 + 1;

        // Growing within the last block allocates nothing.
        assert!(grow(&mut bitmap, &mut inode, 2 * BLOCK_SIZE).unwrap().is_empty());
        assert_eq!(bitmap.count_free(), free - 2);

        assert_eq!(shrink_to_zero(&mut bitmap, &mut inode).unwrap(), 2);
        assert_eq!(inode.size, 0);
        assert_eq!(inode.allocated_blocks(), 0);
        assert_eq!(bitmap.count_free(), free);
    }

    #[test]
    fn test_grow_rolls_back() {
        let sb = layout(16, 32).unwrap();
        let mut bitmap = Bitmap::format(&sb);
        let free = bitmap.count_free() as usize;
        let mut inode = file_with(&[], 0);

        let result = grow(&mut bitmap, &mut inode, (free + 1) * BLOCK_SIZE);
        assert_eq!(result, Err(FsError::NoSpace));
        assert_eq!(bitmap.count_free() as usize, free);
        assert_eq!(inode.allocated_blocks(), 0);
    }

    #[test]
    fn test_grow_past_max_size() {
        let sb = layout(256, 32).unwrap();
        let mut bitmap = Bitmap::format(&sb);
        let mut inode = file_with(&[], 0);
        assert_eq!(grow(&mut bitmap, &mut inode, MAX_FILE_SIZE + 1), Err(FsError::NoSpace));
        assert_eq!(grow(&mut bitmap, &mut inode, MAX_FILE_SIZE).unwrap().len(), NUM_DIRECT_PTRS);
    }
}
