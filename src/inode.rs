//! Management of reading and writing to inodes.
//! Inode records live in a contiguous table right after the bitmap. A record whose
//! mode is zero is a free slot; inode 0 is never handed out.

use std::collections::BTreeSet;

use bitvec::prelude::*;
use log::debug;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::{BlockDevice, Inode, SuperBlock};

fn locate(superblock: &SuperBlock, inode_id: u32) -> Result<(u32, usize)> {
    if inode_id == RESERVED_INODE_ID || inode_id >= superblock.num_inodes {
        return Err(FsError::NotFound);
    }
    let block_id = superblock.inode_table_start + inode_id / INODES_PER_BLOCK as u32;
    let offset = (inode_id as usize % INODES_PER_BLOCK) * INODE_SIZE;
    Ok((block_id, offset))
}

pub fn get_inode(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inode_id: u32,
) -> Result<Inode> {
    let (block_id, offset) = locate(superblock, inode_id)?;
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(block_id, &mut buf)?;
    Ok(Inode::decode(&buf[offset..offset + INODE_SIZE]))
}

pub fn write_inode(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inode_id: u32,
    inode: &Inode,
) -> Result<()> {
    let (block_id, offset) = locate(superblock, inode_id)?;
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(block_id, &mut buf)?;
    inode.encode(&mut buf[offset..offset + INODE_SIZE]);
    device.write_block(block_id, &buf)?;
    Ok(())
}

/// In-memory record of which inode slots are live.
/// Freed slots whose on-disk record still has to be zeroed are kept in `stale`
/// and written back by `flush`, the same way the bitmap defers its dirty blocks.
#[derive(Debug)]
pub struct InodeTable {
    used: BitVec,
    stale: BTreeSet<u32>,
}

impl InodeTable {
    /// Only the reserved slot is in use; the caller writes the root inode itself.
    pub fn format(superblock: &SuperBlock) -> Self {
        let mut used = bitvec![0; superblock.num_inodes as usize];
        used.set(RESERVED_INODE_ID as usize, true);
        InodeTable {
            used,
            stale: BTreeSet::new(),
        }
    }

    /// Scans the whole inode table for live records.
    pub fn load(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<Self> {
        let mut table = vec![0u8; superblock.inode_table_blocks as usize * BLOCK_SIZE];
        device.read_blocks(superblock.inode_table_start, &mut table)?;

        let mut used = bitvec![0; superblock.num_inodes as usize];
        used.set(RESERVED_INODE_ID as usize, true);
        for inode_id in 1..superblock.num_inodes as usize {
            let offset = inode_id * INODE_SIZE;
            if !Inode::decode(&table[offset..offset + INODE_SIZE]).is_free() {
                used.set(inode_id, true);
            }
        }
        debug!("inode table loaded: {} live inodes", used.count_ones() - 1);
        Ok(InodeTable {
            used,
            stale: BTreeSet::new(),
        })
    }

    /// Claims the lowest free slot.
    pub fn alloc_slot(&mut self) -> Result<u32> {
        let inode_id = self.used.first_zero().ok_or(FsError::NoSpace)?;
        self.used.set(inode_id, true);
        Ok(inode_id as u32)
    }

    /// Frees a slot in memory. Its on-disk record is zeroed by the next `flush`
    /// unless the slot is claimed again first.
    pub fn discard(&mut self, inode_id: u32) {
        if inode_id != RESERVED_INODE_ID {
            self.used.set(inode_id as usize, false);
            self.stale.insert(inode_id);
        }
    }

    pub fn is_live(&self, inode_id: u32) -> bool {
        inode_id != RESERVED_INODE_ID && self.used.get(inode_id as usize).is_some_and(|b| *b)
    }

    pub fn is_dirty(&self) -> bool {
        !self.stale.is_empty()
    }

    pub fn live_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.used.iter_ones().skip(1).map(|i| i as u32)
    }

    pub fn count_free(&self) -> u32 {
        self.used.count_zeros() as u32
    }

    /// Zeroes the records of freed slots. A slot claimed again since it was freed
    /// belongs to its new owner and is skipped. On error the remaining records stay pending.
    pub fn flush(&mut self, device: &impl BlockDevice, superblock: &SuperBlock) -> Result<()> {
        while let Some(&inode_id) = self.stale.first() {
            if !self.used[inode_id as usize] {
                write_inode(device, superblock, inode_id, &Inode::FREE)?;
            }
            self.stale.remove(&inode_id);
        }
        Ok(())
    }
}
