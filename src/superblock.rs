use log::{info, warn};

use crate::config::*;
use crate::error::{FsError, Result};
use crate::{BlockDevice, SuperBlock};

/// Computes the region layout for a fresh volume.
/// The volume must at least hold its metadata plus the root directory block.
pub fn layout(num_blocks: u32, num_inodes: u32) -> Result<SuperBlock> {
    if num_inodes <= ROOT_INODE_ID {
        return Err(FsError::InvalidSuperBlock);
    }
    let bitmap_blocks = (num_blocks as usize).div_ceil(BITS_PER_BLOCK) as u32;
    let inode_table_blocks = (num_inodes as usize).div_ceil(INODES_PER_BLOCK) as u32;
    let inode_table_start = BITMAP_START + bitmap_blocks;
    let data_start = inode_table_start + inode_table_blocks;
    if data_start >= num_blocks {
        return Err(FsError::InvalidSuperBlock);
    }

    Ok(SuperBlock {
        magic: MAGIC,
        num_blocks,
        bitmap_start: BITMAP_START,
        bitmap_blocks,
        inode_table_start,
        inode_table_blocks,
        num_inodes,
        root_inode: ROOT_INODE_ID,
        data_start,
    })
}

/// Checks that the regions described by a superblock are where `layout` would put them
/// and that they fit on the device.
fn validate(superblock: &SuperBlock, device_blocks: usize) -> Result<()> {
    let expected = layout(superblock.num_blocks, superblock.num_inodes)?;
    if *superblock != expected || superblock.num_blocks as usize > device_blocks {
        return Err(FsError::InvalidSuperBlock);
    }
    Ok(())
}

pub fn read_superblock<D: BlockDevice>(device: &D) -> Result<SuperBlock> {
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(SUPERBLOCK_ID, &mut buf)?;
    let superblock = SuperBlock::decode(buf.as_slice());

    if superblock.magic != MAGIC {
        warn!("rejecting volume: magic {:#010x}, expected {:#010x}", superblock.magic, MAGIC);
        return Err(FsError::InvalidMagic);
    }
    if let Err(e) = validate(&superblock, device.num_blocks()) {
        warn!("rejecting volume: bad geometry {:?}", superblock);
        return Err(e);
    }

    info!(
        "superblock: {} blocks, {} bitmap blocks, {} inodes, data starts at {}",
        superblock.num_blocks, superblock.bitmap_blocks, superblock.num_inodes, superblock.data_start
    );
    Ok(superblock)
}

pub fn write_superblock<D: BlockDevice>(device: &D, superblock: &SuperBlock) -> Result<()> {
    let buf = Box::new(superblock.encode());
    device.write_block(SUPERBLOCK_ID, &buf)?;
    Ok(())
}
