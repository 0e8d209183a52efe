//! Management of the block bitmap.
//! One bit per device block, set while the block is in use. The bitmap is mirrored
//! in memory; allocation and freeing only touch the mirror and remember which bitmap
//! blocks changed, `flush` writes those back.

use std::collections::BTreeSet;

use bitvec::prelude::*;
use log::{debug, warn};

use crate::config::*;
use crate::error::{FsError, Result};
use crate::{BlockDevice, SuperBlock};

#[derive(Debug)]
pub struct Bitmap {
    bits: BitVec<u8, Lsb0>,
    bitmap_start: u32,
    num_blocks: u32,
    data_start: u32,
    dirty: BTreeSet<u32>, // bitmap block indices relative to bitmap_start
}

impl Bitmap {
    /// A fresh bitmap with only the metadata regions in use. Every bitmap block is dirty.
    pub fn format(superblock: &SuperBlock) -> Self {
        let bytes = vec![0u8; superblock.bitmap_blocks as usize * BLOCK_SIZE];
        let mut bitmap = Self::from_bytes(bytes, superblock);
        bitmap.bits[..superblock.data_start as usize].fill(true);
        bitmap.dirty = (0..superblock.bitmap_blocks).collect();
        bitmap
    }

    /// Reads the bitmap region of the device into memory.
    pub fn load(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<Self> {
        let mut bytes = vec![0u8; superblock.bitmap_blocks as usize * BLOCK_SIZE];
        device.read_blocks(superblock.bitmap_start, &mut bytes)?;
        let mut bitmap = Self::from_bytes(bytes, superblock);

        let metadata = &mut bitmap.bits[..superblock.data_start as usize];
        if !metadata.all() {
            warn!("metadata blocks were marked free in the bitmap, repairing");
            metadata.fill(true);
            bitmap.dirty = (0..superblock.bitmap_blocks).collect();
        }
        debug!(
            "bitmap loaded: {} of {} blocks free",
            bitmap.count_free(),
            superblock.num_blocks
        );
        Ok(bitmap)
    }

    fn from_bytes(bytes: Vec<u8>, superblock: &SuperBlock) -> Self {
        Bitmap {
            bits: BitVec::from_vec(bytes),
            bitmap_start: superblock.bitmap_start,
            num_blocks: superblock.num_blocks,
            data_start: superblock.data_start,
            dirty: BTreeSet::new(),
        }
    }

    fn mark_dirty(&mut self, block_id: u32) {
        self.dirty.insert(block_id / BITS_PER_BLOCK as u32);
    }

    /// Allocates the first free block and returns its block ID.
    pub fn allocate(&mut self) -> Result<u32> {
        let block_id = self.bits[..self.num_blocks as usize]
            .first_zero()
            .ok_or(FsError::NoSpace)? as u32;
        self.bits.set(block_id as usize, true);
        self.mark_dirty(block_id);
        Ok(block_id)
    }

    /// Marks a data block free. Freeing an already free block changes nothing.
    pub fn free(&mut self, block_id: u32) -> Result<()> {
        if block_id < self.data_start || block_id >= self.num_blocks {
            return Err(FsError::InvalidBlockId);
        }
        if self.bits[block_id as usize] {
            self.bits.set(block_id as usize, false);
            self.mark_dirty(block_id);
        }
        Ok(())
    }

    pub fn is_used(&self, block_id: u32) -> bool {
        block_id < self.num_blocks && self.bits[block_id as usize]
    }

    pub fn count_used(&self) -> u32 {
        self.bits[..self.num_blocks as usize].count_ones() as u32
    }

    pub fn count_free(&self) -> u32 {
        self.num_blocks - self.count_used()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Writes every changed bitmap block back to the device.
    pub fn flush(&mut self, device: &impl BlockDevice) -> Result<()> {
        let raw = self.bits.as_raw_slice();
        while let Some(&index) = self.dirty.first() {
            let start = index as usize * BLOCK_SIZE;
            device.write_blocks(self.bitmap_start + index, &raw[start..start + BLOCK_SIZE])?;
            self.dirty.remove(&index);
        }
        Ok(())
    }
}
