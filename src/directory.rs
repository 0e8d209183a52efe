//! Directory blocks.
//! A directory owns exactly one data block holding NUM_ENTRY_PER_BLOCK fixed-size
//! entries. Invalid entries are free slots; there are no '.' or '..' entries.

use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::*;
use crate::BlockDevice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirBlock {
    entries: Box<[DirEntry; NUM_ENTRY_PER_BLOCK]>,
}

impl Default for DirBlock {
    fn default() -> Self {
        DirBlock {
            entries: Box::new([DirEntry::NULL; NUM_ENTRY_PER_BLOCK]),
        }
    }
}

impl DirBlock {
    /// Decodes every slot of a directory block, free ones included.
    pub fn decode(buf: &[u8; BLOCK_SIZE]) -> Self {
        let mut block = Self::default();
        for (entry, raw) in block.entries.iter_mut().zip(buf.chunks_exact(DIR_ENTRY_SIZE)) {
            *entry = DirEntry::decode(raw);
        }
        block
    }

    pub fn encode(&self) -> Box<[u8; BLOCK_SIZE]> {
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        for (entry, raw) in self.entries.iter().zip(buf.chunks_exact_mut(DIR_ENTRY_SIZE)) {
            entry.encode(raw);
        }
        buf
    }

    pub fn entries(&self) -> &[DirEntry] {
        self.entries.as_slice()
    }

    pub fn valid_entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| e.valid)
    }

    pub fn is_empty(&self) -> bool {
        self.valid_entries().next().is_none()
    }

    /// First free slot, or `NoSpace` when the block is full.
    pub fn find_free_slot(&self) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| !e.valid)
            .ok_or(FsError::NoSpace)
    }

    /// Finds the valid entry with this name and returns its slot and inode number.
    pub fn lookup(&self, name: &[u8]) -> Option<(usize, u32)> {
        if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
            return None;
        }
        self.entries
            .iter()
            .position(|e| e.valid && e.name_eq(name))
            .map(|slot| (slot, self.entries[slot].inode_id))
    }

    pub fn insert(&mut self, slot: usize, entry: DirEntry) {
        debug_assert!(!self.entries[slot].valid);
        self.entries[slot] = entry;
    }

    /// Invalidates a slot and returns the inode number it pointed at.
    pub fn remove(&mut self, slot: usize) -> u32 {
        let inode_id = self.entries[slot].inode_id;
        self.entries[slot] = DirEntry::NULL;
        inode_id
    }

    pub fn rename(&mut self, slot: usize, name: &str) -> Result<()> {
        self.entries[slot].set_name(name)
    }
}

pub fn read_dir_block(device: &impl BlockDevice, block_id: u32) -> Result<DirBlock> {
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(block_id, &mut buf)?;
    Ok(DirBlock::decode(&buf))
}

pub fn write_dir_block(device: &impl BlockDevice, block_id: u32, block: &DirBlock) -> Result<()> {
    device.write_block(block_id, &block.encode())
}

/// The block holding a directory's entries.
pub fn dir_block_id(dir_inode: &Inode) -> Result<u32> {
    if !dir_inode.is_dir() {
        return Err(FsError::NotADirectory);
    }
    match dir_inode.direct_ptrs[0] {
        NULL_BLOCK => Err(FsError::Corrupted),
        block_id => Ok(block_id),
    }
}
