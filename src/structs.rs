//! On-disk records and their little-endian byte codecs.

use crate::config::*;
use crate::error::{FsError, Result};

fn get_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn get_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,              // Magic number to identify the filesystem
    pub num_blocks: u32,         // Total number of blocks in the filesystem
    pub bitmap_start: u32,       // Block number where the block bitmap starts
    pub bitmap_blocks: u32,      // Size of the bitmap in blocks
    pub inode_table_start: u32,  // Block number where the inode table starts
    pub inode_table_blocks: u32, // Size of the inode table in blocks
    pub num_inodes: u32,         // Number of inode records, including the reserved one
    pub root_inode: u32,         // Inode number of the root directory
    pub data_start: u32,         // Block number where data blocks start
}

impl SuperBlock {
    pub fn decode(buf: &[u8]) -> Self {
        SuperBlock {
            magic: get_u32(buf, 0),
            num_blocks: get_u32(buf, 4),
            bitmap_start: get_u32(buf, 8),
            bitmap_blocks: get_u32(buf, 12),
            inode_table_start: get_u32(buf, 16),
            inode_table_blocks: get_u32(buf, 20),
            num_inodes: get_u32(buf, 24),
            root_inode: get_u32(buf, 28),
            data_start: get_u32(buf, 32),
        }
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        put_u32(&mut buf, 0, self.magic);
        put_u32(&mut buf, 4, self.num_blocks);
        put_u32(&mut buf, 8, self.bitmap_start);
        put_u32(&mut buf, 12, self.bitmap_blocks);
        put_u32(&mut buf, 16, self.inode_table_start);
        put_u32(&mut buf, 20, self.inode_table_blocks);
        put_u32(&mut buf, 24, self.num_inodes);
        put_u32(&mut buf, 28, self.root_inode);
        put_u32(&mut buf, 32, self.data_start);
        buf
    }

    /// Blocks occupied by the superblock, the bitmap and the inode table.
    pub fn metadata_blocks(&self) -> u32 {
        self.data_start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub uid: u16,
    pub gid: u16,
    pub mode: u32, // S_IFMT type bits | permission bits, 0 for a free slot
    pub ctime: u32,
    pub mtime: u32,
    pub size: u32,
    pub direct_ptrs: [u32; NUM_DIRECT_PTRS],
}

impl Inode {
    pub const FREE: Self = Self {
        uid: 0,
        gid: 0,
        mode: 0,
        ctime: 0,
        mtime: 0,
        size: 0,
        direct_ptrs: [NULL_BLOCK; NUM_DIRECT_PTRS],
    };

    pub fn new(mode: u32, uid: u16, gid: u16, time: u32) -> Self {
        Self {
            uid,
            gid,
            mode,
            ctime: time,
            mtime: time,
            ..Self::FREE
        }
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut direct_ptrs = [NULL_BLOCK; NUM_DIRECT_PTRS];
        for (i, ptr) in direct_ptrs.iter_mut().enumerate() {
            *ptr = get_u32(buf, 20 + i * 4);
        }
        Inode {
            uid: get_u16(buf, 0),
            gid: get_u16(buf, 2),
            mode: get_u32(buf, 4),
            ctime: get_u32(buf, 8),
            mtime: get_u32(buf, 12),
            size: get_u32(buf, 16),
            direct_ptrs,
        }
    }

    /// Writes the record into `buf`, which must be at least INODE_SIZE bytes.
    pub fn encode(&self, buf: &mut [u8]) {
        put_u16(buf, 0, self.uid);
        put_u16(buf, 2, self.gid);
        put_u32(buf, 4, self.mode);
        put_u32(buf, 8, self.ctime);
        put_u32(buf, 12, self.mtime);
        put_u32(buf, 16, self.size);
        for (i, ptr) in self.direct_ptrs.iter().enumerate() {
            put_u32(buf, 20 + i * 4, *ptr);
        }
    }

    pub fn is_free(&self) -> bool {
        self.mode == 0
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn kind(&self) -> FileKind {
        if self.is_dir() {
            FileKind::Directory
        } else {
            FileKind::Regular
        }
    }

    pub fn perm(&self) -> u32 {
        self.mode & PERM_MASK
    }

    /// Number of pointer slots holding a block.
    pub fn allocated_blocks(&self) -> usize {
        self.direct_ptrs.iter().filter(|&&p| p != NULL_BLOCK).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub inode_id: u32,
    pub valid: bool,
    pub name: [u8; MAX_FILE_NAME_LEN],
}

/// Strips the zero padding of a fixed-width name field.
pub fn trim_zero(name: &[u8]) -> &[u8] {
    let mut end = name.len();
    while end > 0 && name[end - 1] == 0 {
        end -= 1;
    }
    &name[..end]
}

impl DirEntry {
    pub const NULL: Self = Self {
        inode_id: 0,
        valid: false,
        name: [0; MAX_FILE_NAME_LEN],
    };

    pub fn new(inode_id: u32, name: &str) -> Result<Self> {
        let mut entry = Self {
            inode_id,
            valid: true,
            ..Self::NULL
        };
        entry.set_name(name)?;
        Ok(entry)
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.contains(&0) || bytes.contains(&b'/') {
            return Err(FsError::InvalidPath);
        }
        if bytes.len() > MAX_FILE_NAME_LEN {
            return Err(FsError::NameTooLong);
        }
        self.name = [0; MAX_FILE_NAME_LEN];
        self.name[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut name = [0; MAX_FILE_NAME_LEN];
        name.copy_from_slice(&buf[5..DIR_ENTRY_SIZE]);
        DirEntry {
            inode_id: get_u32(buf, 0),
            valid: buf[4] != 0,
            name,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.inode_id);
        buf[4] = self.valid as u8;
        buf[5..DIR_ENTRY_SIZE].copy_from_slice(&self.name);
    }

    pub fn name_bytes(&self) -> &[u8] {
        trim_zero(&self.name)
    }

    pub fn name_eq(&self, name: &[u8]) -> bool {
        self.name_bytes() == name
    }

    pub fn name_string(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }
}
