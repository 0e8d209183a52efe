//! Attribute records handed to the dispatcher, and the caller context of a request.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::{FileKind, Inode};

/// Seconds since the epoch, as stored in inode timestamps.
pub fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Who is asking, and when. Owner fields of new inodes come from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub uid: u16,
    pub gid: u16,
    pub time: u32,
}

impl Caller {
    pub fn new(uid: u16, gid: u16) -> Self {
        Caller { uid, gid, time: now() }
    }

    pub fn at(uid: u16, gid: u16, time: u32) -> Self {
        Caller { uid, gid, time }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr {
    pub ino: u32,
    pub kind: FileKind,
    pub mode: u32,
    pub perm: u32,
    pub nlink: u32,
    pub uid: u16,
    pub gid: u16,
    pub size: u64,
    pub blocks: u64,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}

impl FileAttr {
    pub fn from_inode(ino: u32, inode: &Inode) -> Self {
        FileAttr {
            ino,
            kind: inode.kind(),
            mode: inode.mode,
            perm: inode.perm(),
            nlink: 1, // No hard links
            uid: inode.uid,
            gid: inode.gid,
            size: inode.size as u64,
            blocks: inode.allocated_blocks() as u64,
            atime: inode.mtime, // Access time is not tracked
            mtime: inode.mtime,
            ctime: inode.ctime,
        }
    }
}

/// Volume statistics in the shape of `statvfs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    pub block_size: u32,
    pub blocks: u32,
    pub free_blocks: u32,
    pub available_blocks: u32,
    pub files: u32,
    pub free_files: u32,
    pub name_max: u32,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListing {
    pub name: String,
    pub attr: FileAttr,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::*;

    #[test]
    fn test_attr_from_inode() {
        let mut inode = Inode::new(S_IFDIR | 0o750, 7, 8, 100);
        inode.mtime = 200;
        inode.size = BLOCK_SIZE as u32;
        inode.direct_ptrs[0] = 12;
        let attr = FileAttr::from_inode(4, &inode);
        assert_eq!(attr.kind, FileKind::Directory);
        assert_eq!(attr.perm, 0o750);
        assert_eq!(attr.nlink, 1);
        assert_eq!(attr.atime, 200);
        assert_eq!(attr.ctime, 100);
        assert_eq!(attr.blocks, 1);
    }
}
