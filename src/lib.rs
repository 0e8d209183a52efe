//! A small block file system with a fixed on-disk format, meant to sit behind a
//! user-space file system dispatcher (FUSE or similar).
//! No links, no holes, no journaling; directories hold at most one block of entries.
//!
//! Linear layout, 4096-byte blocks:
//! - Superblock (block 0)
//! - Block Bitmap (one bit per block of the volume)
//! - Inode Table (128-byte records, 27 direct pointers each)
//! - Data Blocks
//!
//! Layers (from bottom to top):
//! 1. Block Device: whole-block reads and writes.             | User implemented (ImageFile provided)
//! 2. Bitmap / Inode table: allocation state, kept in memory. | Fs implemented
//! 3. Directory/Path: entry blocks and path walking.          | Fs implemented
//! 4. File: offset to block mapping, reads and writes.        | Fs implemented
//! 5. FileSystem: the operation handlers.                     | Dispatcher calls these (errno via FsError::errno)

mod config;
mod block_dev;
mod image;
mod trace;
mod structs;
mod superblock;
mod bitmap;
mod inode;
mod directory;
mod path;
mod file;
mod attr;
mod fs;
mod sync;
mod error;

pub use block_dev::{check_range, BlockDevice};
pub use config::*;
pub use image::ImageFile;
pub use trace::Traced;
pub use structs::*;
pub use superblock::{layout, read_superblock, write_superblock};
pub use bitmap::Bitmap;
pub use inode::{get_inode, write_inode, InodeTable};
pub use directory::{read_dir_block, write_dir_block, DirBlock};
pub use path::{components, resolve, resolve_parent, split, ParentLookup};
pub use file::{blocks_for, blocks_needed, fread, fwrite, grow, shrink_to_zero};
pub use attr::*;
pub use fs::*;
pub use sync::SharedFileSystem;
pub use error::FsError;
pub use error::FsError as Error;
pub use error::Result;
