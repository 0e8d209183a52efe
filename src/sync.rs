//! A cloneable handle for dispatchers that serve requests from several threads.
//! Each call holds one lock over the whole volume, so a request's resolve,
//! allocation, inode and directory updates are never observed half done.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::attr::{Caller, DirListing, FileAttr, StatFs};
use crate::{BlockDevice, FileSystem, Result};

pub struct SharedFileSystem<D: BlockDevice> {
    inner: Arc<Mutex<FileSystem<D>>>,
}

impl<D: BlockDevice> Clone for SharedFileSystem<D> {
    fn clone(&self) -> Self {
        SharedFileSystem {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: BlockDevice> SharedFileSystem<D> {
    pub fn new(fs: FileSystem<D>) -> Self {
        SharedFileSystem {
            inner: Arc::new(Mutex::new(fs)),
        }
    }

    /// Locks the volume for a sequence of calls that must not interleave with others.
    pub fn lock(&self) -> MutexGuard<'_, FileSystem<D>> {
        self.inner.lock()
    }

    pub fn statfs(&self) -> StatFs {
        self.lock().statfs()
    }

    pub fn getattr(&self, path: &str) -> Result<FileAttr> {
        self.lock().getattr(path)
    }

    pub fn readdir(&self, path: &str) -> Result<Vec<DirListing>> {
        self.lock().readdir(path)
    }

    pub fn read(&self, path: &str, offset: usize, buf: &mut [u8]) -> Result<usize> {
        self.lock().read(path, offset, buf)
    }

    pub fn write(&self, path: &str, offset: usize, data: &[u8]) -> Result<usize> {
        self.lock().write(path, offset, data)
    }

    pub fn create(&self, path: &str, mode: u32, caller: &Caller) -> Result<u32> {
        self.lock().create(path, mode, caller)
    }

    pub fn mkdir(&self, path: &str, mode: u32, caller: &Caller) -> Result<u32> {
        self.lock().mkdir(path, mode, caller)
    }

    pub fn unlink(&self, path: &str) -> Result<()> {
        self.lock().unlink(path)
    }

    pub fn rmdir(&self, path: &str) -> Result<()> {
        self.lock().rmdir(path)
    }

    pub fn rename(&self, src: &str, dst: &str) -> Result<()> {
        self.lock().rename(src, dst)
    }

    pub fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        self.lock().chmod(path, mode)
    }

    pub fn truncate(&self, path: &str, len: u64) -> Result<()> {
        self.lock().truncate(path, len)
    }

    pub fn utime(&self, path: &str, mtime: Option<u32>) -> Result<()> {
        self.lock().utime(path, mtime)
    }

    pub fn sync(&self) -> Result<()> {
        self.lock().sync()
    }
}
