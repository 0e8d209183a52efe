//! A block device backed by a disk image on the host file system.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, error};
use parking_lot::Mutex;

use crate::block_dev::{check_range, BlockDevice};
use crate::config::BLOCK_SIZE;
use crate::error::{FsError, Result};

#[derive(Debug)]
pub struct ImageFile {
    inner: Mutex<File>,
    num_blocks: usize,
}

impl ImageFile {
    /// Opens an existing image. Trailing bytes that do not fill a block are ignored.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::options().read(true).write(true).open(path)?;
        let num_blocks = file.metadata()?.len() as usize / BLOCK_SIZE;
        debug!("opened image {} with {} blocks", path.display(), num_blocks);
        Ok(ImageFile {
            inner: Mutex::new(file),
            num_blocks,
        })
    }

    /// Creates (or truncates) an image of `num_blocks` zeroed blocks.
    pub fn create(path: impl AsRef<Path>, num_blocks: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len((num_blocks * BLOCK_SIZE) as u64)?;
        debug!("created image {} with {} blocks", path.display(), num_blocks);
        Ok(ImageFile {
            inner: Mutex::new(file),
            num_blocks,
        })
    }
}

impl BlockDevice for ImageFile {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_blocks(&self, start: u32, buf: &mut [u8]) -> Result<()> {
        check_range(self.num_blocks, start, buf.len())?;
        let mut file = self.inner.lock();
        file.seek(SeekFrom::Start(start as u64 * BLOCK_SIZE as u64))
            .and_then(|_| file.read_exact(buf))
            .map_err(|e| {
                error!("image read of block {} failed: {}", start, e);
                FsError::from(e)
            })
    }

    fn write_blocks(&self, start: u32, buf: &[u8]) -> Result<()> {
        check_range(self.num_blocks, start, buf.len())?;
        let mut file = self.inner.lock();
        file.seek(SeekFrom::Start(start as u64 * BLOCK_SIZE as u64))
            .and_then(|_| file.write_all(buf))
            .map_err(|e| {
                error!("image write of block {} failed: {}", start, e);
                FsError::from(e)
            })
    }

    fn flush(&self) -> Result<()> {
        let file = self.inner.lock();
        file.sync_data()?;
        Ok(())
    }
}
