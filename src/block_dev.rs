use crate::config::BLOCK_SIZE;
use crate::error::Result;

pub trait BlockDevice: Send + Sync {
    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> usize;

    /// Reads `buf.len() / BLOCK_SIZE` consecutive blocks starting at `start`.
    /// buf.len() must be a non-zero multiple of BLOCK_SIZE.
    /// Either the whole range is read or an error is returned.
    fn read_blocks(&self, start: u32, buf: &mut [u8]) -> Result<()>;

    /// Writes `buf.len() / BLOCK_SIZE` consecutive blocks starting at `start`.
    /// buf.len() must be a non-zero multiple of BLOCK_SIZE.
    fn write_blocks(&self, start: u32, buf: &[u8]) -> Result<()>;

    /// Flushes any buffered data to the underlying storage.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.read_blocks(block_id, buf)
    }

    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.write_blocks(block_id, buf)
    }
}

/// Checks that a buffer covers whole blocks lying inside the device.
/// Device implementations call this before touching storage.
pub fn check_range(num_blocks: usize, start: u32, len: usize) -> Result<()> {
    if len == 0 || len % BLOCK_SIZE != 0 {
        return Err(crate::FsError::InvalidBlockId);
    }
    let end = start as usize + len / BLOCK_SIZE;
    if end > num_blocks {
        return Err(crate::FsError::InvalidBlockId);
    }
    Ok(())
}
