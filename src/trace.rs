//! Tracing is implemented as a block device that wraps another block device,
//! the same way any other device-level policy would be layered on.
//! Every transfer is logged at trace level and counted.

use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;

use crate::{BlockDevice, Result, BLOCK_SIZE};

#[derive(Debug)]
pub struct Traced<D: BlockDevice> {
    device: D,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl<D: BlockDevice> Traced<D> {
    pub fn new(device: D) -> Self {
        Traced {
            device,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of blocks read through this wrapper so far.
    pub fn blocks_read(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of blocks written through this wrapper so far.
    pub fn blocks_written(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn into_inner(self) -> D {
        self.device
    }
}

impl<D: BlockDevice> BlockDevice for Traced<D> {
    fn num_blocks(&self) -> usize {
        self.device.num_blocks()
    }

    fn read_blocks(&self, start: u32, buf: &mut [u8]) -> Result<()> {
        let count = buf.len() / BLOCK_SIZE;
        trace!("R {} +{}", start, count);
        self.device.read_blocks(start, buf)?;
        self.reads.fetch_add(count as u64, Ordering::Relaxed);
        Ok(())
    }

    fn write_blocks(&self, start: u32, buf: &[u8]) -> Result<()> {
        let count = buf.len() / BLOCK_SIZE;
        trace!("W {} +{}", start, count);
        self.device.write_blocks(start, buf)?;
        self.writes.fetch_add(count as u64, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        trace!("F");
        self.device.flush()
    }
}
