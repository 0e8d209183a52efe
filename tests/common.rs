//! Common utilities for tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lfs::{check_range, BlockDevice, Caller, Error, FileSystem, Result, BLOCK_SIZE};

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

/// Routes the library's `log` output to the test harness. Safe to call from every test.
pub fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug)]
pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    num_blocks: usize,
    fail_writes: AtomicBool,
    fault_countdown: AtomicUsize,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl RamDisk {
    /// Creates a new RamDisk with the specified number of blocks.
    /// Each block is BLOCK_SIZE bytes.
    pub fn new(num_blocks: usize) -> Self {
        RamDisk {
            inner: Mutex::new(vec![0u8; num_blocks * BLOCK_SIZE]),
            num_blocks,
            fail_writes: AtomicBool::new(false),
            fault_countdown: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// Makes every following write fail with an I/O error until turned off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes only the `n`th write from now on fail (1 is the next one). 0 disarms it.
    pub fn fail_nth_write(&self, n: usize) {
        self.fault_countdown.store(n, Ordering::SeqCst);
    }

    /// Number of `write_blocks` calls seen so far, failed ones included.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Number of `read_blocks` calls served so far.
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Raw copy of one block, bypassing the file system.
    pub fn block(&self, block_id: u32) -> Vec<u8> {
        let start = block_id as usize * BLOCK_SIZE;
        self.inner.lock().unwrap()[start..start + BLOCK_SIZE].to_vec()
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_blocks(&self, start: u32, buf: &mut [u8]) -> Result<()> {
        check_range(self.num_blocks, start, buf.len())?;
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let start = start as usize * BLOCK_SIZE;
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[start..start + buf.len()]);
        Ok(())
    }

    fn write_blocks(&self, start: u32, buf: &[u8]) -> Result<()> {
        check_range(self.num_blocks, start, buf.len())?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let countdown = self
            .fault_countdown
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if self.fail_writes.load(Ordering::SeqCst) || countdown == Ok(1) {
            return Err(Error::IoFault(std::io::ErrorKind::Other));
        }
        let start = start as usize * BLOCK_SIZE;
        let mut data = self.inner.lock().unwrap();
        data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

pub const DISK_BLOCKS: u32 = 256;
pub const DISK_INODES: u32 = 160;

/// A formatted volume on a fresh RamDisk, plus the disk for inspection.
pub fn new_fs(num_blocks: u32, num_inodes: u32) -> (FileSystem<RamDisk>, Arc<RamDisk>) {
    setup();
    let rd = Arc::new(RamDisk::new(num_blocks as usize));
    let fs = FileSystem::format(Arc::clone(&rd), num_blocks, num_inodes).unwrap();
    (fs, rd)
}

pub fn user() -> Caller {
    Caller::at(1000, 100, 1_700_000_000)
}

/// Bytes 0, 1, 2, ... wrapping at 251 so block boundaries are visible in failures.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
