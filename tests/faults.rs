#![allow(unused)]

mod common;

use std::sync::Arc;

use common::{new_fs, pattern, user, RamDisk, DISK_BLOCKS, DISK_INODES};
use lfs::*;

type Fs = FileSystem<RamDisk>;

/// Runs `op` on a fresh volume once per device write it issues, failing a
/// different write each time. After every run the volume must verify, take new
/// files without sharing inodes or blocks, and mount cleanly after a sync.
fn fault_each_write<T: std::fmt::Debug>(
    setup: impl Fn(&mut Fs),
    op: impl Fn(&mut Fs) -> Result<T>,
    check: impl Fn(&Fs, &Result<T>),
) {
    let (mut fs, rd) = new_fs(DISK_BLOCKS, DISK_INODES);
    setup(&mut fs);
    let before = rd.write_calls();
    op(&mut fs).unwrap();
    let writes = rd.write_calls() - before;
    assert!(writes > 0);

    for n in 1..=writes {
        let (mut fs, rd) = new_fs(DISK_BLOCKS, DISK_INODES);
        setup(&mut fs);
        rd.fail_nth_write(n);
        let result = op(&mut fs);
        rd.fail_nth_write(0);
        log!("write {} of {} failed: {:?}", n, writes, result);

        fs.verify().unwrap();
        check(&fs, &result);

        fs.create("/after", 0o644, &user()).unwrap();
        fs.write("/after", 0, &pattern(BLOCK_SIZE + 1)).unwrap();
        fs.verify().unwrap();

        fs.sync().unwrap();
        let remounted = FileSystem::mount(Arc::clone(&rd)).unwrap();
        assert_eq!(remounted.verify().unwrap(), fs.verify().unwrap());
    }
}

fn with_file(fs: &mut Fs) {
    fs.create("/f", 0o644, &user()).unwrap();
    fs.write("/f", 0, &pattern(2 * BLOCK_SIZE)).unwrap();
}

#[test]
fn test_create_faults() {
    fault_each_write(
        |_| {},
        |fs| fs.create("/g", 0o644, &user()),
        |fs, result| match result {
            Ok(id) => assert_eq!(fs.lookup("/g").unwrap(), (*id, FileKind::Regular)),
            Err(e) => {
                assert!(matches!(e, Error::IoFault(_)));
                assert_eq!(fs.getattr("/g"), Err(Error::NotFound));
            }
        },
    );
}

#[test]
fn test_mkdir_faults() {
    fault_each_write(
        |fs| {
            fs.mkdir("/d", 0o755, &user()).unwrap();
        },
        |fs| fs.mkdir("/d/sub", 0o755, &user()),
        |fs, result| match result {
            Ok(id) => {
                assert_eq!(fs.lookup("/d/sub").unwrap(), (*id, FileKind::Directory));
                assert!(fs.readdir("/d/sub").unwrap().is_empty());
            }
            Err(_) => assert_eq!(fs.getattr("/d/sub"), Err(Error::NotFound)),
        },
    );
}

#[test]
fn test_write_faults() {
    fault_each_write(
        |fs| {
            fs.create("/f", 0o644, &user()).unwrap();
            fs.write("/f", 0, b"stable").unwrap();
        },
        |fs| fs.write("/f", 6, &pattern(2 * BLOCK_SIZE)),
        |fs, result| {
            let size = fs.getattr("/f").unwrap().size as usize;
            let mut head = [0u8; 6];
            fs.read("/f", 0, &mut head).unwrap();
            assert_eq!(&head, b"stable");
            match result {
                Ok(_) => {
                    assert_eq!(size, 6 + 2 * BLOCK_SIZE);
                    let mut tail = vec![0u8; 2 * BLOCK_SIZE];
                    fs.read("/f", 6, &mut tail).unwrap();
                    assert_eq!(tail, pattern(2 * BLOCK_SIZE));
                }
                Err(_) => assert_eq!(size, 6),
            }
        },
    );
}

#[test]
fn test_truncate_faults() {
    fault_each_write(
        with_file,
        |fs| fs.truncate("/f", 0),
        |fs, result| {
            let attr = fs.getattr("/f").unwrap();
            match result {
                Ok(_) => assert_eq!((attr.size, attr.blocks), (0, 0)),
                Err(_) => {
                    assert_eq!((attr.size, attr.blocks), (2 * BLOCK_SIZE as u64, 2));
                    let mut buf = vec![0u8; 2 * BLOCK_SIZE];
                    fs.read("/f", 0, &mut buf).unwrap();
                    assert_eq!(buf, pattern(2 * BLOCK_SIZE));
                }
            }
        },
    );
}

#[test]
fn test_truncate_failure_keeps_blocks() {
    let (mut fs, rd) = new_fs(DISK_BLOCKS, DISK_INODES);
    with_file(&mut fs);
    let free = fs.statfs().free_blocks;

    rd.set_fail_writes(true);
    assert!(matches!(fs.truncate("/f", 0), Err(Error::IoFault(_))));
    rd.set_fail_writes(false);
    assert_eq!(fs.statfs().free_blocks, free);

    // A new file must not be handed the blocks /f still points at.
    fs.create("/g", 0o644, &user()).unwrap();
    fs.write("/g", 0, &[7u8; 10]).unwrap();
    let mut buf = vec![0u8; 2 * BLOCK_SIZE];
    fs.read("/f", 0, &mut buf).unwrap();
    assert_eq!(buf, pattern(2 * BLOCK_SIZE));
    fs.verify().unwrap();
}

#[test]
fn test_unlink_faults() {
    fault_each_write(
        with_file,
        |fs| fs.unlink("/f"),
        |fs, result| match result {
            Ok(_) => assert_eq!(fs.getattr("/f"), Err(Error::NotFound)),
            Err(_) => assert_eq!(fs.getattr("/f").unwrap().size, 2 * BLOCK_SIZE as u64),
        },
    );
}

#[test]
fn test_rmdir_faults() {
    fault_each_write(
        |fs| {
            fs.mkdir("/d", 0o755, &user()).unwrap();
        },
        |fs| fs.rmdir("/d"),
        |fs, result| match result {
            Ok(_) => assert_eq!(fs.getattr("/d"), Err(Error::NotFound)),
            Err(_) => assert_eq!(fs.getattr("/d").unwrap().kind, FileKind::Directory),
        },
    );
}

#[test]
fn test_rename_faults() {
    fault_each_write(
        with_file,
        |fs| fs.rename("/f", "/renamed"),
        |fs, result| {
            let (present, absent) = match result {
                Ok(_) => ("/renamed", "/f"),
                Err(_) => ("/f", "/renamed"),
            };
            assert_eq!(fs.getattr(present).unwrap().size, 2 * BLOCK_SIZE as u64);
            assert_eq!(fs.getattr(absent), Err(Error::NotFound));
        },
    );
}

#[test]
fn test_linked_node_survives_parent_update_failure() {
    let (mut fs, rd) = new_fs(DISK_BLOCKS, DISK_INODES);
    // The third write of a file creation updates the parent's mtime.
    rd.fail_nth_write(3);
    let g = fs.create("/g", 0o644, &user()).unwrap();
    rd.fail_nth_write(0);

    assert_eq!(fs.lookup("/g").unwrap().0, g);
    let h = fs.create("/h", 0o644, &user()).unwrap();
    assert_ne!(g, h);
    fs.verify().unwrap();
}

#[test]
fn test_unlink_finishes_after_entry_removed() {
    let (mut fs, rd) = new_fs(DISK_BLOCKS, DISK_INODES);
    with_file(&mut fs);
    let before = fs.statfs();
    // The second write of an unlink updates the parent's mtime.
    rd.fail_nth_write(2);
    fs.unlink("/f").unwrap();
    rd.fail_nth_write(0);

    assert_eq!(fs.getattr("/f"), Err(Error::NotFound));
    let after = fs.statfs();
    assert_eq!(after.free_blocks, before.free_blocks + 2);
    assert_eq!(after.free_files, before.free_files + 1);
    fs.verify().unwrap();
}
