use std::collections::BTreeSet;
use std::sync::Arc;

use bitvec::prelude::*;
use log::{debug, info, warn};

use crate::attr::{now, Caller, DirListing, FileAttr, StatFs};
use crate::bitmap::Bitmap;
use crate::config::*;
use crate::directory::{dir_block_id, read_dir_block, write_dir_block, DirBlock};
use crate::error::{FsError, Result};
use crate::file::{blocks_needed, fread, fwrite, grow, release, shrink_to_zero};
use crate::inode::{get_inode, write_inode, InodeTable};
use crate::path::{resolve, resolve_parent, split, ParentLookup};
use crate::structs::*;
use crate::superblock::{layout, read_superblock, write_superblock};
use crate::BlockDevice;

/// Block and inode usage found by [`FileSystem::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub used_blocks: u32,
    pub live_inodes: u32,
}

#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    superblock: SuperBlock,
    bitmap: Bitmap,
    inodes: InodeTable,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Writes a fresh volume of `num_blocks` blocks with room for `num_inodes` inodes
    /// (the reserved inode 0 included), containing only an empty root directory.
    pub fn format(device: Arc<D>, num_blocks: u32, num_inodes: u32) -> Result<Self> {
        if num_blocks as usize > device.num_blocks() {
            return Err(FsError::InvalidSuperBlock);
        }
        let superblock = layout(num_blocks, num_inodes)?;
        info!(
            "formatting {} blocks: bitmap {}+{}, inode table {}+{}, data from {}",
            num_blocks,
            superblock.bitmap_start,
            superblock.bitmap_blocks,
            superblock.inode_table_start,
            superblock.inode_table_blocks,
            superblock.data_start
        );

        let zeroed = vec![0u8; superblock.inode_table_blocks as usize * BLOCK_SIZE];
        device.write_blocks(superblock.inode_table_start, &zeroed)?;

        let mut fs_inst = Self {
            bitmap: Bitmap::format(&superblock),
            inodes: InodeTable::format(&superblock),
            device,
            superblock,
        };

        let root_id = fs_inst.inodes.alloc_slot()?;
        debug_assert_eq!(root_id, ROOT_INODE_ID);
        let block_id = fs_inst.bitmap.allocate()?;
        write_dir_block(&*fs_inst.device, block_id, &DirBlock::default())?;
        let mut root = Inode::new(ROOT_DIR_MODE, 0, 0, now());
        root.size = BLOCK_SIZE as u32;
        root.direct_ptrs[0] = block_id;
        write_inode(&*fs_inst.device, &fs_inst.superblock, root_id, &root)?;

        fs_inst.bitmap.flush(&*fs_inst.device)?;
        write_superblock(&*fs_inst.device, &fs_inst.superblock)?;
        fs_inst.device.flush()?;
        Ok(fs_inst)
    }

    /// Loads an existing volume. A bad magic number means the device holds no
    /// volume of ours and nothing else can be done with it.
    pub fn mount(device: Arc<D>) -> Result<Self> {
        let superblock = read_superblock(&*device)?;
        let bitmap = Bitmap::load(&*device, &superblock)?;
        let inodes = InodeTable::load(&*device, &superblock)?;
        if !inodes.is_live(superblock.root_inode) {
            warn!("root inode {} is not allocated", superblock.root_inode);
            return Err(FsError::Corrupted);
        }
        Ok(Self {
            device,
            superblock,
            bitmap,
            inodes,
        })
    }

    // Following methods directly operate on the fs instance, wrap it in a SharedFileSystem
    // when requests arrive from more than one thread.

    pub fn statfs(&self) -> StatFs {
        let sb = &self.superblock;
        let free_blocks = self.bitmap.count_free();
        StatFs {
            block_size: BLOCK_SIZE as u32,
            blocks: sb.num_blocks - 1 - sb.bitmap_blocks,
            free_blocks,
            available_blocks: free_blocks,
            files: sb.num_inodes - 1,
            free_files: self.inodes.count_free(),
            name_max: MAX_FILE_NAME_LEN as u32,
        }
    }

    pub fn lookup(&self, path: &str) -> Result<(u32, FileKind)> {
        let inode_id = resolve(&*self.device, &self.superblock, path)?;
        Ok((inode_id, self.get_inode(inode_id)?.kind()))
    }

    pub fn getattr(&self, path: &str) -> Result<FileAttr> {
        debug!("getattr {:?}", path);
        let inode_id = resolve(&*self.device, &self.superblock, path)?;
        Ok(FileAttr::from_inode(inode_id, &self.get_inode(inode_id)?))
    }

    pub fn readdir(&self, path: &str) -> Result<Vec<DirListing>> {
        debug!("readdir {:?}", path);
        let inode_id = resolve(&*self.device, &self.superblock, path)?;
        let dir = self.get_inode(inode_id)?;
        let entries = read_dir_block(&*self.device, dir_block_id(&dir)?)?;
        entries
            .valid_entries()
            .map(|entry| {
                let child = self.get_inode(entry.inode_id)?;
                Ok(DirListing {
                    name: entry.name_string(),
                    attr: FileAttr::from_inode(entry.inode_id, &child),
                })
            })
            .collect()
    }

    /// Reads up to `buf.len()` bytes at `offset`; fewer near end of file, none past it.
    pub fn read(&self, path: &str, offset: usize, buf: &mut [u8]) -> Result<usize> {
        debug!("read {:?} offset {} len {}", path, offset, buf.len());
        let (_, inode) = self.resolve_file(path)?;
        fread(&*self.device, &inode, offset, buf)
    }

    /// Writes all of `data` at `offset`. The offset may be at most the current size,
    /// files never get holes.
    pub fn write(&mut self, path: &str, offset: usize, data: &[u8]) -> Result<usize> {
        debug!("write {:?} offset {} len {}", path, offset, data.len());
        let (inode_id, mut inode) = self.resolve_file(path)?;
        let size = inode.size as usize;
        if offset > size {
            return Err(FsError::InvalidOffset);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let end = offset + data.len();
        let fresh = grow(&mut self.bitmap, &mut inode, end)?;
        let written = fwrite(&*self.device, &inode, offset, data, &fresh).and_then(|_| {
            inode.size = size.max(end) as u32;
            inode.mtime = now();
            write_inode(&*self.device, &self.superblock, inode_id, &inode)
        });
        if let Err(e) = written {
            release(&mut self.bitmap, &fresh);
            return Err(e);
        }

        self.flush_tables();
        Ok(data.len())
    }

    /// Creates an empty regular file. Only the permission bits of `mode` are used.
    pub fn create(&mut self, path: &str, mode: u32, caller: &Caller) -> Result<u32> {
        debug!("create {:?} mode {:o}", path, mode);
        self.make_node(path, S_IFREG | (mode & PERM_MASK), caller)
    }

    /// Creates an empty directory. Only the permission bits of `mode` are used.
    pub fn mkdir(&mut self, path: &str, mode: u32, caller: &Caller) -> Result<u32> {
        debug!("mkdir {:?} mode {:o}", path, mode);
        self.make_node(path, S_IFDIR | (mode & PERM_MASK), caller)
    }

    fn make_node(&mut self, path: &str, mode: u32, caller: &Caller) -> Result<u32> {
        let mut lookup = resolve_parent(&*self.device, &self.superblock, path)?;
        let mut entry = DirEntry::new(RESERVED_INODE_ID, &lookup.name)?;
        if lookup.child().is_some() {
            return Err(FsError::AlreadyExists);
        }
        let slot = lookup.entries.find_free_slot()?;

        let mut inode = Inode::new(mode, caller.uid, caller.gid, caller.time);
        let mut fresh = Vec::new();
        if inode.is_dir() {
            let block_id = self.bitmap.allocate()?;
            inode.direct_ptrs[0] = block_id;
            inode.size = BLOCK_SIZE as u32;
            fresh.push(block_id);
        }
        let inode_id = match self.inodes.alloc_slot() {
            Ok(inode_id) => inode_id,
            Err(e) => {
                release(&mut self.bitmap, &fresh);
                return Err(e);
            }
        };
        entry.inode_id = inode_id;

        // The child is fully written before the parent's entry points at it.
        let linked = self.write_node(inode_id, &inode).and_then(|_| {
            lookup.entries.insert(slot, entry);
            write_dir_block(&*self.device, lookup.block_id, &lookup.entries)
        });
        if let Err(e) = linked {
            self.inodes.discard(inode_id);
            release(&mut self.bitmap, &fresh);
            return Err(e);
        }

        // Linked: from here on the node exists whatever else fails.
        self.touch_parent(&mut lookup, caller.time);
        self.flush_tables();
        Ok(inode_id)
    }

    fn write_node(&self, inode_id: u32, inode: &Inode) -> Result<()> {
        if inode.is_dir() {
            write_dir_block(&*self.device, inode.direct_ptrs[0], &DirBlock::default())?;
        }
        write_inode(&*self.device, &self.superblock, inode_id, inode)
    }

    /// Sets the parent directory's mtime. The entry change it records is already
    /// on disk, so a failure here is logged and not reported.
    fn touch_parent(&self, lookup: &mut ParentLookup, time: u32) {
        lookup.parent.mtime = time;
        if let Err(e) = write_inode(&*self.device, &self.superblock, lookup.parent_id, &lookup.parent) {
            warn!("could not update mtime of directory {}: {}", lookup.parent_id, e);
        }
    }

    /// Writes back freed inode records and changed bitmap blocks. Whatever fails
    /// stays pending for the next flush or `sync`.
    fn flush_tables(&mut self) {
        if let Err(e) = self.inodes.flush(&*self.device, &self.superblock) {
            warn!("inode table write-back deferred: {}", e);
        }
        if let Err(e) = self.bitmap.flush(&*self.device) {
            warn!("bitmap write-back deferred: {}", e);
        }
    }

    /// Removes a regular file and frees its data blocks.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        debug!("unlink {:?}", path);
        let lookup = resolve_parent(&*self.device, &self.superblock, path)?;
        let (slot, inode_id) = lookup.child().ok_or(FsError::NotFound)?;
        let inode = self.get_inode(inode_id)?;
        if inode.is_dir() {
            return Err(FsError::IsADirectory);
        }
        self.remove_node(lookup, slot, inode_id, inode)
    }

    /// Removes an empty directory.
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        debug!("rmdir {:?}", path);
        let lookup = resolve_parent(&*self.device, &self.superblock, path)?;
        let (slot, inode_id) = lookup.child().ok_or(FsError::NotFound)?;
        let inode = self.get_inode(inode_id)?;
        let entries = read_dir_block(&*self.device, dir_block_id(&inode)?)?;
        if !entries.is_empty() {
            return Err(FsError::NotEmpty);
        }
        self.remove_node(lookup, slot, inode_id, inode)
    }

    /// Unlinks the entry first, then releases the inode and its blocks. Once the
    /// entry is gone from disk the release always completes in memory.
    fn remove_node(
        &mut self,
        mut lookup: ParentLookup,
        slot: usize,
        inode_id: u32,
        inode: Inode,
    ) -> Result<()> {
        lookup.entries.remove(slot);
        write_dir_block(&*self.device, lookup.block_id, &lookup.entries)?;
        self.touch_parent(&mut lookup, now());

        let blocks: Vec<u32> = inode
            .direct_ptrs
            .iter()
            .copied()
            .filter(|&ptr| ptr != NULL_BLOCK)
            .collect();
        release(&mut self.bitmap, &blocks);
        self.inodes.discard(inode_id);
        self.flush_tables();
        debug!("released inode {} and {} blocks", inode_id, blocks.len());
        Ok(())
    }

    /// Renames an entry within its directory. Moving between directories and
    /// replacing an existing destination are not supported.
    pub fn rename(&mut self, src: &str, dst: &str) -> Result<()> {
        debug!("rename {:?} -> {:?}", src, dst);
        let (src_dirs, _) = split(src).ok_or(FsError::InvalidPath)?;
        let (dst_dirs, dst_name) = split(dst).ok_or(FsError::InvalidPath)?;

        let mut lookup = resolve_parent(&*self.device, &self.superblock, src)?;
        let (slot, _) = lookup.child().ok_or(FsError::NotFound)?;
        // Without links or '..' entries, two paths name the same directory only if they are equal.
        if src_dirs != dst_dirs {
            return Err(FsError::CrossDirectoryRename);
        }
        if dst_name.len() > MAX_FILE_NAME_LEN {
            return Err(FsError::NameTooLong);
        }
        if lookup.entries.lookup(dst_name.as_bytes()).is_some() {
            return Err(FsError::AlreadyExists);
        }

        lookup.entries.rename(slot, dst_name)?;
        write_dir_block(&*self.device, lookup.block_id, &lookup.entries)?;
        self.touch_parent(&mut lookup, now());
        Ok(())
    }

    /// Replaces the permission bits, keeping the file type.
    pub fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        debug!("chmod {:?} {:o}", path, mode);
        self.update_inode(path, |inode| {
            inode.mode = (inode.mode & S_IFMT) | (mode & PERM_MASK);
            inode.ctime = now();
        })
    }

    /// Only truncation to zero length is supported.
    pub fn truncate(&mut self, path: &str, len: u64) -> Result<()> {
        debug!("truncate {:?} to {}", path, len);
        let (inode_id, mut inode) = self.resolve_file(path)?;
        if len != 0 {
            return Err(FsError::UnsupportedTruncateLength);
        }
        let emptied = Inode {
            size: 0,
            mtime: now(),
            direct_ptrs: [NULL_BLOCK; NUM_DIRECT_PTRS],
            ..inode
        };
        write_inode(&*self.device, &self.superblock, inode_id, &emptied)?;
        // No pointer on disk refers to the old blocks any more.
        shrink_to_zero(&mut self.bitmap, &mut inode)?;
        self.flush_tables();
        Ok(())
    }

    /// Sets the modification time, to now when `mtime` is None.
    pub fn utime(&mut self, path: &str, mtime: Option<u32>) -> Result<()> {
        debug!("utime {:?} {:?}", path, mtime);
        let mtime = mtime.unwrap_or_else(now);
        self.update_inode(path, |inode| inode.mtime = mtime)
    }

    fn update_inode(&mut self, path: &str, f: impl FnOnce(&mut Inode)) -> Result<()> {
        let inode_id = resolve(&*self.device, &self.superblock, path)?;
        let mut inode = self.get_inode(inode_id)?;
        f(&mut inode);
        write_inode(&*self.device, &self.superblock, inode_id, &inode)
    }

    fn resolve_file(&self, path: &str) -> Result<(u32, Inode)> {
        let inode_id = resolve(&*self.device, &self.superblock, path)?;
        let inode = self.get_inode(inode_id)?;
        if inode.is_dir() {
            return Err(FsError::IsADirectory);
        }
        Ok((inode_id, inode))
    }

    /// Walks the tree from the root and checks that the bitmap marks exactly the
    /// metadata blocks plus the blocks reachable from live inodes, that every live
    /// inode is reachable exactly once, and that pointers and names are well formed.
    pub fn verify(&self) -> Result<Usage> {
        let sb = &self.superblock;
        let mut reachable = bitvec![0; sb.num_blocks as usize];
        reachable[..sb.data_start as usize].fill(true);
        let mut seen = BTreeSet::new();
        let mut stack = vec![sb.root_inode];

        while let Some(inode_id) = stack.pop() {
            if !seen.insert(inode_id) {
                warn!("inode {} is referenced more than once", inode_id);
                return Err(FsError::Corrupted);
            }
            let inode = self.get_inode(inode_id)?;
            if inode.is_free() || !self.inodes.is_live(inode_id) {
                warn!("entry points at free inode {}", inode_id);
                return Err(FsError::Corrupted);
            }

            let mapped = if inode.is_dir() { 1 } else { blocks_needed(inode.size as usize) };
            for (i, &ptr) in inode.direct_ptrs.iter().enumerate() {
                if (i < mapped) != (ptr != NULL_BLOCK) {
                    warn!("inode {} has a bad pointer layout at slot {}", inode_id, i);
                    return Err(FsError::Corrupted);
                }
                if ptr == NULL_BLOCK {
                    continue;
                }
                if ptr < sb.data_start || ptr >= sb.num_blocks || reachable[ptr as usize] {
                    warn!("inode {} points at block {} which is not a free data block", inode_id, ptr);
                    return Err(FsError::Corrupted);
                }
                reachable.set(ptr as usize, true);
            }

            if inode.is_dir() {
                let entries = read_dir_block(&*self.device, inode.direct_ptrs[0])?;
                let mut names = BTreeSet::new();
                for entry in entries.valid_entries() {
                    if !names.insert(entry.name_bytes().to_vec()) {
                        warn!("directory {} has duplicate name {:?}", inode_id, entry.name_string());
                        return Err(FsError::Corrupted);
                    }
                    stack.push(entry.inode_id);
                }
            }
        }

        for block_id in 0..sb.num_blocks {
            if reachable[block_id as usize] != self.bitmap.is_used(block_id) {
                warn!(
                    "block {} is {} in the bitmap but {}",
                    block_id,
                    if self.bitmap.is_used(block_id) { "used" } else { "free" },
                    if reachable[block_id as usize] { "reachable" } else { "unreachable" }
                );
                return Err(FsError::Corrupted);
            }
        }
        if let Some(orphan) = self.inodes.live_ids().find(|id| !seen.contains(id)) {
            warn!("inode {} is allocated but unreachable", orphan);
            return Err(FsError::Corrupted);
        }

        Ok(Usage {
            used_blocks: reachable.count_ones() as u32,
            live_inodes: seen.len() as u32,
        })
    }

    /// Writes any pending inode table and bitmap changes and flushes the device.
    pub fn sync(&mut self) -> Result<()> {
        self.inodes.flush(&*self.device, &self.superblock)?;
        self.bitmap.flush(&*self.device)?;
        self.device.flush()
    }

    pub fn get_inode(&self, inode_id: u32) -> Result<Inode> {
        get_inode(&*self.device, &self.superblock, inode_id)
    }

    pub fn root_inode_id(&self) -> u32 {
        self.superblock.root_inode
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }
}
