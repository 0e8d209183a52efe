//! Path resolution.
//! Paths are walked from the root one component at a time. Every step must start from
//! a directory; the last component may name anything.

use log::debug;

use crate::directory::{dir_block_id, read_dir_block, DirBlock};
use crate::error::{FsError, Result};
use crate::inode::get_inode;
use crate::{BlockDevice, Inode, SuperBlock};

/// Splits a path on '/', dropping empty components.
pub fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// One step of the walk: look `name` up in the directory `dir_id`.
fn step(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    dir_id: u32,
    name: &str,
) -> Result<u32> {
    let dir = get_inode(device, superblock, dir_id)?;
    let block_id = dir_block_id(&dir)?;
    let entries = read_dir_block(device, block_id)?;
    entries
        .lookup(name.as_bytes())
        .map(|(_, child_id)| child_id)
        .ok_or(FsError::NotFound)
}

fn walk(device: &impl BlockDevice, superblock: &SuperBlock, components: &[&str]) -> Result<u32> {
    components
        .iter()
        .try_fold(superblock.root_inode, |dir_id, name| {
            step(device, superblock, dir_id, name)
        })
}

/// Resolves a path to the inode it names.
pub fn resolve(device: &impl BlockDevice, superblock: &SuperBlock, path: &str) -> Result<u32> {
    let inode_id = walk(device, superblock, &components(path));
    debug!("resolve {:?} -> {:?}", path, inode_id);
    inode_id
}

/// A resolved parent directory together with its entry block, so callers can
/// look up, insert or remove the final component without walking again.
#[derive(Debug)]
pub struct ParentLookup {
    pub parent_id: u32,
    pub parent: Inode,
    pub block_id: u32,
    pub entries: DirBlock,
    pub name: String,
}

impl ParentLookup {
    /// Slot and inode number of the final component, if present.
    pub fn child(&self) -> Option<(usize, u32)> {
        self.entries.lookup(self.name.as_bytes())
    }
}

/// Resolves everything but the final component of `path`.
/// Fails with `InvalidPath` when there is no final component (the root).
pub fn resolve_parent(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    path: &str,
) -> Result<ParentLookup> {
    let components = components(path);
    let (name, parent_path) = components.split_last().ok_or(FsError::InvalidPath)?;
    let parent_id = walk(device, superblock, parent_path)?;
    let parent = get_inode(device, superblock, parent_id)?;
    let block_id = dir_block_id(&parent)?;
    let entries = read_dir_block(device, block_id)?;
    debug!("resolve parent of {:?} -> {}", path, parent_id);
    Ok(ParentLookup {
        parent_id,
        parent,
        block_id,
        entries,
        name: name.to_string(),
    })
}

/// Splits a path into its parent components and final name, e.g. "/a/b/c" -> (["a", "b"], "c").
pub fn split(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut components = components(path);
    let name = components.pop()?;
    Some((components, name))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_components() {
        assert_eq!(components("/"), Vec::<&str>::new());
        assert_eq!(components(""), Vec::<&str>::new());
        assert_eq!(components("/a/b/c"), vec!["a", "b", "c"]);
        assert_eq!(components("//a///b/"), vec!["a", "b"]);
        assert_eq!(components("a/b"), vec!["a", "b"]);
    }

    #[test]
    fn test_split() {
        assert_eq!(split("/a/b/c"), Some((vec!["a", "b"], "c")));
        assert_eq!(split("/c/"), Some((vec![], "c")));
        assert_eq!(split("/"), None);
    }
}
