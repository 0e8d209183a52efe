pub const MAGIC: u32 = 0x4C46_5346; // "LFSF" in ASCII

pub const BLOCK_SIZE: usize = 4096;
pub const SUPERBLOCK_ID: u32 = 0; // Block ID for the superblock
pub const BITMAP_START: u32 = 1; // Bitmap region starts right after the superblock
pub const NULL_BLOCK: u32 = 0; // Unallocated pointer, block 0 is never a data block

pub const RESERVED_INODE_ID: u32 = 0; // Never handed out
pub const ROOT_INODE_ID: u32 = 1; // Inode ID for the root directory
pub const INODE_SIZE: usize = 128;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
pub const NUM_DIRECT_PTRS: usize = (INODE_SIZE - 20) / 4; // 20 bytes of fixed fields
pub const MAX_FILE_SIZE: usize = NUM_DIRECT_PTRS * BLOCK_SIZE;

pub const DIR_ENTRY_SIZE: usize = 32; // inode (4) + valid flag (1) + name (27)
pub const MAX_FILE_NAME_LEN: usize = DIR_ENTRY_SIZE - 5;
pub const NUM_ENTRY_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

pub const BITS_PER_BLOCK: usize = BLOCK_SIZE * 8;

// POSIX file type and permission bits, as stored in the inode mode field.
pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const PERM_MASK: u32 = 0o7777;

pub const ROOT_DIR_MODE: u32 = S_IFDIR | 0o755;
