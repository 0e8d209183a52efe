use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("file exists")]
    AlreadyExists,
    #[error("file name longer than 27 bytes")]
    NameTooLong,
    #[error("write offset past end of file")]
    InvalidOffset,
    #[error("no space left on device")]
    NoSpace,
    #[error("only truncation to zero length is supported")]
    UnsupportedTruncateLength,
    #[error("rename across directories is not supported")]
    CrossDirectoryRename,
    #[error("path has no final component")]
    InvalidPath,
    #[error("bad magic number in superblock")]
    InvalidMagic,
    #[error("superblock geometry does not fit the device")]
    InvalidSuperBlock,
    #[error("block id out of device range")]
    InvalidBlockId,
    #[error("file system structure is inconsistent")]
    Corrupted,
    #[error("device I/O failure: {0}")]
    IoFault(io::ErrorKind),
}

impl FsError {
    /// The errno a FUSE dispatcher should hand back for this error.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NameTooLong
            | FsError::InvalidOffset
            | FsError::UnsupportedTruncateLength
            | FsError::CrossDirectoryRename
            | FsError::InvalidPath => libc::EINVAL,
            FsError::NoSpace => libc::ENOSPC,
            FsError::InvalidMagic
            | FsError::InvalidSuperBlock
            | FsError::InvalidBlockId
            | FsError::Corrupted
            | FsError::IoFault(_) => libc::EIO,
        }
    }
}

impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        FsError::IoFault(err.kind())
    }
}

pub type Result<T> = core::result::Result<T, FsError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_errno() {
        assert_eq!(FsError::NotFound.errno(), libc::ENOENT);
        assert_eq!(FsError::CrossDirectoryRename.errno(), libc::EINVAL);
        assert_eq!(FsError::IoFault(io::ErrorKind::UnexpectedEof).errno(), libc::EIO);
    }

    #[test]
    fn test_from_io() {
        let err: FsError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert_eq!(err, FsError::IoFault(io::ErrorKind::PermissionDenied));
    }
}
