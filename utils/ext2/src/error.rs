use core::fmt::Display;

use myos_api::filesystem::FileIoError;
use nostdio::NoStdIoError;

use crate::types::INodeIndex;

#[derive(Debug)]
pub enum Ext2Error {
    /// superblock or group descriptor content this driver cannot mount
    InvalidFilesystem(&'static str),
    IoError(NoStdIoError),
    /// inode number 0, or past `s_inodes_count`
    InvalidInode(INodeIndex),
    CorruptDirectoryEntry {
        inode: INodeIndex,
        block: u32,
        offset: usize,
    },
    NotFound,
    NotADirectory(INodeIndex),
    BufferTooSmall,
    /// file spans more blocks than this target can address
    FileTooLarge,
    InvalidArgument(&'static str),
}

pub type Result<T> = core::result::Result<T, Ext2Error>;

impl From<NoStdIoError> for Ext2Error {
    fn from(value: NoStdIoError) -> Self {
        Ext2Error::IoError(value)
    }
}

impl Display for Ext2Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Ext2Error::InvalidFilesystem(msg) => write!(f, "invalid ext2 filesystem: {msg}"),
            Ext2Error::IoError(err) => write!(f, "io error: {err}"),
            Ext2Error::InvalidInode(idx) => write!(f, "invalid inode {idx}"),
            Ext2Error::CorruptDirectoryEntry {
                inode,
                block,
                offset,
            } => write!(
                f,
                "corrupt directory entry in inode {inode}, block {block}, offset {offset:#x}"
            ),
            Ext2Error::NotFound => write!(f, "not found"),
            Ext2Error::NotADirectory(idx) => write!(f, "inode {idx} is not a directory"),
            Ext2Error::BufferTooSmall => write!(f, "buffer too small"),
            Ext2Error::FileTooLarge => write!(f, "file too large"),
            Ext2Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl From<Ext2Error> for FileIoError {
    fn from(value: Ext2Error) -> Self {
        match value {
            Ext2Error::InvalidFilesystem(msg) => FileIoError::InvalidFilesystem(msg),
            Ext2Error::IoError(err) => FileIoError::IoError(err),
            Ext2Error::InvalidInode(_) => FileIoError::InvalidArgument("invalid inode number"),
            Ext2Error::CorruptDirectoryEntry { .. } => {
                FileIoError::Corrupt("corrupt directory entry")
            }
            Ext2Error::NotFound => FileIoError::NotFound,
            Ext2Error::NotADirectory(_) => FileIoError::NotADirectory,
            Ext2Error::BufferTooSmall => FileIoError::BufferTooSmall,
            Ext2Error::FileTooLarge => FileIoError::Other("file too large"),
            Ext2Error::InvalidArgument(msg) => FileIoError::InvalidArgument(msg),
        }
    }
}

#[cfg(feature = "std")]
impl From<Ext2Error> for std::io::Error {
    fn from(value: Ext2Error) -> Self {
        match value {
            Ext2Error::IoError(NoStdIoError::StdIoError(err)) => err,
            Ext2Error::NotFound => std::io::Error::from(std::io::ErrorKind::NotFound),
            other => std::io::Error::other(format!("{other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use myos_api::filesystem::Errno;

    use super::*;

    #[test]
    fn test_file_io_error_mapping() {
        let err: FileIoError = Ext2Error::CorruptDirectoryEntry {
            inode: INodeIndex(2),
            block: 9,
            offset: 12,
        }
        .into();
        assert_eq!(Errno::EUCLEAN, err.errno());

        let err: FileIoError = Ext2Error::NotADirectory(INodeIndex(12)).into();
        assert_eq!(Errno::ENOTDIR, err.errno());

        let err: FileIoError = Ext2Error::InvalidInode(INodeIndex(0)).into();
        assert_eq!(Errno::EINVAL, err.errno());

        let err: FileIoError = Ext2Error::from(NoStdIoError::UnexpectedEof).into();
        assert_eq!(Errno::EIO, err.errno());
    }

    #[test]
    fn test_display() {
        let err = Ext2Error::CorruptDirectoryEntry {
            inode: INodeIndex(2),
            block: 9,
            offset: 12,
        };
        assert_eq!(
            "corrupt directory entry in inode 2, block 9, offset 0xc",
            format!("{err}")
        );
    }
}
