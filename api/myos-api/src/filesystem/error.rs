use nostdio::NoStdIoError;

/// Error surfaced to the VFS layer by every filesystem driver.
#[derive(Debug)]
pub enum FileIoError {
    IoError(NoStdIoError),
    /// the volume is not a filesystem this driver understands
    InvalidFilesystem(&'static str),
    /// an on-disk structure failed validation
    Corrupt(&'static str),
    NotFound,
    NotADirectory,
    InvalidArgument(&'static str),
    BufferTooSmall,
    Other(&'static str),
}

/// POSIX error numbers the syscall layer hands back to userland.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Errno {
    ENOENT = 2,
    EIO = 5,
    ENOTDIR = 20,
    EINVAL = 22,
    EUCLEAN = 117,
}

impl FileIoError {
    pub fn errno(&self) -> Errno {
        match self {
            FileIoError::IoError(_) | FileIoError::Other(_) => Errno::EIO,
            FileIoError::InvalidFilesystem(_) | FileIoError::InvalidArgument(_) => Errno::EINVAL,
            FileIoError::BufferTooSmall => Errno::EINVAL,
            FileIoError::Corrupt(_) => Errno::EUCLEAN,
            FileIoError::NotFound => Errno::ENOENT,
            FileIoError::NotADirectory => Errno::ENOTDIR,
        }
    }
}

impl From<NoStdIoError> for FileIoError {
    fn from(err: NoStdIoError) -> Self {
        FileIoError::IoError(err)
    }
}

pub type Result<T> = core::result::Result<T, FileIoError>;
