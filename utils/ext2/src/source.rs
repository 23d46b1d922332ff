use alloc::{sync::Arc, vec::Vec};

use myos_api::filesystem::FilePos;
use nostdio::{NoStdIoError, Result};

/// Byte addressable device an ext2 volume is mounted from.
///
/// The filesystem issues block aligned, block sized requests, except for the
/// superblock which lives at byte 1024 regardless of the block size. A source
/// that transfers fewer bytes than requested must report an error.
pub trait Ext2Source {
    fn read(&self, file_pos: FilePos, buf: &mut [u8]) -> Result<()>;

    fn write(&self, file_pos: FilePos, buf: &[u8]) -> Result<()>;
}

/// RAM disk. Clones share the same backing buffer.
#[derive(Clone)]
pub struct MemExt2Source {
    data: Arc<spin::Mutex<Vec<u8>>>,
}

impl MemExt2Source {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(spin::Mutex::new(data)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current device contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    fn range(file_pos: FilePos, len: usize, device_len: usize) -> Result<core::ops::Range<usize>> {
        let start = usize::try_from(file_pos.0).map_err(|_| NoStdIoError::InvalidInput)?;
        let end = start.checked_add(len).ok_or(NoStdIoError::InvalidInput)?;
        if end > device_len {
            return Err(NoStdIoError::UnexpectedEof);
        }
        Ok(start..end)
    }
}

impl Ext2Source for MemExt2Source {
    fn read(&self, file_pos: FilePos, buf: &mut [u8]) -> Result<()> {
        let data = self.data.lock();
        let range = Self::range(file_pos, buf.len(), data.len())?;
        let src = data.get(range).ok_or(NoStdIoError::UnexpectedEof)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&self, file_pos: FilePos, buf: &[u8]) -> Result<()> {
        let mut data = self.data.lock();
        let range = Self::range(file_pos, buf.len(), data.len())?;
        let dst = data.get_mut(range).ok_or(NoStdIoError::UnexpectedEof)?;
        dst.copy_from_slice(buf);
        Ok(())
    }
}

impl<T: Ext2Source + ?Sized> Ext2Source for Arc<T> {
    fn read(&self, file_pos: FilePos, buf: &mut [u8]) -> Result<()> {
        (**self).read(file_pos, buf)
    }

    fn write(&self, file_pos: FilePos, buf: &[u8]) -> Result<()> {
        (**self).write(file_pos, buf)
    }
}

#[cfg(any(test, feature = "std"))]
pub struct FileExt2Source {
    file: spin::Mutex<std::fs::File>,
}

#[cfg(any(test, feature = "std"))]
impl FileExt2Source {
    pub fn new(file: std::fs::File) -> Self {
        Self {
            file: spin::Mutex::new(file),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl Ext2Source for FileExt2Source {
    fn read(&self, file_pos: FilePos, buf: &mut [u8]) -> Result<()> {
        use std::io::{Read, Seek, SeekFrom};

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(file_pos.0))
            .map_err(NoStdIoError::StdIoError)?;
        let mut read = 0;
        while read < buf.len() {
            let remaining = buf.get_mut(read..).ok_or(NoStdIoError::InvalidInput)?;
            match file.read(remaining) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => return Err(NoStdIoError::StdIoError(err)),
            }
        }
        if read != buf.len() {
            return Err(NoStdIoError::create_partial_read_error(
                file_pos.0,
                read,
                buf.len(),
            ));
        }
        Ok(())
    }

    fn write(&self, file_pos: FilePos, buf: &[u8]) -> Result<()> {
        use std::io::{Seek, SeekFrom, Write};

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(file_pos.0))
            .map_err(NoStdIoError::StdIoError)?;
        file.write_all(buf).map_err(|err| {
            if err.kind() == std::io::ErrorKind::WriteZero {
                NoStdIoError::create_partial_write_error(file_pos.0, 0, buf.len())
            } else {
                NoStdIoError::StdIoError(err)
            }
        })
    }
}
