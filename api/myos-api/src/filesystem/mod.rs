mod error;

use core::ops::{Add, AddAssign};

pub use error::{Errno, FileIoError, Result};

/// Byte position within a file or on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilePos(pub u64);

impl Add<usize> for FilePos {
    type Output = FilePos;

    fn add(self, rhs: usize) -> Self::Output {
        FilePos(self.0 + rhs as u64)
    }
}

impl AddAssign<usize> for FilePos {
    fn add_assign(&mut self, rhs: usize) {
        self.0 += rhs as u64;
    }
}
