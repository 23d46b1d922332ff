#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]
#![allow(clippy::new_without_default)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::unreachable,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing))]

use core::fmt;

/// Errors raised by the byte-level sources that sit underneath a filesystem.
#[derive(Debug)]
pub enum NoStdIoError {
    #[cfg(feature = "std")]
    StdIoError(std::io::Error),
    UnexpectedEof,
    InvalidInput,
    /// fewer bytes were transferred than requested
    PartialTransfer {
        write: bool,
        pos: u64,
        transferred: usize,
        expected: usize,
    },
    /// a fixed layout record could not be decoded from or encoded into a buffer
    Layout(&'static str),
    /// the device reported a failure without further detail
    Device(&'static str),
    Other,
}

impl NoStdIoError {
    pub fn create_partial_read_error(pos: u64, read: usize, expected: usize) -> Self {
        NoStdIoError::PartialTransfer {
            write: false,
            pos,
            transferred: read,
            expected,
        }
    }

    pub fn create_partial_write_error(pos: u64, written: usize, expected: usize) -> Self {
        NoStdIoError::PartialTransfer {
            write: true,
            pos,
            transferred: written,
            expected,
        }
    }

    /// zerocopy errors borrow the source buffer, so only the context message is kept
    pub fn from_zerocopy_err<E>(msg: &'static str, _err: E) -> Self {
        NoStdIoError::Layout(msg)
    }
}

impl fmt::Display for NoStdIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "std")]
            NoStdIoError::StdIoError(err) => write!(f, "{err}"),
            NoStdIoError::UnexpectedEof => write!(f, "unexpected end of file"),
            NoStdIoError::InvalidInput => write!(f, "invalid input"),
            NoStdIoError::PartialTransfer {
                write,
                pos,
                transferred,
                expected,
            } => write!(
                f,
                "partial {} at {pos:#x}: {transferred} of {expected} bytes",
                if *write { "write" } else { "read" }
            ),
            NoStdIoError::Layout(msg) => write!(f, "layout error: {msg}"),
            NoStdIoError::Device(msg) => write!(f, "device error: {msg}"),
            NoStdIoError::Other => write!(f, "other i/o error"),
        }
    }
}

pub type Result<T> = core::result::Result<T, NoStdIoError>;
