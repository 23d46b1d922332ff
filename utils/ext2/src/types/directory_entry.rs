use nostdio::NoStdIoError;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, TryFromBytes,
    little_endian::{U16, U32},
};

use crate::{Ext2Error, Result};

pub(crate) const DIR_ENTRY_HEADER_SIZE: usize = core::mem::size_of::<DirEntryHeader>();
pub const EXT2_NAME_LEN: usize = 255;

#[repr(C, packed)]
#[derive(Clone, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub(crate) struct DirEntryHeader {
    /// Number of the inode that this directory entry points to, 0 when unused
    pub inode: U32,

    /// Length of this directory entry, including padding up to the next entry
    pub rec_len: U16,

    /// Length of the file name
    pub name_len: u8,

    /// File type code when the FILETYPE feature is set, reserved otherwise
    pub file_type: u8,
    // file name [u8; name_len]
}

impl DirEntryHeader {
    pub(crate) fn read_from_slice(bytes: &[u8]) -> Result<Self> {
        let (header, _) = DirEntryHeader::read_from_prefix(bytes).map_err(|err| {
            Ext2Error::IoError(NoStdIoError::from_zerocopy_err(
                "failed reading dir entry",
                err,
            ))
        })?;
        Ok(header)
    }
}

/// see https://www.nongnu.org/ext2-doc/ext2.html#linked-directory-entry-structure
#[allow(dead_code)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromBytes)]
pub enum DirEntryFileType {
    Unknown = 0x0,
    RegularFile = 0x1,
    Directory = 0x2,
    CharacterDeviceFile = 0x3,
    BlockDeviceFile = 0x4,
    Fifo = 0x5,
    Socket = 0x6,
    SymbolicLink = 0x7,
}

impl DirEntryFileType {
    pub(crate) fn from_u8(value: u8) -> Self {
        let buf = [value];
        DirEntryFileType::try_read_from_bytes(&buf).unwrap_or(DirEntryFileType::Unknown)
    }
}
