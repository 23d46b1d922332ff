use core::fmt;

use myos_api::filesystem::FilePos;

pub(crate) mod block_group_descriptor;
pub(crate) mod directory_entry;
pub(crate) mod inode;
pub(crate) mod super_block;

/// Absolute block number on the volume. Block 0 never holds file data, so a
/// zero pointer on disk means "no block".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockIndex(pub u32);

impl BlockIndex {
    pub(crate) fn from_u32(value: u32) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(BlockIndex(value))
        }
    }

    pub(crate) fn to_file_pos(self, block_size: u32) -> FilePos {
        FilePos(self.0 as u64 * block_size as u64)
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 1-based inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct INodeIndex(pub u32);

impl INodeIndex {
    pub const ROOT: INodeIndex = INodeIndex(2);

    pub fn root() -> Self {
        Self::ROOT
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for INodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
