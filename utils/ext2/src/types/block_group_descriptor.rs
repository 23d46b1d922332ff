use core::fmt::Debug;

use nostdio::NoStdIoError;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    little_endian::{U16, U32},
};

use crate::{Ext2Error, Result, types::BlockIndex};

pub(crate) const BLOCK_GROUP_DESCRIPTOR_SIZE: usize = core::mem::size_of::<BlockGroupDescriptor>();

const _: () = assert!(BLOCK_GROUP_DESCRIPTOR_SIZE == 32);

#[repr(C, packed)]
#[derive(Clone, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub(crate) struct BlockGroupDescriptor {
    /// Blocks bitmap block
    pub block_bitmap: U32,
    /// Inodes bitmap block
    pub inode_bitmap: U32,
    /// Inodes table block
    pub inode_table: U32,
    /// Free blocks count
    pub free_blocks_count: U16,
    /// Free inodes count
    pub free_inodes_count: U16,
    /// Directories count
    pub used_dirs_count: U16,
    pub reserved: [u8; 14],
}

impl BlockGroupDescriptor {
    /// Decodes the descriptor starting at `offset` inside a descriptor table block.
    pub(crate) fn read_from_block(block: &[u8], offset: usize) -> Result<Self> {
        let bytes = block
            .get(offset..offset + BLOCK_GROUP_DESCRIPTOR_SIZE)
            .ok_or(Ext2Error::BufferTooSmall)?;
        BlockGroupDescriptor::read_from_bytes(bytes).map_err(|err| {
            Ext2Error::IoError(NoStdIoError::from_zerocopy_err(
                "failed to read block group descriptor from bytes",
                err,
            ))
        })
    }

    pub fn inode_table_block_index(&self) -> Option<BlockIndex> {
        BlockIndex::from_u32(self.inode_table.get())
    }
}

impl Debug for BlockGroupDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockGroupDescriptor")
            .field("block_bitmap", &self.block_bitmap.get())
            .field("inode_bitmap", &self.inode_bitmap.get())
            .field("inode_table", &self.inode_table.get())
            .field("free_blocks_count", &self.free_blocks_count.get())
            .field("free_inodes_count", &self.free_inodes_count.get())
            .field("used_dirs_count", &self.used_dirs_count.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use zerocopy::FromZeros;

    use super::*;

    #[test]
    fn test_read_second_descriptor_in_block() {
        let mut block = [0u8; 1024];
        let mut bgd = BlockGroupDescriptor::new_zeroed();
        bgd.inode_table = U32::new(0x1234);
        bgd.used_dirs_count = U16::new(3);
        bgd.write_to(&mut block[32..64]).unwrap();

        let decoded = BlockGroupDescriptor::read_from_block(&block, 32).unwrap();
        assert_eq!(Some(BlockIndex(0x1234)), decoded.inode_table_block_index());
        assert_eq!(3, decoded.used_dirs_count.get());
        assert_eq!(0, decoded.block_bitmap.get());
    }

    #[test]
    fn test_read_past_block_end() {
        let block = [0u8; 1024];
        assert!(matches!(
            BlockGroupDescriptor::read_from_block(&block, 1000),
            Err(Ext2Error::BufferTooSmall)
        ));
    }
}
