use crate::{
    Ext2Error, Result,
    types::{
        BlockIndex, INodeIndex,
        block_group_descriptor::BLOCK_GROUP_DESCRIPTOR_SIZE,
        super_block::{
            EXT2_GOOD_OLD_INODE_SIZE, EXT2_GOOD_OLD_REV, EXT2_MAGIC, MAX_LOG_BLOCK_SIZE,
            PhysicalSuperBlock, SUPER_BLOCK_POS, SUPER_BLOCK_SIZE,
        },
    },
};

/// Volume geometry derived from the superblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub block_size: u32,
    pub blocks_count: u32,
    pub first_data_block: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub inodes_count: u32,
    pub inode_size: u32,
    pub block_group_count: u32,
    /// first block of the group descriptor table
    pub first_bgd: BlockIndex,
}

/// Where an inode record lives on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeLocation {
    pub group: u32,
    /// index within the group's inode table
    pub index: u32,
    /// block within the group's inode table
    pub block_offset: u32,
    /// byte offset of the record within that block
    pub offset_in_block: usize,
}

impl Layout {
    pub(crate) fn new(sb: &PhysicalSuperBlock) -> Result<Self> {
        if sb.magic.get() != EXT2_MAGIC {
            return Err(Ext2Error::InvalidFilesystem("bad superblock signature"));
        }

        let log_block_size = sb.log_block_size.get();
        if log_block_size > MAX_LOG_BLOCK_SIZE {
            return Err(Ext2Error::InvalidFilesystem("block size too large"));
        }
        let block_size = 1024u32 << log_block_size;

        let blocks_per_group = sb.blocks_per_group.get();
        let inodes_per_group = sb.inodes_per_group.get();
        if blocks_per_group == 0 {
            return Err(Ext2Error::InvalidFilesystem("zero blocks per group"));
        }
        if inodes_per_group == 0 {
            return Err(Ext2Error::InvalidFilesystem("zero inodes per group"));
        }

        let inode_size = if sb.rev_level.get() == EXT2_GOOD_OLD_REV {
            EXT2_GOOD_OLD_INODE_SIZE as u32
        } else {
            sb.inode_size.get() as u32
        };
        if !inode_size.is_power_of_two()
            || inode_size < EXT2_GOOD_OLD_INODE_SIZE as u32
            || inode_size > block_size
        {
            return Err(Ext2Error::InvalidFilesystem("unsupported inode size"));
        }

        let blocks_count = sb.blocks_count.get();
        let first_data_block = sb.first_data_block.get();
        let data_blocks = blocks_count
            .checked_sub(first_data_block)
            .filter(|count| *count > 0)
            .ok_or(Ext2Error::InvalidFilesystem("block count below first data block"))?;
        let block_group_count = data_blocks.div_ceil(blocks_per_group);

        let first_bgd = u32::try_from(
            (SUPER_BLOCK_POS.0 + SUPER_BLOCK_SIZE as u64).div_ceil(block_size as u64),
        )
        .map_err(|_| Ext2Error::InvalidFilesystem("block size too large"))?;

        Ok(Self {
            block_size,
            blocks_count,
            first_data_block,
            blocks_per_group,
            inodes_per_group,
            inodes_count: sb.inodes_count.get(),
            inode_size,
            block_group_count,
            first_bgd: BlockIndex(first_bgd),
        })
    }

    pub fn pointers_per_block(&self) -> u32 {
        self.block_size / 4
    }

    /// returns the number of blocks needed to hold `size` bytes
    pub(crate) fn blocks_for_size(&self, size: u64) -> Result<usize> {
        usize::try_from(size.div_ceil(self.block_size as u64)).map_err(|_| Ext2Error::FileTooLarge)
    }

    /// returns the block holding the descriptor for `group` along with the offset
    /// of the descriptor within that block
    pub(crate) fn calc_bgd_location(&self, group: u32) -> Result<(BlockIndex, usize)> {
        if group >= self.block_group_count {
            return Err(Ext2Error::InvalidArgument("block group out of range"));
        }
        let byte = group as u64 * BLOCK_GROUP_DESCRIPTOR_SIZE as u64;
        let block_size = self.block_size as u64;
        let block = u32::try_from(self.first_bgd.0 as u64 + byte / block_size)
            .map_err(|_| Ext2Error::InvalidFilesystem("group descriptor table out of range"))?;
        let offset = usize::try_from(byte % block_size)
            .map_err(|_| Ext2Error::InvalidArgument("block group out of range"))?;
        Ok((BlockIndex(block), offset))
    }

    pub fn calc_inode_location(&self, inode_idx: INodeIndex) -> Result<InodeLocation> {
        if !inode_idx.is_valid() || inode_idx.0 > self.inodes_count {
            return Err(Ext2Error::InvalidInode(inode_idx));
        }

        let zero_based = inode_idx.0 - 1;
        let group = zero_based / self.inodes_per_group;
        if group >= self.block_group_count {
            return Err(Ext2Error::InvalidInode(inode_idx));
        }
        let index = zero_based % self.inodes_per_group;

        let byte = index as u64 * self.inode_size as u64;
        let block_size = self.block_size as u64;
        let block_offset =
            u32::try_from(byte / block_size).map_err(|_| Ext2Error::InvalidInode(inode_idx))?;
        let offset_in_block =
            usize::try_from(byte % block_size).map_err(|_| Ext2Error::InvalidInode(inode_idx))?;

        Ok(InodeLocation {
            group,
            index,
            block_offset,
            offset_in_block,
        })
    }
}
