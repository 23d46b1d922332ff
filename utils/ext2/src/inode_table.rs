use alloc::{vec, vec::Vec};

use log::trace;

use crate::{
    Ext2Error, Result,
    cache::BlockCache,
    layout::Layout,
    source::Ext2Source,
    types::{
        BlockIndex, INodeIndex, block_group_descriptor::BlockGroupDescriptor, inode::InodeRecord,
    },
};

/// Block sized staging buffers reused across inode table accesses.
pub(crate) struct Scratch {
    bgd: Vec<u8>,
    inode: Vec<u8>,
}

impl Scratch {
    pub fn new(block_size: u32) -> Self {
        Self {
            bgd: vec![0; block_size as usize],
            inode: vec![0; block_size as usize],
        }
    }
}

pub(crate) fn read_group_descriptor<T: Ext2Source>(
    cache: &mut BlockCache<T>,
    layout: &Layout,
    scratch: &mut Scratch,
    group: u32,
) -> Result<BlockGroupDescriptor> {
    let (block, offset) = layout.calc_bgd_location(group)?;
    cache.read_block(block, &mut scratch.bgd)?;
    BlockGroupDescriptor::read_from_block(&scratch.bgd, offset)
}

/// returns the inode table block holding `inode_idx` along with the record offset
fn locate_inode<T: Ext2Source>(
    cache: &mut BlockCache<T>,
    layout: &Layout,
    scratch: &mut Scratch,
    inode_idx: INodeIndex,
) -> Result<(BlockIndex, usize)> {
    let location = layout.calc_inode_location(inode_idx)?;
    let bgd = read_group_descriptor(cache, layout, scratch, location.group)?;
    let table = bgd
        .inode_table_block_index()
        .ok_or(Ext2Error::InvalidFilesystem("group has no inode table"))?;
    let block = table
        .0
        .checked_add(location.block_offset)
        .filter(|b| *b < layout.blocks_count)
        .ok_or(Ext2Error::InvalidFilesystem("inode table past end of volume"))?;
    trace!(
        "inode {inode_idx} at block {block} offset {}",
        location.offset_in_block
    );
    Ok((BlockIndex(block), location.offset_in_block))
}

pub(crate) fn read_inode<T: Ext2Source>(
    cache: &mut BlockCache<T>,
    layout: &Layout,
    scratch: &mut Scratch,
    inode_idx: INodeIndex,
) -> Result<InodeRecord> {
    let (block, offset) = locate_inode(cache, layout, scratch, inode_idx)?;
    cache.read_block(block, &mut scratch.inode)?;
    let bytes = scratch.inode.get(offset..).ok_or(Ext2Error::BufferTooSmall)?;
    InodeRecord::read_from_slice(bytes)
}

/// Read-modify-write of the table block. Only the standard 128 byte record is
/// replaced; the tail of larger on-disk inodes is left as it was.
pub(crate) fn write_inode<T: Ext2Source>(
    cache: &mut BlockCache<T>,
    layout: &Layout,
    scratch: &mut Scratch,
    record: &InodeRecord,
    inode_idx: INodeIndex,
) -> Result<()> {
    let (block, offset) = locate_inode(cache, layout, scratch, inode_idx)?;
    cache.read_block(block, &mut scratch.inode)?;
    let bytes = scratch
        .inode
        .get_mut(offset..)
        .ok_or(Ext2Error::BufferTooSmall)?;
    record.write_to_slice(bytes)?;
    cache.write_block(block, &scratch.inode)
}
