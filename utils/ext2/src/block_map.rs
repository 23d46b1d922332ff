use alloc::{vec, vec::Vec};

use nostdio::NoStdIoError;
use zerocopy::{FromBytes, little_endian::U32};

use crate::{
    Ext2Error, Result,
    types::{
        BlockIndex,
        inode::{BlockPointers, DIRECT_BLOCK_COUNT},
    },
};

/// Largest number of blocks a single inode can address.
pub(crate) fn max_addressable_blocks(block_size: u32) -> u64 {
    let ppb = (block_size / 4) as u64;
    DIRECT_BLOCK_COUNT as u64 + ppb + ppb * ppb + ppb * ppb * ppb
}

fn initial_capacity(block_size: u32) -> usize {
    DIRECT_BLOCK_COUNT + (block_size / 4) as usize
}

/// Lists the data blocks of a file, in file order.
///
/// Returns at most `needed` blocks. A zero pointer at any level, direct or
/// indirect, ends the file: sparse files are not supported.
pub(crate) fn resolve_blocks<F>(
    pointers: &BlockPointers,
    needed: usize,
    block_size: u32,
    read_block: F,
) -> Result<Vec<BlockIndex>>
where
    F: FnMut(BlockIndex, &mut [u8]) -> Result<()>,
{
    let needed = usize::try_from(max_addressable_blocks(block_size))
        .map_or(needed, |max| needed.min(max));
    // the size field is untrusted, grow past the first indirect level on demand
    let capacity = needed.min(initial_capacity(block_size));
    let mut walker = BlockWalker {
        read_block,
        block_size,
        needed,
        blocks: Vec::with_capacity(capacity),
        ended: false,
    };

    for ptr in pointers.direct {
        if !walker.push(ptr) {
            break;
        }
    }
    walker.walk(pointers.singly_indirect, 1)?;
    walker.walk(pointers.doubly_indirect, 2)?;
    walker.walk(pointers.triply_indirect, 3)?;
    Ok(walker.blocks)
}

struct BlockWalker<F> {
    read_block: F,
    block_size: u32,
    needed: usize,
    blocks: Vec<BlockIndex>,
    ended: bool,
}

impl<F> BlockWalker<F>
where
    F: FnMut(BlockIndex, &mut [u8]) -> Result<()>,
{
    fn done(&self) -> bool {
        self.ended || self.blocks.len() >= self.needed
    }

    /// returns true while more blocks are wanted
    fn push(&mut self, ptr: u32) -> bool {
        if self.done() {
            return false;
        }
        match BlockIndex::from_u32(ptr) {
            Some(block) => {
                self.blocks.push(block);
                !self.done()
            }
            None => {
                self.ended = true;
                false
            }
        }
    }

    /// `depth` 0 is a data block, 1 a block of data block pointers, and so on.
    fn walk(&mut self, ptr: u32, depth: u32) -> Result<()> {
        if self.done() {
            return Ok(());
        }
        if depth == 0 {
            self.push(ptr);
            return Ok(());
        }
        let Some(block) = BlockIndex::from_u32(ptr) else {
            self.ended = true;
            return Ok(());
        };

        let mut buf = vec![0u8; self.block_size as usize];
        (self.read_block)(block, &mut buf)?;
        let entries = <[U32]>::ref_from_bytes(&buf).map_err(|err| {
            Ext2Error::IoError(NoStdIoError::from_zerocopy_err(
                "failed to read indirect block",
                err,
            ))
        })?;
        for entry in entries {
            self.walk(entry.get(), depth - 1)?;
            if self.done() {
                break;
            }
        }
        Ok(())
    }
}
