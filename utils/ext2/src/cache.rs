use alloc::{vec, vec::Vec};

use log::{debug, trace};
use myos_api::filesystem::FilePos;

use crate::{Ext2Error, Result, source::Ext2Source, types::BlockIndex};

/// Number of blocks kept by a freshly mounted filesystem.
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 64;

struct CachedBlock {
    block: BlockIndex,
    data: Vec<u8>,
    last_used: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Write-through LRU cache of whole blocks sitting in front of an [`Ext2Source`].
pub(crate) struct BlockCache<T: Ext2Source> {
    source: T,
    block_size: u32,
    capacity: usize,
    blocks: Vec<CachedBlock>,
    clock: u64,
    stats: CacheStats,
}

impl<T: Ext2Source> BlockCache<T> {
    pub fn new(source: T, block_size: u32, capacity: usize) -> Self {
        Self {
            source,
            block_size,
            capacity,
            blocks: Vec::with_capacity(capacity),
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.block_size as usize {
            return Err(Ext2Error::InvalidArgument(
                "block buffer length must equal the block size",
            ));
        }
        Ok(())
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn position(&self, block: BlockIndex) -> Option<usize> {
        self.blocks.iter().position(|b| b.block == block)
    }

    pub fn read_block(&mut self, block: BlockIndex, buf: &mut [u8]) -> Result<()> {
        self.check_len(buf.len())?;
        let now = self.tick();
        if let Some(cached) = self.blocks.iter_mut().find(|b| b.block == block) {
            cached.last_used = now;
            buf.copy_from_slice(&cached.data);
            self.stats.hits += 1;
            return Ok(());
        }

        self.stats.misses += 1;
        trace!("reading block {block} from device");
        self.source
            .read(block.to_file_pos(self.block_size), buf)?;
        self.insert(block, buf, now);
        Ok(())
    }

    /// Writes `buf` to the device, then refreshes the cached copy. A failed
    /// device write drops the cached copy so no stale data is served.
    pub fn write_block(&mut self, block: BlockIndex, buf: &[u8]) -> Result<()> {
        self.check_len(buf.len())?;
        let now = self.tick();
        if let Err(err) = self.source.write(block.to_file_pos(self.block_size), buf) {
            if let Some(idx) = self.position(block) {
                self.blocks.swap_remove(idx);
            }
            return Err(err.into());
        }

        match self.blocks.iter_mut().find(|b| b.block == block) {
            Some(cached) => {
                cached.data.copy_from_slice(buf);
                cached.last_used = now;
            }
            None => self.insert(block, buf, now),
        }
        Ok(())
    }

    /// Unaligned write straight to the device. Cached blocks overlapping the
    /// range are dropped.
    pub fn write_at(&mut self, file_pos: FilePos, buf: &[u8]) -> Result<()> {
        let block_size = self.block_size as u64;
        let start = file_pos.0;
        let end = start.saturating_add(buf.len() as u64);
        self.blocks.retain(|b| {
            let b_start = b.block.0 as u64 * block_size;
            let b_end = b_start + block_size;
            b_end <= start || b_start >= end
        });
        self.source.write(file_pos, buf)?;
        Ok(())
    }

    fn insert(&mut self, block: BlockIndex, data: &[u8], now: u64) {
        if self.capacity == 0 {
            return;
        }
        if self.blocks.len() >= self.capacity {
            let lru = self
                .blocks
                .iter()
                .enumerate()
                .min_by_key(|(_, b)| b.last_used)
                .map(|(idx, _)| idx);
            if let Some(idx) = lru {
                let evicted = self.blocks.swap_remove(idx);
                self.stats.evictions += 1;
                debug!("evicted block {} from cache", evicted.block);
                // reuse the evicted allocation
                let mut buf = evicted.data;
                buf.copy_from_slice(data);
                self.blocks.push(CachedBlock {
                    block,
                    data: buf,
                    last_used: now,
                });
                return;
            }
        }
        let mut buf = vec![0u8; data.len()];
        buf.copy_from_slice(data);
        self.blocks.push(CachedBlock {
            block,
            data: buf,
            last_used: now,
        });
    }
}
