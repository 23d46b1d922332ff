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
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::panic,
        clippy::indexing_slicing,
        clippy::cast_possible_truncation
    )
)]

extern crate alloc;

use alloc::{sync::Arc, vec, vec::Vec};
use core::ops::ControlFlow;

use log::{debug, info, warn};
use myos_api::{filesystem::FilePos, time::TimeSeconds};

use crate::{
    cache::BlockCache,
    inode_cache::{InodeCache, MountId},
    inode_table::Scratch,
};

mod block_map;
mod cache;
mod directory;
mod error;
mod inode_cache;
mod inode_table;
mod layout;
pub mod source;
mod super_block;
#[cfg(test)]
mod test_image;
mod types;
mod utils;

pub use cache::{CacheStats, DEFAULT_BLOCK_CACHE_CAPACITY};
pub use directory::DirectoryEntry;
pub use error::{Ext2Error, Result};
pub use inode_cache::{Inode, InodeRef};
pub use layout::{InodeLocation, Layout};
pub use source::Ext2Source;
pub use super_block::SuperBlock;
pub use types::{
    BlockIndex, INodeIndex,
    directory_entry::{DirEntryFileType, EXT2_NAME_LEN},
    inode::{BlockPointers, INODE_RECORD_SIZE, InodeFileType, InodePermissions, InodeRecord},
    super_block::{FeatureCompat, FeatureIncompat, FeatureRoCompat},
};

pub struct FsOptions {
    /// written to the superblock's mount and last check times
    pub time: TimeSeconds,
    /// number of blocks kept in memory, 0 disables the block cache
    pub block_cache_capacity: usize,
}

impl FsOptions {
    pub fn new(time: TimeSeconds) -> Self {
        Self {
            time,
            block_cache_capacity: DEFAULT_BLOCK_CACHE_CAPACITY,
        }
    }

    #[cfg(feature = "std")]
    pub fn now() -> myos_api::time::Result<Self> {
        Ok(Self::new(TimeSeconds::now()?))
    }
}

struct State<T: Ext2Source> {
    cache: BlockCache<T>,
    super_block: SuperBlock,
    scratch: Scratch,
    inodes: InodeCache,
}

/// A mounted ext2 volume.
///
/// One lock guards the block cache, superblock and staging buffers, so every
/// operation is serialized. Directory visitors run with the lock released and
/// may call back into the filesystem.
pub struct Ext2<T: Ext2Source> {
    id: MountId,
    layout: Layout,
    filetype: bool,
    state: spin::Mutex<State<T>>,
    root: InodeRef,
}

impl<T: Ext2Source> Ext2<T> {
    /// Validates the superblock, loads the root directory and records the
    /// mount in the superblock. Nothing is returned unless every step succeeds.
    pub fn mount(source: T, options: FsOptions) -> Result<Self> {
        let mut super_block = SuperBlock::read(&source)?;
        let layout = *super_block.layout();

        let unsupported = super_block.feature_incompat() - FeatureIncompat::FILETYPE;
        if !unsupported.is_empty() {
            warn!("refusing to mount, incompatible features {unsupported:?}");
            return Err(Ext2Error::InvalidFilesystem("unsupported incompatible feature"));
        }

        info!(
            "mounting ext2 volume {:?} ({}): {} blocks of {} bytes, {} groups, {} inodes",
            super_block.volume_name().unwrap_or(""),
            super_block.uuid(),
            layout.blocks_count,
            layout.block_size,
            layout.block_group_count,
            layout.inodes_count
        );

        let mut cache = BlockCache::new(source, layout.block_size, options.block_cache_capacity);
        let mut scratch = Scratch::new(layout.block_size);

        super_block.mark_mounted(options.time);

        let root_record =
            inode_table::read_inode(&mut cache, &layout, &mut scratch, INodeIndex::root())?;
        if !root_record.is_dir() {
            return Err(Ext2Error::InvalidFilesystem("root inode is not a directory"));
        }

        super_block.write(&mut cache)?;

        let id = MountId::next();
        let root = Arc::new(Inode::new(id, INodeIndex::root(), root_record));
        let mut inodes = InodeCache::new();
        inodes.insert(root.clone());

        Ok(Self {
            id,
            layout,
            filetype: super_block
                .feature_incompat()
                .contains(FeatureIncompat::FILETYPE),
            state: spin::Mutex::new(State {
                cache,
                super_block,
                scratch,
                inodes,
            }),
            root,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Snapshot of the in-memory superblock.
    pub fn super_block(&self) -> SuperBlock {
        self.state.lock().super_block.clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.state.lock().cache.stats()
    }

    pub fn root_inode(&self) -> InodeRef {
        self.root.clone()
    }

    /// Returns the shared in-memory inode, reading it from disk if no one holds it.
    pub fn get_inode(&self, inode_idx: INodeIndex) -> Result<InodeRef> {
        let mut state = self.state.lock();
        if let Some(inode) = state.inodes.get(inode_idx) {
            return Ok(inode);
        }

        let State {
            cache,
            scratch,
            inodes,
            ..
        } = &mut *state;
        let record = inode_table::read_inode(cache, &self.layout, scratch, inode_idx)?;
        let inode = Arc::new(Inode::new(self.id, inode_idx, record));
        inodes.insert(inode.clone());
        debug!("loaded inode {inode_idx}");
        Ok(inode)
    }

    /// Reads the on-disk record, bypassing the inode cache.
    pub fn read_inode(&self, inode_idx: INodeIndex) -> Result<InodeRecord> {
        let mut state = self.state.lock();
        let State { cache, scratch, .. } = &mut *state;
        inode_table::read_inode(cache, &self.layout, scratch, inode_idx)
    }

    /// Writes `record` to the inode table. A live in-memory inode with the same
    /// number is updated to match.
    pub fn write_inode(&self, record: &InodeRecord, inode_idx: INodeIndex) -> Result<()> {
        let mut state = self.state.lock();
        let State {
            cache,
            scratch,
            inodes,
            ..
        } = &mut *state;
        inode_table::write_inode(cache, &self.layout, scratch, record, inode_idx)?;
        if let Some(inode) = inodes.peek(inode_idx) {
            inode.replace(record);
        }
        Ok(())
    }

    fn check_owner(&self, inode: &Inode) -> Result<()> {
        if inode.owner() != self.id {
            warn!("inode {} belongs to another volume", inode.index());
            return Err(Ext2Error::InvalidArgument("inode belongs to another volume"));
        }
        Ok(())
    }

    /// Persists the in-memory record of `inode`.
    pub fn write_inode_ref(&self, inode: &Inode) -> Result<()> {
        self.check_owner(inode)?;
        let record = inode.record();
        self.write_inode(&record, inode.index())
    }

    pub fn blocks_for_inode(&self, inode: &Inode) -> Result<Vec<BlockIndex>> {
        self.check_owner(inode)?;
        let record = inode.record();
        let needed = self.layout.blocks_for_size(record.size())?;
        self.resolve_blocks(&record, needed)
    }

    pub fn blocks_for_index(&self, inode_idx: INodeIndex) -> Result<Vec<BlockIndex>> {
        let inode = self.get_inode(inode_idx)?;
        self.blocks_for_inode(&inode)
    }

    fn resolve_blocks(&self, record: &InodeRecord, needed: usize) -> Result<Vec<BlockIndex>> {
        let mut state = self.state.lock();
        block_map::resolve_blocks(
            &record.block_pointers(),
            needed,
            self.layout.block_size,
            |block, buf| state.cache.read_block(block, buf),
        )
    }

    /// Calls `visit` for every live entry of `dir` in on-disk order until it
    /// returns `Break`.
    pub fn traverse_directory<F>(&self, dir: &Inode, mut visit: F) -> Result<()>
    where
        F: FnMut(DirectoryEntry) -> ControlFlow<()>,
    {
        self.check_owner(dir)?;
        if !dir.is_dir() {
            return Err(Ext2Error::NotADirectory(dir.index()));
        }
        let blocks = self.blocks_for_inode(dir)?;
        debug!("traversing directory {} over {} blocks", dir.index(), blocks.len());

        let mut buf = vec![0u8; self.layout.block_size as usize];
        for block in blocks {
            self.state.lock().cache.read_block(block, &mut buf)?;
            let flow = directory::parse_directory_block(
                &buf,
                dir.index(),
                block,
                self.filetype,
                &mut visit,
            )?;
            if flow.is_break() {
                break;
            }
        }
        Ok(())
    }

    pub fn read_dir(&self, dir: &Inode) -> Result<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        self.traverse_directory(dir, |entry| {
            entries.push(entry);
            ControlFlow::Continue(())
        })?;
        Ok(entries)
    }

    pub fn read_dir_by_index(&self, inode_idx: INodeIndex) -> Result<Vec<DirectoryEntry>> {
        let dir = self.get_inode(inode_idx)?;
        self.read_dir(&dir)
    }

    /// Finds `name` in `dir` without descending into subdirectories.
    pub fn lookup(&self, dir: &Inode, name: &[u8]) -> Result<INodeIndex> {
        let mut found = None;
        self.traverse_directory(dir, |entry| {
            if entry.name() == name {
                found = Some(entry.inode());
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        found.ok_or(Ext2Error::NotFound)
    }

    /// Every data block of the file, concatenated. The result is a whole
    /// number of blocks; callers truncate to [`Inode::size`].
    pub fn read_entire_file(&self, inode: &Inode) -> Result<Vec<u8>> {
        let blocks = self.blocks_for_inode(inode)?;
        let block_size = self.layout.block_size as usize;
        let mut data = vec![0u8; blocks.len() * block_size];
        for (block, chunk) in blocks.into_iter().zip(data.chunks_mut(block_size)) {
            self.state.lock().cache.read_block(block, chunk)?;
        }
        Ok(data)
    }

    /// Reads up to `buf.len()` bytes at `pos`, stopping at the end of the file.
    pub fn read_file(&self, inode: &Inode, pos: FilePos, buf: &mut [u8]) -> Result<usize> {
        self.check_owner(inode)?;
        let record = inode.record();
        let size = record.size();
        if pos.0 >= size || buf.is_empty() {
            return Ok(0);
        }
        let len = usize::try_from(size - pos.0)
            .map(|remaining| remaining.min(buf.len()))
            .unwrap_or(buf.len());
        let end = pos.0 + len as u64;

        let needed = self.layout.blocks_for_size(end)?;
        let blocks = self.resolve_blocks(&record, needed)?;

        let block_size = self.layout.block_size as u64;
        let mut block_buf = vec![0u8; self.layout.block_size as usize];
        let mut copied = 0;
        let mut file_pos = pos.0;
        while copied < len {
            let block_number =
                usize::try_from(file_pos / block_size).map_err(|_| Ext2Error::FileTooLarge)?;
            let Some(block) = blocks.get(block_number) else {
                break;
            };
            self.state.lock().cache.read_block(*block, &mut block_buf)?;

            let offset =
                usize::try_from(file_pos % block_size).map_err(|_| Ext2Error::FileTooLarge)?;
            let count = (block_buf.len() - offset).min(len - copied);
            let src = block_buf
                .get(offset..offset + count)
                .ok_or(Ext2Error::BufferTooSmall)?;
            let dst = buf
                .get_mut(copied..copied + count)
                .ok_or(Ext2Error::BufferTooSmall)?;
            dst.copy_from_slice(src);

            copied += count;
            file_pos += count as u64;
        }
        Ok(copied)
    }

    /// Writes the in-memory superblock back to the device.
    pub fn write_superblock(&self) -> Result<()> {
        let mut state = self.state.lock();
        let State {
            cache, super_block, ..
        } = &mut *state;
        super_block.write(cache)
    }

    /// Best effort superblock persist. Failures are logged; the in-memory copy
    /// stays authoritative.
    pub fn sync(&self) {
        if let Err(err) = self.write_superblock() {
            warn!("failed to write superblock: {err}");
        }
    }
}
