//! Builds small ext2 images in memory for tests.

use zerocopy::{
    FromZeros, IntoBytes,
    little_endian::{U16, U32},
};

use crate::types::{
    BlockIndex,
    block_group_descriptor::{BLOCK_GROUP_DESCRIPTOR_SIZE, BlockGroupDescriptor},
    directory_entry::DirEntryFileType,
    inode::{DIRECT_BLOCK_COUNT, InodeFileType, InodePermissions, InodeRecord},
    super_block::{EXT2_MAGIC, FeatureIncompat, FeatureRoCompat, PhysicalSuperBlock},
};

pub(crate) struct ImageOptions {
    pub log_block_size: u32,
    pub blocks_count: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub inode_size: u16,
    pub filetype: bool,
}

impl ImageOptions {
    pub fn new() -> Self {
        Self {
            log_block_size: 0,
            blocks_count: 1024,
            blocks_per_group: 8192,
            inodes_per_group: 64,
            inode_size: 128,
            filetype: true,
        }
    }
}

pub(crate) struct ImageBuilder {
    image: Vec<u8>,
    block_size: usize,
    inodes_per_group: u32,
    inode_size: usize,
    inode_tables: Vec<u32>,
    next_block: u32,
}

impl ImageBuilder {
    pub fn new(options: ImageOptions) -> Self {
        let block_size = 1024usize << options.log_block_size;
        let first_data_block = if block_size == 1024 { 1 } else { 0 };
        let group_count = (options.blocks_count - first_data_block).div_ceil(options.blocks_per_group);
        let inodes_count = options.inodes_per_group * group_count;

        let mut sb = PhysicalSuperBlock::new_zeroed();
        sb.inodes_count = U32::new(inodes_count);
        sb.blocks_count = U32::new(options.blocks_count);
        sb.first_data_block = U32::new(first_data_block);
        sb.log_block_size = U32::new(options.log_block_size);
        sb.log_frag_size = U32::new(options.log_block_size);
        sb.blocks_per_group = U32::new(options.blocks_per_group);
        sb.frags_per_group = U32::new(options.blocks_per_group);
        sb.inodes_per_group = U32::new(options.inodes_per_group);
        sb.max_mnt_count = U16::new(20);
        sb.magic = U16::new(EXT2_MAGIC);
        sb.state = U16::new(1);
        sb.errors = U16::new(1);
        sb.rev_level = U32::new(1);
        sb.first_ino = U32::new(11);
        sb.inode_size = U16::new(options.inode_size);
        if options.filetype {
            sb.feature_incompat = U32::new(FeatureIncompat::FILETYPE.bits());
        }
        sb.feature_ro_compat = U32::new(FeatureRoCompat::LARGE_FILE.bits());
        sb.uuid = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        sb.volume_name = *b"myos\0\0\0\0\0\0\0\0\0\0\0\0";

        let mut image = vec![0u8; options.blocks_count as usize * block_size];
        image[1024..2048].copy_from_slice(sb.as_bytes());

        let first_bgd = 2048usize.div_ceil(block_size) as u32;
        let bgd_blocks = (group_count as usize * BLOCK_GROUP_DESCRIPTOR_SIZE).div_ceil(block_size);
        let mut builder = Self {
            image,
            block_size,
            inodes_per_group: options.inodes_per_group,
            inode_size: options.inode_size as usize,
            inode_tables: Vec::new(),
            next_block: first_bgd + bgd_blocks as u32,
        };

        let table_blocks =
            (options.inodes_per_group as usize * builder.inode_size).div_ceil(block_size);
        for group in 0..group_count as usize {
            let table = builder.next_block;
            builder.next_block += table_blocks as u32;
            builder.inode_tables.push(table);

            let mut bgd = BlockGroupDescriptor::new_zeroed();
            bgd.inode_table = U32::new(table);
            bgd.free_inodes_count = U16::new(options.inodes_per_group as u16);
            let pos = first_bgd as usize * block_size + group * BLOCK_GROUP_DESCRIPTOR_SIZE;
            builder.image[pos..pos + BLOCK_GROUP_DESCRIPTOR_SIZE].copy_from_slice(bgd.as_bytes());
        }

        builder.add_dir(2, &[]);
        builder
    }

    pub fn alloc_block(&mut self) -> u32 {
        let block = self.next_block;
        self.next_block += 1;
        block
    }

    pub fn write_block(&mut self, block: u32, data: &[u8]) {
        assert!(data.len() <= self.block_size);
        let pos = block as usize * self.block_size;
        self.image[pos..pos + data.len()].copy_from_slice(data);
    }

    pub fn write_bytes(&mut self, pos: usize, data: &[u8]) {
        self.image[pos..pos + data.len()].copy_from_slice(data);
    }

    /// Byte position of inode `n`, computed from the tables this builder laid out.
    pub fn inode_pos(&self, n: u32) -> usize {
        let group = ((n - 1) / self.inodes_per_group) as usize;
        let index = ((n - 1) % self.inodes_per_group) as usize;
        self.inode_tables[group] as usize * self.block_size + index * self.inode_size
    }

    pub fn write_inode(&mut self, n: u32, record: &InodeRecord) {
        let pos = self.inode_pos(n);
        self.image[pos..pos + 128].copy_from_slice(record.as_bytes());
    }

    /// Directory inode `n` holding "." and ".." followed by `entries`.
    pub fn add_dir(&mut self, n: u32, entries: &[(u32, &str, DirEntryFileType)]) -> u32 {
        let mut dir = DirBlockBuilder::new(self.block_size)
            .entry(n, ".", DirEntryFileType::Directory)
            .entry(2, "..", DirEntryFileType::Directory);
        for (inode, name, file_type) in entries {
            dir = dir.entry(*inode, name, *file_type);
        }
        let block = self.alloc_block();
        self.write_block(block, &dir.finish());
        self.set_dir_blocks(n, &[block]);
        block
    }

    /// Directory inode `n` whose content is exactly `blocks`.
    pub fn set_dir_blocks(&mut self, n: u32, blocks: &[u32]) {
        let mut record = InodeRecord::new_zeroed();
        record.set_mode(
            InodeFileType::Directory,
            InodePermissions::from_bits_truncate(0o755),
        );
        record.set_links_count(2);
        record.set_size((blocks.len() * self.block_size) as u64);
        for (slot, block) in blocks.iter().enumerate() {
            record.set_block_pointer(slot, BlockIndex::from_u32(*block)).unwrap();
        }
        self.write_inode(n, &record);
    }

    /// Regular file inode `n`. Data goes into direct blocks, then a singly
    /// indirect block, then a doubly indirect tree. Returns the data blocks.
    pub fn add_file(&mut self, n: u32, data: &[u8]) -> Vec<u32> {
        let block_size = self.block_size;
        let ppb = block_size / 4;
        let mut blocks = Vec::new();
        for chunk in data.chunks(block_size) {
            let block = self.alloc_block();
            self.write_block(block, chunk);
            blocks.push(block);
        }

        let mut record = InodeRecord::new_zeroed();
        record.set_mode(
            InodeFileType::RegularFile,
            InodePermissions::from_bits_truncate(0o644),
        );
        record.set_links_count(1);
        record.set_size(data.len() as u64);

        let mut remaining = blocks.as_slice();
        let direct = remaining.len().min(DIRECT_BLOCK_COUNT);
        for (slot, block) in remaining[..direct].iter().enumerate() {
            record.set_block_pointer(slot, Some(BlockIndex(*block))).unwrap();
        }
        remaining = &remaining[direct..];

        if !remaining.is_empty() {
            let count = remaining.len().min(ppb);
            let indirect = self.pointer_block(&remaining[..count]);
            record.set_block_pointer(DIRECT_BLOCK_COUNT, Some(BlockIndex(indirect))).unwrap();
            remaining = &remaining[count..];
        }

        if !remaining.is_empty() {
            assert!(remaining.len() <= ppb * ppb, "file too large for test image");
            let mut children = Vec::new();
            for chunk in remaining.chunks(ppb) {
                children.push(self.pointer_block(chunk));
            }
            let doubly = self.pointer_block(&children);
            record.set_block_pointer(DIRECT_BLOCK_COUNT + 1, Some(BlockIndex(doubly))).unwrap();
        }

        self.write_inode(n, &record);
        blocks
    }

    pub fn pointer_block(&mut self, pointers: &[u32]) -> u32 {
        let block = self.alloc_block();
        let bytes: Vec<u8> = pointers.iter().flat_map(|p| p.to_le_bytes()).collect();
        self.write_block(block, &bytes);
        block
    }

    pub fn finish(self) -> Vec<u8> {
        self.image
    }
}

/// Lays out directory entries in one block.
pub(crate) struct DirBlockBuilder {
    buf: Vec<u8>,
    pos: usize,
    last: Option<usize>,
    stretch_last: bool,
}

impl DirBlockBuilder {
    pub fn new(block_size: usize) -> Self {
        Self {
            buf: vec![0u8; block_size],
            pos: 0,
            last: None,
            stretch_last: false,
        }
    }

    pub fn entry(self, inode: u32, name: &str, file_type: DirEntryFileType) -> Self {
        let rec_len = (8 + name.len()).next_multiple_of(4) as u16;
        let mut builder = self.entry_with_rec_len(inode, name, file_type, rec_len);
        builder.stretch_last = true;
        builder
    }

    /// Entry with an explicit record length, left as given by `finish`.
    pub fn entry_with_rec_len(
        mut self,
        inode: u32,
        name: &str,
        file_type: DirEntryFileType,
        rec_len: u16,
    ) -> Self {
        let pos = self.pos;
        self.buf[pos..pos + 4].copy_from_slice(&inode.to_le_bytes());
        self.buf[pos + 4..pos + 6].copy_from_slice(&rec_len.to_le_bytes());
        self.buf[pos + 6] = name.len() as u8;
        self.buf[pos + 7] = file_type as u8;
        self.buf[pos + 8..pos + 8 + name.len()].copy_from_slice(name.as_bytes());
        self.last = Some(pos);
        self.stretch_last = false;
        self.pos += rec_len as usize;
        self
    }

    /// Stretches the last entry to the end of the block unless its length was explicit.
    pub fn finish(mut self) -> Vec<u8> {
        if let Some(last) = self.last {
            if self.stretch_last && self.pos < self.buf.len() {
                let rec_len = (self.buf.len() - last) as u16;
                self.buf[last + 4..last + 6].copy_from_slice(&rec_len.to_le_bytes());
            }
        }
        self.buf
    }
}
