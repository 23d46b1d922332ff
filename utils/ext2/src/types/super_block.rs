use core::fmt::Debug;

use bitflags::bitflags;
use myos_api::filesystem::FilePos;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    little_endian::{U16, U32},
};

pub(crate) const SUPER_BLOCK_SIZE: usize = core::mem::size_of::<PhysicalSuperBlock>();
pub(crate) const SUPER_BLOCK_POS: FilePos = FilePos(0x400);
pub(crate) const EXT2_MAGIC: u16 = 0xef53;
/// rev 0 volumes have no `s_inode_size` field and always use 128 byte inodes
pub(crate) const EXT2_GOOD_OLD_INODE_SIZE: u16 = 128;
pub(crate) const EXT2_GOOD_OLD_REV: u32 = 0;
/// largest block size hint accepted, 1024 << 6 = 64KiB
pub(crate) const MAX_LOG_BLOCK_SIZE: u32 = 6;

const _: () = assert!(SUPER_BLOCK_SIZE == 1024);

#[repr(C, packed)]
#[derive(Clone, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub(crate) struct PhysicalSuperBlock {
    /*00*/
    pub inodes_count: U32,      /* Inodes count */
    pub blocks_count: U32,      /* Blocks count */
    pub r_blocks_count: U32,    /* Reserved blocks count */
    pub free_blocks_count: U32, /* Free blocks count */
    /*10*/
    pub free_inodes_count: U32, /* Free inodes count */
    pub first_data_block: U32,  /* First Data Block */
    pub log_block_size: U32,    /* Block size */
    pub log_frag_size: U32,     /* Fragment size */
    /*20*/
    pub blocks_per_group: U32, /* # Blocks per group */
    pub frags_per_group: U32,  /* # Fragments per group */
    pub inodes_per_group: U32, /* # Inodes per group */
    pub mtime: U32,            /* Mount time */
    /*30*/
    pub wtime: U32,           /* Write time */
    pub mnt_count: U16,       /* Mount count */
    pub max_mnt_count: U16,   /* Maximal mount count */
    pub magic: U16,           /* Magic signature */
    pub state: U16,           /* File system state */
    pub errors: U16,          /* Behaviour when detecting errors */
    pub minor_rev_level: U16, /* minor revision level */
    /*40*/
    pub lastcheck: U32,     /* time of last check */
    pub checkinterval: U32, /* max. time between checks */
    pub creator_os: U32,    /* OS */
    pub rev_level: U32,     /* Revision level */
    /*50*/
    pub def_resuid: U16, /* Default uid for reserved blocks */
    pub def_resgid: U16, /* Default gid for reserved blocks */
    /*
     * These fields are for EXT2_DYNAMIC_REV superblocks only.
     */
    pub first_ino: U32,      /* First non-reserved inode */
    pub inode_size: U16,     /* size of inode structure */
    pub block_group_nr: U16, /* block group # of this superblock */
    pub feature_compat: U32, /* compatible feature set */
    /*60*/
    pub feature_incompat: U32,  /* incompatible feature set */
    pub feature_ro_compat: U32, /* readonly-compatible feature set */
    /*68*/
    pub uuid: [u8; 16], /* 128-bit uuid for volume */
    /*78*/
    pub volume_name: [u8; 16], /* volume name */
    /*88*/
    pub last_mounted: [u8; 64], /* directory where last mounted */
    /*C8*/
    pub algorithm_usage_bitmap: U32, /* For compression */
    pub prealloc_blocks: u8,         /* Nr of blocks to try to preallocate*/
    pub prealloc_dir_blocks: u8,     /* Nr to preallocate for dirs */
    pub padding1: U16,
    /*D0*/
    pub journal_uuid: [u8; 16], /* uuid of journal superblock */
    /*E0*/
    pub journal_inum: U32,     /* inode number of journal file */
    pub journal_dev: U32,      /* device number of journal file */
    pub last_orphan: U32,      /* start of list of inodes to delete */
    pub hash_seed: [U32; 4],   /* HTREE hash seed */
    pub def_hash_version: u8,  /* Default hash version to use */
    pub reserved_char_pad: u8,
    pub reserved_word_pad: U16,
    /*100*/
    pub default_mount_opts: U32,
    pub first_meta_bg: U32, /* First metablock block group */
    pub reserved: [u8; 760], /* Padding to the end of the block */
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FeatureCompat: u32 {
        const DIR_PREALLOC = 0x0001;
        const IMAGIC_INODES = 0x0002;
        const HAS_JOURNAL = 0x0004;
        const EXT_ATTR = 0x0008;
        const RESIZE_INO = 0x0010;
        const DIR_INDEX = 0x0020;
        const _ = !0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FeatureIncompat: u32 {
        const COMPRESSION = 0x0001;
        /// directory entries carry a file type byte
        const FILETYPE = 0x0002;
        const RECOVER = 0x0004;
        const JOURNAL_DEV = 0x0008;
        const META_BG = 0x0010;
        const _ = !0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FeatureRoCompat: u32 {
        const SPARSE_SUPER = 0x0001;
        /// regular files use `i_dir_acl` as the upper 32 bits of their size
        const LARGE_FILE = 0x0002;
        const BTREE_DIR = 0x0004;
        const _ = !0;
    }
}

impl Debug for PhysicalSuperBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PhysicalSuperBlock")
            .field("inodes_count", &self.inodes_count.get())
            .field("blocks_count", &self.blocks_count.get())
            .field("first_data_block", &self.first_data_block.get())
            .field("log_block_size", &self.log_block_size.get())
            .field("blocks_per_group", &self.blocks_per_group.get())
            .field("inodes_per_group", &self.inodes_per_group.get())
            .field("magic", &format_args!("{:#x}", self.magic.get()))
            .field("rev_level", &self.rev_level.get())
            .field("inode_size", &self.inode_size.get())
            .field("lastcheck", &self.lastcheck.get())
            .finish_non_exhaustive()
    }
}
