use core::fmt::Debug;

use bitflags::bitflags;
use myos_api::{Gid, Uid, time::TimeSeconds};
use nostdio::NoStdIoError;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    little_endian::{U16, U32},
};

use crate::{Ext2Error, Result, types::BlockIndex};

/// Bytes of an inode this driver models. Larger on-disk inodes keep their tail untouched.
pub const INODE_RECORD_SIZE: usize = core::mem::size_of::<InodeRecord>();
pub const DIRECT_BLOCK_COUNT: usize = 12;
pub(crate) const SINGLY_INDIRECT_SLOT: usize = DIRECT_BLOCK_COUNT;
pub(crate) const DOUBLY_INDIRECT_SLOT: usize = DIRECT_BLOCK_COUNT + 1;
pub(crate) const TRIPLY_INDIRECT_SLOT: usize = DIRECT_BLOCK_COUNT + 2;
pub(crate) const BLOCK_POINTER_COUNT: usize = DIRECT_BLOCK_COUNT + 3;

const FILE_TYPE_MASK: u16 = 0xf000;

const _: () = assert!(INODE_RECORD_SIZE == 128);

/// The standard 128 byte ext2 inode.
#[repr(C, packed)]
#[derive(Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct InodeRecord {
    /// File mode
    mode: U16,
    /// Low 16 bits of Owner Uid
    uid: U16,
    /// Size in bytes
    size: U32,
    /// Access time
    atime: U32,
    /// Inode change time
    ctime: U32,
    /// Modification time
    mtime: U32,
    /// Deletion time
    dtime: U32,
    /// Low 16 bits of Group Id
    gid: U16,
    /// Links count
    links_count: U16,
    /// 512 byte sectors count
    sectors: U32,
    /// File flags
    flags: U32,
    osd1: U32,
    /// 12 direct pointers followed by the singly, doubly and triply indirect pointers
    block: [U32; BLOCK_POINTER_COUNT],
    /// File version (for NFS)
    generation: U32,
    /// File ACL
    file_acl: U32,
    /// Directory ACL, or the high 32 bits of the size for regular files
    dir_acl: U32,
    /// Fragment address
    faddr: U32,
    osd2: [u8; 12],
}

/// Value of the type nibble of `i_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeFileType {
    Fifo,
    CharacterDevice,
    Directory,
    BlockDevice,
    RegularFile,
    SymbolicLink,
    Socket,
    Unknown(u16),
}

impl InodeFileType {
    fn from_mode(mode: u16) -> Self {
        match mode & FILE_TYPE_MASK {
            0x1000 => InodeFileType::Fifo,
            0x2000 => InodeFileType::CharacterDevice,
            0x4000 => InodeFileType::Directory,
            0x6000 => InodeFileType::BlockDevice,
            0x8000 => InodeFileType::RegularFile,
            0xa000 => InodeFileType::SymbolicLink,
            0xc000 => InodeFileType::Socket,
            other => InodeFileType::Unknown(other),
        }
    }

    fn to_mode(self) -> u16 {
        match self {
            InodeFileType::Fifo => 0x1000,
            InodeFileType::CharacterDevice => 0x2000,
            InodeFileType::Directory => 0x4000,
            InodeFileType::BlockDevice => 0x6000,
            InodeFileType::RegularFile => 0x8000,
            InodeFileType::SymbolicLink => 0xa000,
            InodeFileType::Socket => 0xc000,
            InodeFileType::Unknown(bits) => bits & FILE_TYPE_MASK,
        }
    }
}

bitflags! {
    /// Permission bits of `i_mode`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InodePermissions: u16 {
        const SET_UID = 0o4000;
        const SET_GID = 0o2000;
        const STICKY = 0o1000;
        const USER_READ = 0o400;
        const USER_WRITE = 0o200;
        const USER_EXEC = 0o100;
        const GROUP_READ = 0o040;
        const GROUP_WRITE = 0o020;
        const GROUP_EXEC = 0o010;
        const OTHER_READ = 0o004;
        const OTHER_WRITE = 0o002;
        const OTHER_EXEC = 0o001;
    }
}

/// Block pointers of an inode, in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPointers {
    pub direct: [u32; DIRECT_BLOCK_COUNT],
    pub singly_indirect: u32,
    pub doubly_indirect: u32,
    pub triply_indirect: u32,
}

impl InodeRecord {
    /// Decodes the record at the start of `bytes`, ignoring anything past 128 bytes.
    pub(crate) fn read_from_slice(bytes: &[u8]) -> Result<Self> {
        let (record, _) = InodeRecord::read_from_prefix(bytes).map_err(|err| {
            Ext2Error::IoError(NoStdIoError::from_zerocopy_err(
                "failed to read inode from bytes",
                err,
            ))
        })?;
        Ok(record)
    }

    /// Overwrites the first 128 bytes of `bytes` with this record.
    pub(crate) fn write_to_slice(&self, bytes: &mut [u8]) -> Result<()> {
        self.write_to_prefix(bytes).map_err(|err| {
            Ext2Error::IoError(NoStdIoError::from_zerocopy_err(
                "failed to write inode to bytes",
                err,
            ))
        })
    }

    pub fn file_type(&self) -> InodeFileType {
        InodeFileType::from_mode(self.mode.get())
    }

    pub fn permissions(&self) -> InodePermissions {
        InodePermissions::from_bits_truncate(self.mode.get())
    }

    pub fn set_mode(&mut self, file_type: InodeFileType, permissions: InodePermissions) {
        self.mode = U16::new(file_type.to_mode() | permissions.bits());
    }

    pub fn is_dir(&self) -> bool {
        self.file_type() == InodeFileType::Directory
    }

    /// File size in bytes. Regular files store the upper half in `i_dir_acl`.
    pub fn size(&self) -> u64 {
        let lo = self.size.get() as u64;
        if self.file_type() == InodeFileType::RegularFile {
            ((self.dir_acl.get() as u64) << 32) | lo
        } else {
            lo
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn set_size(&mut self, size: u64) {
        self.size = U32::new(size as u32);
        if self.file_type() == InodeFileType::RegularFile {
            self.dir_acl = U32::new((size >> 32) as u32);
        }
    }

    pub fn uid(&self) -> Uid {
        Uid(self.uid.get() as u32)
    }

    pub fn gid(&self) -> Gid {
        Gid(self.gid.get() as u32)
    }

    pub fn links_count(&self) -> u16 {
        self.links_count.get()
    }

    pub fn set_links_count(&mut self, links_count: u16) {
        self.links_count = U16::new(links_count);
    }

    pub fn access_time(&self) -> TimeSeconds {
        TimeSeconds(self.atime.get() as u64)
    }

    pub fn modification_time(&self) -> TimeSeconds {
        TimeSeconds(self.mtime.get() as u64)
    }

    pub fn change_time(&self) -> TimeSeconds {
        TimeSeconds(self.ctime.get() as u64)
    }

    /// ext2 timestamps are 32 bits wide and wrap in 2106.
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_access_time(&mut self, time: TimeSeconds) {
        self.atime = U32::new(time.0 as u32);
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn set_modification_time(&mut self, time: TimeSeconds) {
        self.mtime = U32::new(time.0 as u32);
    }

    pub fn block_pointers(&self) -> BlockPointers {
        let mut direct = [0; DIRECT_BLOCK_COUNT];
        for (dst, src) in direct.iter_mut().zip(self.block.iter()) {
            *dst = src.get();
        }
        BlockPointers {
            direct,
            singly_indirect: self.block_pointer(SINGLY_INDIRECT_SLOT),
            doubly_indirect: self.block_pointer(DOUBLY_INDIRECT_SLOT),
            triply_indirect: self.block_pointer(TRIPLY_INDIRECT_SLOT),
        }
    }

    fn block_pointer(&self, slot: usize) -> u32 {
        self.block.get(slot).map(|ptr| ptr.get()).unwrap_or(0)
    }

    /// Sets pointer `slot` (0..12 direct, 12 singly, 13 doubly, 14 triply indirect).
    pub fn set_block_pointer(&mut self, slot: usize, block: Option<BlockIndex>) -> Result<()> {
        let ptr = self
            .block
            .get_mut(slot)
            .ok_or(Ext2Error::InvalidArgument("block pointer slot out of range"))?;
        *ptr = U32::new(block.map(|b| b.0).unwrap_or(0));
        Ok(())
    }
}

impl Debug for InodeRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InodeRecord")
            .field("file_type", &self.file_type())
            .field("permissions", &format_args!("{:o}", self.permissions().bits()))
            .field("uid", &self.uid.get())
            .field("gid", &self.gid.get())
            .field("size", &self.size())
            .field("links_count", &self.links_count.get())
            .field("sectors", &self.sectors.get())
            .field("flags", &self.flags.get())
            .field("block", &self.block_pointers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use zerocopy::FromZeros;

    use super::*;

    #[test]
    fn test_mode_round_trip() {
        let mut inode = InodeRecord::new_zeroed();
        inode.set_mode(
            InodeFileType::Directory,
            InodePermissions::USER_READ | InodePermissions::USER_WRITE | InodePermissions::USER_EXEC,
        );
        assert!(inode.is_dir());
        assert_eq!(0o40700, inode.mode.get());
        assert_eq!(0o700, inode.permissions().bits());
    }

    #[test]
    fn test_large_file_size_uses_dir_acl() {
        let mut inode = InodeRecord::new_zeroed();
        inode.set_mode(InodeFileType::RegularFile, InodePermissions::USER_READ);
        inode.set_size(0x1_0000_0400);
        assert_eq!(0x400, inode.size.get());
        assert_eq!(1, inode.dir_acl.get());
        assert_eq!(0x1_0000_0400, inode.size());

        // directories never borrow i_dir_acl
        inode.set_mode(InodeFileType::Directory, InodePermissions::USER_READ);
        assert_eq!(0x400, inode.size());
    }

    #[test]
    fn test_owner_ids() {
        let mut inode = InodeRecord::new_zeroed();
        inode.uid = U16::new(1000);
        inode.gid = U16::new(100);
        assert_eq!(Uid(1000), inode.uid());
        assert_eq!(Gid(100), inode.gid());
    }

    #[test]
    fn test_block_pointer_layout() {
        let mut inode = InodeRecord::new_zeroed();
        inode.set_block_pointer(0, Some(BlockIndex(10))).unwrap();
        inode.set_block_pointer(11, Some(BlockIndex(21))).unwrap();
        inode.set_block_pointer(SINGLY_INDIRECT_SLOT, Some(BlockIndex(30))).unwrap();
        inode.set_block_pointer(TRIPLY_INDIRECT_SLOT, Some(BlockIndex(50))).unwrap();
        assert!(inode.set_block_pointer(BLOCK_POINTER_COUNT, None).is_err());

        let pointers = inode.block_pointers();
        assert_eq!(10, pointers.direct[0]);
        assert_eq!(21, pointers.direct[11]);
        assert_eq!(30, pointers.singly_indirect);
        assert_eq!(0, pointers.doubly_indirect);
        assert_eq!(50, pointers.triply_indirect);

        // i_block starts at byte 40 of the on-disk record
        let bytes = inode.as_bytes();
        assert_eq!(&10u32.to_le_bytes(), &bytes[40..44]);
        assert_eq!(&50u32.to_le_bytes(), &bytes[96..100]);
    }
}
