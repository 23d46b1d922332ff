use core::ops::ControlFlow;

use log::debug;

use crate::{
    Ext2Error, Result,
    types::{
        BlockIndex, INodeIndex,
        directory_entry::{DIR_ENTRY_HEADER_SIZE, DirEntryFileType, DirEntryHeader, EXT2_NAME_LEN},
    },
};

/// One live entry of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    inode: INodeIndex,
    file_type: DirEntryFileType,
    name: heapless::Vec<u8, EXT2_NAME_LEN>,
}

impl DirectoryEntry {
    pub fn inode(&self) -> INodeIndex {
        self.inode
    }

    /// `Unknown` on volumes without the filetype feature.
    pub fn file_type(&self) -> DirEntryFileType {
        self.file_type
    }

    /// Raw name bytes; ext2 does not require names to be UTF-8.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn name_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.name).ok()
    }
}

/// Visits every live entry in one directory block.
///
/// Entries with inode 0 are skipped. Returns `Break` if the visitor asked to
/// stop, and `CorruptDirectoryEntry` as soon as a record does not fit.
pub(crate) fn parse_directory_block<F>(
    block: &[u8],
    dir: INodeIndex,
    block_idx: BlockIndex,
    filetype_enabled: bool,
    visit: &mut F,
) -> Result<ControlFlow<()>>
where
    F: FnMut(DirectoryEntry) -> ControlFlow<()>,
{
    let corrupt = |offset: usize| Ext2Error::CorruptDirectoryEntry {
        inode: dir,
        block: block_idx.0,
        offset,
    };

    let mut offset = 0;
    while offset < block.len() {
        let rest = block.get(offset..).ok_or_else(|| corrupt(offset))?;
        if rest.len() < DIR_ENTRY_HEADER_SIZE {
            return Err(corrupt(offset));
        }
        let header = DirEntryHeader::read_from_slice(rest)?;
        let rec_len = header.rec_len.get() as usize;
        let name_len = header.name_len as usize;
        if rec_len < DIR_ENTRY_HEADER_SIZE
            || rec_len > rest.len()
            || DIR_ENTRY_HEADER_SIZE + name_len > rec_len
        {
            debug!("corrupt entry in directory {dir} at {block_idx}:{offset:#x}, rec_len {rec_len}");
            return Err(corrupt(offset));
        }

        if let Some(inode) = core::num::NonZeroU32::new(header.inode.get()) {
            let name_bytes = rest
                .get(DIR_ENTRY_HEADER_SIZE..DIR_ENTRY_HEADER_SIZE + name_len)
                .ok_or_else(|| corrupt(offset))?;
            let name = heapless::Vec::from_slice(name_bytes).map_err(|_| corrupt(offset))?;
            let file_type = if filetype_enabled {
                DirEntryFileType::from_u8(header.file_type)
            } else {
                DirEntryFileType::Unknown
            };
            let entry = DirectoryEntry {
                inode: INodeIndex(inode.get()),
                file_type,
                name,
            };
            if visit(entry).is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }

        offset += rec_len;
    }
    Ok(ControlFlow::Continue(()))
}
