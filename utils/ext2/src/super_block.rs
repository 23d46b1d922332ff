use chrono::NaiveDateTime;
use myos_api::time::TimeSeconds;
use nostdio::NoStdIoError;
use uuid::Uuid;
use zerocopy::{
    FromBytes, IntoBytes,
    little_endian::{U16, U32},
};

use crate::{
    Ext2Error, Result,
    cache::BlockCache,
    layout::Layout,
    source::Ext2Source,
    types::super_block::{
        FeatureCompat, FeatureIncompat, FeatureRoCompat, PhysicalSuperBlock, SUPER_BLOCK_POS,
        SUPER_BLOCK_SIZE,
    },
    utils::{seconds_to_date_time, trim_nul},
};

/// In-memory copy of the superblock. Every byte read from disk is kept so
/// writing it back never loses fields this driver does not model.
#[derive(Debug, Clone)]
pub struct SuperBlock {
    raw: PhysicalSuperBlock,
    layout: Layout,
}

impl SuperBlock {
    pub(crate) fn read<T: Ext2Source>(source: &T) -> Result<SuperBlock> {
        let mut buf = [0; SUPER_BLOCK_SIZE];
        source.read(SUPER_BLOCK_POS, &mut buf)?;
        Self::from_bytes(&buf)
    }

    pub(crate) fn from_bytes(buf: &[u8]) -> Result<SuperBlock> {
        let raw = PhysicalSuperBlock::read_from_bytes(buf).map_err(|err| {
            Ext2Error::IoError(NoStdIoError::from_zerocopy_err(
                "failed to read super block from bytes",
                err,
            ))
        })?;
        let layout = Layout::new(&raw)?;
        Ok(Self { raw, layout })
    }

    pub(crate) fn write<T: Ext2Source>(&self, cache: &mut BlockCache<T>) -> Result<()> {
        cache.write_at(SUPER_BLOCK_POS, self.raw.as_bytes())
    }

    /// ext2 timestamps are 32 bits wide and wrap in 2106.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn mark_mounted(&mut self, time: TimeSeconds) {
        let now = U32::new(time.0 as u32);
        self.raw.lastcheck = now;
        self.raw.mtime = now;
        self.raw.wtime = now;
        self.raw.mnt_count = U16::new(self.raw.mnt_count.get().wrapping_add(1));
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn block_size(&self) -> u32 {
        self.layout.block_size
    }

    pub fn block_group_count(&self) -> u32 {
        self.layout.block_group_count
    }

    pub fn inodes_count(&self) -> u32 {
        self.raw.inodes_count.get()
    }

    pub fn blocks_count(&self) -> u32 {
        self.raw.blocks_count.get()
    }

    pub fn free_blocks_count(&self) -> u32 {
        self.raw.free_blocks_count.get()
    }

    pub fn free_inodes_count(&self) -> u32 {
        self.raw.free_inodes_count.get()
    }

    pub fn mount_count(&self) -> u16 {
        self.raw.mnt_count.get()
    }

    pub fn rev_level(&self) -> u32 {
        self.raw.rev_level.get()
    }

    pub fn mount_time(&self) -> TimeSeconds {
        TimeSeconds(self.raw.mtime.get() as u64)
    }

    pub fn write_time(&self) -> TimeSeconds {
        TimeSeconds(self.raw.wtime.get() as u64)
    }

    pub fn last_check(&self) -> TimeSeconds {
        TimeSeconds(self.raw.lastcheck.get() as u64)
    }

    pub fn last_check_time(&self) -> Option<NaiveDateTime> {
        seconds_to_date_time(self.raw.lastcheck.get())
    }

    pub fn uuid(&self) -> Uuid {
        let bytes = self.raw.uuid;
        uuid::Builder::from_bytes(bytes).into_uuid()
    }

    /// Volume label, `None` when it is not valid UTF-8.
    pub fn volume_name(&self) -> Option<&str> {
        core::str::from_utf8(trim_nul(&self.raw.volume_name)).ok()
    }

    pub fn feature_compat(&self) -> FeatureCompat {
        FeatureCompat::from_bits_retain(self.raw.feature_compat.get())
    }

    pub fn feature_incompat(&self) -> FeatureIncompat {
        FeatureIncompat::from_bits_retain(self.raw.feature_incompat.get())
    }

    pub fn feature_ro_compat(&self) -> FeatureRoCompat {
        FeatureRoCompat::from_bits_retain(self.raw.feature_ro_compat.get())
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use assert_hex::assert_eq_hex;

    use super::*;
    use crate::{
        source::MemExt2Source,
        test_image::{ImageBuilder, ImageOptions},
    };

    #[test]
    fn test_read_geometry() {
        let image = ImageBuilder::new(ImageOptions::new()).finish();
        let sb = SuperBlock::read(&MemExt2Source::new(image)).unwrap();
        assert_eq!(1024, sb.block_size());
        assert_eq!(1, sb.block_group_count());
        assert_eq!(Some("myos"), sb.volume_name());
        assert_eq!(
            "0102030405060708090a0b0c0d0e0f10",
            format!("{}", sb.uuid().simple())
        );
        assert!(sb.feature_incompat().contains(FeatureIncompat::FILETYPE));
    }

    #[test]
    fn test_bad_signature() {
        let mut image = ImageBuilder::new(ImageOptions::new()).finish();
        // s_magic lives 56 bytes into the record
        assert_eq_hex!(0x53, image[1024 + 56]);
        assert_eq_hex!(0xef, image[1024 + 57]);
        image[1024 + 56] = 0;
        assert!(matches!(
            SuperBlock::read(&MemExt2Source::new(image)),
            Err(Ext2Error::InvalidFilesystem(_))
        ));
    }

    #[test]
    fn test_mark_mounted_and_write_preserves_unmodeled_bytes() {
        let mut image = ImageBuilder::new(ImageOptions::new()).finish();
        // poke a byte in the reserved tail
        image[1024 + 1000] = 0xab;
        let source = MemExt2Source::new(image);
        let mut sb = SuperBlock::read(&source).unwrap();
        let before = sb.as_bytes().to_vec();

        sb.mark_mounted(TimeSeconds(1_700_000_000));
        assert_eq!(1, sb.mount_count());
        assert_eq!(TimeSeconds(1_700_000_000), sb.last_check());
        assert_eq!(TimeSeconds(1_700_000_000), sb.mount_time());
        assert_eq!(TimeSeconds(1_700_000_000), sb.write_time());
        assert!(sb.last_check_time().is_some());

        let mut cache = BlockCache::new(source.clone(), sb.block_size(), 4);
        sb.write(&mut cache).unwrap();

        let disk = source.snapshot();
        let written = &disk[1024..2048];
        assert_eq_hex!(0xab, written[1000]);
        let changed: Vec<usize> = before
            .iter()
            .zip(written)
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect();
        // mtime, wtime, mnt_count and lastcheck only
        assert!(changed.iter().all(|i| (0x2c..0x36).contains(i) || (0x40..0x44).contains(i)));
        assert!(!changed.is_empty());
    }
}
