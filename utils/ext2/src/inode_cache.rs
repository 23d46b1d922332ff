use alloc::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};
use core::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::types::{
    INodeIndex,
    inode::{InodeFileType, InodeRecord},
};

/// Number of recently used inodes kept alive with no outside holder.
pub(crate) const RETAINED_INODES: usize = 16;

static NEXT_MOUNT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one mounted volume for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MountId(u64);

impl MountId {
    pub fn next() -> Self {
        Self(NEXT_MOUNT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shared in-memory inode. Every holder of the same inode number sees the
/// same object. The handle does not keep the filesystem alive; pass it back to
/// the [`crate::Ext2`] it came from, other volumes reject it.
pub struct Inode {
    owner: MountId,
    index: INodeIndex,
    record: spin::Mutex<InodeRecord>,
}

pub type InodeRef = Arc<Inode>;

impl Inode {
    pub(crate) fn new(owner: MountId, index: INodeIndex, record: InodeRecord) -> Self {
        Self {
            owner,
            index,
            record: spin::Mutex::new(record),
        }
    }

    pub(crate) fn owner(&self) -> MountId {
        self.owner
    }

    pub fn index(&self) -> INodeIndex {
        self.index
    }

    /// Copy of the current record.
    pub fn record(&self) -> InodeRecord {
        *self.record.lock()
    }

    /// Mutates the in-memory record. Use [`crate::Ext2::write_inode_ref`] to persist it.
    ///
    /// `f` works on a copy with no lock held, so it may call back into the
    /// filesystem. The copy is stored when `f` returns.
    pub fn update<R>(&self, f: impl FnOnce(&mut InodeRecord) -> R) -> R {
        let mut record = self.record();
        let result = f(&mut record);
        self.replace(&record);
        result
    }

    pub(crate) fn replace(&self, record: &InodeRecord) {
        *self.record.lock() = *record;
    }

    pub fn size(&self) -> u64 {
        self.record.lock().size()
    }

    pub fn file_type(&self) -> InodeFileType {
        self.record.lock().file_type()
    }

    pub fn is_dir(&self) -> bool {
        self.record.lock().is_dir()
    }
}

impl core::fmt::Debug for Inode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Inode")
            .field("owner", &self.owner)
            .field("index", &self.index)
            .field("record", &*self.record.lock())
            .finish()
    }
}

/// Maps inode numbers to live in-memory inodes.
///
/// Entries are weak, so an inode is freed once nobody holds it, except for the
/// most recently used ones which stay in `retained`.
pub(crate) struct InodeCache {
    live: BTreeMap<INodeIndex, Weak<Inode>>,
    retained: heapless::Deque<InodeRef, RETAINED_INODES>,
}

impl InodeCache {
    pub fn new() -> Self {
        Self {
            live: BTreeMap::new(),
            retained: heapless::Deque::new(),
        }
    }

    pub fn get(&mut self, index: INodeIndex) -> Option<InodeRef> {
        let inode = self.peek(index)?;
        self.retain(&inode);
        Some(inode)
    }

    /// Looks up a live inode without touching the retained set.
    pub fn peek(&self, index: INodeIndex) -> Option<InodeRef> {
        self.live.get(&index).and_then(Weak::upgrade)
    }

    pub fn insert(&mut self, inode: InodeRef) {
        let before = self.live.len();
        self.live.retain(|_, weak| weak.strong_count() > 0);
        let purged = before - self.live.len();
        if purged > 0 {
            debug!("purged {purged} dead inode cache entries");
        }
        self.live.insert(inode.index(), Arc::downgrade(&inode));
        self.retain(&inode);
    }

    /// Moves `inode` to the front of the retained set.
    fn retain(&mut self, inode: &InodeRef) {
        if self
            .retained
            .front()
            .is_some_and(|front| Arc::ptr_eq(front, inode))
        {
            return;
        }

        let mut kept = heapless::Deque::<InodeRef, RETAINED_INODES>::new();
        while let Some(existing) = self.retained.pop_front() {
            if !Arc::ptr_eq(&existing, inode) && kept.push_back(existing).is_err() {
                break;
            }
        }
        if kept.is_full() {
            kept.pop_back();
        }
        // cannot fail, one slot was freed above
        let _ = kept.push_front(inode.clone());
        self.retained = kept;
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.live
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
