use core::num::NonZeroUsize;

use anyhow::{ensure, Result};
use lru::LruCache;
use parking_lot::Mutex;
use types::{
    nonstandard::ExecutionHeader,
    primitives::{ExecutionBlockHash, ExecutionBlockHeight},
};

use crate::error::Error;

/// Finalized execution headers indexed by hash and by height.
///
/// Both indexes share one lock and are updated together, so they always hold the same headers.
pub struct HeaderCache {
    indexes: Mutex<Indexes>,
}

struct Indexes {
    by_hash: LruCache<ExecutionBlockHash, ExecutionHeader>,
    by_height: LruCache<ExecutionBlockHeight, ExecutionBlockHash>,
}

impl HeaderCache {
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            indexes: Mutex::new(Indexes {
                by_hash: LruCache::new(capacity),
                by_height: LruCache::new(capacity),
            }),
        }
    }

    pub fn add(&self, header: ExecutionHeader) -> Result<()> {
        let ExecutionHeader { hash, height, .. } = header;

        ensure!(
            header.is_finalized(),
            Error::NonFinalizedHeader { hash, height },
        );

        let mut indexes = self.indexes.lock();

        // A reorganized height or a header seen again at another height replaces the old entry.
        if let Some(old_hash) = indexes.by_height.pop(&height) {
            indexes.by_hash.pop(&old_hash);
        }

        if let Some(old_header) = indexes.by_hash.pop(&hash) {
            indexes.by_height.pop(&old_header.height);
        }

        if let Some((_, evicted)) = indexes.by_hash.push(hash, header) {
            indexes.by_height.pop(&evicted.height);
        }

        if let Some((evicted_height, evicted_hash)) = indexes.by_height.push(height, hash) {
            if evicted_height != height {
                indexes.by_hash.pop(&evicted_hash);
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn get_by_hash(&self, hash: ExecutionBlockHash) -> Option<ExecutionHeader> {
        let mut indexes = self.indexes.lock();
        let header = indexes.by_hash.get(&hash).copied()?;
        indexes.by_height.promote(&header.height);
        Some(header)
    }

    #[must_use]
    pub fn get_by_height(&self, height: ExecutionBlockHeight) -> Option<ExecutionHeader> {
        let mut indexes = self.indexes.lock();
        let hash = indexes.by_height.get(&height).copied()?;
        indexes.by_hash.get(&hash).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.lock().by_hash.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn index_sizes(&self) -> (usize, usize) {
        let indexes = self.indexes.lock();
        (indexes.by_hash.len(), indexes.by_height.len())
    }
}
