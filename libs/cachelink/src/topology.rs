//! Shared cluster-topology version id.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// A topology id shared by value across every operation issued against a
/// cache.
///
/// Responses may carry a newer id than the one a request was built with;
/// `operations::CacheOperation::read_header_and_validate` writes it back
/// here after a successful header read. Readers may observe a stale id
/// and get corrected on the next response — last-writer-wins, no
/// per-operation ownership.
#[derive(Debug, Clone)]
pub struct TopologyIdCell(Arc<AtomicI32>);

impl TopologyIdCell {
    pub fn new(initial: i32) -> Self {
        Self(Arc::new(AtomicI32::new(initial)))
    }

    pub fn load(&self) -> i32 {
        self.0.load(Ordering::Acquire)
    }

    pub fn store(&self, value: i32) {
        self.0.store(value, Ordering::Release);
    }
}

impl Default for TopologyIdCell {
    fn default() -> Self {
        Self::new(-1)
    }
}
