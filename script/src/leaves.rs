//! Concurrent leaf fetching for the remote commitment trees.
//!
//! The full leaf set `[0, n)` is read in contiguous ranges issued all at
//! once and joined before anything else proceeds. Range reads may complete
//! in any order; results are concatenated in range order so leaf indices
//! line up. A fetch either yields the complete ordered set or fails as a
//! whole - no partial trees.

use alloy_primitives::U256;
use futures::future::try_join_all;
use tracing::debug;

use crate::error::MinerError;
use crate::store::LeafStore;

/// Range size for remote leaf reads.
pub const DEFAULT_BATCH_SIZE: u64 = 1024;

/// Fetch the full ordered leaf set of `store`. `tree` names the tree in
/// error messages and logs.
pub async fn fetch_leaves<S: LeafStore>(
    store: &S,
    batch_size: u64,
    tree: &'static str,
) -> Result<Vec<U256>, MinerError> {
    let n = store.next_index().await?;
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < n {
        let end = (start + batch_size).min(n);
        ranges.push(store.leaf_slice(start, end));
        start = end;
    }
    debug!(tree, leaves = n, batches = ranges.len(), "fetching leaves");

    let chunks = try_join_all(ranges).await?;
    let leaves: Vec<U256> = chunks.into_iter().flatten().collect();
    if leaves.len() as u64 != n {
        return Err(MinerError::InconsistentLeafSet {
            tree,
            expected: n,
            got: leaves.len() as u64,
        });
    }
    Ok(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory leaf store with half-open slice semantics and a read
    /// counter, standing in for the on-chain tree contract.
    pub struct MemoryLeafStore {
        pub leaves: Vec<U256>,
        pub reads: AtomicUsize,
        /// When set, slices come back one leaf short to simulate a
        /// misbehaving remote.
        pub truncate: bool,
    }

    impl MemoryLeafStore {
        pub fn new(leaves: Vec<U256>) -> Self {
            Self {
                leaves,
                reads: AtomicUsize::new(0),
                truncate: false,
            }
        }
    }

    impl LeafStore for MemoryLeafStore {
        async fn next_index(&self) -> Result<u64, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.leaves.len() as u64)
        }

        async fn leaf_slice(&self, start: u64, end: u64) -> Result<Vec<U256>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let end = (end as usize).min(self.leaves.len());
            let mut slice = self.leaves[start as usize..end].to_vec();
            if self.truncate && !slice.is_empty() {
                slice.pop();
            }
            Ok(slice)
        }
    }

    fn fixture(n: u64) -> Vec<U256> {
        (0..n).map(U256::from).collect()
    }

    #[tokio::test]
    async fn batch_sizes_one_and_default_agree() {
        let leaves = fixture(2500);
        let store = MemoryLeafStore::new(leaves.clone());
        let one = fetch_leaves(&store, 1, "deposit").await.unwrap();
        let default = fetch_leaves(&store, DEFAULT_BATCH_SIZE, "deposit")
            .await
            .unwrap();
        assert_eq!(one, leaves);
        assert_eq!(default, leaves);
    }

    #[tokio::test]
    async fn exact_multiple_of_batch_size() {
        let leaves = fixture(2048);
        let store = MemoryLeafStore::new(leaves.clone());
        let got = fetch_leaves(&store, 1024, "deposit").await.unwrap();
        assert_eq!(got, leaves);
    }

    #[tokio::test]
    async fn one_past_batch_boundary() {
        let leaves = fixture(1025);
        let store = MemoryLeafStore::new(leaves.clone());
        let got = fetch_leaves(&store, 1024, "withdrawal").await.unwrap();
        assert_eq!(got.len(), 1025);
        assert_eq!(got, leaves);
    }

    #[tokio::test]
    async fn empty_tree_yields_no_leaves_and_no_range_reads() {
        let store = MemoryLeafStore::new(vec![]);
        let got = fetch_leaves(&store, 1024, "account").await.unwrap();
        assert!(got.is_empty());
        // next_index only
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_slices_fail_as_inconsistent() {
        let mut store = MemoryLeafStore::new(fixture(100));
        store.truncate = true;
        let err = fetch_leaves(&store, 30, "account").await.unwrap_err();
        match err {
            MinerError::InconsistentLeafSet {
                tree,
                expected,
                got,
            } => {
                assert_eq!(tree, "account");
                assert_eq!(expected, 100);
                assert_eq!(got, 96);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
