//! Fixed-depth append-only Merkle tree over BN254 field elements.
//!
//! The three remote commitment trees (deposit, withdrawal, account) are
//! reconstructed locally with this type. Internal nodes use the 2-ary
//! Poseidon hash; unpopulated subtrees hash against a fixed zero element
//! with no known preimage, so empty regions are deterministic without
//! leaking how much of the tree is filled.
//!
//! Every level is materialized, which keeps `path` and `index_of` trivial.
//! Trees are rebuilt from fresh leaf fetches on each operation, so there is
//! no persistence concern here.

use alloy_primitives::U256;
use ark_bn254::Fr;

use crate::crypto::{bits_to_number, poseidon2, u256_to_fr};
use crate::error::CoreError;

/// Default tree height used by the deployed contracts.
pub const DEFAULT_HEIGHT: usize = 20;

/// Leaf value for unpopulated positions, shared with the on-chain trees and
/// the circuits. A verifiably unbiased constant with no known preimage.
pub const ZERO_ELEMENT: &str =
    "18057714445064126197463363025270544038935021370379666668119966501302555028628";

/// The zero element as a field element.
pub fn zero_element() -> Fr {
    u256_to_fr(U256::from_str_radix(ZERO_ELEMENT, 10).unwrap())
}

/// Merkle inclusion path: sibling hashes from leaf level to root, plus the
/// direction bit at each level (0 = current node is the left child).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath {
    pub elements: Vec<Fr>,
    pub indices: Vec<u8>,
}

impl MerklePath {
    /// The all-zero path supplied for accounts that are not yet committed
    /// anywhere. Note that the elements are literal zeros, not the zero
    /// element: the circuit treats this path as "no prior account".
    pub fn zero(height: usize) -> Self {
        Self {
            elements: vec![Fr::from(0u64); height],
            indices: vec![0; height],
        }
    }

    /// Direction bits packed into a single integer, LSB at the leaf level.
    pub fn packed_indices(&self) -> U256 {
        bits_to_number(&self.indices)
    }
}

/// An in-memory reconstruction of one append-only commitment tree.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    height: usize,
    /// Zero subtree hash per level, `zeros[0]` being the zero leaf.
    zeros: Vec<Fr>,
    /// `layers[0]` holds the populated leaves; `layers[h]` the populated
    /// nodes at height `h`. Nodes right of the populated range are implied
    /// by `zeros`.
    layers: Vec<Vec<Fr>>,
}

impl MerkleTree {
    /// Build a tree of the given height over the ordered leaf set.
    pub fn new(height: usize, leaves: &[Fr]) -> Result<Self, CoreError> {
        if leaves.len() > capacity(height) {
            return Err(CoreError::TreeFull {
                height,
                leaves: leaves.len(),
            });
        }

        let mut zeros = Vec::with_capacity(height + 1);
        zeros.push(zero_element());
        for level in 1..=height {
            let below = zeros[level - 1];
            zeros.push(poseidon2(below, below));
        }

        let mut layers = Vec::with_capacity(height + 1);
        layers.push(leaves.to_vec());
        for level in 1..=height {
            let width = (layers[level - 1].len() + 1) / 2;
            let mut layer = Vec::with_capacity(width);
            for i in 0..width {
                let left = node_at(&layers[level - 1], &zeros, level - 1, 2 * i);
                let right = node_at(&layers[level - 1], &zeros, level - 1, 2 * i + 1);
                layer.push(poseidon2(left, right));
            }
            layers.push(layer);
        }

        Ok(Self {
            height,
            zeros,
            layers,
        })
    }

    /// Build an empty tree of the given height.
    pub fn empty(height: usize) -> Self {
        Self::new(height, &[]).expect("empty tree always fits")
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of populated leaves.
    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    /// Current root.
    pub fn root(&self) -> Fr {
        node_at(&self.layers[self.height], &self.zeros, self.height, 0)
    }

    /// Append a leaf and update the affected nodes up to the root.
    pub fn insert(&mut self, leaf: Fr) -> Result<(), CoreError> {
        let index = self.len();
        if index >= capacity(self.height) {
            return Err(CoreError::TreeFull {
                height: self.height,
                leaves: index + 1,
            });
        }

        self.layers[0].push(leaf);
        let mut cur = index;
        for level in 1..=self.height {
            cur /= 2;
            let left = node_at(&self.layers[level - 1], &self.zeros, level - 1, 2 * cur);
            let right = node_at(&self.layers[level - 1], &self.zeros, level - 1, 2 * cur + 1);
            let parent = poseidon2(left, right);
            if cur < self.layers[level].len() {
                self.layers[level][cur] = parent;
            } else {
                self.layers[level].push(parent);
            }
        }
        Ok(())
    }

    /// Inclusion path for the leaf at `index`.
    pub fn path(&self, index: usize) -> Result<MerklePath, CoreError> {
        if index >= self.len() {
            return Err(CoreError::IndexOutOfRange {
                index,
                leaves: self.len(),
            });
        }

        let mut elements = Vec::with_capacity(self.height);
        let mut indices = Vec::with_capacity(self.height);
        let mut cur = index;
        for level in 0..self.height {
            indices.push((cur % 2) as u8);
            elements.push(node_at(&self.layers[level], &self.zeros, level, cur ^ 1));
            cur /= 2;
        }
        Ok(MerklePath { elements, indices })
    }

    /// Linear scan for a leaf by exact field equality. Returns `None` rather
    /// than failing so callers can substitute a zero path.
    pub fn index_of(&self, leaf: Fr) -> Option<usize> {
        self.layers[0].iter().position(|l| *l == leaf)
    }
}

fn capacity(height: usize) -> usize {
    1usize << height
}

fn node_at(layer: &[Fr], zeros: &[Fr], level: usize, index: usize) -> Fr {
    layer.get(index).copied().unwrap_or(zeros[level])
}

/// Recompute the root from a leaf and its path. Standard Merkle
/// verification, used as the test oracle for reconstruction.
pub fn verify_path(root: Fr, leaf: Fr, path: &MerklePath) -> bool {
    let mut node = leaf;
    for (sibling, bit) in path.elements.iter().zip(path.indices.iter()) {
        node = if *bit == 0 {
            poseidon2(node, *sibling)
        } else {
            poseidon2(*sibling, node)
        };
    }
    node == root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: u64) -> Vec<Fr> {
        (1..=n).map(Fr::from).collect()
    }

    #[test]
    fn all_paths_verify_against_root() {
        let leaves = leaves(7);
        let tree = MerkleTree::new(4, &leaves).unwrap();
        let root = tree.root();
        for (i, leaf) in leaves.iter().enumerate() {
            let path = tree.path(i).unwrap();
            assert_eq!(path.elements.len(), 4);
            assert!(verify_path(root, *leaf, &path), "path {} failed", i);
        }
    }

    #[test]
    fn incremental_insert_matches_batch_build() {
        let leaves = leaves(6);
        let batch = MerkleTree::new(5, &leaves).unwrap();
        let mut incremental = MerkleTree::empty(5);
        for leaf in &leaves {
            incremental.insert(*leaf).unwrap();
        }
        assert_eq!(batch.root(), incremental.root());
    }

    #[test]
    fn insert_changes_root() {
        let mut tree = MerkleTree::new(4, &leaves(3)).unwrap();
        let before = tree.root();
        tree.insert(Fr::from(99u64)).unwrap();
        assert_ne!(before, tree.root());
        assert!(verify_path(tree.root(), Fr::from(99u64), &tree.path(3).unwrap()));
    }

    #[test]
    fn index_of_finds_exact_leaf() {
        let tree = MerkleTree::new(4, &leaves(5)).unwrap();
        assert_eq!(tree.index_of(Fr::from(3u64)), Some(2));
        assert_eq!(tree.index_of(Fr::from(42u64)), None);
    }

    #[test]
    fn empty_trees_of_equal_height_agree() {
        let a = MerkleTree::empty(6);
        let b = MerkleTree::new(6, &[]).unwrap();
        assert_eq!(a.root(), b.root());
        assert_ne!(a.root(), MerkleTree::empty(7).root());
    }

    #[test]
    fn over_capacity_is_rejected() {
        let err = MerkleTree::new(2, &leaves(5)).unwrap_err();
        assert!(matches!(err, CoreError::TreeFull { height: 2, leaves: 5 }));

        let mut tree = MerkleTree::new(2, &leaves(4)).unwrap();
        assert!(matches!(
            tree.insert(Fr::from(9u64)),
            Err(CoreError::TreeFull { .. })
        ));
    }

    #[test]
    fn path_out_of_range_is_rejected() {
        let tree = MerkleTree::new(3, &leaves(2)).unwrap();
        assert!(matches!(
            tree.path(2),
            Err(CoreError::IndexOutOfRange { index: 2, leaves: 2 })
        ));
    }

    #[test]
    fn zero_path_is_literal_zeros() {
        let path = MerklePath::zero(3);
        assert_eq!(path.elements, vec![Fr::from(0u64); 3]);
        assert_eq!(path.packed_indices(), U256::ZERO);
    }
}
