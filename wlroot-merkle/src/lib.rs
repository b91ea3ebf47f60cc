// File: wlroot-merkle/src/lib.rs
//! Sorted-pair Merkle tree over whitelist leaves.
//!
//! Leaf hashes are sorted before pairing and every parent is
//! `keccak256(min(l, r) || max(l, r))`, so the root only depends on the set of
//! leaves and proofs carry no left/right flags. When a level has an odd number
//! of nodes the last one is promoted to the next level unchanged.
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, trace};
use wlroot_hash::{hash_sorted_pair, keccak256, Digest, HashError};
use wlroot_leaf::{EncodingError, Entry};

mod proof;
pub use proof::{verify, verify_bytes, verify_leaf, Proof};

#[cfg(test)]
mod proptests;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("cannot build a merkle tree from zero leaves")]
    EmptyTree,
    #[error("leaf {0} is not in the tree")]
    LeafNotFound(Digest),
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl From<HashError> for MerkleError {
    fn from(e: HashError) -> Self { MerkleError::MalformedProof(e.to_string()) }
}

#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// `levels[0]` holds the sorted leaf hashes, the last level holds only the root.
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Hash each pre-image into a leaf and build the tree.
    pub fn build<T: AsRef<[u8]> + Sync>(preimages: &[T]) -> Result<Self, MerkleError> {
        let leaves: Vec<Digest> = preimages.par_iter().map(|p| keccak256(p.as_ref())).collect();
        Self::from_leaf_hashes(leaves)
    }

    pub fn from_entries(entries: &[Entry]) -> Result<Self, MerkleError> {
        let leaves: Vec<Digest> = entries.par_iter().map(Entry::leaf_hash).collect();
        Self::from_leaf_hashes(leaves)
    }

    /// Encode raw `(identity, timestamp)` pairs and build. The first pair that
    /// fails to encode aborts the build.
    pub fn from_raw_pairs<I: AsRef<[u8]>>(pairs: &[(I, i128)]) -> Result<Self, MerkleError> {
        let preimages = pairs
            .iter()
            .map(|(id, ts)| wlroot_leaf::encode(id.as_ref(), *ts))
            .collect::<Result<Vec<_>, _>>()?;
        Self::build(&preimages)
    }

    /// Build from already-hashed leaves. Input order does not matter.
    pub fn from_leaf_hashes(mut leaves: Vec<Digest>) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyTree);
        }
        leaves.par_sort_unstable();
        let n = leaves.len();
        let mut levels = vec![leaves];
        loop {
            let cur = &levels[levels.len() - 1];
            if cur.len() == 1 {
                break;
            }
            let next: Vec<Digest> = cur
                .par_chunks(2)
                .map(|pair| match pair.get(1) {
                    Some(right) => hash_sorted_pair(&pair[0], right),
                    // odd tail: promoted, not duplicated
                    None => pair[0],
                })
                .collect();
            trace!(level = levels.len(), width = next.len(), "hashed merkle level");
            levels.push(next);
        }
        let tree = Self { levels };
        debug!(leaves = n, depth = tree.depth(), root = %tree.root(), "built merkle tree");
        Ok(tree)
    }

    pub fn root(&self) -> Digest { self.levels[self.levels.len() - 1][0] }

    pub fn root_hex(&self) -> String { self.root().to_hex() }

    /// Sorted leaf hashes.
    pub fn leaves(&self) -> &[Digest] { &self.levels[0] }

    pub fn levels(&self) -> &[Vec<Digest>] { &self.levels }

    pub fn len(&self) -> usize { self.levels[0].len() }

    pub fn is_empty(&self) -> bool { self.levels[0].is_empty() }

    /// Number of hashing levels above the leaves.
    pub fn depth(&self) -> usize { self.levels.len() - 1 }

    /// Position of the first leaf equal to `leaf` in sorted order.
    pub fn position(&self, leaf: &Digest) -> Option<usize> {
        let leaves = self.leaves();
        let idx = leaves.partition_point(|h| h < leaf);
        (idx < leaves.len() && leaves[idx] == *leaf).then_some(idx)
    }

    /// Sibling path for the leaf at sorted index `idx`. Levels where the node
    /// was promoted contribute nothing.
    pub fn open(&self, mut idx: usize) -> Option<Proof> {
        if idx >= self.len() {
            return None;
        }
        let mut path = Vec::with_capacity(self.depth());
        for level in &self.levels[..self.depth()] {
            if let Some(sib) = level.get(idx ^ 1) {
                path.push(*sib);
            }
            idx >>= 1;
        }
        Some(Proof::new(path))
    }

    pub fn prove_leaf(&self, leaf: &Digest) -> Result<Proof, MerkleError> {
        let idx = self.position(leaf).ok_or(MerkleError::LeafNotFound(*leaf))?;
        let proof = self.open(idx).ok_or(MerkleError::LeafNotFound(*leaf))?;
        trace!(leaf = %leaf, index = idx, siblings = proof.len(), "generated proof");
        Ok(proof)
    }

    /// Proof for a pre-image. With duplicate leaves the first instance is used;
    /// any instance verifies the same way.
    pub fn prove(&self, preimage: &[u8]) -> Result<Proof, MerkleError> {
        self.prove_leaf(&keccak256(preimage))
    }

    pub fn prove_entry(&self, entry: &Entry) -> Result<Proof, MerkleError> {
        self.prove_leaf(&entry.leaf_hash())
    }

    /// Check a proof against this tree's own root.
    pub fn verify(&self, preimage: &[u8], proof: &Proof) -> bool {
        verify(&self.root(), preimage, proof)
    }
}
