use serde::{Deserialize, Serialize};
use wlroot_hash::{hash_sorted_pair, keccak256, Digest, DIGEST_LEN};

use crate::MerkleError;

/// Sibling hashes from leaf to root. Detached from the tree it came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proof {
    siblings: Vec<Digest>,
}

impl Proof {
    pub fn new(siblings: Vec<Digest>) -> Self { Self { siblings } }

    pub fn siblings(&self) -> &[Digest] { &self.siblings }

    pub fn len(&self) -> usize { self.siblings.len() }

    pub fn is_empty(&self) -> bool { self.siblings.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &Digest> { self.siblings.iter() }

    /// Concatenated 32-byte siblings.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.siblings.len() * DIGEST_LEN);
        for s in &self.siblings {
            out.extend_from_slice(s.as_ref());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MerkleError> {
        if bytes.len() % DIGEST_LEN != 0 {
            return Err(MerkleError::MalformedProof(format!(
                "length {} is not a multiple of {}",
                bytes.len(),
                DIGEST_LEN
            )));
        }
        let siblings = bytes
            .chunks_exact(DIGEST_LEN)
            .map(Digest::from_slice)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { siblings })
    }

    /// `0x`-prefixed hex, one string per sibling.
    pub fn to_hex_strings(&self) -> Vec<String> {
        self.siblings.iter().map(Digest::to_hex).collect()
    }

    pub fn from_hex_strings<S: AsRef<str>>(items: &[S]) -> Result<Self, MerkleError> {
        let siblings = items
            .iter()
            .map(|s| Digest::from_hex(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { siblings })
    }
}

impl From<Vec<Digest>> for Proof {
    fn from(siblings: Vec<Digest>) -> Self { Self { siblings } }
}

impl<'a> IntoIterator for &'a Proof {
    type Item = &'a Digest;
    type IntoIter = core::slice::Iter<'a, Digest>;
    fn into_iter(self) -> Self::IntoIter { self.siblings.iter() }
}

/// Recompute the root from an already-hashed leaf. A mismatch is `false`, never an error.
pub fn verify_leaf(root: &Digest, leaf: &Digest, proof: &Proof) -> bool {
    let computed = proof.iter().fold(*leaf, |acc, sib| hash_sorted_pair(&acc, sib));
    computed == *root
}

pub fn verify(root: &Digest, preimage: &[u8], proof: &Proof) -> bool {
    verify_leaf(root, &keccak256(preimage), proof)
}

/// Verify from raw byte encodings. Fails only when the shapes are wrong.
pub fn verify_bytes(root: &[u8], preimage: &[u8], proof: &[u8]) -> Result<bool, MerkleError> {
    let root = Digest::from_slice(root)?;
    let proof = Proof::from_bytes(proof)?;
    Ok(verify(&root, preimage, &proof))
}
