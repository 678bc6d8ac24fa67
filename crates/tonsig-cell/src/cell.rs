//! Immutable cells and their representation hash

use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::slice::CellSlice;

/// Maximum number of data bits a single cell can hold
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of child references a single cell can hold
pub const MAX_CELL_REFS: usize = 4;

/// SHA-256 representation hash of a cell tree
pub type CellHash = [u8; 32];

struct CellInner {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Cell>,
    depth: u16,
    hash: CellHash,
}

/// An immutable node holding up to 1023 bits and up to 4 child references.
///
/// Cloning is cheap: the tree is shared. Two cells compare equal iff their
/// representation hashes are equal, which makes equality structural.
#[derive(Clone)]
pub struct Cell(Arc<CellInner>);

impl Cell {
    /// Bits are packed MSB-first; bits past `bit_len` must be zero.
    pub(crate) fn from_parts(data: Vec<u8>, bit_len: usize, refs: Vec<Cell>) -> Self {
        let depth = refs
            .iter()
            .map(|r| r.depth().saturating_add(1))
            .max()
            .unwrap_or(0);
        let hash = representation_hash(&data, bit_len, &refs);
        Self(Arc::new(CellInner {
            data,
            bit_len,
            refs,
            depth,
            hash,
        }))
    }

    /// A cell with no bits and no references
    pub fn empty() -> Self {
        Self::from_parts(Vec::new(), 0, Vec::new())
    }

    /// Number of data bits
    pub fn bit_len(&self) -> usize {
        self.0.bit_len
    }

    /// Packed data bytes, MSB-first, without completion tag
    pub fn data(&self) -> &[u8] {
        &self.0.data
    }

    /// Child references in order
    pub fn refs(&self) -> &[Cell] {
        &self.0.refs
    }

    /// Child reference at `index`
    pub fn reference(&self, index: usize) -> Option<&Cell> {
        self.0.refs.get(index)
    }

    /// Longest path to a leaf; 0 for a cell without references
    pub fn depth(&self) -> u16 {
        self.0.depth
    }

    /// Representation hash of this cell tree
    pub fn hash(&self) -> &CellHash {
        &self.0.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.0.hash)
    }

    /// Whether the cell carries neither bits nor references
    pub fn is_empty(&self) -> bool {
        self.0.bit_len == 0 && self.0.refs.is_empty()
    }

    /// Start reading this cell from its first bit and first reference
    pub fn parse(&self) -> CellSlice<'_> {
        CellSlice::new(self)
    }

    pub(crate) fn bit_at(&self, index: usize) -> bool {
        (self.0.data[index / 8] >> (7 - index % 8)) & 1 == 1
    }
}

/// `d1 = refs`, `d2 = floor(bits / 8) + ceil(bits / 8)`; ordinary cells only
pub(crate) fn descriptors(bit_len: usize, ref_count: usize) -> [u8; 2] {
    [ref_count as u8, (bit_len / 8 + bit_len.div_ceil(8)) as u8]
}

/// Data bytes with the completion tag appended when the length is not byte-aligned
pub(crate) fn padded_data(data: &[u8], bit_len: usize) -> Vec<u8> {
    let byte_len = bit_len.div_ceil(8);
    let mut out = data[..byte_len].to_vec();
    if bit_len % 8 != 0 {
        out[byte_len - 1] |= 0x80 >> (bit_len % 8);
    }
    out
}

fn representation_hash(data: &[u8], bit_len: usize, refs: &[Cell]) -> CellHash {
    let mut hasher = Sha256::new();
    hasher.update(descriptors(bit_len, refs.len()));
    hasher.update(padded_data(data, bit_len));
    for child in refs {
        hasher.update(child.depth().to_be_bytes());
    }
    for child in refs {
        hasher.update(child.hash());
    }
    hasher.finalize().into()
}

impl Default for Cell {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.0.hash == other.0.hash
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state);
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("bits", &self.bit_len())
            .field("refs", &self.refs().len())
            .field("hash", &self.hash_hex())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CellBuilder;

    #[test]
    fn test_empty_cell_hash() {
        assert_eq!(
            Cell::empty().hash_hex(),
            "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7"
        );
    }

    #[test]
    fn test_padded_data_completion_tag() {
        // 0b101 followed by the tag bit
        assert_eq!(padded_data(&[0b1010_0000], 3), vec![0b1011_0000]);
        assert_eq!(padded_data(&[0xff], 8), vec![0xff]);
        assert!(padded_data(&[], 0).is_empty());
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(descriptors(0, 0), [0, 0]);
        assert_eq!(descriptors(8, 1), [1, 2]);
        assert_eq!(descriptors(9, 2), [2, 3]);
        assert_eq!(descriptors(1023, 4), [4, 255]);
    }

    #[test]
    fn test_depth_and_equality() {
        let leaf = Cell::empty();
        let mut b = CellBuilder::new();
        b.store_ref(leaf.clone()).unwrap();
        let parent = b.build();
        assert_eq!(leaf.depth(), 0);
        assert_eq!(parent.depth(), 1);
        assert_ne!(leaf, parent);

        let mut again = CellBuilder::new();
        again.store_ref(Cell::empty()).unwrap();
        assert_eq!(parent, again.build());
    }
}
