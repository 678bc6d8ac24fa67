//! Bag-of-cells wire format

use std::collections::{HashMap, HashSet};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::cell::{descriptors, padded_data, Cell, CellHash, MAX_CELL_REFS};
use crate::error::{CellError, Result};

const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

const FLAG_HAS_IDX: u8 = 0x80;
const FLAG_HAS_CRC32C: u8 = 0x40;
const SIZE_MASK: u8 = 0x07;

const CRC32C_POLY: u32 = 0x82f6_3b78;

/// CRC-32C (Castagnoli), reflected, as used by the BoC trailer
pub fn crc32c(bytes: &[u8]) -> u32 {
    let mut crc = !0u32;
    for byte in bytes {
        crc ^= u32::from(*byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ CRC32C_POLY
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

fn bytes_needed(value: usize) -> usize {
    let bits = usize::BITS - value.leading_zeros();
    (bits as usize).div_ceil(8).max(1)
}

fn push_uint(out: &mut Vec<u8>, value: usize, width: usize) {
    let be = (value as u64).to_be_bytes();
    out.extend_from_slice(&be[8 - width..]);
}

/// Parents before children, each distinct cell once
fn topological_order(root: &Cell) -> (Vec<Cell>, HashMap<CellHash, usize>) {
    fn visit(cell: &Cell, seen: &mut HashSet<CellHash>, post: &mut Vec<Cell>) {
        if !seen.insert(*cell.hash()) {
            return;
        }
        for child in cell.refs() {
            visit(child, seen, post);
        }
        post.push(cell.clone());
    }

    let mut seen = HashSet::new();
    let mut post = Vec::new();
    visit(root, &mut seen, &mut post);
    post.reverse();

    let index = post
        .iter()
        .enumerate()
        .map(|(i, cell)| (*cell.hash(), i))
        .collect();
    (post, index)
}

/// Serialize a single-root bag of cells with a CRC32C trailer and no index
pub fn serialize_boc(root: &Cell) -> Vec<u8> {
    let (cells, index) = topological_order(root);
    let size = bytes_needed(cells.len());

    let mut body = Vec::new();
    for cell in &cells {
        body.extend_from_slice(&descriptors(cell.bit_len(), cell.refs().len()));
        body.extend_from_slice(&padded_data(cell.data(), cell.bit_len()));
        for child in cell.refs() {
            // Every child was visited, so it has an index.
            let child_index = index.get(child.hash()).copied().unwrap_or_default();
            push_uint(&mut body, child_index, size);
        }
    }
    let off_bytes = bytes_needed(body.len());

    let mut out = Vec::with_capacity(body.len() + 32);
    out.extend_from_slice(&BOC_MAGIC);
    out.push(FLAG_HAS_CRC32C | size as u8);
    out.push(off_bytes as u8);
    push_uint(&mut out, cells.len(), size);
    push_uint(&mut out, 1, size);
    push_uint(&mut out, 0, size);
    push_uint(&mut out, body.len(), off_bytes);
    push_uint(&mut out, 0, size);
    out.extend_from_slice(&body);
    let crc = crc32c(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| CellError::InvalidBoc("unexpected end of input".into()))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn uint(&mut self, width: usize) -> Result<usize> {
        let value = self
            .take(width)?
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        usize::try_from(value).map_err(|_| CellError::InvalidBoc("size field too large".into()))
    }
}

struct RawCell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<usize>,
}

fn read_cell(reader: &mut Reader<'_>, size: usize) -> Result<RawCell> {
    let d1 = reader.byte()?;
    let d2 = reader.byte()?;
    let ref_count = usize::from(d1 & 7);
    if d1 & 8 != 0 {
        return Err(CellError::InvalidBoc("exotic cells are not supported".into()));
    }
    if d1 >> 5 != 0 {
        return Err(CellError::InvalidBoc("cells with a non-zero level are not supported".into()));
    }
    if ref_count > MAX_CELL_REFS {
        return Err(CellError::InvalidBoc(format!("cell declares {ref_count} references")));
    }
    if d1 & 16 != 0 {
        // stored hash and depth for level 0
        reader.take(34)?;
    }

    let byte_len = usize::from(d2).div_ceil(2);
    let mut data = reader.take(byte_len)?.to_vec();
    let bit_len = if d2 % 2 == 0 {
        byte_len * 8
    } else {
        let last = data[byte_len - 1];
        if last == 0 {
            return Err(CellError::InvalidBoc("missing completion tag".into()));
        }
        let tag = last.trailing_zeros() as usize;
        data[byte_len - 1] &= !(1u8 << tag);
        byte_len * 8 - tag - 1
    };

    let mut refs = Vec::with_capacity(ref_count);
    for _ in 0..ref_count {
        refs.push(reader.uint(size)?);
    }
    Ok(RawCell {
        data,
        bit_len,
        refs,
    })
}

/// Parse a bag of cells holding exactly one root
pub fn deserialize_boc(bytes: &[u8]) -> Result<Cell> {
    let mut reader = Reader { bytes, pos: 0 };
    if reader.take(4)? != BOC_MAGIC {
        return Err(CellError::InvalidBoc("bad magic".into()));
    }
    let flags = reader.byte()?;
    let size = usize::from(flags & SIZE_MASK);
    if size == 0 || size > 4 {
        return Err(CellError::InvalidBoc(format!("invalid reference size {size}")));
    }
    let off_bytes = usize::from(reader.byte()?);
    if off_bytes == 0 || off_bytes > 8 {
        return Err(CellError::InvalidBoc(format!("invalid offset size {off_bytes}")));
    }

    let cell_count = reader.uint(size)?;
    let root_count = reader.uint(size)?;
    let absent = reader.uint(size)?;
    let total_size = reader.uint(off_bytes)?;
    if cell_count > bytes.len() {
        return Err(CellError::InvalidBoc("cell count exceeds input length".into()));
    }
    if root_count != 1 {
        return Err(CellError::InvalidBoc(format!("expected one root, found {root_count}")));
    }
    if absent != 0 {
        return Err(CellError::InvalidBoc("absent cells are not supported".into()));
    }
    let root_index = reader.uint(size)?;
    if root_index >= cell_count {
        return Err(CellError::InvalidBoc("root index out of range".into()));
    }
    if flags & FLAG_HAS_IDX != 0 {
        let index_len = cell_count
            .checked_mul(off_bytes)
            .ok_or_else(|| CellError::InvalidBoc("index too large".into()))?;
        reader.take(index_len)?;
    }

    let cells_start = reader.pos;
    let mut raw = Vec::with_capacity(cell_count);
    for _ in 0..cell_count {
        raw.push(read_cell(&mut reader, size)?);
    }
    if reader.pos - cells_start != total_size {
        return Err(CellError::InvalidBoc("cell data size mismatch".into()));
    }

    if flags & FLAG_HAS_CRC32C != 0 {
        let payload_end = reader.pos;
        let stored = reader.take(4)?;
        let stored = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
        if crc32c(&bytes[..payload_end]) != stored {
            return Err(CellError::InvalidBoc("crc32c mismatch".into()));
        }
    }
    if reader.pos != bytes.len() {
        return Err(CellError::InvalidBoc("trailing bytes after bag of cells".into()));
    }

    // Children always come later, so build from the back.
    let mut built: Vec<Option<Cell>> = vec![None; cell_count];
    for (i, cell) in raw.into_iter().enumerate().rev() {
        let mut refs = Vec::with_capacity(cell.refs.len());
        for child in cell.refs {
            if child <= i || child >= cell_count {
                return Err(CellError::InvalidBoc(format!(
                    "cell {i} references cell {child} out of order"
                )));
            }
            let child = built[child]
                .clone()
                .ok_or_else(|| CellError::InvalidBoc("dangling reference".into()))?;
            refs.push(child);
        }
        built[i] = Some(Cell::from_parts(cell.data, cell.bit_len, refs));
    }

    built[root_index]
        .take()
        .ok_or_else(|| CellError::InvalidBoc("missing root".into()))
}

impl Cell {
    pub fn to_boc(&self) -> Vec<u8> {
        serialize_boc(self)
    }

    pub fn from_boc(bytes: &[u8]) -> Result<Self> {
        deserialize_boc(bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_boc())
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CellError::InvalidBoc(format!("invalid base64: {e}")))?;
        Self::from_boc(&bytes)
    }
}

impl Serialize for Cell {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Cell::from_base64(&encoded).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CellBuilder;

    fn sample_tree() -> Cell {
        let shared = {
            let mut b = CellBuilder::new();
            b.store_uint(7, 3).unwrap();
            b.build()
        };
        let mut left = CellBuilder::new();
        left.store_buffer(b"left")
            .unwrap()
            .store_ref(shared.clone())
            .unwrap();
        let mut root = CellBuilder::new();
        root.store_uint(0xdead, 16)
            .unwrap()
            .store_bit(true)
            .unwrap()
            .store_ref(left.build())
            .unwrap()
            .store_ref(shared)
            .unwrap();
        root.build()
    }

    #[test]
    fn test_crc32c_check_value() {
        assert_eq!(crc32c(b"123456789"), 0xe306_9283);
    }

    #[test]
    fn test_boc_round_trip_deduplicates() {
        let root = sample_tree();
        let boc = root.to_boc();
        assert_eq!(&boc[..4], &BOC_MAGIC);
        assert_eq!(boc[4], FLAG_HAS_CRC32C | 1);
        // root, left, shared: the shared leaf is written once
        assert_eq!(boc[6], 3);

        let decoded = Cell::from_boc(&boc).unwrap();
        assert_eq!(decoded, root);
        assert_eq!(decoded.bit_len(), 17);
        assert_eq!(decoded.reference(1).unwrap().bit_len(), 3);
    }

    #[test]
    fn test_empty_cell_boc() {
        let boc = Cell::empty().to_boc();
        // header 11 bytes + record 2 bytes + crc 4 bytes
        assert_eq!(boc.len(), 17);
        assert_eq!(Cell::from_boc(&boc).unwrap(), Cell::empty());
    }

    #[test]
    fn test_rejects_corrupted_crc() {
        let mut boc = sample_tree().to_boc();
        let last = boc.len() - 1;
        boc[last] ^= 0xff;
        let err = Cell::from_boc(&boc).unwrap_err();
        assert_eq!(err, CellError::InvalidBoc("crc32c mismatch".into()));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_rejects_truncated_and_trailing_input() {
        let boc = sample_tree().to_boc();
        assert!(Cell::from_boc(&boc[..boc.len() - 6]).unwrap_err().is_malformed());
        assert!(Cell::from_boc(&boc[..3]).unwrap_err().is_malformed());

        let mut padded = boc.clone();
        padded.push(0);
        assert_eq!(
            Cell::from_boc(&padded).unwrap_err(),
            CellError::InvalidBoc("trailing bytes after bag of cells".into())
        );
    }

    #[test]
    fn test_rejects_backward_reference() {
        // two cells, the second pointing back at the first; no crc
        let bytes = [
            0xb5, 0xee, 0x9c, 0x72, 0x01, 0x01, 0x02, 0x01, 0x00, 0x06, 0x00, // header
            0x01, 0x00, 0x01, // cell 0 -> cell 1
            0x01, 0x00, 0x00, // cell 1 -> cell 0
        ];
        let err = Cell::from_boc(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.is_malformed());
        let err = Cell::from_boc(&bytes).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_base64_and_serde() {
        let root = sample_tree();
        let encoded = root.to_base64();
        assert!(encoded.starts_with("te6cc"));
        assert_eq!(Cell::from_base64(&encoded).unwrap(), root);

        let json = serde_json::to_string(&root).unwrap();
        assert_eq!(json, format!("\"{encoded}\""));
        let back: Cell = serde_json::from_str(&json).unwrap();
        assert_eq!(back, root);
        assert!(serde_json::from_str::<Cell>("\"not base64!\"").is_err());
    }
}
