//! `HashmapE` dictionaries with fixed-width unsigned integer keys.
//!
//! Entries are laid out as a binary Patricia trie. Every edge label is written in the
//! shortest of the three label encodings (short, long, same); on a tie the earlier form in
//! that list wins. Forks keep the `0` branch in the first reference and the `1` branch in
//! the second.

use std::collections::BTreeMap;

use crate::builder::CellBuilder;
use crate::cell::Cell;
use crate::error::{CellError, Result};
use crate::slice::CellSlice;

/// Widest key supported by this codec
pub const MAX_KEY_BITS: usize = 32;

/// How a dictionary value is laid out in its leaf
pub trait DictValue: Sized {
    fn store_value(&self, builder: &mut CellBuilder) -> Result<()>;
    fn load_value(slice: &mut CellSlice<'_>) -> Result<Self>;
}

/// Values stored as a child reference of the leaf
impl DictValue for Cell {
    fn store_value(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_ref(self.clone())?;
        Ok(())
    }

    fn load_value(slice: &mut CellSlice<'_>) -> Result<Self> {
        slice.load_ref()
    }
}

/// Fixed-width byte strings stored inline in the leaf
impl<const N: usize> DictValue for [u8; N] {
    fn store_value(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_buffer(self)?;
        Ok(())
    }

    fn load_value(slice: &mut CellSlice<'_>) -> Result<Self> {
        slice.load_array::<N>()
    }
}

fn check_key_width(key_bits: usize) -> Result<()> {
    if key_bits == 0 || key_bits > MAX_KEY_BITS {
        return Err(CellError::UnsupportedWidth { bits: key_bits });
    }
    Ok(())
}

/// Bits needed for a label length that can be anything in `0..=max_len`
fn len_bits(max_len: usize) -> usize {
    (usize::BITS - max_len.leading_zeros()) as usize
}

/// Bit `pos` of `key`, counting from the most significant of `key_bits`
fn key_bit(key: u32, pos: usize, key_bits: usize) -> bool {
    (key >> (key_bits - 1 - pos)) & 1 == 1
}

/// Serialize the trie root for `entries`, or `None` for an empty dictionary
pub fn build_dict_root<V: DictValue>(
    entries: &BTreeMap<u32, V>,
    key_bits: usize,
) -> Result<Option<Cell>> {
    check_key_width(key_bits)?;
    if entries.is_empty() {
        return Ok(None);
    }
    if key_bits < MAX_KEY_BITS {
        if let Some((&key, _)) = entries.iter().next_back() {
            if key >> key_bits != 0 {
                return Err(CellError::ValueOutOfRange { bits: key_bits });
            }
        }
    }

    let sorted: Vec<(u32, &V)> = entries.iter().map(|(k, v)| (*k, v)).collect();
    let mut builder = CellBuilder::new();
    write_edge(&mut builder, &sorted, 0, key_bits)?;
    Ok(Some(builder.build()))
}

fn write_edge<V: DictValue>(
    builder: &mut CellBuilder,
    entries: &[(u32, &V)],
    pos: usize,
    key_bits: usize,
) -> Result<()> {
    let remaining = key_bits - pos;
    let first = entries[0].0;
    let last = entries[entries.len() - 1].0;

    // Sorted keys: the common prefix of all of them is the prefix of the extremes.
    let label_len = if entries.len() == 1 {
        remaining
    } else {
        (0..remaining)
            .take_while(|&i| key_bit(first, pos + i, key_bits) == key_bit(last, pos + i, key_bits))
            .count()
    };
    write_label(builder, first, pos, label_len, remaining, key_bits)?;

    if entries.len() == 1 {
        return entries[0].1.store_value(builder);
    }

    let fork = pos + label_len;
    let split = entries
        .iter()
        .position(|(key, _)| key_bit(*key, fork, key_bits))
        .unwrap_or(entries.len());
    let (zeros, ones) = entries.split_at(split);

    let mut left = CellBuilder::new();
    write_edge(&mut left, zeros, fork + 1, key_bits)?;
    let mut right = CellBuilder::new();
    write_edge(&mut right, ones, fork + 1, key_bits)?;

    builder.store_ref(left.build())?;
    builder.store_ref(right.build())?;
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LabelForm {
    Short,
    Long,
    Same,
}

fn choose_label_form(uniform: bool, len: usize, max_len: usize) -> LabelForm {
    let mut form = LabelForm::Short;
    let mut cost = 2 + 2 * len;

    let long = 2 + len_bits(max_len) + len;
    if long < cost {
        form = LabelForm::Long;
        cost = long;
    }
    if uniform && 3 + len_bits(max_len) < cost {
        form = LabelForm::Same;
    }
    form
}

fn write_label(
    builder: &mut CellBuilder,
    key: u32,
    pos: usize,
    len: usize,
    max_len: usize,
    key_bits: usize,
) -> Result<()> {
    let first_bit = len > 0 && key_bit(key, pos, key_bits);
    let uniform = (0..len).all(|i| key_bit(key, pos + i, key_bits) == first_bit);

    match choose_label_form(uniform, len, max_len) {
        LabelForm::Short => {
            builder.store_bit(false)?;
            for _ in 0..len {
                builder.store_bit(true)?;
            }
            builder.store_bit(false)?;
            for i in 0..len {
                builder.store_bit(key_bit(key, pos + i, key_bits))?;
            }
        }
        LabelForm::Long => {
            builder.store_bit(true)?.store_bit(false)?;
            builder.store_uint(len as u64, len_bits(max_len))?;
            for i in 0..len {
                builder.store_bit(key_bit(key, pos + i, key_bits))?;
            }
        }
        LabelForm::Same => {
            builder
                .store_bit(true)?
                .store_bit(true)?
                .store_bit(first_bit)?;
            builder.store_uint(len as u64, len_bits(max_len))?;
        }
    }
    Ok(())
}

/// Parse the trie rooted at `root` into a sorted map
pub fn parse_dict_root<V: DictValue>(root: &Cell, key_bits: usize) -> Result<BTreeMap<u32, V>> {
    check_key_width(key_bits)?;
    let mut out = BTreeMap::new();
    read_edge(root, 0, 0, key_bits, &mut out)?;
    Ok(out)
}

fn read_edge<V: DictValue>(
    cell: &Cell,
    prefix: u64,
    pos: usize,
    key_bits: usize,
    out: &mut BTreeMap<u32, V>,
) -> Result<()> {
    let mut slice = cell.parse();
    let remaining = key_bits - pos;
    let (label, len) = read_label(&mut slice, remaining)?;
    let prefix = (prefix << len) | label;
    let fork = pos + len;

    if fork == key_bits {
        let value = V::load_value(&mut slice)?;
        out.insert(prefix as u32, value);
        return Ok(());
    }

    let zeros = slice.load_ref()?;
    let ones = slice.load_ref()?;
    read_edge(&zeros, prefix << 1, fork + 1, key_bits, out)?;
    read_edge(&ones, (prefix << 1) | 1, fork + 1, key_bits, out)
}

fn read_label(slice: &mut CellSlice<'_>, max_len: usize) -> Result<(u64, usize)> {
    let check = |len: usize| -> Result<usize> {
        if len > max_len {
            return Err(CellError::KeyWidthMismatch {
                label: len,
                remaining: max_len,
            });
        }
        Ok(len)
    };

    if !slice.load_bit()? {
        let mut len = 0;
        while slice.load_bit()? {
            len = check(len + 1)?;
        }
        Ok((slice.load_uint(len)?, len))
    } else if !slice.load_bit()? {
        let len = check(slice.load_uint(len_bits(max_len))? as usize)?;
        Ok((slice.load_uint(len)?, len))
    } else {
        let bit = slice.load_bit()?;
        let len = check(slice.load_uint(len_bits(max_len))? as usize)?;
        let bits = if bit { (1u64 << len) - 1 } else { 0 };
        Ok((bits, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bits_of(cell: &Cell) -> String {
        let mut s = cell.parse();
        (0..cell.bit_len())
            .map(|_| if s.load_bit().unwrap() { '1' } else { '0' })
            .collect()
    }

    #[test]
    fn test_len_bits() {
        assert_eq!(len_bits(0), 0);
        assert_eq!(len_bits(1), 1);
        assert_eq!(len_bits(2), 2);
        assert_eq!(len_bits(7), 3);
        assert_eq!(len_bits(8), 4);
    }

    #[test]
    fn test_empty_dict_is_single_zero_bit() {
        let mut b = CellBuilder::new();
        b.store_dict(&BTreeMap::<u32, Cell>::new(), 8).unwrap();
        let cell = b.build();
        assert_eq!(cell.bit_len(), 1);
        assert!(cell.refs().is_empty());
        let parsed: BTreeMap<u32, Cell> = cell.parse().load_dict(8).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_label_forms_for_two_signatures() {
        let mut entries = BTreeMap::new();
        entries.insert(0u32, [0xaau8; 64]);
        entries.insert(5u32, [0xbbu8; 64]);
        let root = build_dict_root(&entries, 8).unwrap().unwrap();

        // common prefix 00000 is cheapest as hml_same: 11 0 0101
        assert_eq!(bits_of(&root), "1100101");
        let zeros = root.reference(0).unwrap();
        let ones = root.reference(1).unwrap();
        // remaining "00": hml_same 11 0 10, then the value
        assert!(bits_of(zeros).starts_with("11010"));
        // remaining "01": hml_short 0 11 0 01, then the value
        assert!(bits_of(ones).starts_with("011001"));
        assert_eq!(zeros.bit_len(), 5 + 512);
        assert_eq!(ones.bit_len(), 6 + 512);

        let mut b = CellBuilder::new();
        b.store_dict(&entries, 8).unwrap();
        assert_eq!(
            b.build().hash_hex(),
            "a841de84d57591dce4352cf2770b65ccbbeffc576db4395da81737236e18bd09"
        );
    }

    #[test]
    fn test_key_out_of_range() {
        let mut entries = BTreeMap::new();
        entries.insert(256u32, Cell::empty());
        assert_eq!(
            build_dict_root(&entries, 8).unwrap_err(),
            CellError::ValueOutOfRange { bits: 8 }
        );
    }

    #[test]
    fn test_decode_with_wrong_key_width_fails() {
        let mut entries = BTreeMap::new();
        for key in [0u32, 1, 2, 200] {
            entries.insert(key, [key as u8; 4]);
        }
        let root = build_dict_root(&entries, 16).unwrap().unwrap();
        let parsed: Result<BTreeMap<u32, [u8; 4]>> = parse_dict_root(&root, 4);
        let err = parsed.unwrap_err();
        assert!(err.is_malformed(), "unexpected error {err:?}");
    }

    #[test]
    fn test_single_entry_full_width_key() {
        let mut entries = BTreeMap::new();
        entries.insert(u32::MAX, [7u8; 2]);
        let root = build_dict_root(&entries, 32).unwrap().unwrap();
        let parsed: BTreeMap<u32, [u8; 2]> = parse_dict_root(&root, 32).unwrap();
        assert_eq!(parsed, entries);
    }

    proptest! {
        #[test]
        fn prop_dict_round_trip(
            entries in proptest::collection::btree_map(any::<u16>(), any::<[u8; 3]>(), 0..64),
        ) {
            let entries: BTreeMap<u32, [u8; 3]> =
                entries.into_iter().map(|(k, v)| (u32::from(k), v)).collect();
            let mut b = CellBuilder::new();
            b.store_dict(&entries, 16).unwrap();
            let cell = b.build();
            let decoded: BTreeMap<u32, [u8; 3]> = cell.parse().load_dict(16).unwrap();
            prop_assert_eq!(decoded, entries);
        }
    }
}
