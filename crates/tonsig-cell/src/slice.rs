//! Sequential reader over a cell

use std::collections::BTreeMap;

use crate::builder::CellBuilder;
use crate::cell::Cell;
use crate::dict::{self, DictValue};
use crate::error::{CellError, Result};

/// Read cursor over one cell's bits and references.
///
/// Loads either consume exactly what they return or fail without moving the cursor.
#[derive(Clone, Debug)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl<'a> CellSlice<'a> {
    pub fn new(cell: &'a Cell) -> Self {
        Self {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len() - self.bit_pos
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.refs().len() - self.ref_pos
    }

    /// Whether all bits and references have been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    fn ensure_bits(&self, bits: usize) -> Result<()> {
        if bits > self.remaining_bits() {
            return Err(CellError::BitsExhausted {
                requested: bits,
                remaining: self.remaining_bits(),
            });
        }
        Ok(())
    }

    pub(crate) fn remaining_bit_iter(&self) -> impl Iterator<Item = bool> + '_ {
        (self.bit_pos..self.cell.bit_len()).map(|i| self.cell.bit_at(i))
    }

    pub(crate) fn remaining_ref_iter(&self) -> impl Iterator<Item = &'a Cell> {
        self.cell.refs()[self.ref_pos..].iter()
    }

    pub fn load_bit(&mut self) -> Result<bool> {
        self.ensure_bits(1)?;
        let bit = self.cell.bit_at(self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Load an unsigned big-endian integer of `bits` bits (at most 64)
    pub fn load_uint(&mut self, bits: usize) -> Result<u64> {
        if bits > 64 {
            return Err(CellError::UnsupportedWidth { bits });
        }
        self.ensure_bits(bits)?;
        let mut value = 0u64;
        for i in 0..bits {
            value = (value << 1) | u64::from(self.cell.bit_at(self.bit_pos + i));
        }
        self.bit_pos += bits;
        Ok(value)
    }

    /// Load a two's complement integer of `bits` bits (1..=64)
    pub fn load_int(&mut self, bits: usize) -> Result<i64> {
        if bits == 0 || bits > 64 {
            return Err(CellError::UnsupportedWidth { bits });
        }
        let raw = self.load_uint(bits)?;
        let shift = 64 - bits;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Advance past `bits` bits without interpreting them
    pub fn skip(&mut self, bits: usize) -> Result<()> {
        self.ensure_bits(bits)?;
        self.bit_pos += bits;
        Ok(())
    }

    /// Load `len` whole bytes
    pub fn load_buffer(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_bits(len * 8)?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            let mut byte = 0u8;
            for _ in 0..8 {
                byte = (byte << 1) | u8::from(self.cell.bit_at(self.bit_pos));
                self.bit_pos += 1;
            }
            out.push(byte);
        }
        Ok(out)
    }

    /// Load exactly `N` bytes into an array
    pub fn load_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.load_buffer(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    /// Load the next child reference
    pub fn load_ref(&mut self) -> Result<Cell> {
        let cell = self
            .cell
            .reference(self.ref_pos)
            .cloned()
            .ok_or(CellError::RefsExhausted)?;
        self.ref_pos += 1;
        Ok(cell)
    }

    /// `Maybe ^Cell`
    pub fn load_maybe_ref(&mut self) -> Result<Option<Cell>> {
        let mut lookahead = self.clone();
        let cell = if lookahead.load_bit()? {
            Some(lookahead.load_ref()?)
        } else {
            None
        };
        *self = lookahead;
        Ok(cell)
    }

    /// `VarUInteger 16`
    pub fn load_coins(&mut self) -> Result<u128> {
        let mut lookahead = self.clone();
        let byte_len = lookahead.load_uint(4)? as usize;
        let bytes = lookahead.load_buffer(byte_len)?;
        *self = lookahead;
        Ok(bytes
            .iter()
            .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte)))
    }

    /// `HashmapE key_bits V`
    pub fn load_dict<V: DictValue>(&mut self, key_bits: usize) -> Result<BTreeMap<u32, V>> {
        let mut lookahead = self.clone();
        let entries = match lookahead.load_maybe_ref()? {
            Some(root) => dict::parse_dict_root(&root, key_bits)?,
            None => BTreeMap::new(),
        };
        *self = lookahead;
        Ok(entries)
    }

    /// Copy whatever has not been consumed into a fresh cell
    pub fn to_cell(&self) -> Result<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_slice(self)?;
        Ok(builder.build())
    }
}
