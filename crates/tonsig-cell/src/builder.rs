//! Append-only cell construction

use std::collections::BTreeMap;

use crate::cell::{Cell, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::dict::{self, DictValue};
use crate::error::{CellError, Result};
use crate::slice::CellSlice;

/// Builder for a single cell.
///
/// Every `store_*` call checks capacity before writing, so a failed call leaves the
/// builder untouched. Fields are written exactly in call order with no implicit padding.
#[derive(Clone, Debug, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Cell>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    pub fn available_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    pub fn available_refs(&self) -> usize {
        MAX_CELL_REFS - self.refs.len()
    }

    pub(crate) fn ensure_bits(&self, bits: usize) -> Result<()> {
        if bits > self.available_bits() {
            return Err(CellError::BitOverflow {
                bits: self.bit_len + bits,
            });
        }
        Ok(())
    }

    fn ensure_refs(&self, refs: usize) -> Result<()> {
        if refs > self.available_refs() {
            return Err(CellError::RefOverflow);
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        let offset = self.bit_len % 8;
        if offset == 0 {
            self.data.push(0);
        }
        if bit {
            if let Some(last) = self.data.last_mut() {
                *last |= 0x80 >> offset;
            }
        }
        self.bit_len += 1;
    }

    /// Store a single bit
    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.ensure_bits(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Store `value` as an unsigned big-endian integer of exactly `bits` bits
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self> {
        if bits > 64 {
            return Err(CellError::UnsupportedWidth { bits });
        }
        if bits < 64 && value >> bits != 0 {
            return Err(CellError::ValueOutOfRange { bits });
        }
        self.ensure_bits(bits)?;
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    /// Store `value` as a two's complement integer of exactly `bits` bits
    pub fn store_int(&mut self, value: i64, bits: usize) -> Result<&mut Self> {
        if bits == 0 || bits > 64 {
            return Err(CellError::UnsupportedWidth { bits });
        }
        if bits < 64 {
            let bound = 1i64 << (bits - 1);
            if value < -bound || value >= bound {
                return Err(CellError::ValueOutOfRange { bits });
            }
        }
        let mask = if bits == 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        };
        self.store_uint(value as u64 & mask, bits)
    }

    /// Store raw bytes, 8 bits each
    pub fn store_buffer(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.ensure_bits(bytes.len() * 8)?;
        if self.bit_len % 8 == 0 {
            self.data.extend_from_slice(bytes);
            self.bit_len += bytes.len() * 8;
        } else {
            for byte in bytes {
                for i in (0..8).rev() {
                    self.push_bit((byte >> i) & 1 == 1);
                }
            }
        }
        Ok(self)
    }

    /// Append a child reference
    pub fn store_ref(&mut self, cell: Cell) -> Result<&mut Self> {
        self.ensure_refs(1)?;
        self.refs.push(cell);
        Ok(self)
    }

    /// `Maybe ^Cell`: a presence bit, then the reference if present
    pub fn store_maybe_ref(&mut self, cell: Option<Cell>) -> Result<&mut Self> {
        match cell {
            Some(cell) => {
                self.ensure_bits(1)?;
                self.ensure_refs(1)?;
                self.push_bit(true);
                self.refs.push(cell);
            }
            None => {
                self.store_bit(false)?;
            }
        }
        Ok(self)
    }

    /// `VarUInteger 16`: a 4-bit byte length followed by the big-endian bytes
    pub fn store_coins(&mut self, amount: u128) -> Result<&mut Self> {
        let byte_len = (128 - amount.leading_zeros() as usize).div_ceil(8);
        if byte_len > 15 {
            return Err(CellError::ValueOutOfRange { bits: 120 });
        }
        self.ensure_bits(4 + byte_len * 8)?;
        self.store_uint(byte_len as u64, 4)?;
        self.store_buffer(&amount.to_be_bytes()[16 - byte_len..])
    }

    /// `HashmapE key_bits V`: a presence bit, then a reference to the trie root
    pub fn store_dict<V: DictValue>(
        &mut self,
        entries: &BTreeMap<u32, V>,
        key_bits: usize,
    ) -> Result<&mut Self> {
        match dict::build_dict_root(entries, key_bits)? {
            Some(root) => self.store_maybe_ref(Some(root)),
            None => self.store_bit(false),
        }
    }

    /// Append everything the slice has not consumed yet, bits and references
    pub fn store_slice(&mut self, slice: &CellSlice<'_>) -> Result<&mut Self> {
        self.ensure_bits(slice.remaining_bits())?;
        self.ensure_refs(slice.remaining_refs())?;
        for bit in slice.remaining_bit_iter() {
            self.push_bit(bit);
        }
        self.refs.extend(slice.remaining_ref_iter().cloned());
        Ok(self)
    }

    /// Append another cell's full content
    pub fn store_cell_contents(&mut self, cell: &Cell) -> Result<&mut Self> {
        self.store_slice(&cell.parse())
    }

    /// Finish the cell and compute its hash
    pub fn build(self) -> Cell {
        Cell::from_parts(self.data, self.bit_len, self.refs)
    }
}
