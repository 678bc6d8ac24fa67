//! Standard internal addresses

use std::fmt;
use std::str::FromStr;

use crate::builder::CellBuilder;
use crate::cell::CellHash;
use crate::error::{CellError, Result};
use crate::slice::CellSlice;

/// `addr_std$10 anycast:(Maybe Anycast)=0 workchain_id:int8 address:bits256`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub workchain: i8,
    pub hash: CellHash,
}

impl Address {
    pub const fn new(workchain: i8, hash: CellHash) -> Self {
        Self { workchain, hash }
    }

    /// Raw `workchain:hex` form
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_raw())
    }
}

impl FromStr for Address {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self> {
        let (workchain, hash) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| CellError::InvalidAddress(format!("expected workchain:hash, got {s}")))?;
        let workchain = workchain
            .parse::<i8>()
            .map_err(|e| CellError::InvalidAddress(format!("workchain: {e}")))?;
        let bytes = hex::decode(hash).map_err(|e| CellError::InvalidAddress(format!("hash: {e}")))?;
        let hash: CellHash = bytes
            .try_into()
            .map_err(|_| CellError::InvalidAddress("hash must be 32 bytes".into()))?;
        Ok(Self { workchain, hash })
    }
}

impl CellBuilder {
    pub fn store_address(&mut self, address: &Address) -> Result<&mut Self> {
        self.ensure_bits(3 + 8 + 256)?;
        self.store_uint(0b100, 3)?
            .store_int(i64::from(address.workchain), 8)?
            .store_buffer(&address.hash)
    }

    /// `addr_none$00`
    pub fn store_address_none(&mut self) -> Result<&mut Self> {
        self.store_uint(0, 2)
    }
}

impl CellSlice<'_> {
    /// Load an optional standard address; `addr_none` yields `None`
    pub fn load_maybe_address(&mut self) -> Result<Option<Address>> {
        let mut lookahead = self.clone();
        let address = match lookahead.load_uint(2)? {
            0b00 => None,
            0b10 => {
                if lookahead.load_bit()? {
                    return Err(CellError::InvalidAddress("anycast is not supported".into()));
                }
                let workchain = lookahead.load_int(8)? as i8;
                let hash = lookahead.load_array::<32>()?;
                Some(Address { workchain, hash })
            }
            tag => {
                return Err(CellError::InvalidAddress(format!(
                    "unsupported address tag {tag:02b}"
                )))
            }
        };
        *self = lookahead;
        Ok(address)
    }

    pub fn load_address(&mut self) -> Result<Address> {
        let mut lookahead = self.clone();
        let address = lookahead
            .load_maybe_address()?
            .ok_or_else(|| CellError::InvalidAddress("expected a standard address".into()))?;
        *self = lookahead;
        Ok(address)
    }
}
