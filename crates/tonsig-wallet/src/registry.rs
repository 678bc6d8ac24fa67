//! Owner registry: index-addressed public keys

use std::collections::BTreeMap;

use tonsig_cell::{Cell, CellBuilder, CellSlice};
use tonsig_crypto::PublicKey;

use crate::error::{Result, WalletError};

/// Key width of the owners dictionary
pub const OWNER_INDEX_BITS: usize = 8;

/// Largest registry the 8-bit owner count can describe
pub const MAX_OWNERS: usize = 255;

/// Ordered owner keys; owner `i` is `keys[i]`.
///
/// Indices are assigned once, positionally, when the registry is built and never change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnerRegistry {
    keys: Vec<PublicKey>,
}

impl OwnerRegistry {
    pub fn from_public_keys<I>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = PublicKey>,
    {
        let keys: Vec<PublicKey> = keys.into_iter().collect();
        if keys.len() > MAX_OWNERS {
            return Err(WalletError::InvalidConfig(format!(
                "{} owners exceed the limit of {MAX_OWNERS}",
                keys.len()
            )));
        }
        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: u8) -> Option<&PublicKey> {
        self.keys.get(usize::from(index))
    }

    pub fn keys(&self) -> &[PublicKey] {
        &self.keys
    }

    /// `(index, key)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &PublicKey)> {
        // from_public_keys caps the length at 255, so every position fits in u8
        self.keys.iter().enumerate().map(|(i, key)| (i as u8, key))
    }

    /// First index holding `key`, scanning in index order
    pub fn find_index(&self, key: &PublicKey) -> Option<u8> {
        self.keys
            .iter()
            .position(|candidate| candidate == key)
            .map(|i| i as u8)
    }

    /// Dictionary entries: index -> cell of `public_key:bits256 flags:uint8=0`
    pub fn encode(&self) -> Result<BTreeMap<u32, Cell>> {
        let mut entries = BTreeMap::new();
        for (index, key) in self.iter() {
            let mut value = CellBuilder::new();
            value.store_buffer(key.as_bytes())?.store_uint(0, 8)?;
            entries.insert(u32::from(index), value.build());
        }
        Ok(entries)
    }

    /// Inverse of [`OwnerRegistry::encode`]. Indices have to be dense from zero.
    pub fn decode(entries: &BTreeMap<u32, Cell>) -> Result<Self> {
        let mut keys = Vec::with_capacity(entries.len());
        for (position, (index, value)) in entries.iter().enumerate() {
            if *index as usize != position {
                return Err(WalletError::MalformedEncoding(format!(
                    "owner indices are not dense: expected {position}, found {index}"
                )));
            }
            let mut slice = value.parse();
            if slice.remaining_bits() < PublicKey::LENGTH * 8 + 8 {
                return Err(WalletError::MalformedEncoding(format!(
                    "owner {index} entry holds {} bits, expected at least 264",
                    slice.remaining_bits()
                )));
            }
            keys.push(PublicKey::new(slice.load_array::<32>()?));
        }
        Self::from_public_keys(keys)
    }

    /// Append the owners dictionary to `builder`
    pub fn store(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_dict(&self.encode()?, OWNER_INDEX_BITS)?;
        Ok(())
    }

    /// Read an owners dictionary from `slice`
    pub fn load(slice: &mut CellSlice<'_>) -> Result<Self> {
        let entries: BTreeMap<u32, Cell> = slice.load_dict(OWNER_INDEX_BITS)?;
        Self::decode(&entries)
    }
}
