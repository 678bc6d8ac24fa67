//! Orders: pending outbound messages plus collected owner signatures

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tonsig_cell::{Cell, CellHash};
use tonsig_crypto::{verify_hash, SecretKey, Signature};

use crate::error::Result;
use crate::message::{encode_messages, OutboundMessage};
use crate::registry::OwnerRegistry;

/// A batch of outbound messages awaiting quorum.
///
/// Co-signer signatures cover [`Order::messages_hash`]. Changing the messages after
/// signatures were collected leaves those signatures behind on the old hash; nothing
/// here prevents that, but [`Order::stale_signatures`] reports it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    messages: Vec<OutboundMessage>,
    #[serde(default)]
    signatures: BTreeMap<u8, Signature>,
}

impl Order {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<OutboundMessage>) -> Self {
        Self {
            messages,
            signatures: BTreeMap::new(),
        }
    }

    pub fn messages(&self) -> &[OutboundMessage] {
        &self.messages
    }

    pub fn signatures(&self) -> &BTreeMap<u8, Signature> {
        &self.signatures
    }

    pub fn add_message(&mut self, message: OutboundMessage) {
        self.messages.push(message);
    }

    /// Insert or replace the signature for `owner_index`, returning the replaced one
    pub fn add_signature(&mut self, owner_index: u8, signature: Signature) -> Option<Signature> {
        self.signatures.insert(owner_index, signature)
    }

    /// Copy every signature of `other` into this order.
    ///
    /// Last writer wins: where both orders hold a signature for the same owner, `other`'s
    /// replaces ours. Messages are left alone; merging orders with different messages
    /// produces signatures over the wrong hash.
    pub fn union_signatures(&mut self, other: &Order) {
        for (index, signature) in &other.signatures {
            self.signatures.insert(*index, *signature);
        }
    }

    pub fn clear_signatures(&mut self) {
        self.signatures.clear();
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    pub fn messages_cell(&self) -> Result<Cell> {
        encode_messages(&self.messages)
    }

    /// The hash every co-signer signs
    pub fn messages_hash(&self) -> Result<CellHash> {
        Ok(*self.messages_cell()?.hash())
    }

    /// Sign the current messages as `owner_index` and store the signature
    pub fn sign(&mut self, owner_index: u8, key: &SecretKey) -> Result<Signature> {
        let signature = key.sign(&self.messages_hash()?);
        self.signatures.insert(owner_index, signature);
        Ok(signature)
    }

    /// Owner indices whose signature does not verify against the current messages hash,
    /// including indices missing from `registry`
    pub fn stale_signatures(&self, registry: &OwnerRegistry) -> Result<Vec<u8>> {
        let hash = self.messages_hash()?;
        Ok(self
            .signatures
            .iter()
            .filter(|(index, signature)| match registry.get(**index) {
                Some(key) => verify_hash(key, &hash, signature).is_err(),
                None => true,
            })
            .map(|(index, _)| *index)
            .collect())
    }

    /// Signatures as dictionary entries with inline 64-byte values
    pub(crate) fn signature_entries(&self) -> BTreeMap<u32, [u8; 64]> {
        self.signatures
            .iter()
            .map(|(index, signature)| (u32::from(*index), *signature.as_bytes()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonsig_cell::CellBuilder;

    fn sig(byte: u8) -> Signature {
        Signature::new([byte; 64])
    }

    fn transfer(tag: u32) -> OutboundMessage {
        let mut b = CellBuilder::new();
        b.store_uint(u64::from(tag), 32).unwrap();
        OutboundMessage::new(3, b.build())
    }

    #[test]
    fn test_one_signature_per_owner() {
        let mut order = Order::new();
        order.add_signature(0, sig(0));
        order.add_signature(1, sig(1));
        order.add_signature(2, sig(2));
        assert_eq!(order.signatures().len(), 3);

        let replaced = order.add_signature(1, sig(9));
        assert_eq!(replaced, Some(sig(1)));
        assert_eq!(order.signatures().len(), 3);
        assert_eq!(order.signatures()[&1], sig(9));
    }

    #[test]
    fn test_union_is_last_writer_wins() {
        let mut a = Order::new();
        for i in [0, 1, 2] {
            a.add_signature(i, sig(i));
        }
        let mut b = Order::new();
        for i in [2, 3, 5] {
            b.add_signature(i, sig(100 + i));
        }

        a.union_signatures(&b);
        let indices: Vec<u8> = a.signatures().keys().copied().collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 5]);
        assert_eq!(a.signatures()[&2], sig(102));
        assert_eq!(a.signatures()[&0], sig(0));
        assert_eq!(b.signatures().len(), 3);
    }

    #[test]
    fn test_clear_signatures_keeps_messages() {
        let mut order = Order::with_messages(vec![transfer(1), transfer(2)]);
        order.add_signature(0, sig(0));
        let before = order.messages().to_vec();

        order.clear_signatures();
        assert!(order.signatures().is_empty());
        assert_eq!(order.messages(), before.as_slice());
    }

    #[test]
    fn test_clear_messages_keeps_signatures() {
        let mut order = Order::with_messages(vec![transfer(1)]);
        order.add_signature(4, sig(4));
        order.clear_messages();
        assert!(order.messages().is_empty());
        assert_eq!(order.signatures().len(), 1);
    }

    #[test]
    fn test_messages_hash_tracks_order_of_messages() {
        let ab = Order::with_messages(vec![transfer(1), transfer(2)]);
        let ba = Order::with_messages(vec![transfer(2), transfer(1)]);
        assert_ne!(ab.messages_hash().unwrap(), ba.messages_hash().unwrap());
        assert_eq!(
            Order::new().messages_hash().unwrap(),
            *Cell::empty().hash()
        );
    }

    #[test]
    fn test_sign_and_detect_stale() {
        let keys: Vec<SecretKey> = (1..=3u8).map(|i| SecretKey::from_seed(&[i; 32])).collect();
        let registry =
            OwnerRegistry::from_public_keys(keys.iter().map(SecretKey::public_key)).unwrap();

        let mut order = Order::with_messages(vec![transfer(7)]);
        order.sign(0, &keys[0]).unwrap();
        order.sign(1, &keys[1]).unwrap();
        assert!(order.stale_signatures(&registry).unwrap().is_empty());

        // signed under the wrong index
        order.sign(2, &keys[0]).unwrap();
        assert_eq!(order.stale_signatures(&registry).unwrap(), vec![2]);

        order.add_message(transfer(8));
        assert_eq!(order.stale_signatures(&registry).unwrap(), vec![0, 1, 2]);

        let mut unknown = Order::new();
        unknown.add_signature(9, sig(1));
        assert_eq!(unknown.stale_signatures(&registry).unwrap(), vec![9]);
    }

    #[test]
    fn test_json_exchange() {
        let mut order = Order::with_messages(vec![transfer(1)]);
        order.add_signature(3, sig(0xcd));
        let json = serde_json::to_string_pretty(&order).unwrap();
        assert!(json.contains(&"cd".repeat(64)));
        assert!(json.contains("\"3\""));

        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back, order);

        let empty: Order = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Order::new());
    }
}
