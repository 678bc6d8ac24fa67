//! Signed external submissions
//!
//! Layout, innermost first:
//!
//! ```text
//! body     = signatures:(HashmapE 8 bits512) messages_hash:bits256 messages...
//! envelope = owner_index:uint8 0 instance_id:uint32 body...
//! payload  = root_signature:bits512 envelope...
//! ```
//!
//! The root signature covers `hash(envelope)`; co-signer signatures in the dictionary
//! cover `messages_hash`.

use std::collections::{BTreeMap, BTreeSet};

use tonsig_cell::{Address, Cell, CellBuilder, CellHash};
use tonsig_crypto::{verify_hash, SecretKey, Signature};
use tracing::{debug, warn};

use crate::error::{Result, WalletError};
use crate::message::{decode_messages, encode_messages, ExternalMessage, OutboundMessage};
use crate::order::Order;
use crate::registry::{OwnerRegistry, OWNER_INDEX_BITS};

/// Signed payload ready to be wrapped into an external message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalPayload {
    pub owner_index: u8,
    pub root_signature: Signature,
    pub envelope: Cell,
    pub payload: Cell,
}

impl ExternalPayload {
    /// Wrap as an inbound external message to `wallet`
    pub fn to_message(&self, wallet: Address) -> Result<Cell> {
        ExternalMessage::new(wallet, self.payload.clone()).to_cell()
    }
}

/// Assemble the payload for `order`, signing the envelope with `key`.
///
/// Co-signer signatures must already be in `order`; the caller's own root signature is
/// computed here and never read from the order. Signatures that no longer match the
/// messages are logged but still included.
pub fn build_submission(
    order: &Order,
    registry: &OwnerRegistry,
    instance_id: u32,
    key: &SecretKey,
) -> Result<ExternalPayload> {
    let messages = order.messages_cell()?;
    let messages_hash = messages.hash();

    for index in order.stale_signatures(registry)? {
        warn!(owner_index = index, "signature does not match the current messages");
    }

    let mut body = CellBuilder::new();
    body.store_dict(&order.signature_entries(), OWNER_INDEX_BITS)?
        .store_buffer(messages_hash)?
        .store_cell_contents(&messages)?;
    let body = body.build();

    let public_key = key.public_key();
    let owner_index = registry
        .find_index(&public_key)
        .ok_or_else(|| WalletError::UnknownSigner(public_key.to_hex()))?;

    let mut envelope = CellBuilder::new();
    envelope
        .store_uint(u64::from(owner_index), 8)?
        .store_bit(false)?
        .store_uint(u64::from(instance_id), 32)?
        .store_cell_contents(&body)?;
    let envelope = envelope.build();

    let root_signature = key.sign(envelope.hash());

    let mut payload = CellBuilder::new();
    payload
        .store_buffer(root_signature.as_bytes())?
        .store_cell_contents(&envelope)?;
    let payload = payload.build();

    debug!(
        owner_index,
        messages = order.messages().len(),
        cosigners = order.signatures().len(),
        envelope_hash = %envelope.hash_hex(),
        "built submission"
    );

    Ok(ExternalPayload {
        owner_index,
        root_signature,
        envelope,
        payload,
    })
}

/// A submission payload taken apart again
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedSubmission {
    pub root_signature: Signature,
    pub owner_index: u8,
    pub instance_id: u32,
    pub signatures: BTreeMap<u8, Signature>,
    pub messages_hash: CellHash,
    pub messages: Vec<OutboundMessage>,
    pub envelope: Cell,
}

impl ParsedSubmission {
    /// Parse the payload cell produced by [`build_submission`]
    pub fn parse(payload: &Cell) -> Result<Self> {
        let mut slice = payload.parse();
        let root_signature = Signature::new(slice.load_array::<64>()?);
        let envelope = slice.to_cell()?;

        let mut slice = envelope.parse();
        let owner_index = slice.load_uint(8)? as u8;
        if slice.load_bit()? {
            return Err(WalletError::MalformedEncoding(
                "envelope flag bit is set".into(),
            ));
        }
        let instance_id = slice.load_uint(32)? as u32;
        let entries: BTreeMap<u32, [u8; 64]> = slice.load_dict(OWNER_INDEX_BITS)?;
        let messages_hash = slice.load_array::<32>()?;
        let messages = decode_messages(&mut slice)?;

        let signatures = entries
            .into_iter()
            .map(|(index, bytes)| (index as u8, Signature::new(bytes)))
            .collect();

        Ok(Self {
            root_signature,
            owner_index,
            instance_id,
            signatures,
            messages_hash,
            messages,
            envelope,
        })
    }

    /// Parse a complete inbound external message, returning its destination too
    pub fn from_message(message: &Cell) -> Result<(Address, Self)> {
        let message = ExternalMessage::from_cell(message)?;
        Ok((message.dest, Self::parse(&message.body)?))
    }

    /// Repeat the checks the wallet program performs.
    ///
    /// Fails if the root signer is unknown, its signature does not cover the envelope, or
    /// the stored messages hash does not match the messages. Returns the owner indices
    /// with a valid signature, root signer included; bad co-signer signatures are only
    /// logged.
    pub fn verify(&self, registry: &OwnerRegistry) -> Result<BTreeSet<u8>> {
        let root_key = registry
            .get(self.owner_index)
            .ok_or_else(|| WalletError::UnknownSigner(format!("owner index {}", self.owner_index)))?;
        verify_hash(root_key, self.envelope.hash(), &self.root_signature)?;

        let messages = encode_messages(&self.messages)?;
        if *messages.hash() != self.messages_hash {
            return Err(WalletError::MalformedEncoding(
                "messages hash does not match the message node".into(),
            ));
        }

        let mut signers = BTreeSet::from([self.owner_index]);
        for (index, signature) in &self.signatures {
            let valid = registry
                .get(*index)
                .map(|key| verify_hash(key, &self.messages_hash, signature).is_ok())
                .unwrap_or(false);
            if valid {
                signers.insert(*index);
            } else {
                warn!(owner_index = index, "co-signer signature does not verify");
            }
        }
        Ok(signers)
    }

    /// The order this submission was built from, with the co-signer signatures only
    pub fn to_order(&self) -> Order {
        let mut order = Order::with_messages(self.messages.clone());
        for (index, signature) in &self.signatures {
            order.add_signature(*index, *signature);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::InternalMessage;

    fn keys() -> Vec<SecretKey> {
        (1..=3u8).map(|i| SecretKey::from_seed(&[i; 32])).collect()
    }

    fn registry(keys: &[SecretKey]) -> OwnerRegistry {
        OwnerRegistry::from_public_keys(keys.iter().map(SecretKey::public_key)).unwrap()
    }

    fn sample_order() -> Order {
        let transfer = InternalMessage::new(Address::new(0, [0x42; 32]), 5_000_000)
            .to_cell()
            .unwrap();
        Order::with_messages(vec![OutboundMessage::new(3, transfer)])
    }

    #[test]
    fn test_unknown_signer_produces_nothing() {
        let keys = keys();
        let registry = registry(&keys[..2]);
        let err = build_submission(&sample_order(), &registry, 7, &keys[2]).unwrap_err();
        assert!(matches!(err, WalletError::UnknownSigner(_)));
    }

    #[test]
    fn test_payload_layout() {
        let keys = keys();
        let registry = registry(&keys);
        let mut order = sample_order();
        order.sign(0, &keys[0]).unwrap();

        let built = build_submission(&order, &registry, 7, &keys[1]).unwrap();
        assert_eq!(built.owner_index, 1);
        // 512 signature + 8 index + 1 flag + 32 instance + 1 dict + 256 hash + 8 mode
        assert_eq!(built.payload.bit_len(), 818);
        // signatures dictionary, then the message envelope
        assert_eq!(built.payload.refs().len(), 2);
        assert_eq!(&built.payload.data()[..64], built.root_signature.as_bytes());
        assert_eq!(built.envelope.data()[0], 1);

        let envelope_hash = *built.envelope.hash();
        assert!(verify_hash(&keys[1].public_key(), &envelope_hash, &built.root_signature).is_ok());
    }

    #[test]
    fn test_parse_inverts_build() {
        let keys = keys();
        let registry = registry(&keys);
        let mut order = sample_order();
        order.sign(0, &keys[0]).unwrap();
        order.sign(2, &keys[2]).unwrap();

        let built = build_submission(&order, &registry, 42, &keys[1]).unwrap();
        let parsed = ParsedSubmission::parse(&built.payload).unwrap();
        assert_eq!(parsed.owner_index, 1);
        assert_eq!(parsed.instance_id, 42);
        assert_eq!(parsed.root_signature, built.root_signature);
        assert_eq!(parsed.envelope, built.envelope);
        assert_eq!(parsed.messages_hash, order.messages_hash().unwrap());
        assert_eq!(parsed.to_order(), order);

        let signers = parsed.verify(&registry).unwrap();
        assert_eq!(signers.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_verify_rejects_foreign_root_signature() {
        let keys = keys();
        let registry = registry(&keys);
        let built = build_submission(&sample_order(), &registry, 1, &keys[0]).unwrap();
        let mut parsed = ParsedSubmission::parse(&built.payload).unwrap();
        parsed.owner_index = 2;
        assert!(matches!(
            parsed.verify(&registry),
            Err(WalletError::Crypto(_))
        ));

        parsed.owner_index = 9;
        assert!(matches!(
            parsed.verify(&registry),
            Err(WalletError::UnknownSigner(_))
        ));
    }

    #[test]
    fn test_stale_cosigner_is_not_counted() {
        let keys = keys();
        let registry = registry(&keys);
        let mut order = sample_order();
        order.sign(2, &keys[2]).unwrap();
        order.add_message(OutboundMessage::new(1, Cell::empty()));

        let built = build_submission(&order, &registry, 1, &keys[0]).unwrap();
        let signers = ParsedSubmission::parse(&built.payload)
            .unwrap()
            .verify(&registry)
            .unwrap();
        assert_eq!(signers.into_iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_too_many_messages_with_signatures() {
        let keys = keys();
        let registry = registry(&keys);
        let mut order = Order::with_messages(vec![OutboundMessage::new(3, Cell::empty()); 4]);
        assert!(build_submission(&order, &registry, 1, &keys[0]).is_ok());

        order.sign(1, &keys[1]).unwrap();
        let err = build_submission(&order, &registry, 1, &keys[0]).unwrap_err();
        assert!(matches!(
            err,
            WalletError::Cell(tonsig_cell::CellError::RefOverflow)
        ));
    }

    #[test]
    fn test_message_wrapping() {
        let keys = keys();
        let registry = registry(&keys);
        let wallet = Address::new(0, [0x77; 32]);
        let built = build_submission(&sample_order(), &registry, 1, &keys[0]).unwrap();
        let message = built.to_message(wallet).unwrap();

        let (dest, parsed) = ParsedSubmission::from_message(&message).unwrap();
        assert_eq!(dest, wallet);
        assert_eq!(parsed.envelope, built.envelope);
    }

    #[test]
    fn test_parse_truncated_payload() {
        let mut b = CellBuilder::new();
        b.store_buffer(&[0u8; 64]).unwrap().store_uint(1, 8).unwrap();
        let err = ParsedSubmission::parse(&b.build()).unwrap_err();
        assert!(err.is_malformed());
    }
}
