//! Outbound messages and the envelopes that carry them

use serde::{Deserialize, Serialize};
use tonsig_cell::{Address, Cell, CellBuilder, CellSlice};

use crate::error::{Result, WalletError};

/// Send-mode bits carried verbatim next to each outbound message
pub mod send_mode {
    pub const PAY_FEES_SEPARATELY: u8 = 1;
    pub const IGNORE_ERRORS: u8 = 2;
    pub const DESTROY_IF_ZERO: u8 = 32;
    pub const CARRY_REMAINING_VALUE: u8 = 64;
    pub const CARRY_ALL_BALANCE: u8 = 128;
}

/// One message the wallet should emit, with its send mode
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub mode: u8,
    pub envelope: Cell,
}

impl OutboundMessage {
    pub fn new(mode: u8, envelope: Cell) -> Self {
        Self { mode, envelope }
    }
}

/// Message node: `mode:uint8` plus a reference to the envelope, once per message in order
pub fn encode_messages(messages: &[OutboundMessage]) -> Result<Cell> {
    let mut builder = CellBuilder::new();
    for message in messages {
        builder
            .store_uint(u64::from(message.mode), 8)?
            .store_ref(message.envelope.clone())?;
    }
    Ok(builder.build())
}

/// Inverse of [`encode_messages`]; consumes the rest of `slice`
pub fn decode_messages(slice: &mut CellSlice<'_>) -> Result<Vec<OutboundMessage>> {
    if slice.remaining_bits() != slice.remaining_refs() * 8 {
        return Err(WalletError::MalformedEncoding(format!(
            "message node has {} bits for {} messages",
            slice.remaining_bits(),
            slice.remaining_refs()
        )));
    }
    let mut messages = Vec::with_capacity(slice.remaining_refs());
    while slice.remaining_refs() > 0 {
        let mode = slice.load_uint(8)? as u8;
        let envelope = slice.load_ref()?;
        messages.push(OutboundMessage { mode, envelope });
    }
    Ok(messages)
}

/// `Maybe (Either StateInit ^StateInit)`; the state init always goes by reference
fn store_init(builder: &mut CellBuilder, state_init: Option<&Cell>) -> Result<()> {
    match state_init {
        Some(init) => {
            builder.store_bit(true)?.store_bit(true)?.store_ref(init.clone())?;
        }
        None => {
            builder.store_bit(false)?;
        }
    }
    Ok(())
}

/// `Either X ^X`: inline when the body fits next to the header, otherwise by reference
fn store_body(builder: &mut CellBuilder, body: &Cell) -> Result<()> {
    let inline = builder.available_bits() > body.bit_len()
        && builder.available_refs() >= body.refs().len();
    if inline {
        builder.store_bit(false)?.store_cell_contents(body)?;
    } else {
        builder.store_bit(true)?.store_ref(body.clone())?;
    }
    Ok(())
}

/// Accepts both `Either` forms; an inline state init is copied out into its own cell
fn load_init(slice: &mut CellSlice<'_>) -> Result<Option<Cell>> {
    if !slice.load_bit()? {
        return Ok(None);
    }
    if slice.load_bit()? {
        Ok(Some(slice.load_ref()?))
    } else {
        Ok(Some(load_state_init_inline(slice)?))
    }
}

/// `split_depth:(Maybe (## 5)) special:(Maybe TickTock) code:(Maybe ^Cell)
/// data:(Maybe ^Cell) library:(HashmapE 256 SimpleLib)`
fn load_state_init_inline(slice: &mut CellSlice<'_>) -> Result<Cell> {
    let mut builder = CellBuilder::new();
    let split_depth = slice.load_bit()?;
    builder.store_bit(split_depth)?;
    if split_depth {
        builder.store_uint(slice.load_uint(5)?, 5)?;
    }
    let special = slice.load_bit()?;
    builder.store_bit(special)?;
    if special {
        builder.store_uint(slice.load_uint(2)?, 2)?;
    }
    // code, data, then the library dictionary, which is laid out like a maybe-ref
    for _ in 0..3 {
        builder.store_maybe_ref(slice.load_maybe_ref()?)?;
    }
    Ok(builder.build())
}

fn load_body(slice: &mut CellSlice<'_>) -> Result<Cell> {
    if slice.load_bit()? {
        Ok(slice.load_ref()?)
    } else {
        Ok(slice.to_cell()?)
    }
}

/// Internal message the wallet (or another contract) can carry as an envelope.
///
/// Only the fields a sender controls are modeled; fees, logical time and creation time
/// are written as zero and filled in by the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InternalMessage {
    pub bounce: bool,
    pub dest: Address,
    pub value: u128,
    pub state_init: Option<Cell>,
    pub body: Cell,
}

impl InternalMessage {
    pub fn new(dest: Address, value: u128) -> Self {
        Self {
            bounce: true,
            dest,
            value,
            state_init: None,
            body: Cell::empty(),
        }
    }

    pub fn with_bounce(mut self, bounce: bool) -> Self {
        self.bounce = bounce;
        self
    }

    pub fn with_state_init(mut self, state_init: Cell) -> Self {
        self.state_init = Some(state_init);
        self
    }

    pub fn with_body(mut self, body: Cell) -> Self {
        self.body = body;
        self
    }

    /// `int_msg_info$0 ihr_disabled bounce bounced src dest value ihr_fee fwd_fee created_lt created_at`
    pub fn to_cell(&self) -> Result<Cell> {
        let mut builder = CellBuilder::new();
        builder
            .store_bit(false)?
            .store_bit(true)?
            .store_bit(self.bounce)?
            .store_bit(false)?
            .store_address_none()?
            .store_address(&self.dest)?
            .store_coins(self.value)?
            .store_bit(false)?
            .store_coins(0)?
            .store_coins(0)?
            .store_uint(0, 64)?
            .store_uint(0, 32)?;
        store_init(&mut builder, self.state_init.as_ref())?;
        store_body(&mut builder, &self.body)?;
        Ok(builder.build())
    }

    pub fn from_cell(cell: &Cell) -> Result<Self> {
        let mut slice = cell.parse();
        if slice.load_bit()? {
            return Err(WalletError::MalformedEncoding(
                "not an internal message".into(),
            ));
        }
        let _ihr_disabled = slice.load_bit()?;
        let bounce = slice.load_bit()?;
        let _bounced = slice.load_bit()?;
        let _src = slice.load_maybe_address()?;
        let dest = slice.load_address()?;
        let value = slice.load_coins()?;
        if slice.load_bit()? {
            return Err(WalletError::MalformedEncoding(
                "extra currencies are not supported".into(),
            ));
        }
        let _ihr_fee = slice.load_coins()?;
        let _fwd_fee = slice.load_coins()?;
        slice.skip(64 + 32)?;
        let state_init = load_init(&mut slice)?;
        let body = load_body(&mut slice)?;
        Ok(Self {
            bounce,
            dest,
            value,
            state_init,
            body,
        })
    }
}

/// Inbound external message addressed to a wallet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalMessage {
    pub dest: Address,
    pub state_init: Option<Cell>,
    pub body: Cell,
}

impl ExternalMessage {
    pub fn new(dest: Address, body: Cell) -> Self {
        Self {
            dest,
            state_init: None,
            body,
        }
    }

    pub fn with_state_init(mut self, state_init: Cell) -> Self {
        self.state_init = Some(state_init);
        self
    }

    /// `ext_in_msg_info$10 src:addr_none dest import_fee:Coins=0`
    pub fn to_cell(&self) -> Result<Cell> {
        let mut builder = CellBuilder::new();
        builder
            .store_uint(0b10, 2)?
            .store_address_none()?
            .store_address(&self.dest)?
            .store_coins(0)?;
        store_init(&mut builder, self.state_init.as_ref())?;
        store_body(&mut builder, &self.body)?;
        Ok(builder.build())
    }

    pub fn from_cell(cell: &Cell) -> Result<Self> {
        let mut slice = cell.parse();
        if slice.load_uint(2)? != 0b10 {
            return Err(WalletError::MalformedEncoding(
                "not an inbound external message".into(),
            ));
        }
        let _src = slice.load_maybe_address()?;
        let dest = slice.load_address()?;
        let _import_fee = slice.load_coins()?;
        let state_init = load_init(&mut slice)?;
        let body = load_body(&mut slice)?;
        Ok(Self {
            dest,
            state_init,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> Address {
        Address::new(0, [0x5c; 32])
    }

    fn note(text: &str) -> Cell {
        let mut b = CellBuilder::new();
        b.store_uint(0, 32).unwrap().store_buffer(text.as_bytes()).unwrap();
        b.build()
    }

    #[test]
    fn test_message_node_layout() {
        let messages = vec![
            OutboundMessage::new(send_mode::PAY_FEES_SEPARATELY, note("a")),
            OutboundMessage::new(send_mode::CARRY_ALL_BALANCE, note("b")),
        ];
        let node = encode_messages(&messages).unwrap();
        assert_eq!(node.bit_len(), 16);
        assert_eq!(node.data(), &[1, 128]);
        assert_eq!(node.refs().len(), 2);

        let decoded = decode_messages(&mut node.parse()).unwrap();
        assert_eq!(decoded, messages);
    }

    #[test]
    fn test_fifth_message_overflows() {
        let messages = vec![OutboundMessage::new(3, Cell::empty()); 5];
        let err = encode_messages(&messages).unwrap_err();
        assert!(matches!(
            err,
            WalletError::Cell(tonsig_cell::CellError::RefOverflow)
        ));
    }

    #[test]
    fn test_internal_message_round_trip() {
        let message = InternalMessage::new(dest(), 1_000_000_000)
            .with_state_init(Cell::empty())
            .with_body(note("hello"));
        let cell = message.to_cell().unwrap();
        // ihr_disabled and bounce set after the leading tag
        assert_eq!(cell.data()[0] >> 4, 0b0110);
        // state init by reference; body fits inline
        assert_eq!(cell.refs().len(), 1);
        assert_eq!(InternalMessage::from_cell(&cell).unwrap(), message);
    }

    #[test]
    fn test_external_message_body_by_reference_when_large() {
        let mut big = CellBuilder::new();
        big.store_buffer(&[0xff; 100]).unwrap();
        let big = big.build();

        let small = ExternalMessage::new(dest(), note("x")).to_cell().unwrap();
        assert!(small.refs().is_empty());

        let message = ExternalMessage::new(dest(), big.clone());
        let cell = message.to_cell().unwrap();
        assert_eq!(cell.refs(), &[big]);
        assert_eq!(ExternalMessage::from_cell(&cell).unwrap(), message);
    }

    fn state_init(split_depth: Option<u8>) -> Cell {
        let mut code = CellBuilder::new();
        code.store_uint(0xff00, 16).unwrap();
        let mut b = CellBuilder::new();
        match split_depth {
            Some(depth) => {
                b.store_bit(true).unwrap().store_uint(u64::from(depth), 5).unwrap();
            }
            None => {
                b.store_bit(false).unwrap();
            }
        }
        b.store_bit(false)
            .unwrap()
            .store_maybe_ref(Some(code.build()))
            .unwrap()
            .store_maybe_ref(Some(note("data")))
            .unwrap()
            .store_bit(false)
            .unwrap();
        b.build()
    }

    fn external_with_inline_init(init: &Cell, body: &Cell) -> Cell {
        let mut b = CellBuilder::new();
        b.store_uint(0b10, 2)
            .unwrap()
            .store_address_none()
            .unwrap()
            .store_address(&dest())
            .unwrap()
            .store_coins(0)
            .unwrap()
            .store_bit(true)
            .unwrap()
            .store_bit(false)
            .unwrap()
            .store_cell_contents(init)
            .unwrap()
            .store_bit(false)
            .unwrap()
            .store_cell_contents(body)
            .unwrap();
        b.build()
    }

    #[test]
    fn test_external_message_with_inline_state_init() {
        let init = state_init(None);
        let cell = external_with_inline_init(&init, &note("hi"));
        assert_eq!(cell.refs().len(), 2);

        let message = ExternalMessage::from_cell(&cell).unwrap();
        assert_eq!(message.dest, dest());
        assert_eq!(message.state_init, Some(init.clone()));
        assert_eq!(message.body, note("hi"));

        // re-encoding moves the state init behind a reference; same hash either way
        let by_ref = message.to_cell().unwrap();
        assert_eq!(ExternalMessage::from_cell(&by_ref).unwrap(), message);
        assert_eq!(*message.state_init.unwrap().hash(), *init.hash());
    }

    #[test]
    fn test_inline_state_init_keeps_split_depth() {
        let init = state_init(Some(7));
        let cell = external_with_inline_init(&init, &Cell::empty());
        let message = ExternalMessage::from_cell(&cell).unwrap();
        assert_eq!(message.state_init, Some(init));
        assert!(message.body.is_empty());
    }

    #[test]
    fn test_inline_state_init_truncated() {
        let mut b = CellBuilder::new();
        b.store_uint(0b10, 2)
            .unwrap()
            .store_address_none()
            .unwrap()
            .store_address(&dest())
            .unwrap()
            .store_coins(0)
            .unwrap()
            .store_bit(true)
            .unwrap()
            .store_bit(false)
            .unwrap()
            .store_bit(false)
            .unwrap();
        let err = ExternalMessage::from_cell(&b.build()).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_external_rejects_internal() {
        let cell = InternalMessage::new(dest(), 1).to_cell().unwrap();
        assert!(ExternalMessage::from_cell(&cell).unwrap_err().is_malformed());
    }
}
