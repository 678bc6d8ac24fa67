//! k-of-n multisig wallets
//!
//! Derives a wallet's address from its owners, quorum and instance id, collects orders
//! and co-signer signatures, and builds the signed external message the wallet program
//! accepts. Chain access goes through [`ChainTransport`].

pub mod code;
pub mod error;
pub mod identity;
pub mod message;
pub mod order;
pub mod registry;
pub mod submission;
pub mod transport;
pub mod wallet;

pub use code::{ProgramCode, MULTISIG_CODE_BOC};
pub use error::{Result, WalletError};
pub use identity::{
    derive_address, load_from_chain_state, parse_config_data, ChainState, ContractIdentity,
    StateInit, WalletConfig,
};
pub use message::{send_mode, ExternalMessage, InternalMessage, OutboundMessage};
pub use order::Order;
pub use registry::{OwnerRegistry, MAX_OWNERS};
pub use submission::{build_submission, ExternalPayload, ParsedSubmission};
pub use transport::{ChainTransport, MemoryTransport, TransportError};
pub use wallet::MultisigWallet;
