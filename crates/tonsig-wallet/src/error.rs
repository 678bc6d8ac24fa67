//! Wallet error types

use thiserror::Error;
use tonsig_cell::CellError;
use tonsig_crypto::CryptoError;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error(transparent)]
    Cell(#[from] CellError),

    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("unknown signer: {0} is not a registered owner")]
    UnknownSigner(String),

    #[error("invalid wallet config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl WalletError {
    /// Structural decode failures, whether raised here or by the cell codec
    pub fn is_malformed(&self) -> bool {
        match self {
            WalletError::MalformedEncoding(_) => true,
            WalletError::Cell(e) => e.is_malformed(),
            _ => false,
        }
    }

    /// The remote program refused the submission
    pub fn is_remote_rejection(&self) -> bool {
        matches!(
            self,
            WalletError::Transport(TransportError::RemoteRejection(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;
