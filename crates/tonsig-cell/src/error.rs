//! Error type for cell encoding and decoding

use thiserror::Error;

/// Errors raised while building, parsing or (de)serializing cells
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("malformed encoding: needed {requested} bits but only {remaining} remain")]
    BitsExhausted { requested: usize, remaining: usize },

    #[error("malformed encoding: no child reference left to load")]
    RefsExhausted,

    #[error("malformed encoding: dictionary label of {label} bits exceeds remaining key width {remaining}")]
    KeyWidthMismatch { label: usize, remaining: usize },

    #[error("malformed encoding: {0}")]
    InvalidBoc(String),

    #[error("malformed address: {0}")]
    InvalidAddress(String),

    #[error("cell overflow: {bits} bits exceed the 1023 bit capacity")]
    BitOverflow { bits: usize },

    #[error("cell overflow: more than 4 references")]
    RefOverflow,

    #[error("value does not fit in {bits} bits")]
    ValueOutOfRange { bits: usize },

    #[error("unsupported field width: {bits} bits")]
    UnsupportedWidth { bits: usize },
}

impl CellError {
    /// Whether the error comes from decoding structurally invalid input, as opposed to a
    /// caller trying to encode something that does not fit.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            CellError::BitsExhausted { .. }
                | CellError::RefsExhausted
                | CellError::KeyWidthMismatch { .. }
                | CellError::InvalidBoc(_)
                | CellError::InvalidAddress(_)
        )
    }
}

/// Result type for cell operations
pub type Result<T> = std::result::Result<T, CellError>;
