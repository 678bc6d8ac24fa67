//! Cell trees for tonsig
//!
//! Cells are immutable nodes of at most 1023 bits and 4 child references. This crate
//! builds and parses them, encodes `HashmapE` dictionaries, computes representation
//! hashes and converts trees to and from the bag-of-cells wire format.

pub mod address;
pub mod boc;
pub mod builder;
pub mod cell;
pub mod dict;
pub mod error;
pub mod slice;

pub use address::Address;
pub use boc::{deserialize_boc, serialize_boc};
pub use builder::CellBuilder;
pub use cell::{Cell, CellHash, MAX_CELL_BITS, MAX_CELL_REFS};
pub use dict::DictValue;
pub use error::{CellError, Result};
pub use slice::CellSlice;
