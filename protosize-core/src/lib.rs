//! Wire-format primitives for protosize.
//!
//! This crate provides the leaf computations shared by the schema model and the
//! size estimator in `protosize`.
//!
//! ## Modules
//!
//! - [`varint`]: Base-128 varint and zigzag length functions
//! - [`wire`]: Wire kinds and tag lengths
//! - [`error`]: Schema-build and sizing error types

mod error;
mod varint;
mod wire;

pub use error::*;
pub use varint::*;
pub use wire::*;
