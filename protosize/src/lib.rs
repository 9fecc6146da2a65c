//! # protosize
//!
//! Computes the exact number of bytes a message value occupies in the protobuf
//! binary wire format, without encoding it. The result is meant for
//! pre-allocating an encoder's output buffer, so it must match the encoder
//! byte for byte.
//!
//! ## Features
//!
//! - **Schema model:** [`schema::MessageSchema`] validates field descriptors once
//!   and compiles each field into a fixed size formula.
//! - **Recursive schemas:** [`schema::SchemaPool`] resolves nested message types by
//!   name, so messages may refer to themselves.
//! - **Descriptor conversion:** pools can be built from `prost-types` file
//!   descriptors produced by `protoc`.
//! - **Limits:** [`sizer::Sizer`] checks sizes against [`MessageLimits`] and
//!   allocates exactly-sized buffers.
//!
//! ## Example
//!
//! ```
//! use protosize::prelude::*;
//!
//! let schema = MessageSchema::builder("shop.Item")
//!     .proto3(true)
//!     .field(FieldDescriptor::singular("sku", 1, ScalarType::String))
//!     .field(FieldDescriptor::repeated("prices", 5, ScalarType::Int32))
//!     .build()
//!     .unwrap();
//! let pool = SchemaPool::builder().message(schema).build().unwrap();
//!
//! let item = MessageValue::new()
//!     .with_field(1, "")
//!     .with_repeated(5, [1i32, 300]);
//!
//! assert_eq!(protosize::size(&pool, "shop.Item", &item).unwrap(), 5);
//! ```

pub mod field;
pub mod limits;
pub mod map;
pub mod schema;
pub mod sizer;
pub mod value;

#[cfg(test)]
mod testing;

pub use limits::MessageLimits;
pub use protosize_core::{
    MAX_FIELD_NUMBER, MAX_VARINT_LEN, MIN_FIELD_NUMBER, SchemaError, SizeError, WireKind,
    length_delimited_len, tag, tag_len, varint_len, zigzag_encode, zigzag_len,
};
pub use sizer::{Sizer, size};

// Re-export several crates
pub use bytes;
pub use prost_types;

pub mod prelude {
    //! A prelude for `protosize` providing the most common types.
    pub use crate::limits::MessageLimits;
    pub use crate::schema::{
        Cardinality, DescriptorConfig, FieldDescriptor, MessageSchema, ScalarType, SchemaPool,
    };
    pub use crate::sizer::Sizer;
    pub use crate::value::{
        CustomType, CustomValue, Extension, Extensions, FieldValue, MapKey, MessageValue, Value,
    };
    pub use protosize_core::{SchemaError, SizeError};
}
