//! Message schema model.
//!
//! - [`FieldDescriptor`] describes one declared field
//! - [`MessageSchema`] validates and compiles a message's fields
//! - [`SchemaPool`] resolves message type names across schemas
//! - [`DescriptorConfig`] converts `prost-types` file descriptors into a pool

mod descriptor;
mod field;
mod message;
mod pool;

pub use descriptor::DescriptorConfig;
pub use field::{Cardinality, FieldDescriptor, MapEntry, ScalarType};
pub use message::{MessageSchema, MessageSchemaBuilder};
pub use pool::{SchemaPool, SchemaPoolBuilder};
