//! Error types for schema construction and size computation.
//!
//! - [`SchemaError`]: malformed schemas, raised once when a schema is built
//! - [`SizeError`]: a value that cannot be sized against its schema
//!
//! Neither is recoverable: a size computation returns a complete count or fails.

/// Errors detected while building a message schema or schema pool.
///
/// These are startup failures. A schema is validated once and reused for every
/// value of that message type afterwards.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The field uses the deprecated group encoding.
    #[error("field `{message}.{field}` uses the group encoding, which is not supported")]
    UnsupportedEncodingKind { message: String, field: String },

    /// The descriptor breaks a structural rule (packing, map entries, custom types).
    #[error("field `{message}.{field}` is malformed: {reason}")]
    InvariantViolation {
        message: String,
        field: String,
        reason: String,
    },

    /// Two fields of the same message share a number.
    #[error("field number {number} is declared twice in `{message}`")]
    DuplicateFieldNumber { message: String, number: u32 },

    /// A field number outside `1..=2^29-1`.
    #[error("field `{message}.{field}` has out-of-range number {number}")]
    InvalidFieldNumber {
        message: String,
        field: String,
        number: u32,
    },

    /// Two schemas registered under the same name.
    #[error("message type `{0}` is defined twice")]
    DuplicateMessage(String),

    /// A message-typed field references a schema that was never registered.
    #[error("field `{message}.{field}` references undefined message type `{type_name}`")]
    UnresolvedType {
        message: String,
        field: String,
        type_name: String,
    },

    /// A descriptor carries a type tag outside the known scalar set.
    #[error("field `{message}.{field}` has unrecognized type tag {tag}")]
    UnknownScalarType {
        message: String,
        field: String,
        tag: i32,
    },

    /// A descriptor carries a label outside optional/required/repeated.
    #[error("field `{message}.{field}` has unrecognized label {label}")]
    UnknownLabel {
        message: String,
        field: String,
        label: i32,
    },
}

/// Errors raised while sizing a value against its schema.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SizeError {
    /// No schema with this name exists in the pool.
    #[error("message type `{0}` is not defined")]
    UnknownMessage(String),

    /// The value holds a field number its schema does not declare.
    #[error("field number {number} is not declared by `{message}`")]
    UndeclaredField { message: String, number: u32 },

    /// A value variant does not match the declared field type.
    #[error("field {number} of `{message}`: expected {expected} value, found {found}")]
    TypeMismatch {
        message: String,
        number: u32,
        expected: String,
        found: String,
    },

    /// Singular/repeated/map shape of the value does not match the field.
    #[error("field {number} of `{message}`: expected {expected} field, found {found}")]
    CardinalityMismatch {
        message: String,
        number: u32,
        expected: &'static str,
        found: &'static str,
    },

    /// An always-emitted field has no value and no zero value to fall back on.
    #[error("field {number} of `{message}` is always emitted but has no value")]
    MissingValue { message: String, number: u32 },

    /// A decoded extension has no enumerated descriptor.
    #[error("extension {number} is not enumerated by `{message}`")]
    UnknownExtension { message: String, number: u32 },

    /// The value carries extensions but the schema has no extension range.
    #[error("`{0}` does not declare extensions")]
    UnexpectedExtensions(String),

    /// The value carries unrecognized bytes but the schema has no slot for them.
    #[error("`{0}` does not retain unrecognized fields")]
    UnexpectedUnknownFields(String),

    /// The computed size is over the configured limit.
    #[error("message size {size} bytes exceeds maximum allowed size of {max} bytes")]
    LimitExceeded { size: usize, max: usize },
}
