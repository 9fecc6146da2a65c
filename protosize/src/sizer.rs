//! Message size aggregation.
//!
//! The encoded size of a message is the sum of its declared fields'
//! contributions, plus the raw lengths of its extension and unrecognized-field
//! byte ranges. Field contributions are independent, so the total does not
//! depend on the order fields are visited in.

use bytes::BytesMut;
use protosize_core::SizeError;

use crate::field::SizeContext;
use crate::limits::MessageLimits;
use crate::schema::{MessageSchema, SchemaPool};
use crate::value::{Extension, Extensions, MessageValue};

/// Sizes values of one message type.
///
/// Obtained from [`SchemaPool::sizer`]. Cheap to copy; holds only references
/// into the pool.
///
/// # Example
///
/// ```
/// use protosize::schema::{FieldDescriptor, MessageSchema, ScalarType, SchemaPool};
/// use protosize::value::MessageValue;
/// use protosize::MessageLimits;
///
/// let schema = MessageSchema::builder("test.Numbers")
///     .field(FieldDescriptor::repeated("values", 5, ScalarType::Int32).packed(true))
///     .build()
///     .unwrap();
/// let pool = SchemaPool::builder().message(schema).build().unwrap();
///
/// let value = MessageValue::new().with_repeated(5, [1i32, 300]);
/// let sizer = pool
///     .sizer("test.Numbers")
///     .unwrap()
///     .with_limits(MessageLimits::new().max_bytes(64));
///
/// assert_eq!(sizer.size(&value).unwrap(), 5);
/// assert!(sizer.allocate(&value).unwrap().capacity() >= 5);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Sizer<'a> {
    pool: &'a SchemaPool,
    schema: &'a MessageSchema,
    limits: MessageLimits,
}

impl<'a> Sizer<'a> {
    pub(crate) fn new(pool: &'a SchemaPool, schema: &'a MessageSchema) -> Self {
        Self {
            pool,
            schema,
            limits: MessageLimits::default(),
        }
    }

    /// Attach size limits, enforced by [`checked_size`](Self::checked_size).
    pub fn with_limits(mut self, limits: MessageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn schema(&self) -> &'a MessageSchema {
        self.schema
    }

    pub fn limits(&self) -> MessageLimits {
        self.limits
    }

    /// Exact number of bytes `value` encodes to.
    pub fn size(&self, value: &MessageValue) -> Result<usize, SizeError> {
        let size = message_size(self.pool, self.schema, value)?;
        tracing::trace!(message = %self.schema.name(), size, "sized message");
        Ok(size)
    }

    /// Like [`size`](Self::size), but fails when the result exceeds the limits.
    pub fn checked_size(&self, value: &MessageValue) -> Result<usize, SizeError> {
        let size = self.size(value)?;
        if let Err(err) = self.limits.check_size(size) {
            tracing::warn!(
                message = %self.schema.name(),
                size,
                max = ?self.limits.get_max_bytes(),
                "message exceeds size limit"
            );
            return Err(err);
        }
        Ok(size)
    }

    /// A buffer with exactly enough capacity to encode `value`.
    pub fn allocate(&self, value: &MessageValue) -> Result<BytesMut, SizeError> {
        Ok(BytesMut::with_capacity(self.checked_size(value)?))
    }
}

/// Size `value` as an instance of the named message type.
///
/// Shorthand for [`SchemaPool::size`].
pub fn size(pool: &SchemaPool, type_name: &str, value: &MessageValue) -> Result<usize, SizeError> {
    pool.size(type_name, value)
}

/// Body size of `value`, without any enclosing tag or length prefix.
pub(crate) fn message_size(
    pool: &SchemaPool,
    schema: &MessageSchema,
    value: &MessageValue,
) -> Result<usize, SizeError> {
    let name = schema.name();
    if let Some((number, _)) = value.fields().find(|(number, _)| !schema.declares(*number)) {
        return Err(SizeError::UndeclaredField {
            message: name.to_owned(),
            number,
        });
    }

    let mut total = 0;
    for sizer in schema.sizers() {
        let cx = SizeContext {
            pool,
            message: name,
            number: sizer.number(),
        };
        total += sizer.size(value.get(sizer.number()), &cx)?;
    }

    if let Some(extensions) = value.extensions() {
        if !schema.has_extensions() {
            return Err(SizeError::UnexpectedExtensions(name.to_owned()));
        }
        total += extensions_size(pool, schema, extensions)?;
    }

    if let Some(unknown) = value.unknown_fields() {
        if !schema.has_unknown_fields() {
            return Err(SizeError::UnexpectedUnknownFields(name.to_owned()));
        }
        total += unknown.len();
    }

    Ok(total)
}

fn extensions_size(
    pool: &SchemaPool,
    schema: &MessageSchema,
    extensions: &Extensions,
) -> Result<usize, SizeError> {
    let entries = match extensions {
        Extensions::Encoded(bytes) => return Ok(bytes.len()),
        Extensions::Map(entries) => entries,
    };
    entries
        .iter()
        .try_fold(0, |total, (&number, extension)| -> Result<usize, SizeError> {
            let len = match extension {
                Extension::Encoded(bytes) => bytes.len(),
                Extension::Field(value) => {
                    let sizer = schema.extension_sizer(number).ok_or_else(|| {
                        SizeError::UnknownExtension {
                            message: schema.name().to_owned(),
                            number,
                        }
                    })?;
                    let cx = SizeContext {
                        pool,
                        message: schema.name(),
                        number,
                    };
                    sizer.size(Some(value), &cx)?
                }
            };
            Ok(total + len)
        })
}
