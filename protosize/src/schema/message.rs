//! Message schemas.
//!
//! A [`MessageSchema`] is built once through [`MessageSchemaBuilder`], which
//! validates every descriptor and compiles it into a size formula. Nothing is
//! validated per value afterwards beyond type and shape checks.

use std::collections::HashMap;

use protosize_core::{MAX_FIELD_NUMBER, MIN_FIELD_NUMBER, SchemaError};
use serde::Serialize;

use crate::field::FieldSizer;
use crate::schema::{Cardinality, FieldDescriptor, ScalarType};

/// Immutable, validated schema of one message type.
#[derive(Clone, Debug, Serialize)]
pub struct MessageSchema {
    name: String,
    proto3: bool,
    has_extensions: bool,
    has_unknown_fields: bool,
    fields: Vec<FieldDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extension_fields: Vec<FieldDescriptor>,
    #[serde(skip)]
    sizers: Vec<FieldSizer>,
    #[serde(skip)]
    extension_sizers: HashMap<u32, FieldSizer>,
    #[serde(skip)]
    index: HashMap<u32, usize>,
}

impl MessageSchema {
    /// Start building a schema for the fully-qualified message name.
    pub fn builder(name: impl Into<String>) -> MessageSchemaBuilder {
        MessageSchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_proto3(&self) -> bool {
        self.proto3
    }

    pub fn has_extensions(&self) -> bool {
        self.has_extensions
    }

    pub fn has_unknown_fields(&self) -> bool {
        self.has_unknown_fields
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Enumerated extension descriptors, if any.
    pub fn extension_fields(&self) -> &[FieldDescriptor] {
        &self.extension_fields
    }

    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.index.get(&number).map(|&i| &self.fields[i])
    }

    pub(crate) fn declares(&self, number: u32) -> bool {
        self.index.contains_key(&number)
    }

    /// Compiled declared fields, parallel to [`fields`](Self::fields).
    pub(crate) fn sizers(&self) -> &[FieldSizer] {
        &self.sizers
    }

    pub(crate) fn extension_sizer(&self, number: u32) -> Option<&FieldSizer> {
        self.extension_sizers.get(&number)
    }

    /// Every message type name referenced by a field, map value, or extension.
    pub(crate) fn referenced_types(&self) -> impl Iterator<Item = (&FieldDescriptor, &str)> {
        self.fields
            .iter()
            .chain(&self.extension_fields)
            .filter_map(|field| {
                let ty = match field.map_entry() {
                    Some(entry) => entry.value.ty(),
                    None if field.custom_type_name().is_some() => return None,
                    None => field.ty(),
                };
                match ty {
                    ScalarType::Message(name) => Some((field, name.as_str())),
                    _ => None,
                }
            })
    }
}

/// Builder for [`MessageSchema`].
///
/// # Example
///
/// ```
/// use protosize::schema::{FieldDescriptor, MessageSchema, ScalarType};
///
/// let schema = MessageSchema::builder("shop.Order")
///     .proto3(true)
///     .field(FieldDescriptor::singular("id", 1, ScalarType::Uint64))
///     .field(FieldDescriptor::repeated("items", 2, ScalarType::Message("shop.Item".into())))
///     .build()
///     .unwrap();
///
/// assert_eq!(schema.fields().len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct MessageSchemaBuilder {
    name: String,
    proto3: bool,
    has_extensions: bool,
    has_unknown_fields: bool,
    fields: Vec<FieldDescriptor>,
    extension_fields: Vec<FieldDescriptor>,
}

impl MessageSchemaBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            proto3: false,
            has_extensions: false,
            has_unknown_fields: false,
            fields: Vec::new(),
            extension_fields: Vec::new(),
        }
    }

    /// Use proto3 semantics (zero-value elision of singular scalars).
    pub fn proto3(mut self, proto3: bool) -> Self {
        self.proto3 = proto3;
        self
    }

    /// Declare an extension range; the value may carry extension bytes.
    pub fn extensions(mut self, has_extensions: bool) -> Self {
        self.has_extensions = has_extensions;
        self
    }

    /// Retain unrecognized fields; the value may carry unknown bytes.
    pub fn unknown_fields(mut self, has_unknown_fields: bool) -> Self {
        self.has_unknown_fields = has_unknown_fields;
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Enumerate an extension descriptor. Requires [`extensions`](Self::extensions).
    pub fn extension_field(mut self, field: FieldDescriptor) -> Self {
        self.extension_fields.push(field);
        self
    }

    /// Validate and compile the schema.
    pub fn build(self) -> Result<MessageSchema, SchemaError> {
        let mut index = HashMap::with_capacity(self.fields.len());
        let mut sizers = Vec::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            self.validate(field)?;
            if index.insert(field.number(), i).is_some() {
                return Err(SchemaError::DuplicateFieldNumber {
                    message: self.name.clone(),
                    number: field.number(),
                });
            }
            sizers.push(FieldSizer::compile(&self.name, field, self.proto3)?);
        }

        let mut extension_sizers = HashMap::with_capacity(self.extension_fields.len());
        for field in &self.extension_fields {
            self.validate(field)?;
            if !self.has_extensions {
                return Err(self.violation(field, "extension on a message without extension range"));
            }
            if field.cardinality() == Cardinality::Map {
                return Err(self.violation(field, "extensions cannot be maps"));
            }
            if index.contains_key(&field.number())
                || extension_sizers.contains_key(&field.number())
            {
                return Err(SchemaError::DuplicateFieldNumber {
                    message: self.name.clone(),
                    number: field.number(),
                });
            }
            extension_sizers.insert(
                field.number(),
                FieldSizer::compile(&self.name, field, self.proto3)?,
            );
        }

        tracing::debug!(
            message = %self.name,
            fields = self.fields.len(),
            extensions = self.extension_fields.len(),
            proto3 = self.proto3,
            "compiled message schema"
        );

        Ok(MessageSchema {
            name: self.name,
            proto3: self.proto3,
            has_extensions: self.has_extensions,
            has_unknown_fields: self.has_unknown_fields,
            fields: self.fields,
            extension_fields: self.extension_fields,
            sizers,
            extension_sizers,
            index,
        })
    }

    fn validate(&self, field: &FieldDescriptor) -> Result<(), SchemaError> {
        if !(MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER).contains(&field.number()) {
            return Err(SchemaError::InvalidFieldNumber {
                message: self.name.clone(),
                field: field.name().to_owned(),
                number: field.number(),
            });
        }
        if field.ty() == &ScalarType::Group {
            return Err(SchemaError::UnsupportedEncodingKind {
                message: self.name.clone(),
                field: field.name().to_owned(),
            });
        }
        if let ScalarType::Message(name) = field.ty() {
            if name.is_empty() {
                return Err(self.violation(field, "message field without a type name"));
            }
        }
        if field.is_packed()
            && !(field.cardinality() == Cardinality::Repeated && field.ty().is_packable())
        {
            return Err(self.violation(field, "packed requires a repeated numeric field"));
        }
        if field.is_proto3_optional() && field.cardinality() != Cardinality::Singular {
            return Err(self.violation(field, "proto3 optional requires a singular field"));
        }
        if field.custom_type_name().is_some() {
            if !matches!(field.ty(), ScalarType::Bytes | ScalarType::Message(_)) {
                return Err(self.violation(field, "custom types apply to bytes or message fields"));
            }
            if field.cardinality() == Cardinality::Map {
                return Err(self.violation(field, "custom types cannot be map fields"));
            }
        }
        match (field.cardinality(), field.map_entry()) {
            (Cardinality::Map, None) => {
                Err(self.violation(field, "map field has no key/value descriptors"))
            }
            (Cardinality::Map, Some(entry)) => {
                if entry.key.number() != 1 || entry.value.number() != 2 {
                    return Err(self.violation(field, "map entry must use key = 1 and value = 2"));
                }
                if entry.key.cardinality() != Cardinality::Singular
                    || entry.value.cardinality() != Cardinality::Singular
                {
                    return Err(self.violation(field, "map key and value must be singular"));
                }
                if !entry.key.ty().is_valid_map_key() {
                    return Err(self.violation(
                        field,
                        &format!("{} is not a valid map key type", entry.key.ty()),
                    ));
                }
                if entry.key.custom_type_name().is_some()
                    || entry.value.custom_type_name().is_some()
                {
                    return Err(self.violation(field, "map entries cannot use custom types"));
                }
                match entry.value.ty() {
                    ScalarType::Group => Err(SchemaError::UnsupportedEncodingKind {
                        message: self.name.clone(),
                        field: field.name().to_owned(),
                    }),
                    ScalarType::Message(name) if name.is_empty() => {
                        Err(self.violation(field, "map value without a type name"))
                    }
                    _ => Ok(()),
                }
            }
            (_, Some(_)) => Err(self.violation(field, "only map fields carry entry descriptors")),
            (_, None) => Ok(()),
        }
    }

    fn violation(&self, field: &FieldDescriptor, reason: &str) -> SchemaError {
        SchemaError::InvariantViolation {
            message: self.name.clone(),
            field: field.name().to_owned(),
            reason: reason.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MapEntry;

    fn build(field: FieldDescriptor) -> Result<MessageSchema, SchemaError> {
        MessageSchema::builder("test.M").field(field).build()
    }

    #[test]
    fn test_group_rejected_at_build() {
        let err = build(FieldDescriptor::singular("legacy", 1, ScalarType::Group)).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedEncodingKind {
                message: "test.M".into(),
                field: "legacy".into(),
            }
        );
    }

    #[test]
    fn test_group_map_value_rejected() {
        let field = FieldDescriptor::map("m", 1, ScalarType::Int32, ScalarType::Group);
        assert!(matches!(
            build(field),
            Err(SchemaError::UnsupportedEncodingKind { .. })
        ));
    }

    #[test]
    fn test_packed_requires_repeated_numeric() {
        let on_string = FieldDescriptor::repeated("names", 1, ScalarType::String).packed(true);
        assert!(matches!(
            build(on_string),
            Err(SchemaError::InvariantViolation { .. })
        ));

        let on_singular = FieldDescriptor::singular("id", 1, ScalarType::Int32).packed(true);
        assert!(matches!(
            build(on_singular),
            Err(SchemaError::InvariantViolation { .. })
        ));

        let ok = FieldDescriptor::repeated("flags", 1, ScalarType::Bool).packed(true);
        assert!(build(ok).is_ok());
    }

    #[test]
    fn test_duplicate_field_number() {
        let err = MessageSchema::builder("test.M")
            .field(FieldDescriptor::singular("a", 3, ScalarType::Int32))
            .field(FieldDescriptor::singular("b", 3, ScalarType::String))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateFieldNumber {
                message: "test.M".into(),
                number: 3,
            }
        );
    }

    #[test]
    fn test_field_number_range() {
        assert!(matches!(
            build(FieldDescriptor::singular("zero", 0, ScalarType::Int32)),
            Err(SchemaError::InvalidFieldNumber { number: 0, .. })
        ));
        assert!(matches!(
            build(FieldDescriptor::singular("huge", MAX_FIELD_NUMBER + 1, ScalarType::Int32)),
            Err(SchemaError::InvalidFieldNumber { .. })
        ));
        let max = FieldDescriptor::singular("max", MAX_FIELD_NUMBER, ScalarType::Int32);
        assert!(build(max).is_ok());
    }

    #[test]
    fn test_map_key_types() {
        for key in [ScalarType::Float, ScalarType::Double, ScalarType::Enum] {
            let field = FieldDescriptor::map("m", 1, key, ScalarType::Int32);
            assert!(matches!(
                build(field),
                Err(SchemaError::InvariantViolation { .. })
            ));
        }
        let field = FieldDescriptor::map("m", 1, ScalarType::Sfixed64, ScalarType::Bytes);
        assert!(build(field).is_ok());
    }

    #[test]
    fn test_map_entry_numbers() {
        let entry = MapEntry {
            key: FieldDescriptor::singular("key", 2, ScalarType::String),
            value: FieldDescriptor::singular("value", 1, ScalarType::String),
        };
        let field = FieldDescriptor::map_with_entry("MEntry", "m", 1, entry);
        let err = build(field).unwrap_err();
        assert!(err.to_string().contains("key = 1 and value = 2"));
    }

    #[test]
    fn test_custom_type_placement() {
        let on_int = FieldDescriptor::singular("id", 1, ScalarType::Int64).custom_type("Uuid");
        assert!(matches!(
            build(on_int),
            Err(SchemaError::InvariantViolation { .. })
        ));

        let on_bytes = FieldDescriptor::repeated("ids", 1, ScalarType::Bytes).custom_type("Uuid");
        assert!(build(on_bytes).is_ok());
    }

    #[test]
    fn test_extension_fields_require_range() {
        let err = MessageSchema::builder("test.M")
            .extension_field(FieldDescriptor::singular("ext", 100, ScalarType::Int32))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvariantViolation { .. }));

        let schema = MessageSchema::builder("test.M")
            .extensions(true)
            .field(FieldDescriptor::singular("id", 1, ScalarType::Int32))
            .extension_field(FieldDescriptor::singular("ext", 100, ScalarType::Int32))
            .build()
            .unwrap();
        assert!(schema.extension_sizer(100).is_some());
        assert!(schema.extension_sizer(1).is_none());
    }

    #[test]
    fn test_extension_number_collision() {
        let err = MessageSchema::builder("test.M")
            .extensions(true)
            .field(FieldDescriptor::singular("id", 1, ScalarType::Int32))
            .extension_field(FieldDescriptor::singular("ext", 1, ScalarType::Int32))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateFieldNumber { number: 1, .. }));
    }

    #[test]
    fn test_lookup() {
        let schema = MessageSchema::builder("test.M")
            .fields([
                FieldDescriptor::singular("a", 1, ScalarType::Int32),
                FieldDescriptor::singular("b", 9, ScalarType::Bool),
            ])
            .build()
            .unwrap();
        assert_eq!(schema.field(9).map(|f| f.name()), Some("b"));
        assert!(schema.field(2).is_none());
        assert!(schema.declares(1));
    }

    #[test]
    fn test_referenced_types() {
        let schema = MessageSchema::builder("test.M")
            .fields([
                FieldDescriptor::singular("a", 1, ScalarType::Message("test.A".into())),
                FieldDescriptor::map(
                    "b",
                    2,
                    ScalarType::String,
                    ScalarType::Message("test.B".into()),
                ),
                FieldDescriptor::singular("c", 3, ScalarType::Message("Opaque".into()))
                    .custom_type("Opaque"),
                FieldDescriptor::singular("d", 4, ScalarType::Int32),
            ])
            .build()
            .unwrap();
        let names: Vec<_> = schema.referenced_types().map(|(_, name)| name).collect();
        assert_eq!(names, vec!["test.A", "test.B"]);
    }
}
