//! Conversion from `prost-types` file descriptors.
//!
//! `protoc` descriptors carry everything the size rules need except the
//! gogoproto-style annotations (`nullable`, `customtype`), which are supplied
//! through [`DescriptorConfig`].

use std::collections::{HashMap, HashSet};

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet};
use protosize_core::SchemaError;

use crate::schema::{FieldDescriptor, MapEntry, MessageSchema, ScalarType, SchemaPool};

/// Options applied while converting file descriptors into a [`SchemaPool`].
///
/// Field paths are fully-qualified: `package.Message.field`, with nested
/// messages spelled out (`package.Outer.Inner.field`). A leading `.` is
/// accepted.
///
/// # Example
///
/// ```
/// use protosize::schema::DescriptorConfig;
///
/// let config = DescriptorConfig::new()
///     .non_nullable("shop.Order.header")
///     .custom_type("shop.Order.id", "Uuid")
///     .retain_unknown_fields(false);
/// ```
#[derive(Clone, Debug)]
pub struct DescriptorConfig {
    nullable_by_default: bool,
    non_nullable: HashSet<String>,
    custom_types: HashMap<String, String>,
    retain_unknown_fields: bool,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            nullable_by_default: true,
            non_nullable: HashSet::new(),
            custom_types: HashMap::new(),
            retain_unknown_fields: true,
        }
    }
}

impl DescriptorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the nullability of fields without an explicit override. Default: `true`.
    pub fn nullable_by_default(mut self, nullable: bool) -> Self {
        self.nullable_by_default = nullable;
        self
    }

    /// Mark a field as non-nullable (always emitted).
    pub fn non_nullable(mut self, path: impl AsRef<str>) -> Self {
        self.non_nullable.insert(normalize(path.as_ref()).to_owned());
        self
    }

    /// Attach a custom type to a bytes or message field.
    pub fn custom_type(mut self, path: impl AsRef<str>, type_name: impl Into<String>) -> Self {
        self.custom_types
            .insert(normalize(path.as_ref()).to_owned(), type_name.into());
        self
    }

    /// Whether converted messages keep a slot for unrecognized fields. Default: `true`.
    pub fn retain_unknown_fields(mut self, retain: bool) -> Self {
        self.retain_unknown_fields = retain;
        self
    }

    fn is_nullable(&self, path: &str) -> bool {
        self.nullable_by_default && !self.non_nullable.contains(path)
    }
}

impl SchemaPool {
    /// Build a pool from a decoded `protoc --descriptor_set_out` file.
    pub fn from_file_descriptor_set(
        set: &FileDescriptorSet,
        config: &DescriptorConfig,
    ) -> Result<SchemaPool, SchemaError> {
        Self::from_file_descriptors(&set.file, config)
    }

    /// Build a pool from `protoc` output.
    ///
    /// Every message of every file is registered under its fully-qualified
    /// name. Map entry messages are folded into their map fields, and
    /// extensions are attached to the message they extend.
    pub fn from_file_descriptors(
        files: &[FileDescriptorProto],
        config: &DescriptorConfig,
    ) -> Result<SchemaPool, SchemaError> {
        let mut messages = Vec::new();
        let mut extensions = Vec::new();
        for file in files {
            let proto3 = file.syntax() == "proto3";
            let package = file.package();
            for message in &file.message_type {
                collect(package, message, proto3, &mut messages, &mut extensions);
            }
            for extension in &file.extension {
                extensions.push(Declared {
                    scope: package.to_owned(),
                    proto: extension,
                    proto3,
                });
            }
        }

        let entries: HashMap<&str, &DescriptorProto> = messages
            .iter()
            .filter(|m| m.proto.options.as_ref().is_some_and(|o| o.map_entry()))
            .map(|m| (m.name.as_str(), m.proto))
            .collect();
        let converter = Converter { config, entries };

        let mut extension_fields: HashMap<String, Vec<FieldDescriptor>> = HashMap::new();
        for extension in &extensions {
            let extendee = normalize(extension.proto.extendee()).to_owned();
            let declared = messages.iter().any(|m| m.name == extendee);
            if !declared || converter.entries.contains_key(extendee.as_str()) {
                return Err(SchemaError::UnresolvedType {
                    message: extension.scope.clone(),
                    field: extension.proto.name().to_owned(),
                    type_name: extendee,
                });
            }
            let field = converter.field(&extension.scope, extension.proto, extension.proto3)?;
            extension_fields.entry(extendee).or_default().push(field);
        }

        let mut builder = SchemaPool::builder();
        for message in &messages {
            if converter.entries.contains_key(message.name.as_str()) {
                continue;
            }
            let mut schema = MessageSchema::builder(&message.name)
                .proto3(message.proto3)
                .extensions(!message.proto.extension_range.is_empty())
                .unknown_fields(config.retain_unknown_fields);
            for field in &message.proto.field {
                schema = schema.field(converter.field(&message.name, field, message.proto3)?);
            }
            for field in extension_fields.remove(&message.name).unwrap_or_default() {
                schema = schema.extension_field(field);
            }
            builder = builder.message(schema.build()?);
        }

        tracing::debug!(
            files = files.len(),
            messages = messages.len() - converter.entries.len(),
            extensions = extensions.len(),
            "converted file descriptors"
        );
        builder.build()
    }
}

/// A message found while walking a file, with its fully-qualified name.
struct Collected<'a> {
    name: String,
    proto: &'a DescriptorProto,
    proto3: bool,
}

/// An extension declaration and the scope it was declared in.
struct Declared<'a> {
    scope: String,
    proto: &'a FieldDescriptorProto,
    proto3: bool,
}

fn collect<'a>(
    scope: &str,
    message: &'a DescriptorProto,
    proto3: bool,
    messages: &mut Vec<Collected<'a>>,
    extensions: &mut Vec<Declared<'a>>,
) {
    let name = qualify(scope, message.name());
    for nested in &message.nested_type {
        collect(&name, nested, proto3, messages, extensions);
    }
    for extension in &message.extension {
        extensions.push(Declared {
            scope: name.clone(),
            proto: extension,
            proto3,
        });
    }
    messages.push(Collected {
        name,
        proto: message,
        proto3,
    });
}

struct Converter<'a> {
    config: &'a DescriptorConfig,
    entries: HashMap<&'a str, &'a DescriptorProto>,
}

impl Converter<'_> {
    fn field(
        &self,
        scope: &str,
        proto: &FieldDescriptorProto,
        proto3: bool,
    ) -> Result<FieldDescriptor, SchemaError> {
        let name = proto.name();
        let number = u32::try_from(proto.number()).unwrap_or(0);
        let ty = scalar_type(scope, proto)?;
        let label = proto.label.unwrap_or(Label::Optional as i32);
        let label = Label::try_from(label).map_err(|_| SchemaError::UnknownLabel {
            message: scope.to_owned(),
            field: name.to_owned(),
            label,
        })?;

        if label == Label::Repeated {
            if let ScalarType::Message(type_name) = &ty {
                if let Some(entry) = self.entries.get(type_name.as_str()) {
                    return self.map_field(scope, proto, type_name, entry);
                }
            }
        }

        let path = qualify(scope, name);
        let mut field = match label {
            Label::Repeated => {
                let packed = proto
                    .options
                    .as_ref()
                    .and_then(|o| o.packed)
                    .unwrap_or(proto3 && ty.is_packable());
                FieldDescriptor::repeated(name, number, ty).packed(packed)
            }
            Label::Optional | Label::Required => {
                let oneof = proto.oneof_index.is_some();
                if oneof && self.config.non_nullable.contains(&path) {
                    return Err(SchemaError::InvariantViolation {
                        message: scope.to_owned(),
                        field: name.to_owned(),
                        reason: "oneof members cannot be non-nullable".to_owned(),
                    });
                }
                // at most one oneof member is written, and only when set
                let nullable = oneof || self.config.is_nullable(&path);
                let presence = proto.proto3_optional() || (proto3 && oneof);
                FieldDescriptor::singular(name, number, ty)
                    .nullable(nullable)
                    .proto3_optional(presence)
            }
        };
        if let Some(custom) = self.config.custom_types.get(&path) {
            field = field.custom_type(custom.clone());
        }
        Ok(field)
    }

    fn map_field(
        &self,
        scope: &str,
        proto: &FieldDescriptorProto,
        entry_type: &str,
        entry: &DescriptorProto,
    ) -> Result<FieldDescriptor, SchemaError> {
        let find = |number: i32| -> Result<FieldDescriptor, SchemaError> {
            let field = entry
                .field
                .iter()
                .find(|f| f.number() == number)
                .ok_or_else(|| SchemaError::InvariantViolation {
                    message: scope.to_owned(),
                    field: proto.name().to_owned(),
                    reason: format!("map entry `{entry_type}` has no field {number}"),
                })?;
            Ok(FieldDescriptor::singular(
                field.name(),
                number as u32,
                scalar_type(entry_type, field)?,
            ))
        };
        let entry = MapEntry {
            key: find(1)?,
            value: find(2)?,
        };
        let number = u32::try_from(proto.number()).unwrap_or(0);
        Ok(FieldDescriptor::map_with_entry(
            entry_type,
            proto.name(),
            number,
            entry,
        ))
    }
}

fn scalar_type(scope: &str, proto: &FieldDescriptorProto) -> Result<ScalarType, SchemaError> {
    let tag = proto.r#type.unwrap_or_default();
    let ty = Type::try_from(tag).map_err(|_| SchemaError::UnknownScalarType {
        message: scope.to_owned(),
        field: proto.name().to_owned(),
        tag,
    })?;
    Ok(match ty {
        Type::Double => ScalarType::Double,
        Type::Float => ScalarType::Float,
        Type::Int64 => ScalarType::Int64,
        Type::Uint64 => ScalarType::Uint64,
        Type::Int32 => ScalarType::Int32,
        Type::Fixed64 => ScalarType::Fixed64,
        Type::Fixed32 => ScalarType::Fixed32,
        Type::Bool => ScalarType::Bool,
        Type::String => ScalarType::String,
        Type::Group => ScalarType::Group,
        Type::Message => ScalarType::Message(normalize(proto.type_name()).to_owned()),
        Type::Bytes => ScalarType::Bytes,
        Type::Uint32 => ScalarType::Uint32,
        Type::Enum => ScalarType::Enum,
        Type::Sfixed32 => ScalarType::Sfixed32,
        Type::Sfixed64 => ScalarType::Sfixed64,
        Type::Sint32 => ScalarType::Sint32,
        Type::Sint64 => ScalarType::Sint64,
    })
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_owned()
    } else {
        format!("{scope}.{name}")
    }
}

fn normalize(name: &str) -> &str {
    name.strip_prefix('.').unwrap_or(name)
}
