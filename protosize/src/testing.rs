//! Reference encoder for tests.
//!
//! Writes real wire bytes for a value with `prost::encoding`. Which fields
//! are written is decided here from the descriptors and the message syntax,
//! the way generated code guards each field, so the sizer's own compiled
//! rules are never consulted. Tests compare `size` against the length of
//! this output.

use bytes::{BufMut, BytesMut};
use prost::encoding::{WireType, encode_key, encode_varint};
use protosize_core::WireKind;

use crate::schema::{Cardinality, FieldDescriptor, MessageSchema, ScalarType, SchemaPool};
use crate::value::{Extension, Extensions, FieldValue, MapKey, MessageValue, Value};

pub(crate) fn encode(pool: &SchemaPool, name: &str, value: &MessageValue) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_message(pool, pool.get(name).expect("unknown message"), value, &mut buf);
    buf
}

fn encode_message(
    pool: &SchemaPool,
    schema: &MessageSchema,
    value: &MessageValue,
    buf: &mut BytesMut,
) {
    let proto3 = schema.is_proto3();
    for field in schema.fields() {
        encode_field(pool, field, proto3, value.get(field.number()), buf);
    }
    match value.extensions() {
        None => {}
        Some(Extensions::Encoded(bytes)) => buf.put_slice(bytes),
        Some(Extensions::Map(entries)) => {
            for (&number, extension) in entries {
                match extension {
                    Extension::Encoded(bytes) => buf.put_slice(bytes),
                    Extension::Field(field) => {
                        let descriptor = schema
                            .extension_fields()
                            .iter()
                            .find(|f| f.number() == number)
                            .expect("unknown extension");
                        encode_field(pool, descriptor, proto3, Some(field), buf);
                    }
                }
            }
        }
    }
    if let Some(unknown) = value.unknown_fields() {
        buf.put_slice(unknown);
    }
}

/// What a field's element is encoded as.
#[derive(Clone, Copy, Debug)]
enum Element<'a> {
    Scalar(&'a ScalarType),
    Message(&'a str),
    Custom(&'a str),
}

impl<'a> Element<'a> {
    fn of(field: &'a FieldDescriptor) -> Self {
        match (field.custom_type_name(), field.ty()) {
            (Some(name), _) => Element::Custom(name),
            (None, ScalarType::Message(name)) => Element::Message(name),
            (None, ty) => Element::Scalar(ty),
        }
    }

    fn wire_type(self) -> WireType {
        match self {
            Element::Scalar(ty) => match ty.wire_kind().expect("no wire kind") {
                WireKind::Varint => WireType::Varint,
                WireKind::Fixed64 => WireType::SixtyFourBit,
                WireKind::LengthDelimited => WireType::LengthDelimited,
                WireKind::Fixed32 => WireType::ThirtyTwoBit,
            },
            Element::Message(_) | Element::Custom(_) => WireType::LengthDelimited,
        }
    }
}

/// The value a singular field writes, if any.
///
/// Pointer-like fields (nullable, explicit presence, proto2 bytes) are written
/// when set. Non-nullable ones are always written. Plain proto3 scalars are
/// written when they differ from their zero value.
fn singular_to_write(
    field: &FieldDescriptor,
    element: Element<'_>,
    proto3: bool,
    value: Option<&Value>,
) -> Option<Value> {
    let pointer = match element {
        Element::Message(_) | Element::Custom(_) => field.is_nullable(),
        Element::Scalar(ScalarType::Bytes) if !proto3 => true,
        Element::Scalar(_) => {
            if proto3 && !field.is_proto3_optional() {
                return value.filter(|v| **v != zero_value(element)).cloned();
            }
            field.is_proto3_optional() || field.is_nullable()
        }
    };
    match value {
        Some(value) => Some(value.clone()),
        None if pointer => None,
        None => Some(zero_value(element)),
    }
}

fn encode_field(
    pool: &SchemaPool,
    field: &FieldDescriptor,
    proto3: bool,
    value: Option<&FieldValue>,
    buf: &mut BytesMut,
) {
    let number = field.number();
    let element = Element::of(field);
    match (field.cardinality(), value) {
        (Cardinality::Singular, None) => {
            if let Some(value) = singular_to_write(field, element, proto3, None) {
                encode_key(number, element.wire_type(), buf);
                encode_element(pool, element, &value, buf);
            }
        }
        (Cardinality::Singular, Some(FieldValue::Singular(value))) => {
            if let Some(value) = singular_to_write(field, element, proto3, Some(value)) {
                encode_key(number, element.wire_type(), buf);
                encode_element(pool, element, &value, buf);
            }
        }
        (Cardinality::Repeated, Some(FieldValue::Repeated(values))) if field.is_packed() => {
            if values.is_empty() {
                return;
            }
            let mut body = BytesMut::new();
            for value in values {
                encode_element(pool, element, value, &mut body);
            }
            encode_key(number, WireType::LengthDelimited, buf);
            encode_varint(body.len() as u64, buf);
            buf.put_slice(&body);
        }
        (Cardinality::Repeated, Some(FieldValue::Repeated(values))) => {
            for value in values {
                encode_key(number, element.wire_type(), buf);
                encode_element(pool, element, value, buf);
            }
        }
        (Cardinality::Map, Some(FieldValue::Map(entries))) => {
            let entry = field.map_entry().expect("map field without entry");
            let key = Element::of(&entry.key);
            let val = Element::of(&entry.value);
            for (k, v) in entries {
                let mut body = BytesMut::new();
                encode_key(1, key.wire_type(), &mut body);
                encode_element(pool, key, &key_value(k), &mut body);
                encode_key(2, val.wire_type(), &mut body);
                encode_element(pool, val, v, &mut body);

                encode_key(number, WireType::LengthDelimited, buf);
                encode_varint(body.len() as u64, buf);
                buf.put_slice(&body);
            }
        }
        (_, None) => {}
        (cardinality, Some(value)) => {
            panic!("{} field cannot hold {}", cardinality.as_str(), value.shape_name())
        }
    }
}

fn encode_element(pool: &SchemaPool, element: Element<'_>, value: &Value, buf: &mut BytesMut) {
    match (element, value) {
        (Element::Scalar(ScalarType::Double), Value::F64(v)) => buf.put_f64_le(*v),
        (Element::Scalar(ScalarType::Float), Value::F32(v)) => buf.put_f32_le(*v),
        (Element::Scalar(ScalarType::Fixed64), Value::U64(v)) => buf.put_u64_le(*v),
        (Element::Scalar(ScalarType::Sfixed64), Value::I64(v)) => buf.put_i64_le(*v),
        (Element::Scalar(ScalarType::Fixed32), Value::U32(v)) => buf.put_u32_le(*v),
        (Element::Scalar(ScalarType::Sfixed32), Value::I32(v)) => buf.put_i32_le(*v),
        (Element::Scalar(ScalarType::Int32), Value::I32(v))
        | (Element::Scalar(ScalarType::Enum), Value::Enum(v)) => {
            encode_varint(*v as i64 as u64, buf)
        }
        (Element::Scalar(ScalarType::Int64), Value::I64(v)) => encode_varint(*v as u64, buf),
        (Element::Scalar(ScalarType::Uint32), Value::U32(v)) => encode_varint(*v as u64, buf),
        (Element::Scalar(ScalarType::Uint64), Value::U64(v)) => encode_varint(*v, buf),
        (Element::Scalar(ScalarType::Sint32), Value::I32(v)) => {
            encode_varint(((v << 1) ^ (v >> 31)) as u32 as u64, buf)
        }
        (Element::Scalar(ScalarType::Sint64), Value::I64(v)) => {
            encode_varint(((v << 1) ^ (v >> 63)) as u64, buf)
        }
        (Element::Scalar(ScalarType::Bool), Value::Bool(v)) => encode_varint(*v as u64, buf),
        (Element::Scalar(ScalarType::String), Value::String(s)) => {
            encode_varint(s.len() as u64, buf);
            buf.put_slice(s.as_bytes());
        }
        (Element::Scalar(ScalarType::Bytes), Value::Bytes(b)) => {
            encode_varint(b.len() as u64, buf);
            buf.put_slice(b);
        }
        (Element::Message(name), Value::Message(message)) => {
            let body = encode(pool, name, message);
            encode_varint(body.len() as u64, buf);
            buf.put_slice(&body);
        }
        (Element::Custom(_), Value::Custom(custom)) => {
            let mut body = BytesMut::new();
            custom.encode(&mut body);
            encode_varint(body.len() as u64, buf);
            buf.put_slice(&body);
        }
        (element, value) => panic!("cannot encode {} as {element:?}", value.kind_name()),
    }
}

fn zero_value(element: Element<'_>) -> Value {
    match element {
        Element::Scalar(scalar) => match scalar {
            ScalarType::Double => Value::F64(0.0),
            ScalarType::Float => Value::F32(0.0),
            ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => Value::I32(0),
            ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => Value::I64(0),
            ScalarType::Uint32 | ScalarType::Fixed32 => Value::U32(0),
            ScalarType::Uint64 | ScalarType::Fixed64 => Value::U64(0),
            ScalarType::Bool => Value::Bool(false),
            ScalarType::String => Value::String(String::new()),
            ScalarType::Bytes => Value::Bytes(Default::default()),
            ScalarType::Enum => Value::Enum(0),
            ScalarType::Message(_) | ScalarType::Group => unreachable!("not a scalar element"),
        },
        Element::Message(_) => Value::Message(MessageValue::new()),
        Element::Custom(name) => panic!("custom type `{name}` has no zero value"),
    }
}

fn key_value(key: &MapKey) -> Value {
    match key {
        MapKey::Bool(v) => Value::Bool(*v),
        MapKey::I32(v) => Value::I32(*v),
        MapKey::I64(v) => Value::I64(*v),
        MapKey::U32(v) => Value::U32(*v),
        MapKey::U64(v) => Value::U64(*v),
        MapKey::String(v) => Value::String(v.clone()),
        MapKey::Bytes(v) => Value::Bytes(v.clone()),
    }
}
