//! Map field sizing.
//!
//! A map field is written as a repeated message field whose elements are
//! synthetic two-field entries:
//!
//! ```text
//! entry = tag(1) + key payload + tag(2) + value payload
//! field = sum over entries of tag(F) + varint(entry) + entry
//! ```
//!
//! Key and value are always written, including zero values, and a
//! message-typed value contributes at least its length prefix. Entries are
//! summed independently, so iteration order never changes the total.

use std::collections::HashMap;

use protosize_core::{SizeError, WireKind, length_delimited_len, tag_len, varint_len, zigzag_len};

use crate::field::{ElementType, SizeContext, element_wire_kind};
use crate::schema::{MapEntry, ScalarType};
use crate::value::{MapKey, Value};

/// Compiled key/value rules of a map field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapEntrySizer {
    key: ScalarType,
    key_tag_len: usize,
    value: ElementType,
    value_tag_len: usize,
}

impl MapEntrySizer {
    pub(crate) fn compile(entry: &MapEntry) -> Self {
        let value = match entry.value.ty() {
            ScalarType::Message(name) => ElementType::Message(name.clone()),
            ty => ElementType::Scalar(ty.clone()),
        };
        let key_kind = entry.key.ty().wire_kind().unwrap_or(WireKind::Varint);
        Self {
            key_tag_len: tag_len(entry.key.number(), key_kind),
            key: entry.key.ty().clone(),
            value_tag_len: tag_len(entry.value.number(), element_wire_kind(&value)),
            value,
        }
    }

    pub fn key_type(&self) -> &ScalarType {
        &self.key
    }

    pub fn value_type(&self) -> &ElementType {
        &self.value
    }

    /// Size of one entry, without the map field's own tag and length prefix.
    pub(crate) fn entry_len(
        &self,
        key: &MapKey,
        value: &Value,
        cx: &SizeContext<'_>,
    ) -> Result<usize, SizeError> {
        let key_len = key_payload_len(&self.key, key)
            .ok_or_else(|| cx.key_mismatch(&self.key, key.kind_name()))?;
        Ok(self.key_tag_len + key_len + self.value_tag_len + self.value.payload_len(value, cx)?)
    }

    /// Total contribution of a map field whose own tag is `field_tag_len` bytes.
    pub(crate) fn size(
        &self,
        field_tag_len: usize,
        entries: &HashMap<MapKey, Value>,
        cx: &SizeContext<'_>,
    ) -> Result<usize, SizeError> {
        entries
            .iter()
            .try_fold(0, |total, (key, value)| -> Result<usize, SizeError> {
                let entry = self.entry_len(key, value, cx)?;
                Ok(total + field_tag_len + length_delimited_len(entry))
            })
    }
}

/// Payload of a map key, or `None` when the key variant does not fit the type.
fn key_payload_len(ty: &ScalarType, key: &MapKey) -> Option<usize> {
    let len = match (ty, key) {
        (ScalarType::Fixed64, MapKey::U64(_)) | (ScalarType::Sfixed64, MapKey::I64(_)) => 8,
        (ScalarType::Fixed32, MapKey::U32(_)) | (ScalarType::Sfixed32, MapKey::I32(_)) => 4,
        (ScalarType::Int32, MapKey::I32(v)) => varint_len(*v as i64 as u64),
        (ScalarType::Int64, MapKey::I64(v)) => varint_len(*v as u64),
        (ScalarType::Uint32, MapKey::U32(v)) => varint_len(*v as u64),
        (ScalarType::Uint64, MapKey::U64(v)) => varint_len(*v),
        (ScalarType::Sint32, MapKey::I32(v)) => zigzag_len(*v as i64),
        (ScalarType::Sint64, MapKey::I64(v)) => zigzag_len(*v),
        (ScalarType::Bool, MapKey::Bool(_)) => 1,
        (ScalarType::String, MapKey::String(s)) => length_delimited_len(s.len()),
        (ScalarType::Bytes, MapKey::Bytes(b)) => length_delimited_len(b.len()),
        _ => return None,
    };
    Some(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, MessageSchema, SchemaPool};
    use crate::value::MessageValue;

    fn entry(key: ScalarType, value: ScalarType) -> MapEntrySizer {
        let field = FieldDescriptor::map("m", 1, key, value);
        MapEntrySizer::compile(field.map_entry().unwrap())
    }

    fn pool() -> SchemaPool {
        let inner = MessageSchema::builder("test.Inner")
            .proto3(true)
            .field(FieldDescriptor::singular("id", 1, ScalarType::Int32))
            .build()
            .unwrap();
        SchemaPool::builder().message(inner).build().unwrap()
    }

    fn cx(pool: &SchemaPool) -> SizeContext<'_> {
        SizeContext {
            pool,
            message: "test.Outer",
            number: 1,
        }
    }

    #[test]
    fn test_key_payloads() {
        assert_eq!(key_payload_len(&ScalarType::Int32, &MapKey::I32(-1)), Some(10));
        assert_eq!(key_payload_len(&ScalarType::Sint32, &MapKey::I32(-1)), Some(1));
        assert_eq!(key_payload_len(&ScalarType::Sfixed64, &MapKey::I64(-1)), Some(8));
        assert_eq!(key_payload_len(&ScalarType::Fixed32, &MapKey::U32(7)), Some(4));
        assert_eq!(key_payload_len(&ScalarType::Bool, &MapKey::Bool(false)), Some(1));
        assert_eq!(key_payload_len(&ScalarType::String, &MapKey::from("abc")), Some(4));
        assert_eq!(key_payload_len(&ScalarType::Bytes, &MapKey::from(vec![0u8; 200])), Some(202));
        assert_eq!(key_payload_len(&ScalarType::String, &MapKey::I32(1)), None);
    }

    #[test]
    fn test_entry_len_always_counts_zero_key_and_value() {
        let pool = pool();
        let sizer = entry(ScalarType::Int32, ScalarType::Int32);
        // 1 (key tag) + 1 (0) + 1 (value tag) + 1 (0)
        assert_eq!(sizer.entry_len(&MapKey::I32(0), &Value::I32(0), &cx(&pool)), Ok(4));
    }

    #[test]
    fn test_entry_len_string_to_sint64() {
        let pool = pool();
        let sizer = entry(ScalarType::String, ScalarType::Sint64);
        // key: 1 + (1 + 5), value: 1 + zigzag(-64) = 1
        let len = sizer
            .entry_len(&MapKey::from("hello"), &Value::I64(-64), &cx(&pool))
            .unwrap();
        assert_eq!(len, 9);
    }

    #[test]
    fn test_message_value_empty_still_framed() {
        let pool = pool();
        let sizer = entry(ScalarType::Int64, ScalarType::Message("test.Inner".into()));
        // key: 1 + 1, value: 1 + length prefix of an empty message
        let len = sizer
            .entry_len(&MapKey::I64(1), &Value::Message(MessageValue::new()), &cx(&pool))
            .unwrap();
        assert_eq!(len, 4);
    }

    #[test]
    fn test_map_total() {
        let pool = pool();
        let sizer = entry(ScalarType::String, ScalarType::Int32);
        let mut entries = HashMap::new();
        entries.insert(MapKey::from("a"), Value::I32(1));
        entries.insert(MapKey::from("bb"), Value::I32(300));

        // "a": 1+2 + 1+1 = 5 -> 1 + 1 + 5 = 7
        // "bb": 1+3 + 1+2 = 7 -> 1 + 1 + 7 = 9
        assert_eq!(sizer.size(1, &entries, &cx(&pool)), Ok(16));
    }

    #[test]
    fn test_key_mismatch_is_error() {
        let pool = pool();
        let sizer = entry(ScalarType::Uint64, ScalarType::Bool);
        let err = sizer
            .entry_len(&MapKey::I64(1), &Value::Bool(true), &cx(&pool))
            .unwrap_err();
        assert!(matches!(err, SizeError::TypeMismatch { .. }));
    }
}
