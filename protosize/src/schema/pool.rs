//! Registry of message schemas.
//!
//! Nested message fields refer to their type by name, so a schema may refer to
//! itself or to a schema that refers back to it. The pool resolves those names
//! once, when it is built.

use std::collections::{HashMap, HashSet};

use protosize_core::{SchemaError, SizeError};

use crate::schema::{Cardinality, MessageSchema, ScalarType};
use crate::sizer::{self, Sizer};
use crate::value::MessageValue;

/// An immutable set of message schemas, keyed by fully-qualified name.
///
/// `SchemaPool` is `Send + Sync` and may be shared across threads by
/// reference or behind an `Arc`.
#[derive(Clone, Debug, Default)]
pub struct SchemaPool {
    messages: HashMap<String, MessageSchema>,
}

impl SchemaPool {
    pub fn builder() -> SchemaPoolBuilder {
        SchemaPoolBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&MessageSchema> {
        self.messages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.messages.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageSchema> {
        self.messages.values()
    }

    /// Get a sizer bound to the named message type.
    pub fn sizer(&self, name: &str) -> Result<Sizer<'_>, SizeError> {
        let schema = self.lookup(name)?;
        Ok(Sizer::new(self, schema))
    }

    /// Size `value` as an instance of the named message type.
    pub fn size(&self, name: &str, value: &MessageValue) -> Result<usize, SizeError> {
        self.sizer(name)?.size(value)
    }

    /// Size of a nested message body, without its tag or length prefix.
    pub(crate) fn message_size(
        &self,
        name: &str,
        value: &MessageValue,
    ) -> Result<usize, SizeError> {
        sizer::message_size(self, self.lookup(name)?, value)
    }

    fn lookup(&self, name: &str) -> Result<&MessageSchema, SizeError> {
        self.messages
            .get(name)
            .ok_or_else(|| SizeError::UnknownMessage(name.to_owned()))
    }
}

/// Builder for [`SchemaPool`].
#[derive(Debug, Default)]
pub struct SchemaPoolBuilder {
    messages: Vec<MessageSchema>,
}

impl SchemaPoolBuilder {
    pub fn message(mut self, schema: MessageSchema) -> Self {
        self.messages.push(schema);
        self
    }

    pub fn messages(mut self, schemas: impl IntoIterator<Item = MessageSchema>) -> Self {
        self.messages.extend(schemas);
        self
    }

    /// Register every schema, then check that all referenced message types
    /// exist and that no message must contain itself.
    pub fn build(self) -> Result<SchemaPool, SchemaError> {
        let mut messages = HashMap::with_capacity(self.messages.len());
        for schema in self.messages {
            if messages.contains_key(schema.name()) {
                return Err(SchemaError::DuplicateMessage(schema.name().to_owned()));
            }
            messages.insert(schema.name().to_owned(), schema);
        }

        for schema in messages.values() {
            for (field, type_name) in schema.referenced_types() {
                if !messages.contains_key(type_name) {
                    return Err(SchemaError::UnresolvedType {
                        message: schema.name().to_owned(),
                        field: field.name().to_owned(),
                        type_name: type_name.to_owned(),
                    });
                }
            }
        }

        let pool = SchemaPool { messages };
        check_required_cycles(&pool)?;

        tracing::debug!(messages = pool.len(), "built schema pool");
        Ok(pool)
    }
}

/// Non-nullable singular message fields are emitted even when unset, so a
/// cycle made only of such fields would have no finite size.
fn check_required_cycles(pool: &SchemaPool) -> Result<(), SchemaError> {
    let mut done = HashSet::new();
    for schema in pool.iter() {
        let mut path = Vec::new();
        visit(pool, schema, &mut path, &mut done)?;
    }
    Ok(())
}

fn visit<'a>(
    pool: &'a SchemaPool,
    schema: &'a MessageSchema,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Result<(), SchemaError> {
    if done.contains(schema.name()) {
        return Ok(());
    }
    path.push(schema.name());
    for field in schema.fields() {
        if field.cardinality() != Cardinality::Singular
            || field.is_nullable()
            || field.custom_type_name().is_some()
        {
            continue;
        }
        let ScalarType::Message(target) = field.ty() else {
            continue;
        };
        if path.contains(&target.as_str()) {
            return Err(SchemaError::InvariantViolation {
                message: schema.name().to_owned(),
                field: field.name().to_owned(),
                reason: format!("non-nullable message field closes a cycle through `{target}`"),
            });
        }
        if let Some(next) = pool.get(target) {
            visit(pool, next, path, done)?;
        }
    }
    path.pop();
    done.insert(schema.name());
    Ok(())
}
