//! Named type lookup for decoding.
//!
//! The parser leaves references to previously defined types (and recursive
//! self-references) as `AvroSchema::Named`. The decoder looks those up here
//! instead of inlining them, which keeps recursive schemas finite.

use std::collections::HashMap;

use crate::schema::AvroSchema;

/// Registry of named types (records, enums, fixed) by full name.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolutionContext {
    named_types: HashMap<String, AvroSchema>,
}

impl SchemaResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every named type defined anywhere in `schema`.
    pub fn build_from_schema(schema: &AvroSchema) -> Self {
        let mut context = Self::new();
        context.extract_named_types(schema);
        context
    }

    pub fn get(&self, name: &str) -> Option<&AvroSchema> {
        self.named_types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.named_types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.named_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named_types.is_empty()
    }

    fn extract_named_types(&mut self, schema: &AvroSchema) {
        match schema {
            AvroSchema::Record(record) => {
                self.named_types.insert(record.fullname(), schema.clone());
                for field in &record.fields {
                    self.extract_named_types(&field.schema);
                }
            }
            AvroSchema::Enum(e) => {
                self.named_types.insert(e.fullname(), schema.clone());
            }
            AvroSchema::Fixed(f) => {
                self.named_types.insert(f.fullname(), schema.clone());
            }
            AvroSchema::Array(inner) | AvroSchema::Map(inner) => {
                self.extract_named_types(inner);
            }
            AvroSchema::Union(variants) => {
                for variant in variants {
                    self.extract_named_types(variant);
                }
            }
            AvroSchema::Logical(logical) => self.extract_named_types(&logical.base),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    #[test]
    fn test_collects_nested_named_types() {
        let schema = parse_schema(
            r#"{
                "type": "record", "name": "Outer", "namespace": "ns",
                "fields": [
                    {"name": "kind", "type": {"type": "enum", "name": "Kind", "symbols": ["A"]}},
                    {"name": "ids", "type": {"type": "array", "items": {"type": "fixed", "name": "Id", "size": 4}}},
                    {"name": "inner", "type": ["null", {"type": "record", "name": "Inner", "fields": []}]}
                ]
            }"#,
        )
        .unwrap();

        let context = SchemaResolutionContext::build_from_schema(&schema);
        assert_eq!(context.len(), 4);
        for name in ["ns.Outer", "ns.Kind", "ns.Id", "ns.Inner"] {
            assert!(context.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_primitive_schema_has_no_named_types() {
        let context = SchemaResolutionContext::build_from_schema(&AvroSchema::Long);
        assert!(context.is_empty());
        assert!(context.get("Long").is_none());
    }
}
