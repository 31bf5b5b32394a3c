//! JSON schema parser for Avro schemas.
//!
//! Parses the writer schema embedded in a container header into the
//! `AvroSchema` type hierarchy.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SchemaError;
use crate::schema::{
    max_decimal_precision, AvroSchema, EnumSchema, FieldSchema, FixedSchema, LogicalType,
    LogicalTypeName, RecordSchema, TypeName,
};

/// Parse an Avro schema from a JSON string.
///
/// # Example
/// ```
/// use avrocat::schema::{parse_schema, AvroSchema};
///
/// let schema = parse_schema(r#""string""#).unwrap();
/// assert_eq!(schema, AvroSchema::String);
/// ```
pub fn parse_schema(json: &str) -> Result<AvroSchema, SchemaError> {
    parse_schema_with_options(json, false)
}

/// Parse an Avro schema from a JSON string with validation options.
///
/// In strict mode:
/// - Union types cannot contain duplicate types or nested unions
/// - Names must start with a letter/underscore and contain only alphanumerics/underscores
///
/// In permissive mode these violations are logged and parsing continues,
/// which keeps files from lenient writers readable.
///
/// # Example
/// ```
/// use avrocat::schema::parse_schema_with_options;
///
/// assert!(parse_schema_with_options(r#"["int", "int"]"#, false).is_ok());
/// assert!(parse_schema_with_options(r#"["int", "int"]"#, true).is_err());
/// ```
pub fn parse_schema_with_options(json: &str, strict: bool) -> Result<AvroSchema, SchemaError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SchemaError::ParseError(format!("Invalid JSON: {}", e)))?;

    SchemaParser::new().with_strict(strict).parse(&value)
}

/// Schema parser with named type resolution context.
///
/// Maintains a registry of named types (records, enums, fixed) so that
/// later references by name can be checked and resolved.
#[derive(Debug, Default)]
pub struct SchemaParser {
    named_types: HashMap<String, AvroSchema>,
    current_namespace: Option<String>,
    strict: bool,
}

impl SchemaParser {
    /// Create a new SchemaParser in permissive mode.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Parse a JSON value into an AvroSchema.
    pub fn parse(&mut self, value: &Value) -> Result<AvroSchema, SchemaError> {
        match value {
            Value::String(s) => self.parse_type_name(s),
            Value::Object(obj) => self.parse_object(obj),
            Value::Array(arr) => self.parse_union(arr),
            other => Err(SchemaError::InvalidSchema(format!(
                "Expected string, object, or array, found: {}",
                other
            ))),
        }
    }

    /// A primitive name or a reference to an already defined named type.
    fn parse_type_name(&self, s: &str) -> Result<AvroSchema, SchemaError> {
        if let Some(primitive) = primitive(s) {
            return Ok(primitive);
        }

        let fullname = self.resolve_name(s);
        if self.named_types.contains_key(&fullname) {
            Ok(AvroSchema::Named(fullname))
        } else if self.named_types.contains_key(s) {
            Ok(AvroSchema::Named(s.to_string()))
        } else {
            Err(SchemaError::UnsupportedType(format!(
                "Unknown type: {}",
                s
            )))
        }
    }

    fn parse_object(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::InvalidSchema("Missing 'type' field".to_string()))?;

        // {"type": {...}} and {"type": [...]} wrap another schema
        let type_str = match type_value {
            Value::String(s) => s.as_str(),
            nested => return self.parse(nested),
        };

        let schema = match type_str {
            "record" | "error" => self.parse_record(obj)?,
            "enum" => self.parse_enum(obj)?,
            "fixed" => self.parse_fixed(obj)?,
            "array" => {
                let items = obj.get("items").ok_or_else(|| {
                    SchemaError::InvalidSchema("Array missing 'items' field".to_string())
                })?;
                AvroSchema::Array(Box::new(self.parse(items)?))
            }
            "map" => {
                let values = obj.get("values").ok_or_else(|| {
                    SchemaError::InvalidSchema("Map missing 'values' field".to_string())
                })?;
                AvroSchema::Map(Box::new(self.parse(values)?))
            }
            other => self.parse_type_name(other)?,
        };

        match obj.get("logicalType") {
            Some(logical) => self.wrap_logical(obj, logical, schema),
            None => Ok(schema),
        }
    }

    fn parse_union(&mut self, arr: &[Value]) -> Result<AvroSchema, SchemaError> {
        if arr.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "Union schema cannot be empty".to_string(),
            ));
        }

        let variants = arr
            .iter()
            .map(|v| self.parse(v))
            .collect::<Result<Vec<_>, _>>()?;

        self.validate_union(&variants)?;
        Ok(AvroSchema::Union(variants))
    }

    fn parse_record(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let name = self.parse_type_name_parts(obj, "Record")?;
        let fullname = name.fullname();

        // Register before the fields so recursive references resolve
        self.named_types
            .insert(fullname.clone(), AvroSchema::Named(fullname.clone()));

        let fields_value = obj.get("fields").and_then(Value::as_array).ok_or_else(|| {
            SchemaError::InvalidSchema(format!("Record '{}' missing 'fields' array", fullname))
        })?;

        // Nested unqualified names inherit the record's namespace
        let prev_namespace =
            std::mem::replace(&mut self.current_namespace, name.namespace.clone());
        let fields = fields_value
            .iter()
            .map(|f| self.parse_field(f))
            .collect::<Result<Vec<_>, _>>();
        self.current_namespace = prev_namespace;

        let schema = AvroSchema::Record(RecordSchema {
            name,
            fields: fields?,
        });
        self.named_types.insert(fullname, schema.clone());
        Ok(schema)
    }

    fn parse_field(&mut self, value: &Value) -> Result<FieldSchema, SchemaError> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::InvalidSchema("Field must be an object".to_string()))?;

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::InvalidSchema("Field missing 'name'".to_string()))?
            .to_string();
        self.validate_name(&name, "Field")?;

        let type_value = obj.get("type").ok_or_else(|| {
            SchemaError::InvalidSchema(format!("Field '{}' missing 'type'", name))
        })?;

        Ok(FieldSchema {
            schema: self.parse(type_value)?,
            default: obj.get("default").cloned(),
            doc: obj.get("doc").and_then(Value::as_str).map(String::from),
            name,
        })
    }

    fn parse_enum(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let name = self.parse_type_name_parts(obj, "Enum")?;

        let symbols = obj
            .get("symbols")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaError::InvalidSchema("Enum missing 'symbols' array".to_string()))?
            .iter()
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    SchemaError::InvalidSchema("Enum symbols must be strings".to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if symbols.is_empty() {
            return Err(SchemaError::InvalidSchema(format!(
                "Enum '{}' must have at least one symbol",
                name.name
            )));
        }
        for symbol in &symbols {
            self.validate_name(symbol, "Enum symbol")?;
        }

        let fullname = name.fullname();
        let schema = AvroSchema::Enum(EnumSchema {
            name,
            symbols,
            default: obj.get("default").and_then(Value::as_str).map(String::from),
        });
        self.named_types.insert(fullname, schema.clone());
        Ok(schema)
    }

    fn parse_fixed(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let name = self.parse_type_name_parts(obj, "Fixed")?;

        let size = obj.get("size").and_then(Value::as_u64).ok_or_else(|| {
            SchemaError::InvalidSchema(format!("Fixed '{}' missing 'size' field", name.name))
        })? as usize;

        let fullname = name.fullname();
        let schema = AvroSchema::Fixed(FixedSchema { name, size });
        self.named_types.insert(fullname, schema.clone());
        Ok(schema)
    }

    /// Extract name, namespace, doc and aliases of a named type.
    ///
    /// A dotted name carries its own namespace; otherwise an explicit
    /// `namespace` wins over the enclosing one.
    fn parse_type_name_parts(
        &self,
        obj: &Map<String, Value>,
        context: &str,
    ) -> Result<TypeName, SchemaError> {
        let raw = obj.get("name").and_then(Value::as_str).ok_or_else(|| {
            SchemaError::InvalidSchema(format!("{} missing 'name' field", context))
        })?;

        let (namespace, name) = match raw.rsplit_once('.') {
            Some((ns, name)) => (Some(ns.to_string()), name.to_string()),
            None => {
                let ns = obj
                    .get("namespace")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .or_else(|| self.current_namespace.clone());
                (ns.filter(|ns| !ns.is_empty()), raw.to_string())
            }
        };
        self.validate_name(&name, context)?;

        let aliases = obj
            .get("aliases")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(TypeName {
            name,
            namespace,
            doc: obj.get("doc").and_then(Value::as_str).map(String::from),
            aliases,
        })
    }

    /// Apply a `logicalType` annotation to an already parsed base schema.
    ///
    /// Unknown logical types, known ones on the wrong base type, and
    /// decimals with invalid parameters fall back to the base type as the
    /// Avro specification requires.
    fn wrap_logical(
        &self,
        obj: &Map<String, Value>,
        logical: &Value,
        base: AvroSchema,
    ) -> Result<AvroSchema, SchemaError> {
        let Some(logical_name) = logical.as_str() else {
            return Err(SchemaError::InvalidSchema(
                "logicalType must be a string".to_string(),
            ));
        };

        let logical_type = if logical_name == "decimal" {
            match decimal_params(obj, &base) {
                Ok(decimal) => decimal,
                Err(reason) => {
                    warn!(
                        logical_type = logical_name,
                        base = %base.to_json(),
                        %reason,
                        "Ignoring invalid decimal logical type"
                    );
                    return Ok(base);
                }
            }
        } else {
            let Some(logical_type) = LogicalTypeName::from_name(logical_name) else {
                warn!(logical_type = logical_name, "Ignoring unknown logical type");
                return Ok(base);
            };
            logical_type
        };

        if !logical_base_matches(&logical_type, &base) {
            warn!(
                logical_type = logical_name,
                base = %base.to_json(),
                "Ignoring logical type on incompatible base type"
            );
            return Ok(base);
        }

        Ok(AvroSchema::Logical(LogicalType::new(base, logical_type)))
    }

    fn resolve_name(&self, name: &str) -> String {
        match &self.current_namespace {
            Some(ns) if !name.contains('.') => format!("{}.{}", ns, name),
            _ => name.to_string(),
        }
    }

    /// Report a violation: an error in strict mode, a warning otherwise.
    fn violation(&self, message: String) -> Result<(), SchemaError> {
        if self.strict {
            Err(SchemaError::InvalidSchema(message))
        } else {
            warn!("{}", message);
            Ok(())
        }
    }

    /// Avro names must match `[A-Za-z_][A-Za-z0-9_]*`.
    fn validate_name(&self, name: &str, context: &str) -> Result<(), SchemaError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };

        if valid {
            Ok(())
        } else {
            self.violation(format!("{} name '{}' is not a valid Avro name", context, name))
        }
    }

    fn validate_union(&self, variants: &[AvroSchema]) -> Result<(), SchemaError> {
        let mut seen = std::collections::HashSet::new();
        for (i, variant) in variants.iter().enumerate() {
            if matches!(variant, AvroSchema::Union(_)) {
                self.violation(format!(
                    "Union contains nested union at position {}",
                    i
                ))?;
            }
            let key = union_key(variant);
            if !seen.insert(key.clone()) {
                self.violation(format!(
                    "Union contains duplicate type '{}' at position {}",
                    key, i
                ))?;
            }
        }
        Ok(())
    }
}

fn primitive(name: &str) -> Option<AvroSchema> {
    Some(match name {
        "null" => AvroSchema::Null,
        "boolean" => AvroSchema::Boolean,
        "int" => AvroSchema::Int,
        "long" => AvroSchema::Long,
        "float" => AvroSchema::Float,
        "double" => AvroSchema::Double,
        "bytes" => AvroSchema::Bytes,
        "string" => AvroSchema::String,
        _ => return None,
    })
}

/// Read and check a decimal's `precision` and `scale` attributes.
///
/// A `fixed` base additionally bounds the precision by its size.
fn decimal_params(obj: &Map<String, Value>, base: &AvroSchema) -> Result<LogicalTypeName, String> {
    let precision = match obj.get("precision") {
        Some(value) => decimal_param("precision", value)?,
        None => return Err("missing precision".to_string()),
    };
    let scale = match obj.get("scale") {
        Some(value) => decimal_param("scale", value)?,
        None => 0,
    };
    let decimal = LogicalTypeName::decimal(precision, scale)?;

    if let AvroSchema::Fixed(fixed) = base {
        let max = max_decimal_precision(fixed.size);
        if precision > max {
            return Err(format!(
                "precision {} does not fit in fixed of size {} (max {})",
                precision, fixed.size, max
            ));
        }
    }
    Ok(decimal)
}

fn decimal_param(key: &str, value: &Value) -> Result<u32, String> {
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| format!("{} {} is not a 32-bit unsigned integer", key, value))
}

fn logical_base_matches(logical: &LogicalTypeName, base: &AvroSchema) -> bool {
    match logical {
        LogicalTypeName::Decimal { .. } => {
            matches!(base, AvroSchema::Bytes | AvroSchema::Fixed(_))
        }
        LogicalTypeName::Uuid => match base {
            AvroSchema::String => true,
            AvroSchema::Fixed(f) => f.size == 16,
            _ => false,
        },
        LogicalTypeName::Date | LogicalTypeName::TimeMillis => matches!(base, AvroSchema::Int),
        LogicalTypeName::TimeMicros
        | LogicalTypeName::TimestampMillis
        | LogicalTypeName::TimestampMicros
        | LogicalTypeName::LocalTimestampMillis
        | LogicalTypeName::LocalTimestampMicros => matches!(base, AvroSchema::Long),
        LogicalTypeName::Duration => matches!(base, AvroSchema::Fixed(f) if f.size == 12),
    }
}

/// Key used to detect duplicate branches within a union.
fn union_key(schema: &AvroSchema) -> String {
    match schema {
        AvroSchema::Array(_) => "array".to_string(),
        AvroSchema::Map(_) => "map".to_string(),
        AvroSchema::Union(_) => "union".to_string(),
        AvroSchema::Logical(lt) => union_key(&lt.base),
        other => other
            .primitive_name()
            .map(String::from)
            .or_else(|| other.fullname())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        for (json, expected) in [
            (r#""null""#, AvroSchema::Null),
            (r#""boolean""#, AvroSchema::Boolean),
            (r#""int""#, AvroSchema::Int),
            (r#""long""#, AvroSchema::Long),
            (r#""float""#, AvroSchema::Float),
            (r#""double""#, AvroSchema::Double),
            (r#""bytes""#, AvroSchema::Bytes),
            (r#""string""#, AvroSchema::String),
            (r#"{"type": "string"}"#, AvroSchema::String),
        ] {
            assert_eq!(parse_schema(json).unwrap(), expected, "{}", json);
        }
    }

    #[test]
    fn test_parse_record_with_namespace() {
        let schema = parse_schema(
            r#"{
                "type": "record",
                "name": "User",
                "namespace": "com.example",
                "fields": [
                    {"name": "id", "type": "long"},
                    {"name": "email", "type": ["null", "string"], "default": null}
                ]
            }"#,
        )
        .unwrap();

        let record = schema.as_record().expect("record");
        assert_eq!(record.fullname(), "com.example.User");
        assert_eq!(record.field_names().collect::<Vec<_>>(), ["id", "email"]);
        assert_eq!(
            record.fields[1].schema,
            AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::String])
        );
        assert_eq!(record.fields[1].default, Some(Value::Null));
    }

    #[test]
    fn test_dotted_name_sets_namespace() {
        let schema =
            parse_schema(r#"{"type": "fixed", "name": "org.acme.Hash", "size": 8}"#).unwrap();
        match schema {
            AvroSchema::Fixed(f) => {
                assert_eq!(f.name.name, "Hash");
                assert_eq!(f.name.namespace.as_deref(), Some("org.acme"));
                assert_eq!(f.size, 8);
            }
            other => panic!("Expected fixed, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_named_reference_inherits_namespace() {
        let schema = parse_schema(
            r#"{
                "type": "record",
                "name": "Order",
                "namespace": "shop",
                "fields": [
                    {"name": "status", "type": {"type": "enum", "name": "Status", "symbols": ["NEW", "DONE"]}},
                    {"name": "previous", "type": "Status"}
                ]
            }"#,
        )
        .unwrap();

        let record = schema.as_record().unwrap();
        assert_eq!(
            record.fields[1].schema,
            AvroSchema::Named("shop.Status".to_string())
        );
    }

    #[test]
    fn test_recursive_record() {
        let schema = parse_schema(
            r#"{
                "type": "record",
                "name": "Node",
                "fields": [
                    {"name": "value", "type": "int"},
                    {"name": "next", "type": ["null", "Node"]}
                ]
            }"#,
        )
        .unwrap();

        let record = schema.as_record().unwrap();
        assert_eq!(
            record.fields[1].schema,
            AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::Named("Node".to_string())])
        );
    }

    #[test]
    fn test_unknown_type_reference() {
        let err = parse_schema(
            r#"{"type": "record", "name": "R", "fields": [{"name": "a", "type": "Missing"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedType(_)));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_schema(r#"{"type": "record""#).unwrap_err();
        assert!(matches!(err, SchemaError::ParseError(_)));
    }

    #[test]
    fn test_record_missing_fields() {
        let err = parse_schema(r#"{"type": "record", "name": "R"}"#).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(_)));
    }

    #[test]
    fn test_empty_enum_rejected() {
        let err = parse_schema(r#"{"type": "enum", "name": "E", "symbols": []}"#).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(_)));
    }

    #[test]
    fn test_logical_types() {
        let schema = parse_schema(r#"{"type": "int", "logicalType": "date"}"#).unwrap();
        assert_eq!(
            schema,
            AvroSchema::Logical(LogicalType::new(AvroSchema::Int, LogicalTypeName::Date))
        );

        let schema = parse_schema(
            r#"{"type": "bytes", "logicalType": "decimal", "precision": 9, "scale": 3}"#,
        )
        .unwrap();
        assert_eq!(
            schema,
            AvroSchema::Logical(LogicalType::new(
                AvroSchema::Bytes,
                LogicalTypeName::Decimal {
                    precision: 9,
                    scale: 3
                }
            ))
        );
    }

    #[test]
    fn test_unknown_or_mismatched_logical_type_falls_back() {
        let schema = parse_schema(r#"{"type": "long", "logicalType": "nanos-of-doom"}"#).unwrap();
        assert_eq!(schema, AvroSchema::Long);

        let schema = parse_schema(r#"{"type": "string", "logicalType": "date"}"#).unwrap();
        assert_eq!(schema, AvroSchema::String);
    }

    fn parses_to_base(json: &str) -> AvroSchema {
        let schema = parse_schema(json).unwrap();
        assert!(
            !matches!(schema, AvroSchema::Logical(_)),
            "{} kept its logical type",
            json
        );
        schema
    }

    #[test]
    fn test_decimal_scale_above_precision_falls_back() {
        let schema = parses_to_base(
            r#"{"type": "bytes", "logicalType": "decimal", "precision": 2, "scale": 5}"#,
        );
        assert_eq!(schema, AvroSchema::Bytes);
    }

    #[test]
    fn test_decimal_zero_or_missing_precision_falls_back() {
        parses_to_base(r#"{"type": "bytes", "logicalType": "decimal", "precision": 0}"#);
        parses_to_base(r#"{"type": "bytes", "logicalType": "decimal", "scale": 0}"#);
    }

    #[test]
    fn test_decimal_parameters_beyond_u32_fall_back() {
        parses_to_base(
            r#"{"type": "bytes", "logicalType": "decimal", "precision": 4294967297, "scale": 4294967298}"#,
        );
        parses_to_base(
            r#"{"type": "bytes", "logicalType": "decimal", "precision": 10, "scale": 4000000000}"#,
        );
        parses_to_base(r#"{"type": "bytes", "logicalType": "decimal", "precision": -3}"#);
        parses_to_base(r#"{"type": "bytes", "logicalType": "decimal", "precision": "9"}"#);
    }

    #[test]
    fn test_decimal_precision_bounded_by_fixed_size() {
        let schema = parses_to_base(
            r#"{"type": "fixed", "name": "D4", "size": 4, "logicalType": "decimal", "precision": 10}"#,
        );
        assert!(matches!(schema, AvroSchema::Fixed(ref f) if f.size == 4));

        let schema = parse_schema(
            r#"{"type": "fixed", "name": "D4", "size": 4, "logicalType": "decimal", "precision": 9, "scale": 9}"#,
        )
        .unwrap();
        assert!(matches!(
            schema,
            AvroSchema::Logical(ref logical) if logical.logical_type
                == LogicalTypeName::Decimal { precision: 9, scale: 9 }
        ));
    }

    #[test]
    fn test_strict_mode_names() {
        let json = r#"{"type": "record", "name": "1bad", "fields": []}"#;
        assert!(parse_schema_with_options(json, false).is_ok());
        assert!(parse_schema_with_options(json, true).is_err());
    }

    #[test]
    fn test_schema_json_reparses() {
        let json = r#"{
            "type": "record", "name": "Weather", "namespace": "test",
            "fields": [
                {"name": "station", "type": "string"},
                {"name": "time", "type": "long"},
                {"name": "temp", "type": "int"},
                {"name": "tags", "type": {"type": "map", "values": {"type": "array", "items": "string"}}}
            ]
        }"#;
        let schema = parse_schema(json).unwrap();
        let reparsed = parse_schema(&schema.to_json()).unwrap();
        assert_eq!(schema, reparsed);
    }
}
