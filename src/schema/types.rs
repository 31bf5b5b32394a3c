//! Avro schema types and representations.

use serde_json::{json, Map, Value};

/// Represents an Avro schema.
///
/// Supports all Avro primitive types, complex types, and named type references.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroSchema {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,

    /// Record type with named fields.
    Record(RecordSchema),
    /// Enumeration type.
    Enum(EnumSchema),
    /// Array of items with a single schema.
    Array(Box<AvroSchema>),
    /// Map with string keys and values of a single schema.
    Map(Box<AvroSchema>),
    /// Union of multiple schemas.
    Union(Vec<AvroSchema>),
    /// Fixed-size byte array.
    Fixed(FixedSchema),

    /// Reference to a named type defined elsewhere in the schema.
    Named(String),

    /// Logical type wrapper.
    Logical(LogicalType),
}

/// Name, namespace and documentation shared by records, enums and fixed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeName {
    pub name: String,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    pub aliases: Vec<String>,
}

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Get the fully qualified name.
    pub fn fullname(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{}.{}", ns, self.name),
            _ => self.name.clone(),
        }
    }

    fn write_json(&self, obj: &mut Map<String, Value>) {
        obj.insert("name".to_string(), json!(&self.name));
        if let Some(ns) = &self.namespace {
            obj.insert("namespace".to_string(), json!(ns));
        }
        if let Some(doc) = &self.doc {
            obj.insert("doc".to_string(), json!(doc));
        }
        if !self.aliases.is_empty() {
            obj.insert("aliases".to_string(), json!(&self.aliases));
        }
    }
}

/// Schema for a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: TypeName,
    pub fields: Vec<FieldSchema>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: TypeName::new(name),
            fields,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.name.namespace = Some(namespace.into());
        self
    }

    pub fn fullname(&self) -> String {
        self.name.fullname()
    }

    /// Names of the fields, in schema order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Schema for a field within a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub schema: AvroSchema,
    /// Default value, kept verbatim; only used when re-serialising the schema.
    pub default: Option<Value>,
    pub doc: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, schema: AvroSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
            doc: None,
        }
    }
}

/// Schema for an enumeration type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: TypeName,
    pub symbols: Vec<String>,
    pub default: Option<String>,
}

impl EnumSchema {
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            name: TypeName::new(name),
            symbols,
            default: None,
        }
    }

    pub fn fullname(&self) -> String {
        self.name.fullname()
    }
}

/// Schema for a fixed-size byte array.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    pub name: TypeName,
    pub size: usize,
}

impl FixedSchema {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: TypeName::new(name),
            size,
        }
    }

    pub fn fullname(&self) -> String {
        self.name.fullname()
    }
}

/// Logical type wrapper around a base schema.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalType {
    pub base: Box<AvroSchema>,
    pub logical_type: LogicalTypeName,
}

impl LogicalType {
    pub fn new(base: AvroSchema, logical_type: LogicalTypeName) -> Self {
        Self {
            base: Box::new(base),
            logical_type,
        }
    }
}

/// Most decimal digits a two's complement `fixed` of `size` bytes can hold.
pub fn max_decimal_precision(size: usize) -> u32 {
    if size == 0 {
        return 0;
    }
    let bits = size.saturating_mul(8) - 1;
    (bits as f64 * std::f64::consts::LOG10_2).floor() as u32
}

/// Logical type names with their parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalTypeName {
    Decimal { precision: u32, scale: u32 },
    Uuid,
    /// Days since Unix epoch.
    Date,
    TimeMillis,
    TimeMicros,
    TimestampMillis,
    TimestampMicros,
    LocalTimestampMillis,
    LocalTimestampMicros,
    /// Months, days, milliseconds in a fixed[12].
    Duration,
}

impl LogicalTypeName {
    /// Parse a parameterless `logicalType` attribute.
    ///
    /// `None` for names this reader does not know and for `decimal`, which
    /// is built with [`decimal`](Self::decimal).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "uuid" => LogicalTypeName::Uuid,
            "date" => LogicalTypeName::Date,
            "time-millis" => LogicalTypeName::TimeMillis,
            "time-micros" => LogicalTypeName::TimeMicros,
            "timestamp-millis" => LogicalTypeName::TimestampMillis,
            "timestamp-micros" => LogicalTypeName::TimestampMicros,
            "local-timestamp-millis" => LogicalTypeName::LocalTimestampMillis,
            "local-timestamp-micros" => LogicalTypeName::LocalTimestampMicros,
            "duration" => LogicalTypeName::Duration,
            _ => return None,
        })
    }

    /// A decimal with `precision` total digits, `scale` of them fractional.
    ///
    /// # Errors
    /// A description of the problem if precision is zero or scale exceeds
    /// precision.
    pub fn decimal(precision: u32, scale: u32) -> Result<Self, String> {
        if precision == 0 {
            return Err("precision must be positive".to_string());
        }
        if scale > precision {
            return Err(format!("scale {} exceeds precision {}", scale, precision));
        }
        Ok(LogicalTypeName::Decimal { precision, scale })
    }

    pub fn name(&self) -> &'static str {
        match self {
            LogicalTypeName::Decimal { .. } => "decimal",
            LogicalTypeName::Uuid => "uuid",
            LogicalTypeName::Date => "date",
            LogicalTypeName::TimeMillis => "time-millis",
            LogicalTypeName::TimeMicros => "time-micros",
            LogicalTypeName::TimestampMillis => "timestamp-millis",
            LogicalTypeName::TimestampMicros => "timestamp-micros",
            LogicalTypeName::LocalTimestampMillis => "local-timestamp-millis",
            LogicalTypeName::LocalTimestampMicros => "local-timestamp-micros",
            LogicalTypeName::Duration => "duration",
        }
    }
}

impl AvroSchema {
    /// Name of the primitive type, if this is one.
    pub fn primitive_name(&self) -> Option<&'static str> {
        Some(match self {
            AvroSchema::Null => "null",
            AvroSchema::Boolean => "boolean",
            AvroSchema::Int => "int",
            AvroSchema::Long => "long",
            AvroSchema::Float => "float",
            AvroSchema::Double => "double",
            AvroSchema::Bytes => "bytes",
            AvroSchema::String => "string",
            _ => return None,
        })
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive_name().is_some()
    }

    /// Get the fully qualified name of a named type, if applicable.
    pub fn fullname(&self) -> Option<String> {
        match self {
            AvroSchema::Record(r) => Some(r.fullname()),
            AvroSchema::Enum(e) => Some(e.fullname()),
            AvroSchema::Fixed(f) => Some(f.fullname()),
            AvroSchema::Named(n) => Some(n.clone()),
            _ => None,
        }
    }

    /// The record schema, if the top level is a record.
    pub fn as_record(&self) -> Option<&RecordSchema> {
        match self {
            AvroSchema::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Serialize the schema to a compact JSON string.
    ///
    /// # Example
    /// ```
    /// use avrocat::schema::AvroSchema;
    ///
    /// let schema = AvroSchema::Array(Box::new(AvroSchema::Long));
    /// assert_eq!(schema.to_json(), r#"{"type":"array","items":"long"}"#);
    /// ```
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    /// Serialize the schema to a JSON Value.
    pub fn to_json_value(&self) -> Value {
        if let Some(name) = self.primitive_name() {
            return json!(name);
        }

        match self {
            AvroSchema::Record(r) => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!("record"));
                r.name.write_json(&mut obj);
                let fields = r
                    .fields
                    .iter()
                    .map(|f| {
                        let mut field = Map::new();
                        field.insert("name".to_string(), json!(&f.name));
                        field.insert("type".to_string(), f.schema.to_json_value());
                        if let Some(default) = &f.default {
                            field.insert("default".to_string(), default.clone());
                        }
                        if let Some(doc) = &f.doc {
                            field.insert("doc".to_string(), json!(doc));
                        }
                        Value::Object(field)
                    })
                    .collect();
                obj.insert("fields".to_string(), Value::Array(fields));
                Value::Object(obj)
            }
            AvroSchema::Enum(e) => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!("enum"));
                e.name.write_json(&mut obj);
                obj.insert("symbols".to_string(), json!(&e.symbols));
                if let Some(default) = &e.default {
                    obj.insert("default".to_string(), json!(default));
                }
                Value::Object(obj)
            }
            AvroSchema::Fixed(f) => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!("fixed"));
                f.name.write_json(&mut obj);
                obj.insert("size".to_string(), json!(f.size));
                Value::Object(obj)
            }
            AvroSchema::Array(items) => json!({
                "type": "array",
                "items": items.to_json_value()
            }),
            AvroSchema::Map(values) => json!({
                "type": "map",
                "values": values.to_json_value()
            }),
            AvroSchema::Union(variants) => {
                Value::Array(variants.iter().map(|v| v.to_json_value()).collect())
            }
            AvroSchema::Named(name) => json!(name),
            AvroSchema::Logical(lt) => {
                // Logical types serialize as the base type plus annotations
                let mut obj = match lt.base.to_json_value() {
                    Value::Object(m) => m,
                    base => {
                        let mut m = Map::new();
                        m.insert("type".to_string(), base);
                        m
                    }
                };
                obj.insert("logicalType".to_string(), json!(lt.logical_type.name()));
                if let LogicalTypeName::Decimal { precision, scale } = &lt.logical_type {
                    obj.insert("precision".to_string(), json!(precision));
                    if *scale > 0 {
                        obj.insert("scale".to_string(), json!(scale));
                    }
                }
                Value::Object(obj)
            }
            _ => unreachable!("primitives handled above"),
        }
    }
}
