//! Avro binary decoder for primitive and complex types.
//!
//! The decoder follows the Avro specification for binary encoding:
//! - Varints use zigzag encoding for signed integers
//! - Floats and doubles are little-endian IEEE 754
//! - Bytes and strings are length-prefixed
//! - Arrays and maps are sequences of counted blocks ending in a zero count

use base64::Engine;
use serde_json::{json, Map, Number, Value};

use crate::error::DecodeError;
use crate::schema::{AvroSchema, EnumSchema, LogicalTypeName, RecordSchema, SchemaResolutionContext};

use super::varint::decode_zigzag;

/// Decode a boolean value.
///
/// Avro booleans are encoded as a single byte: 0x00 for false, 0x01 for true.
#[inline]
pub fn decode_boolean(data: &mut &[u8]) -> Result<bool, DecodeError> {
    let Some((&byte, rest)) = data.split_first() else {
        return Err(DecodeError::UnexpectedEof);
    };
    *data = rest;
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(DecodeError::InvalidData(format!(
            "Invalid boolean value: {}, expected 0 or 1",
            byte
        ))),
    }
}

/// Decode a 32-bit signed integer (zigzag varint encoded).
#[inline]
pub fn decode_int(data: &mut &[u8]) -> Result<i32, DecodeError> {
    let long = decode_long(data)?;
    i32::try_from(long).map_err(|_| {
        DecodeError::InvalidData(format!("Integer overflow: {} does not fit in i32", long))
    })
}

/// Decode a 64-bit signed integer (zigzag varint encoded).
#[inline]
pub fn decode_long(data: &mut &[u8]) -> Result<i64, DecodeError> {
    decode_zigzag(data)
}

/// Decode a 32-bit IEEE 754 floating-point number (little-endian).
#[inline]
pub fn decode_float(data: &mut &[u8]) -> Result<f32, DecodeError> {
    let bytes = take_array::<4>(data)?;
    Ok(f32::from_le_bytes(bytes))
}

/// Decode a 64-bit IEEE 754 floating-point number (little-endian).
#[inline]
pub fn decode_double(data: &mut &[u8]) -> Result<f64, DecodeError> {
    let bytes = take_array::<8>(data)?;
    Ok(f64::from_le_bytes(bytes))
}

/// Decode bytes without copying (returns a slice reference).
#[inline]
pub fn decode_bytes_ref<'a>(data: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = decode_long(data)?;
    if len < 0 {
        return Err(DecodeError::InvalidData(format!(
            "Negative bytes length: {}",
            len
        )));
    }
    decode_fixed_ref(data, len as usize)
}

/// Decode a byte array (length-prefixed).
#[inline]
pub fn decode_bytes(data: &mut &[u8]) -> Result<Vec<u8>, DecodeError> {
    decode_bytes_ref(data).map(<[u8]>::to_vec)
}

/// Decode a UTF-8 string (length-prefixed).
#[inline]
pub fn decode_string(data: &mut &[u8]) -> Result<String, DecodeError> {
    let bytes = decode_bytes(data)?;
    String::from_utf8(bytes).map_err(DecodeError::from)
}

/// Decode a fixed-size byte array without copying.
#[inline]
pub fn decode_fixed_ref<'a>(data: &mut &'a [u8], size: usize) -> Result<&'a [u8], DecodeError> {
    if data.len() < size {
        return Err(DecodeError::UnexpectedEof);
    }
    let (bytes, rest) = data.split_at(size);
    *data = rest;
    Ok(bytes)
}

/// Decode a fixed-size byte array.
#[inline]
pub fn decode_fixed(data: &mut &[u8], size: usize) -> Result<Vec<u8>, DecodeError> {
    decode_fixed_ref(data, size).map(<[u8]>::to_vec)
}

#[inline]
fn take_array<const N: usize>(data: &mut &[u8]) -> Result<[u8; N], DecodeError> {
    let bytes = decode_fixed_ref(data, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

// ============================================================================
// Decoded values
// ============================================================================

/// Represents a decoded Avro value.
///
/// Records and maps keep their entries as ordered pairs so that printing a
/// record shows fields in schema order and map entries in write order.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    /// Record with named fields, in schema order
    Record(Vec<(String, AvroValue)>),
    /// Enum variant (index and symbol name)
    Enum(i32, String),
    Array(Vec<AvroValue>),
    /// Map with string keys, in write order
    Map(Vec<(String, AvroValue)>),
    /// Union variant (branch index and value)
    Union(i32, Box<AvroValue>),
    Fixed(Vec<u8>),

    // Logical type values
    Decimal {
        /// The unscaled value as big-endian two's complement bytes
        unscaled: Vec<u8>,
        precision: u32,
        scale: u32,
    },
    Uuid(String),
    /// Days since Unix epoch
    Date(i32),
    /// Milliseconds after midnight
    TimeMillis(i32),
    /// Microseconds after midnight
    TimeMicros(i64),
    TimestampMillis(i64),
    TimestampMicros(i64),
    LocalTimestampMillis(i64),
    LocalTimestampMicros(i64),
    Duration {
        months: u32,
        days: u32,
        milliseconds: u32,
    },
}

impl AvroValue {
    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&AvroValue> {
        match self {
            AvroValue::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Strip union wrappers down to the selected branch value.
    pub fn unwrap_union(&self) -> &AvroValue {
        match self {
            AvroValue::Union(_, inner) => inner.unwrap_union(),
            other => other,
        }
    }

    /// Convert to JSON.
    ///
    /// Unions print as their branch value, enums as their symbol, bytes and
    /// fixed as base64, decimals as exact decimal strings. Non-finite floats
    /// have no JSON representation and become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            AvroValue::Null => Value::Null,
            AvroValue::Boolean(b) => Value::Bool(*b),
            AvroValue::Int(i) | AvroValue::Date(i) | AvroValue::TimeMillis(i) => json!(i),
            AvroValue::Long(l)
            | AvroValue::TimeMicros(l)
            | AvroValue::TimestampMillis(l)
            | AvroValue::TimestampMicros(l)
            | AvroValue::LocalTimestampMillis(l)
            | AvroValue::LocalTimestampMicros(l) => json!(l),
            AvroValue::Float(f) => Number::from_f64(*f as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AvroValue::Double(d) => Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AvroValue::Bytes(b) | AvroValue::Fixed(b) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            AvroValue::String(s) | AvroValue::Uuid(s) => Value::String(s.clone()),
            AvroValue::Enum(_, symbol) => Value::String(symbol.clone()),
            AvroValue::Record(entries) | AvroValue::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json());
                }
                Value::Object(map)
            }
            AvroValue::Array(items) => Value::Array(items.iter().map(AvroValue::to_json).collect()),
            AvroValue::Union(_, value) => value.to_json(),
            AvroValue::Decimal {
                unscaled, scale, ..
            } => Value::String(decimal_to_string(unscaled, *scale)),
            AvroValue::Duration {
                months,
                days,
                milliseconds,
            } => json!({
                "months": months,
                "days": days,
                "milliseconds": milliseconds
            }),
        }
    }
}

/// Largest scale rendered as plain digits (`i128::MAX` has 39)
const MAX_PLAIN_SCALE: u32 = 39;

/// Render big-endian two's complement decimal bytes with `scale` fraction digits.
///
/// Values wider than 128 bits cannot be rendered exactly and are shown as
/// hex of the unscaled bytes. Scales beyond the digits an `i128` can hold
/// are shown in exponent form rather than padded with zeros.
fn decimal_to_string(bytes: &[u8], scale: u32) -> String {
    if bytes.is_empty() {
        return "0".to_string();
    }
    if bytes.len() > 16 {
        let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        return format!("0x{}e-{}", hex, scale);
    }

    let negative = bytes[0] & 0x80 != 0;
    let mut value: i128 = if negative { -1 } else { 0 };
    for &byte in bytes {
        value = (value << 8) | byte as i128;
    }

    if scale == 0 {
        return value.to_string();
    }
    if scale > MAX_PLAIN_SCALE {
        return format!("{}e-{}", value, scale);
    }

    let digits = value.unsigned_abs().to_string();
    let scale = scale as usize;
    let padded = if digits.len() <= scale {
        format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    let sign = if negative { "-" } else { "" };
    format!("{}{}.{}", sign, int_part, frac_part)
}

// ============================================================================
// Complex Type Decoders
// ============================================================================

/// Decode an enum value, returning (index, symbol).
#[inline]
pub fn decode_enum(data: &mut &[u8], schema: &EnumSchema) -> Result<(i32, String), DecodeError> {
    let index = decode_int(data)?;
    match usize::try_from(index).ok().and_then(|i| schema.symbols.get(i)) {
        Some(symbol) => Ok((index, symbol.clone())),
        None => Err(DecodeError::InvalidData(format!(
            "Enum index {} out of range for enum '{}' with {} symbols",
            index,
            schema.name.name,
            schema.symbols.len()
        ))),
    }
}

/// Read the item count of the next array/map block.
///
/// A negative count means the block also carries its byte size, which is
/// read and discarded. Returns 0 at the end of the array/map.
fn decode_block_count(data: &mut &[u8]) -> Result<usize, DecodeError> {
    let count = decode_long(data)?;
    if count < 0 {
        let _byte_size = decode_long(data)?;
    }
    usize::try_from(count.unsigned_abs())
        .map_err(|_| DecodeError::InvalidData(format!("Block count {} too large", count)))
}

/// Default limit on records, arrays and maps nested inside one value
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default limit on array items that occupy no bytes, per value
pub const DEFAULT_MAX_ZERO_WIDTH_ITEMS: usize = 1 << 20;

/// Depth budget for nested values.
///
/// Recursive schemas let a small payload describe arbitrarily deep values,
/// so each record, array or map entered spends one unit of the budget.
#[derive(Debug, Clone, Copy)]
pub struct RecursionCounter {
    limit: usize,
    remaining: usize,
}

impl RecursionCounter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    /// Descend one level.
    ///
    /// # Errors
    /// `DecodeError::RecursionLimitExceeded` once the budget is spent.
    pub fn try_enter(&mut self) -> Result<(), DecodeError> {
        if self.remaining == 0 {
            return Err(DecodeError::RecursionLimitExceeded(self.limit));
        }
        self.remaining -= 1;
        Ok(())
    }

    pub fn exit(&mut self) {
        self.remaining = (self.remaining + 1).min(self.limit);
    }

    /// Levels currently entered.
    pub fn depth(&self) -> usize {
        self.limit - self.remaining
    }
}

/// Decoder for values of one writer schema.
///
/// Resolves `Named` references through a [`SchemaResolutionContext`] and
/// enforces a nesting limit and a limit on zero-width array items (`null`,
/// empty records, `fixed` of size 0), which would otherwise let a few bytes
/// declare billions of values. The item budget is shared by every value
/// decoded with the same decoder.
#[derive(Debug)]
pub struct ValueDecoder<'a> {
    context: &'a SchemaResolutionContext,
    recursion: RecursionCounter,
    max_zero_width_items: usize,
    zero_width_items: usize,
}

impl<'a> ValueDecoder<'a> {
    /// Decoder with the default limits.
    pub fn new(context: &'a SchemaResolutionContext) -> Self {
        Self::with_limits(context, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ZERO_WIDTH_ITEMS)
    }

    pub fn with_limits(
        context: &'a SchemaResolutionContext,
        max_depth: usize,
        max_zero_width_items: usize,
    ) -> Self {
        Self {
            context,
            recursion: RecursionCounter::new(max_depth),
            max_zero_width_items,
            zero_width_items: 0,
        }
    }

    /// Decode any Avro value.
    pub fn decode(&mut self, data: &mut &[u8], schema: &AvroSchema) -> Result<AvroValue, DecodeError> {
        Ok(match schema {
            AvroSchema::Null => AvroValue::Null,
            AvroSchema::Boolean => AvroValue::Boolean(decode_boolean(data)?),
            AvroSchema::Int => AvroValue::Int(decode_int(data)?),
            AvroSchema::Long => AvroValue::Long(decode_long(data)?),
            AvroSchema::Float => AvroValue::Float(decode_float(data)?),
            AvroSchema::Double => AvroValue::Double(decode_double(data)?),
            AvroSchema::Bytes => AvroValue::Bytes(decode_bytes(data)?),
            AvroSchema::String => AvroValue::String(decode_string(data)?),

            AvroSchema::Record(record) => AvroValue::Record(self.decode_record(data, record)?),
            AvroSchema::Enum(enum_schema) => {
                let (index, symbol) = decode_enum(data, enum_schema)?;
                AvroValue::Enum(index, symbol)
            }
            AvroSchema::Array(items) => AvroValue::Array(self.decode_array(data, items)?),
            AvroSchema::Map(values) => AvroValue::Map(self.decode_map(data, values)?),
            AvroSchema::Union(variants) => {
                let (index, value) = self.decode_union(data, variants)?;
                AvroValue::Union(index, Box::new(value))
            }
            AvroSchema::Fixed(fixed) => AvroValue::Fixed(decode_fixed(data, fixed.size)?),

            AvroSchema::Named(name) => {
                let context = self.context;
                let resolved = context.get(name).ok_or_else(|| {
                    DecodeError::InvalidData(format!(
                        "Unresolved named type reference: '{}'",
                        name
                    ))
                })?;
                return self.decode(data, resolved);
            }

            AvroSchema::Logical(logical) => {
                decode_logical_value(data, &logical.logical_type, &logical.base)?
            }
        })
    }

    /// Run `f` one nesting level down.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        self.recursion.try_enter()?;
        let result = f(self);
        self.recursion.exit();
        result
    }

    /// Decode a record: field values in schema order, no delimiters.
    pub fn decode_record(
        &mut self,
        data: &mut &[u8],
        schema: &RecordSchema,
    ) -> Result<Vec<(String, AvroValue)>, DecodeError> {
        self.nested(|decoder| {
            let mut fields = Vec::with_capacity(schema.fields.len());
            for field in &schema.fields {
                let value = decoder.decode(data, &field.schema)?;
                fields.push((field.name.clone(), value));
            }
            Ok(fields)
        })
    }

    /// Decode an array of values.
    pub fn decode_array(
        &mut self,
        data: &mut &[u8],
        item_schema: &AvroSchema,
    ) -> Result<Vec<AvroValue>, DecodeError> {
        self.nested(|decoder| {
            let mut items = Vec::new();
            loop {
                let count = decode_block_count(data)?;
                if count == 0 {
                    break;
                }
                // Every item takes at least one byte unless it is zero-width,
                // so cap the reservation by what is left in the buffer
                items.reserve(count.min(data.len()));
                for _ in 0..count {
                    let before = data.len();
                    items.push(decoder.decode(data, item_schema)?);
                    if data.len() == before {
                        decoder.spend_zero_width_item()?;
                    }
                }
            }
            Ok(items)
        })
    }

    /// Decode a map with string keys.
    ///
    /// Every entry carries a length-prefixed key, so entries are never
    /// zero-width.
    pub fn decode_map(
        &mut self,
        data: &mut &[u8],
        value_schema: &AvroSchema,
    ) -> Result<Vec<(String, AvroValue)>, DecodeError> {
        self.nested(|decoder| {
            let mut entries = Vec::new();
            loop {
                let count = decode_block_count(data)?;
                if count == 0 {
                    break;
                }
                entries.reserve(count.min(data.len()));
                for _ in 0..count {
                    let key = decode_string(data)?;
                    let value = decoder.decode(data, value_schema)?;
                    entries.push((key, value));
                }
            }
            Ok(entries)
        })
    }

    /// Decode a union value, returning (branch index, value).
    ///
    /// A union cannot directly contain another union, so the branch value
    /// spends the depth budget instead of the union itself.
    pub fn decode_union(
        &mut self,
        data: &mut &[u8],
        variants: &[AvroSchema],
    ) -> Result<(i32, AvroValue), DecodeError> {
        let index = decode_int(data)?;
        let Some(variant) = usize::try_from(index).ok().and_then(|i| variants.get(i)) else {
            return Err(DecodeError::InvalidData(format!(
                "Union index {} out of range (0..{})",
                index,
                variants.len()
            )));
        };

        let value = self.decode(data, variant)?;
        Ok((index, value))
    }

    fn spend_zero_width_item(&mut self) -> Result<(), DecodeError> {
        if self.zero_width_items >= self.max_zero_width_items {
            return Err(DecodeError::TooManyItems(self.max_zero_width_items));
        }
        self.zero_width_items += 1;
        Ok(())
    }
}

/// Decode a value whose schema has no named type references.
pub fn decode_value(data: &mut &[u8], schema: &AvroSchema) -> Result<AvroValue, DecodeError> {
    decode_value_with_context(data, schema, &SchemaResolutionContext::new())
}

/// Decode any Avro value with the default limits, resolving `Named`
/// references through `context`.
pub fn decode_value_with_context(
    data: &mut &[u8],
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
) -> Result<AvroValue, DecodeError> {
    ValueDecoder::new(context).decode(data, schema)
}

// ============================================================================
// Logical Type Decoders
// ============================================================================

/// Decode a logical type value on top of its base encoding.
pub fn decode_logical_value(
    data: &mut &[u8],
    logical_type: &LogicalTypeName,
    base: &AvroSchema,
) -> Result<AvroValue, DecodeError> {
    let mismatch = || {
        DecodeError::InvalidData(format!(
            "Logical type '{}' cannot be stored as {}",
            logical_type.name(),
            base.to_json()
        ))
    };

    Ok(match (logical_type, base) {
        (LogicalTypeName::Decimal { precision, scale }, AvroSchema::Bytes) => AvroValue::Decimal {
            unscaled: decode_bytes(data)?,
            precision: *precision,
            scale: *scale,
        },
        (LogicalTypeName::Decimal { precision, scale }, AvroSchema::Fixed(fixed)) => {
            AvroValue::Decimal {
                unscaled: decode_fixed(data, fixed.size)?,
                precision: *precision,
                scale: *scale,
            }
        }
        (LogicalTypeName::Uuid, AvroSchema::String) => AvroValue::Uuid(decode_string(data)?),
        (LogicalTypeName::Uuid, AvroSchema::Fixed(fixed)) if fixed.size == 16 => {
            AvroValue::Uuid(format_uuid(&take_array::<16>(data)?))
        }
        (LogicalTypeName::Date, AvroSchema::Int) => AvroValue::Date(decode_int(data)?),
        (LogicalTypeName::TimeMillis, AvroSchema::Int) => {
            let millis = decode_int(data)?;
            if !(0..86_400_000).contains(&millis) {
                return Err(DecodeError::InvalidData(format!(
                    "Invalid time-millis value: {} (must be in range [0, 86400000))",
                    millis
                )));
            }
            AvroValue::TimeMillis(millis)
        }
        (LogicalTypeName::TimeMicros, AvroSchema::Long) => {
            let micros = decode_long(data)?;
            if !(0..86_400_000_000).contains(&micros) {
                return Err(DecodeError::InvalidData(format!(
                    "Invalid time-micros value: {} (must be in range [0, 86400000000))",
                    micros
                )));
            }
            AvroValue::TimeMicros(micros)
        }
        (LogicalTypeName::TimestampMillis, AvroSchema::Long) => {
            AvroValue::TimestampMillis(decode_long(data)?)
        }
        (LogicalTypeName::TimestampMicros, AvroSchema::Long) => {
            AvroValue::TimestampMicros(decode_long(data)?)
        }
        (LogicalTypeName::LocalTimestampMillis, AvroSchema::Long) => {
            AvroValue::LocalTimestampMillis(decode_long(data)?)
        }
        (LogicalTypeName::LocalTimestampMicros, AvroSchema::Long) => {
            AvroValue::LocalTimestampMicros(decode_long(data)?)
        }
        (LogicalTypeName::Duration, AvroSchema::Fixed(fixed)) if fixed.size == 12 => {
            let bytes = take_array::<12>(data)?;
            let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
            AvroValue::Duration {
                months: word(0),
                days: word(4),
                milliseconds: word(8),
            }
        }
        _ => return Err(mismatch()),
    })
}

fn format_uuid(b: &[u8; 16]) -> String {
    let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
