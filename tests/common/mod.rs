//! Shared helpers for building Avro container files in tests.

#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

use avrocat::reader::{encode_zigzag, AVRO_MAGIC, CODEC_KEY, SCHEMA_KEY};
use avrocat::AvroValue;

pub const SYNC: [u8; 16] = [
    0x5A, 0x17, 0xC3, 0x09, 0xEE, 0x41, 0x80, 0x2B, 0x66, 0xD4, 0x13, 0x9F, 0x70, 0x0C, 0xB8, 0x35,
];

/// Byte positions of one block inside a built file.
#[derive(Debug, Clone, Copy)]
pub struct BlockLayout {
    pub start: usize,
    pub sync_offset: usize,
    pub end: usize,
}

/// Builder for container files with the `null` codec.
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    metadata: Vec<(String, Vec<u8>)>,
    sync: [u8; 16],
    blocks: Vec<(usize, Vec<u8>)>,
}

impl ContainerBuilder {
    pub fn new(schema_json: &str) -> Self {
        Self::without_schema().metadata(SCHEMA_KEY, schema_json.as_bytes())
    }

    /// A header with no `avro.schema` entry.
    pub fn without_schema() -> Self {
        Self {
            metadata: Vec::new(),
            sync: SYNC,
            blocks: Vec::new(),
        }
    }

    pub fn metadata(mut self, key: &str, value: &[u8]) -> Self {
        self.metadata.push((key.to_string(), value.to_vec()));
        self
    }

    pub fn codec(self, codec: &str) -> Self {
        self.metadata(CODEC_KEY, codec.as_bytes())
    }

    pub fn sync(mut self, sync: [u8; 16]) -> Self {
        self.sync = sync;
        self
    }

    /// Append a block holding `values`, encoded back to back.
    pub fn block(self, values: &[AvroValue]) -> Self {
        let mut payload = Vec::new();
        for value in values {
            encode_value(value, &mut payload);
        }
        self.raw_block(values.len(), payload)
    }

    /// Append a block with an arbitrary payload and declared record count.
    pub fn raw_block(mut self, record_count: usize, payload: Vec<u8>) -> Self {
        self.blocks.push((record_count, payload));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_layout().0
    }

    pub fn build_with_layout(&self) -> (Vec<u8>, Vec<BlockLayout>) {
        let mut out = AVRO_MAGIC.to_vec();
        if !self.metadata.is_empty() {
            out.extend(encode_zigzag(self.metadata.len() as i64));
            for (key, value) in &self.metadata {
                encode_bytes(key.as_bytes(), &mut out);
                encode_bytes(value, &mut out);
            }
        }
        out.push(0);
        out.extend_from_slice(&self.sync);

        let mut layout = Vec::with_capacity(self.blocks.len());
        for (count, payload) in &self.blocks {
            let start = out.len();
            out.extend(encode_zigzag(*count as i64));
            out.extend(encode_zigzag(payload.len() as i64));
            out.extend_from_slice(payload);
            let sync_offset = out.len();
            out.extend_from_slice(&self.sync);
            layout.push(BlockLayout {
                start,
                sync_offset,
                end: out.len(),
            });
        }
        (out, layout)
    }

    /// Write the file to a fresh temporary path.
    pub fn write_temp(&self) -> NamedTempFile {
        write_temp(&self.build())
    }
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(bytes).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend(encode_zigzag(bytes.len() as i64));
    out.extend_from_slice(bytes);
}

fn encode_entries(entries: &[(String, AvroValue)], out: &mut Vec<u8>) {
    if !entries.is_empty() {
        out.extend(encode_zigzag(entries.len() as i64));
        for (key, value) in entries {
            encode_bytes(key.as_bytes(), out);
            encode_value(value, out);
        }
    }
    out.push(0);
}

/// Avro binary encoding of a value.
///
/// Decimals are written in their `bytes` form.
pub fn encode_value(value: &AvroValue, out: &mut Vec<u8>) {
    match value {
        AvroValue::Null => {}
        AvroValue::Boolean(b) => out.push(*b as u8),
        AvroValue::Int(i) | AvroValue::Date(i) | AvroValue::TimeMillis(i) => {
            out.extend(encode_zigzag(*i as i64))
        }
        AvroValue::Long(l)
        | AvroValue::TimeMicros(l)
        | AvroValue::TimestampMillis(l)
        | AvroValue::TimestampMicros(l)
        | AvroValue::LocalTimestampMillis(l)
        | AvroValue::LocalTimestampMicros(l) => out.extend(encode_zigzag(*l)),
        AvroValue::Float(f) => out.extend_from_slice(&f.to_le_bytes()),
        AvroValue::Double(d) => out.extend_from_slice(&d.to_le_bytes()),
        AvroValue::Bytes(b) => encode_bytes(b, out),
        AvroValue::String(s) | AvroValue::Uuid(s) => encode_bytes(s.as_bytes(), out),
        AvroValue::Record(fields) => {
            for (_, field) in fields {
                encode_value(field, out);
            }
        }
        AvroValue::Enum(index, _) => out.extend(encode_zigzag(*index as i64)),
        AvroValue::Array(items) => {
            if !items.is_empty() {
                out.extend(encode_zigzag(items.len() as i64));
                for item in items {
                    encode_value(item, out);
                }
            }
            out.push(0);
        }
        AvroValue::Map(entries) => encode_entries(entries, out),
        AvroValue::Union(index, inner) => {
            out.extend(encode_zigzag(*index as i64));
            encode_value(inner, out);
        }
        AvroValue::Fixed(bytes) => out.extend_from_slice(bytes),
        AvroValue::Decimal { unscaled, .. } => encode_bytes(unscaled, out),
        AvroValue::Duration {
            months,
            days,
            milliseconds,
        } => {
            out.extend_from_slice(&months.to_le_bytes());
            out.extend_from_slice(&days.to_le_bytes());
            out.extend_from_slice(&milliseconds.to_le_bytes());
        }
    }
}

pub const USER_SCHEMA: &str = r#"{
    "type": "record",
    "name": "User",
    "namespace": "com.example",
    "fields": [
        {"name": "id", "type": "long"},
        {"name": "name", "type": "string"},
        {"name": "email", "type": ["null", "string"], "default": null},
        {"name": "role", "type": {"type": "enum", "name": "Role", "symbols": ["ADMIN", "USER"]}},
        {"name": "tags", "type": {"type": "array", "items": "string"}}
    ]
}"#;

/// A `User` record matching [`USER_SCHEMA`].
pub fn user(id: i64) -> AvroValue {
    let email = if id % 2 == 0 {
        AvroValue::Union(1, Box::new(AvroValue::String(format!("user{}@example.com", id))))
    } else {
        AvroValue::Union(0, Box::new(AvroValue::Null))
    };
    let role = if id == 0 {
        AvroValue::Enum(0, "ADMIN".to_string())
    } else {
        AvroValue::Enum(1, "USER".to_string())
    };
    AvroValue::Record(vec![
        ("id".to_string(), AvroValue::Long(id)),
        ("name".to_string(), AvroValue::String(format!("user-{}", id))),
        ("email".to_string(), email),
        ("role".to_string(), role),
        (
            "tags".to_string(),
            AvroValue::Array(
                (0..id % 3)
                    .map(|t| AvroValue::String(format!("t{}", t)))
                    .collect(),
            ),
        ),
    ])
}
