//! Record output formats.
//!
//! - `json`: one compact JSON document per record
//! - `tsv`: record fields separated by tabs, one record per line
//! - `debug`: the Rust debug form of the decoded value

use std::io::{self, Write};

use clap::ValueEnum;
use serde_json::Value;

use crate::reader::AvroValue;
use crate::schema::AvroSchema;

/// Column name used when the writer schema is not a record.
const VALUE_COLUMN: &str = "value";

/// How each record is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Tab-separated field values
    Tsv,
    /// Rust debug representation
    Debug,
}

/// Writes decoded records to `W` in one [`OutputFormat`].
pub struct RecordWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    /// Column names, printed before the first record when set
    pending_header: Option<Vec<String>>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            pending_header: None,
        }
    }

    /// Print a header row of column names before the first record.
    ///
    /// Only the `tsv` format has a header row.
    pub fn with_header(mut self, schema: &AvroSchema) -> Self {
        if self.format == OutputFormat::Tsv {
            self.pending_header = Some(column_names(schema));
        }
        self
    }

    /// Write the header row now if it hasn't been written.
    pub fn write_header(&mut self) -> io::Result<()> {
        if let Some(columns) = self.pending_header.take() {
            writeln!(self.writer, "{}", columns.join("\t"))?;
        }
        Ok(())
    }

    /// Write one record followed by a newline.
    pub fn write_record(&mut self, value: &AvroValue) -> io::Result<()> {
        self.write_header()?;
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.writer, &value.to_json())?;
                writeln!(self.writer)
            }
            OutputFormat::Tsv => writeln!(self.writer, "{}", tsv_line(value)),
            OutputFormat::Debug => writeln!(self.writer, "{:?}", value),
        }
    }

    /// Flush and return the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.write_header()?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Column names for the `tsv` header row.
pub fn column_names(schema: &AvroSchema) -> Vec<String> {
    match schema.as_record() {
        Some(record) => record.field_names().map(str::to_string).collect(),
        None => vec![VALUE_COLUMN.to_string()],
    }
}

/// Render a record as tab-separated fields.
///
/// A non-record value is a single column. Strings are printed bare with
/// backslash escapes for tab, newline, carriage return and backslash;
/// every other value is printed as compact JSON.
pub fn tsv_line(value: &AvroValue) -> String {
    match value.unwrap_union() {
        AvroValue::Record(fields) => fields
            .iter()
            .map(|(_, field)| tsv_field(field))
            .collect::<Vec<_>>()
            .join("\t"),
        other => tsv_field(other),
    }
}

fn tsv_field(value: &AvroValue) -> String {
    match value.to_json() {
        Value::String(s) => escape_tsv(&s),
        other => other.to_string(),
    }
}

fn escape_tsv(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out
}
