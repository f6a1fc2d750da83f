//! Shared fixtures for the integration test suite.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

use validate_hsds::schema::{FieldType, SchemaRegistry, TableSchema};

/// Build an in-memory zip archive from `(entry name, contents)` pairs.
#[allow(dead_code)]
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = SimpleFileOptions::default();
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// A conformant CSV sample for a registered resource: every declared column,
/// plus `rows` data rows with type-appropriate values and distinct ids.
#[allow(dead_code)]
pub fn sample_csv(resource: &str, rows: usize) -> String {
    let schema = SchemaRegistry::shared()
        .get(resource)
        .unwrap_or_else(|| panic!("no built-in schema for {resource}"));
    sample_csv_for_schema(&schema, rows)
}

#[allow(dead_code)]
pub fn sample_csv_for_schema(schema: &TableSchema, rows: usize) -> String {
    let mut csv = schema
        .fields
        .iter()
        .map(|f| f.name.clone())
        .collect::<Vec<_>>()
        .join(",");
    csv.push('\n');

    for row in 0..rows {
        let cells: Vec<String> = schema
            .fields
            .iter()
            .map(|field| {
                if schema.is_unique_column(&field.name) {
                    return format!("{}-{row}", field.name);
                }
                // Optional columns (most foreign keys included) stay empty.
                if !schema.is_required_column(&field.name) {
                    return String::new();
                }
                sample_cell(field.field_type)
            })
            .collect();
        csv.push_str(&cells.join(","));
        csv.push('\n');
    }
    csv
}

#[allow(dead_code)]
fn sample_cell(field_type: FieldType) -> String {
    match field_type {
        FieldType::Any | FieldType::String => "sample".to_string(),
        FieldType::Integer => "7".to_string(),
        FieldType::Number => "1.5".to_string(),
        FieldType::Boolean => "true".to_string(),
        FieldType::Date => "2023-06-01".to_string(),
        FieldType::Time => "09:00".to_string(),
        FieldType::DateTime => "2023-06-01T09:00:00".to_string(),
        FieldType::Email => "sample@example.org".to_string(),
        FieldType::Uri => "https://example.org/sample".to_string(),
    }
}

/// The same sample with one named column dropped from header and rows alike.
#[allow(dead_code)]
pub fn sample_csv_without_column(resource: &str, column: &str) -> String {
    let schema = SchemaRegistry::shared()
        .get(resource)
        .unwrap_or_else(|| panic!("no built-in schema for {resource}"));
    let keep: Vec<usize> = schema
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.name != column)
        .map(|(idx, _)| idx)
        .collect();
    assert!(keep.len() < schema.fields.len(), "column {column} not in schema");

    sample_csv(resource, 1)
        .lines()
        .map(|line| {
            let cells: Vec<&str> = line.split(',').collect();
            keep.iter()
                .map(|&idx| cells[idx])
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

/// Encode multipart/form-data fields; returns `(content type, body)`.
#[allow(dead_code)]
pub fn multipart_body(fields: &[(&str, &[u8])]) -> (String, Vec<u8>) {
    let boundary = "hsds-integration-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
