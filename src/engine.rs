//! CSV Schema-Conformance Engine
//!
//! Validates one CSV stream against one [`TableSchema`] and reports
//! structured diagnostics. Ordinary conformance violations (missing columns,
//! bad cell types, duplicate keys) are data in the returned report; only
//! unrecoverable conditions (unreadable input, broken CSV framing) surface
//! as [`EngineError`].
//!
//! Checks performed, in order:
//! - header row present and free of blank cells
//! - every schema-declared column present (undeclared columns are warnings)
//! - row arity matches the header
//! - per-cell type conformance (integer, number, boolean, date, time,
//!   datetime, email, uri)
//! - required cells are non-empty
//! - unique columns (including a single-column primary key) hold no
//!   duplicates

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::schema::{FieldType, TableSchema};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"));

static URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:\S+$").expect("valid uri pattern"));

/// Machine-readable diagnostic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckCode {
    /// Header row is missing, empty, or contains a blank cell.
    BlankHeader,
    /// A schema-declared column is absent from the header.
    MissingHeader,
    /// A header column is not declared by the schema (warning).
    ExtraHeader,
    /// A data row has more or fewer cells than the header.
    RaggedRow,
    /// A cell does not conform to its declared field type.
    TypeError,
    /// A required cell is empty.
    RequiredError,
    /// A unique column holds a duplicated value.
    UniqueError,
    /// A foreign-key value has no match in the referenced resource.
    ForeignKeyError,
    /// The underlying CSV record could not be read.
    SourceError,
}

/// One structured diagnostic entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckError {
    pub code: CheckCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl CheckError {
    pub fn new(code: CheckCode, message: impl Into<String>) -> Self {
        Self {
            code,
            row: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn at_row(mut self, row: u64) -> Self {
        self.row = Some(row);
        self
    }

    pub fn in_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Outcome of checking one stream against one schema.
#[derive(Debug, Clone, Default)]
pub struct EngineReport {
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckError>,
    /// True when the diagnostic cap was reached and scanning stopped early.
    pub truncated: bool,
}

impl EngineReport {
    pub fn is_conformant(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// The conformance engine. Cheap to clone; holds only limits.
#[derive(Debug, Clone)]
pub struct CsvEngine {
    /// Cap on collected diagnostics per stream, so a pathological file
    /// cannot balloon a response body.
    max_diagnostics: usize,
}

impl Default for CsvEngine {
    fn default() -> Self {
        Self {
            max_diagnostics: 1000,
        }
    }
}

impl CsvEngine {
    pub fn new(max_diagnostics: usize) -> Self {
        Self {
            max_diagnostics: max_diagnostics.max(1),
        }
    }

    /// Validate the CSV file at `path` against `schema`.
    pub fn validate_path(
        &self,
        path: &Path,
        schema: &TableSchema,
    ) -> Result<EngineReport, EngineError> {
        let file = File::open(path).map_err(|e| EngineError::Unreadable {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        self.validate_reader(file, schema)
    }

    /// Validate a CSV stream against `schema`.
    pub fn validate_reader<R: Read>(
        &self,
        input: R,
        schema: &TableSchema,
    ) -> Result<EngineReport, EngineError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
        let mut report = EngineReport::default();

        let headers = reader.headers().map_err(EngineError::from)?.clone();

        if headers.iter().all(|h| h.trim().is_empty()) {
            report.errors.push(CheckError::new(
                CheckCode::BlankHeader,
                "header row is empty or missing",
            ));
            return Ok(report);
        }

        let mut columns: HashMap<&str, usize> = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            let name = name.trim();
            if name.is_empty() {
                report.errors.push(
                    CheckError::new(
                        CheckCode::BlankHeader,
                        format!("header cell {} is blank", idx + 1),
                    )
                    .at_row(1),
                );
                continue;
            }
            columns.entry(name).or_insert(idx);
        }

        for field in &schema.fields {
            if !columns.contains_key(field.name.as_str()) {
                report.errors.push(
                    CheckError::new(
                        CheckCode::MissingHeader,
                        format!("column '{}' declared by the schema is missing", field.name),
                    )
                    .in_field(&field.name),
                );
            }
        }
        for name in columns.keys() {
            if schema.field(name).is_none() {
                report.warnings.push(
                    CheckError::new(
                        CheckCode::ExtraHeader,
                        format!("column '{name}' is not declared by the schema"),
                    )
                    .in_field(*name),
                );
            }
        }

        // Columns that must hold distinct values, with the values seen so far.
        let mut seen: HashMap<&str, HashSet<String>> = schema
            .fields
            .iter()
            .filter(|f| schema.is_unique_column(&f.name))
            .map(|f| (f.name.as_str(), HashSet::new()))
            .collect();

        let expected_len = headers.len();
        for (index, record) in reader.records().enumerate() {
            if report.errors.len() >= self.max_diagnostics {
                report.truncated = true;
                break;
            }
            // Header is row 1; data rows start at 2.
            let row = index as u64 + 2;

            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    report.errors.push(
                        CheckError::new(CheckCode::SourceError, e.to_string()).at_row(row),
                    );
                    continue;
                }
            };

            if record.len() != expected_len {
                report.errors.push(
                    CheckError::new(
                        CheckCode::RaggedRow,
                        format!(
                            "row has {} cells, header has {}",
                            record.len(),
                            expected_len
                        ),
                    )
                    .at_row(row),
                );
            }

            for field in &schema.fields {
                let Some(&idx) = columns.get(field.name.as_str()) else {
                    continue;
                };
                let cell = record.get(idx).unwrap_or("").trim();

                if cell.is_empty() {
                    if schema.is_required_column(&field.name) {
                        report.errors.push(
                            CheckError::new(
                                CheckCode::RequiredError,
                                format!("required column '{}' is empty", field.name),
                            )
                            .at_row(row)
                            .in_field(&field.name),
                        );
                    }
                    continue;
                }

                if !cell_conforms(cell, field.field_type) {
                    report.errors.push(
                        CheckError::new(
                            CheckCode::TypeError,
                            format!("value '{}' is not a valid {}", cell, field.field_type),
                        )
                        .at_row(row)
                        .in_field(&field.name),
                    );
                }

                if let Some(values) = seen.get_mut(field.name.as_str())
                    && !values.insert(cell.to_string())
                {
                    report.errors.push(
                        CheckError::new(
                            CheckCode::UniqueError,
                            format!("duplicate value '{}' in unique column '{}'", cell, field.name),
                        )
                        .at_row(row)
                        .in_field(&field.name),
                    );
                }
            }
        }

        Ok(report)
    }

    /// Collect `(row, key)` tuples for the named columns of a CSV file.
    ///
    /// Returns `None` when any requested column is absent from the header
    /// (already reported as `missing-header` by the conformance pass).
    /// Unreadable records are skipped; they too were already reported.
    pub fn collect_key_values(
        &self,
        path: &Path,
        fields: &[String],
    ) -> Result<Option<Vec<(u64, Vec<String>)>>, EngineError> {
        let file = File::open(path).map_err(|e| EngineError::Unreadable {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let headers = reader.headers().map_err(EngineError::from)?.clone();

        let mut indices = Vec::with_capacity(fields.len());
        for field in fields {
            match headers.iter().position(|h| h.trim() == field) {
                Some(idx) => indices.push(idx),
                None => return Ok(None),
            }
        }

        let mut values = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let row = index as u64 + 2;
            let Ok(record) = record else {
                continue;
            };
            let key: Vec<String> = indices
                .iter()
                .map(|&idx| record.get(idx).unwrap_or("").trim().to_string())
                .collect();
            values.push((row, key));
        }
        Ok(Some(values))
    }
}

/// Whether a non-empty cell conforms to the declared field type.
fn cell_conforms(cell: &str, field_type: FieldType) -> bool {
    match field_type {
        FieldType::Any | FieldType::String => true,
        FieldType::Integer => cell.parse::<i64>().is_ok(),
        FieldType::Number => cell.parse::<f64>().is_ok(),
        FieldType::Boolean => matches!(
            cell.to_ascii_lowercase().as_str(),
            "true" | "false" | "1" | "0"
        ),
        FieldType::Date => NaiveDate::parse_from_str(cell, "%Y-%m-%d").is_ok(),
        FieldType::Time => {
            NaiveTime::parse_from_str(cell, "%H:%M:%S").is_ok()
                || NaiveTime::parse_from_str(cell, "%H:%M").is_ok()
        }
        FieldType::DateTime => {
            DateTime::parse_from_rfc3339(cell).is_ok()
                || NaiveDateTime::parse_from_str(cell, "%Y-%m-%dT%H:%M:%S").is_ok()
                || NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S").is_ok()
        }
        FieldType::Email => EMAIL_RE.is_match(cell),
        FieldType::Uri => URI_RE.is_match(cell),
    }
}
