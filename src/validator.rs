//! Single Resource Validator
//!
//! The adapter between resource identities and the conformance engine:
//! resolves a resource name to its schema, drives the engine over a file or
//! an in-memory payload, and converts the engine report into the
//! [`ValidationResult`] wire shape. Engine faults (unreadable data, unknown
//! schema) come back as errors here; the orchestrators contain them so one
//! broken resource never aborts its siblings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::engine::{CheckCode, CheckError, CsvEngine, EngineReport};
use crate::error::{EngineError, Result, ValidationError};
use crate::schema::{SchemaRegistry, TableSchema};

/// Result of validating a single resource. Immutable once produced, except
/// for the relation pass appending foreign-key errors.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub resource: String,
    pub errors: Vec<CheckError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CheckError>,
}

impl ValidationResult {
    /// Build a result from an engine report.
    pub fn from_report(resource: impl Into<String>, report: EngineReport) -> Self {
        Self {
            valid: report.is_conformant(),
            resource: resource.into(),
            errors: report.errors,
            warnings: report.warnings,
        }
    }

    /// A passing result with no diagnostics.
    pub fn passed(resource: impl Into<String>) -> Self {
        Self {
            valid: true,
            resource: resource.into(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A failed result carrying a single source-level diagnostic. Used when
    /// a contained fault must stay visible to the caller.
    pub fn failed(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            resource: resource.into(),
            errors: vec![CheckError::new(CheckCode::SourceError, reason)],
            warnings: Vec::new(),
        }
    }

    /// Append foreign-key errors from the relation pass; any error flips the
    /// verdict.
    pub fn attach_relation_errors(&mut self, errors: Vec<CheckError>) {
        if errors.is_empty() {
            return;
        }
        self.valid = false;
        self.errors.extend(errors);
    }
}

/// Validates one resource at a time against its named schema.
pub struct ResourceValidator {
    engine: CsvEngine,
    registry: &'static SchemaRegistry,
}

impl ResourceValidator {
    pub fn new(engine: CsvEngine) -> Self {
        Self {
            engine,
            registry: SchemaRegistry::shared(),
        }
    }

    /// Resolve a schema by resource name.
    pub fn schema_for(&self, resource: &str) -> Result<Arc<TableSchema>> {
        self.registry
            .get(resource)
            .ok_or_else(|| {
                ValidationError::Engine(EngineError::UnknownSchema {
                    name: resource.to_string(),
                })
            })
    }

    /// Validate the file at `path` as resource `resource`.
    pub async fn validate_file(&self, path: &Path, resource: &str) -> Result<ValidationResult> {
        let schema = self.schema_for(resource)?;
        self.validate_file_with_schema(path, resource, schema).await
    }

    /// Validate the file at `path` against an explicit schema (package
    /// descriptors may carry inline schemas that differ from the built-ins).
    pub async fn validate_file_with_schema(
        &self,
        path: &Path,
        resource: &str,
        schema: Arc<TableSchema>,
    ) -> Result<ValidationResult> {
        let engine = self.engine.clone();
        let path: PathBuf = path.to_path_buf();
        let report = tokio::task::spawn_blocking(move || engine.validate_path(&path, &schema))
            .await
            .map_err(|e| ValidationError::Concurrency {
                details: format!("validation task join error: {e}"),
            })??;
        self.log_truncation(resource, &report);
        Ok(ValidationResult::from_report(resource, report))
    }

    /// Validate an in-memory payload (uploaded stream) as `resource`.
    pub async fn validate_bytes(&self, data: Vec<u8>, resource: &str) -> Result<ValidationResult> {
        let schema = self.schema_for(resource)?;
        let engine = self.engine.clone();
        let report =
            tokio::task::spawn_blocking(move || engine.validate_reader(data.as_slice(), &schema))
                .await
                .map_err(|e| ValidationError::Concurrency {
                    details: format!("validation task join error: {e}"),
                })??;
        self.log_truncation(resource, &report);
        Ok(ValidationResult::from_report(resource, report))
    }

    /// Access to the underlying engine (relation pass reads key columns).
    pub fn engine(&self) -> &CsvEngine {
        &self.engine
    }

    fn log_truncation(&self, resource: &str, report: &EngineReport) {
        if report.truncated {
            tracing::warn!(
                resource,
                errors = report.error_count(),
                "diagnostic cap reached, remaining rows not scanned"
            );
        }
    }
}
