//! Batch Orchestrator
//!
//! Drives validation of an expanded archive workspace over the whole
//! Resource Catalog: every catalog entry produces exactly one outcome, in
//! catalog order. Present files are validated concurrently under a bounded
//! semaphore; a fault while validating one resource is contained in that
//! resource's outcome and never aborts the loop. Absent files get an
//! explicit sentinel so callers can always see the full resource set.

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use tokio::sync::Semaphore;

use crate::catalog;
use crate::config::ValidationConfig;
use crate::error::{Result, ValidationError};
use crate::intake::{ArchiveIntake, Workspace};
use crate::validator::{ResourceValidator, ValidationResult};

/// Sentinel body for resources that produced no engine report.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSentinel {
    pub valid: bool,
    pub reason: String,
}

/// Outcome for one catalog resource within a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResourceOutcome {
    /// File present; the engine produced a report.
    Checked(ValidationResult),
    /// File present but validation faulted; the reason is carried in the
    /// outcome rather than only logged.
    Faulted(OutcomeSentinel),
    /// No matching file in the workspace.
    Absent(OutcomeSentinel),
}

impl ResourceOutcome {
    pub fn absent() -> Self {
        ResourceOutcome::Absent(OutcomeSentinel {
            valid: false,
            reason: "resource file not found".to_string(),
        })
    }

    pub fn faulted(reason: impl Into<String>) -> Self {
        ResourceOutcome::Faulted(OutcomeSentinel {
            valid: false,
            reason: reason.into(),
        })
    }

    /// Whether a matching file existed in the workspace.
    pub fn is_present(&self) -> bool {
        !matches!(self, ResourceOutcome::Absent(_))
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ResourceOutcome::Checked(result) if result.valid)
    }
}

/// Aggregate outcome of one archive validation: one entry per catalog
/// resource, in catalog order. Serializes to a JSON object keyed by
/// resource name.
#[derive(Debug)]
pub struct BatchReport {
    entries: Vec<(&'static str, ResourceOutcome)>,
}

impl BatchReport {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ResourceOutcome)> {
        self.entries.iter().map(|(name, outcome)| (*name, outcome))
    }

    pub fn get(&self, name: &str) -> Option<&ResourceOutcome> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn present_count(&self) -> usize {
        self.iter().filter(|(_, o)| o.is_present()).count()
    }

    pub fn valid_count(&self) -> usize {
        self.iter().filter(|(_, o)| o.is_valid()).count()
    }

    /// At least one resource file was present and none of the present ones
    /// passed. This is the condition the archive endpoint reports as failed.
    pub fn all_present_failed(&self) -> bool {
        self.present_count() > 0 && self.valid_count() == 0
    }

    /// Any present resource failed validation.
    pub fn any_present_invalid(&self) -> bool {
        self.iter().any(|(_, o)| o.is_present() && !o.is_valid())
    }
}

impl Serialize for BatchReport {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, outcome) in &self.entries {
            map.serialize_entry(name, outcome)?;
        }
        map.end()
    }
}

/// Orchestrates archive expansion and catalog-wide validation.
pub struct BatchOrchestrator {
    validator: Arc<ResourceValidator>,
    intake: ArchiveIntake,
    config: ValidationConfig,
}

impl BatchOrchestrator {
    pub fn new(
        validator: Arc<ResourceValidator>,
        intake: ArchiveIntake,
        config: ValidationConfig,
    ) -> Self {
        Self {
            validator,
            intake,
            config,
        }
    }

    /// Expand an uploaded archive and validate every catalog resource.
    ///
    /// The workspace is reclaimed before returning, on success and failure
    /// alike.
    pub async fn validate_archive(&self, payload: Vec<u8>) -> Result<BatchReport> {
        let workspace = self.intake.expand(payload).await?;
        let workspace_id = workspace.id();
        let report = self.validate_workspace(&workspace).await;

        if let Err(e) = workspace.close() {
            // Cleanup failure must not change the request outcome.
            tracing::warn!(workspace = %workspace_id, error = %e, "workspace cleanup failed");
        }
        report
    }

    /// Validate every catalog resource against the workspace contents.
    ///
    /// Resources run concurrently up to the configured bound; outcomes are
    /// assembled in catalog order regardless of completion order.
    pub async fn validate_workspace(&self, workspace: &Workspace) -> Result<BatchReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        let tasks: Vec<_> = catalog::entries()
            .map(|descriptor| {
                let validator = Arc::clone(&self.validator);
                let semaphore = Arc::clone(&semaphore);
                let path = workspace.path().join(descriptor.file_name);
                let name = descriptor.name;

                tokio::spawn(async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return (name, ResourceOutcome::faulted("validation pool closed"));
                        }
                    };

                    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                        return (name, ResourceOutcome::absent());
                    }

                    let outcome =
                        match tokio::time::timeout(timeout, validator.validate_file(&path, name))
                            .await
                        {
                            Ok(Ok(result)) => ResourceOutcome::Checked(result),
                            Ok(Err(e)) => {
                                tracing::warn!(resource = name, error = %e, "resource validation faulted");
                                ResourceOutcome::faulted(e.to_string())
                            }
                            Err(_) => {
                                tracing::warn!(resource = name, "resource validation timed out");
                                ResourceOutcome::faulted(format!(
                                    "validation timed out after {}s",
                                    timeout.as_secs()
                                ))
                            }
                        };
                    (name, outcome)
                })
            })
            .collect();

        // try_join_all preserves submission order, so the report stays in
        // catalog order no matter which task finishes first.
        let entries = try_join_all(tasks)
            .await
            .map_err(|e| ValidationError::Concurrency {
                details: format!("batch task join error: {e}"),
            })?;

        Ok(BatchReport { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use crate::engine::CsvEngine;

    const ORGANIZATION_CSV: &str = "id,name,alternate_name,description,email,url,tax_status,tax_id,year_incorporated,legal_status\n\
o1,Example Org,,Community services,,,,,,\n";

    const CONTACT_CSV: &str = "id,organization_id,service_id,service_at_location_id,name,title,department,email\n\
c1,o1,,,Jane Doe,Director,,jane@example.org\n";

    const TAXONOMY_CSV: &str = "id,name,parent_id,parent_name,vocabulary\nt1,Food,,,\n";

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
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

    fn orchestrator() -> BatchOrchestrator {
        BatchOrchestrator::new(
            Arc::new(ResourceValidator::new(CsvEngine::default())),
            ArchiveIntake::new(None, 16),
            ValidationConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_report_has_exactly_the_catalog_key_set() {
        let payload = build_zip(&[
            ("contact.csv", CONTACT_CSV.as_bytes()),
            // A file no catalog entry expects.
            ("extra_notes.csv", b"id\nx\n"),
        ]);
        let report = orchestrator().validate_archive(payload).await.unwrap();

        assert_eq!(report.len(), catalog::CATALOG.len());
        let keys: Vec<_> = report.iter().map(|(name, _)| name).collect();
        let expected: Vec<_> = catalog::entries().map(|d| d.name).collect();
        assert_eq!(keys, expected);
        assert!(report.get("extra_notes").is_none());
    }

    #[tokio::test]
    async fn test_absent_resources_get_sentinel() {
        let payload = build_zip(&[("taxonomy.csv", TAXONOMY_CSV.as_bytes())]);
        let report = orchestrator().validate_archive(payload).await.unwrap();

        assert!(report.get("taxonomy").unwrap().is_valid());
        let contact = report.get("contact").unwrap();
        assert!(!contact.is_present());
        match contact {
            ResourceOutcome::Absent(sentinel) => {
                assert!(!sentinel.valid);
                assert_eq!(sentinel.reason, "resource file not found");
            }
            other => panic!("expected Absent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_isolation_between_resources() {
        // contact.csv is not valid UTF-8, which faults the engine; the other
        // resources must be unaffected.
        let payload = build_zip(&[
            ("contact.csv", &[0xff, 0xfe, 0x00, 0x41][..]),
            ("organization.csv", ORGANIZATION_CSV.as_bytes()),
            ("taxonomy.csv", TAXONOMY_CSV.as_bytes()),
        ]);
        let report = orchestrator().validate_archive(payload).await.unwrap();

        let contact = report.get("contact").unwrap();
        assert!(contact.is_present());
        assert!(!contact.is_valid());
        assert!(report.get("organization").unwrap().is_valid());
        assert!(report.get("taxonomy").unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_invalid_resource_reports_diagnostics() {
        // Missing most declared columns.
        let payload = build_zip(&[("organization.csv", b"id,name\no1,Org\n".as_slice())]);
        let report = orchestrator().validate_archive(payload).await.unwrap();

        match report.get("organization").unwrap() {
            ResourceOutcome::Checked(result) => {
                assert!(!result.valid);
                assert!(!result.errors.is_empty());
            }
            other => panic!("expected Checked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_policy_helpers() {
        let payload = build_zip(&[("organization.csv", b"id\no1\n".as_slice())]);
        let report = orchestrator().validate_archive(payload).await.unwrap();
        assert!(report.all_present_failed());
        assert!(report.any_present_invalid());

        let payload = build_zip(&[
            ("organization.csv", ORGANIZATION_CSV.as_bytes()),
            ("contact.csv", b"id\nc1\n".as_slice()),
        ]);
        let report = orchestrator().validate_archive(payload).await.unwrap();
        assert!(!report.all_present_failed());
        assert!(report.any_present_invalid());

        let payload = build_zip(&[("organization.csv", ORGANIZATION_CSV.as_bytes())]);
        let report = orchestrator().validate_archive(payload).await.unwrap();
        assert!(!report.all_present_failed());
        assert!(!report.any_present_invalid());
    }

    #[tokio::test]
    async fn test_report_serializes_in_catalog_order() {
        let payload = build_zip(&[("taxonomy.csv", TAXONOMY_CSV.as_bytes())]);
        let report = orchestrator().validate_archive(payload).await.unwrap();

        let json = serde_json::to_string(&report).unwrap();
        let first = json.find("\"accessibility_for_disabilities\"").unwrap();
        let last = json.find("\"taxonomy\"").unwrap();
        assert!(first < last);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value.as_object().unwrap().len(),
            catalog::CATALOG.len()
        );
        assert_eq!(
            value["contact"]["reason"],
            serde_json::json!("resource file not found")
        );
        assert_eq!(value["taxonomy"]["valid"], serde_json::json!(true));
    }
}
