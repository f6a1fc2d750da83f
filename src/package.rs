//! Package Validator
//!
//! Loads a data-package descriptor from a local path or remote URL,
//! validates every declared resource in declared order, and optionally runs
//! cross-resource foreign-key checks as a second pass once all per-resource
//! parses have completed. The overall verdict is the AND of the per-resource
//! verdicts: the descriptor is authoritative about which resources exist, so
//! there is no "absent" ambiguity on this path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::sync::Semaphore;

use crate::config::ValidationConfig;
use crate::engine::{CheckCode, CheckError};
use crate::error::{DescriptorError, Result, ValidationError};
use crate::http_client::HttpFetcher;
use crate::schema::{SchemaRegistry, TableSchema};
use crate::validator::{ResourceValidator, ValidationResult};

/// A parsed package descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub resources: Vec<PackageResource>,
}

/// One resource declaration inside a descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageResource {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub schema: Option<TableSchema>,
}

/// Options for a package validation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageOptions {
    /// Check declared foreign-key relations across resources.
    pub relations: bool,
}

/// Ordered per-resource results; serializes as a JSON array.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct PackageReport {
    pub results: Vec<ValidationResult>,
}

impl PackageReport {
    /// Overall package validity: AND over all entries.
    pub fn is_valid(&self) -> bool {
        self.results.iter().all(|r| r.valid)
    }
}

/// Where the descriptor itself was loaded from; resource paths resolve
/// relative to this.
#[derive(Debug, Clone)]
enum DescriptorBase {
    Local(PathBuf),
    Remote(String),
}

/// A resource whose data and schema are pinned down and ready to validate,
/// or the reason it never got that far.
#[derive(Debug, Clone)]
enum ResolvedResource {
    Ready {
        name: String,
        path: PathBuf,
        schema: Arc<TableSchema>,
    },
    Broken {
        name: String,
        reason: String,
    },
}

impl ResolvedResource {
    fn name(&self) -> &str {
        match self {
            ResolvedResource::Ready { name, .. } | ResolvedResource::Broken { name, .. } => name,
        }
    }
}

/// Validates whole data packages by descriptor URI.
pub struct PackageValidator {
    validator: Arc<ResourceValidator>,
    fetcher: Arc<HttpFetcher>,
    config: ValidationConfig,
}

impl PackageValidator {
    pub fn new(
        validator: Arc<ResourceValidator>,
        fetcher: Arc<HttpFetcher>,
        config: ValidationConfig,
    ) -> Self {
        Self {
            validator,
            fetcher,
            config,
        }
    }

    /// Validate the package identified by `uri`.
    pub async fn validate_package(
        &self,
        uri: &str,
        options: PackageOptions,
    ) -> Result<PackageReport> {
        let (descriptor, base) = self.load_descriptor(uri).await?;
        if descriptor.resources.is_empty() {
            return Err(DescriptorError::NoResources.into());
        }

        // Remote resource data lands here; lives until the relation pass is
        // done reading it.
        let staging = TempDir::new().map_err(ValidationError::Io)?;
        let resolved = self
            .resolve_resources(&descriptor.resources, &base, staging.path())
            .await;

        let mut results = self.validate_resources(&resolved).await?;

        if options.relations {
            self.check_relations(&resolved, &mut results).await?;
        }

        Ok(PackageReport { results })
    }

    /// Load and parse the package descriptor.
    async fn load_descriptor(
        &self,
        uri: &str,
    ) -> Result<(PackageDescriptor, DescriptorBase)> {
        let (raw, base) = if is_url(uri) {
            let raw = self.fetcher.fetch_text(uri).await.map_err(|e| {
                DescriptorError::Fetch {
                    uri: uri.to_string(),
                    details: e.to_string(),
                }
            })?;
            (raw, DescriptorBase::Remote(parent_url(uri)))
        } else if uri.contains("://") {
            return Err(DescriptorError::UnsupportedScheme {
                uri: uri.to_string(),
            }
            .into());
        } else {
            let path = Path::new(uri);
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DescriptorError::NotFound {
                        uri: uri.to_string(),
                    }
                } else {
                    DescriptorError::Fetch {
                        uri: uri.to_string(),
                        details: e.to_string(),
                    }
                }
            })?;
            let base = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (raw, DescriptorBase::Local(base))
        };

        let descriptor: PackageDescriptor =
            serde_json::from_str(&raw).map_err(|e| DescriptorError::Malformed {
                details: e.to_string(),
            })?;
        Ok((descriptor, base))
    }

    /// Pin each declared resource to a local file and a schema. Failures are
    /// contained per resource.
    async fn resolve_resources(
        &self,
        resources: &[PackageResource],
        base: &DescriptorBase,
        staging: &Path,
    ) -> Vec<ResolvedResource> {
        let mut resolved = Vec::with_capacity(resources.len());

        for (index, resource) in resources.iter().enumerate() {
            let name = resource.name.clone();

            let schema = match &resource.schema {
                Some(inline) => Arc::new(inline.clone()),
                None => match SchemaRegistry::shared().get(&name) {
                    Some(schema) => schema,
                    None => {
                        resolved.push(ResolvedResource::Broken {
                            name,
                            reason: "no schema declared and no built-in schema for resource"
                                .to_string(),
                        });
                        continue;
                    }
                },
            };

            let declared = resource
                .path
                .clone()
                .unwrap_or_else(|| format!("{name}.csv"));

            let path = if is_url(&declared) {
                self.stage_remote(&declared, index, &name, staging).await
            } else {
                match base {
                    DescriptorBase::Local(dir) => {
                        let candidate = if Path::new(&declared).is_absolute() {
                            PathBuf::from(&declared)
                        } else {
                            dir.join(&declared)
                        };
                        Ok(candidate)
                    }
                    DescriptorBase::Remote(base_url) => {
                        self.stage_remote(&format!("{base_url}/{declared}"), index, &name, staging)
                            .await
                    }
                }
            };

            match path {
                Ok(path) => resolved.push(ResolvedResource::Ready { name, path, schema }),
                Err(reason) => {
                    tracing::warn!(resource = %resource.name, reason, "resource data unavailable");
                    resolved.push(ResolvedResource::Broken { name, reason });
                }
            }
        }

        resolved
    }

    /// Download remote resource data into the staging directory.
    async fn stage_remote(
        &self,
        url: &str,
        index: usize,
        name: &str,
        staging: &Path,
    ) -> std::result::Result<PathBuf, String> {
        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| format!("failed to fetch {url}: {e}"))?;
        let path = staging.join(format!("{index}-{name}.csv"));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| format!("failed to stage {url}: {e}"))?;
        Ok(path)
    }

    /// First pass: validate each resource independently, in declared order,
    /// under the concurrency bound.
    async fn validate_resources(
        &self,
        resolved: &[ResolvedResource],
    ) -> Result<Vec<ValidationResult>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        let tasks: Vec<_> = resolved
            .iter()
            .cloned()
            .map(|resource| {
                let validator = Arc::clone(&self.validator);
                let semaphore = Arc::clone(&semaphore);

                tokio::spawn(async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return ValidationResult::failed(
                                resource.name(),
                                "validation pool closed",
                            );
                        }
                    };

                    match resource {
                        ResolvedResource::Broken { name, reason } => {
                            ValidationResult::failed(name, reason)
                        }
                        ResolvedResource::Ready { name, path, schema } => {
                            match tokio::time::timeout(
                                timeout,
                                validator.validate_file_with_schema(&path, &name, schema),
                            )
                            .await
                            {
                                Ok(Ok(result)) => result,
                                Ok(Err(e)) => {
                                    tracing::warn!(resource = %name, error = %e, "resource validation faulted");
                                    ValidationResult::failed(name, e.to_string())
                                }
                                Err(_) => ValidationResult::failed(
                                    name,
                                    format!("validation timed out after {}s", timeout.as_secs()),
                                ),
                            }
                        }
                    }
                })
            })
            .collect();

        try_join_all(tasks)
            .await
            .map_err(|e| ValidationError::Concurrency {
                details: format!("package task join error: {e}"),
            })
    }

    /// Second pass: every declared foreign key is checked once all parses
    /// are done. Violations attach to the referencing resource's result.
    async fn check_relations(
        &self,
        resolved: &[ResolvedResource],
        results: &mut [ValidationResult],
    ) -> Result<()> {
        for (index, resource) in resolved.iter().enumerate() {
            let ResolvedResource::Ready { name, path, schema } = resource else {
                continue;
            };
            if schema.foreign_keys.is_empty() {
                continue;
            }

            let mut relation_errors = Vec::new();
            for fk in &schema.foreign_keys {
                let target_name = if fk.reference.resource.is_empty() {
                    name.as_str()
                } else {
                    fk.reference.resource.as_str()
                };

                let Some(target) = resolved.iter().find(|r| r.name() == target_name) else {
                    relation_errors.push(
                        CheckError::new(
                            CheckCode::ForeignKeyError,
                            format!("referenced resource '{target_name}' is not declared"),
                        )
                        .in_field(fk.fields.join(", ")),
                    );
                    continue;
                };
                let ResolvedResource::Ready {
                    path: target_path, ..
                } = target
                else {
                    relation_errors.push(
                        CheckError::new(
                            CheckCode::ForeignKeyError,
                            format!("referenced resource '{target_name}' has no readable data"),
                        )
                        .in_field(fk.fields.join(", ")),
                    );
                    continue;
                };

                let referencing = self.collect(path, &fk.fields).await;
                let referenced = self.collect(target_path, &fk.reference.fields).await;

                let (Some(referencing), Some(referenced)) = (referencing, referenced) else {
                    // Missing columns were already reported by the first
                    // pass; nothing to cross-check.
                    continue;
                };

                let known: HashSet<String> = referenced
                    .into_iter()
                    .filter(|(_, key)| key.iter().any(|part| !part.is_empty()))
                    .map(|(_, key)| key.join("\u{1f}"))
                    .collect();

                for (row, key) in referencing {
                    // Empty referencing cells are a required/type concern of
                    // the first pass, not a dangling reference.
                    if key.iter().any(|part| part.is_empty()) {
                        continue;
                    }
                    if !known.contains(&key.join("\u{1f}")) {
                        relation_errors.push(
                            CheckError::new(
                                CheckCode::ForeignKeyError,
                                format!(
                                    "value '{}' not found in {}.{}",
                                    key.join(", "),
                                    target_name,
                                    fk.reference.fields.join(", ")
                                ),
                            )
                            .at_row(row)
                            .in_field(fk.fields.join(", ")),
                        );
                    }
                }
            }

            results[index].attach_relation_errors(relation_errors);
        }

        Ok(())
    }

    /// Read key columns off the blocking pool; unreadable data degrades to
    /// "nothing to check" since the first pass already reported it.
    async fn collect(&self, path: &Path, fields: &[String]) -> Option<Vec<(u64, Vec<String>)>> {
        let engine = self.validator.engine().clone();
        let path = path.to_path_buf();
        let fields = fields.to_vec();
        match tokio::task::spawn_blocking(move || engine.collect_key_values(&path, &fields)).await {
            Ok(Ok(values)) => values,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "key column read failed during relation pass");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "relation pass task join error");
                None
            }
        }
    }
}

fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Base URL of a descriptor URL: everything up to the final path segment.
fn parent_url(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((base, _)) if base.len() > "https:/".len() => base.to_string(),
        _ => url.to_string(),
    }
}
