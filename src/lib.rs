//! # validate-hsds Library
//!
//! Validates Open Referral (HSDS) CSV data resources against the catalog of
//! table schemas belonging to a data package: one uploaded stream at a time,
//! in bulk from a zip archive, or as a whole package identified by a
//! descriptor URI, with optional cross-resource foreign-key checks.

pub mod batch;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod http_client;
pub mod intake;
pub mod output;
pub mod package;
pub mod schema;
pub mod server;
pub mod validator;

pub use batch::{BatchOrchestrator, BatchReport, OutcomeSentinel, ResourceOutcome};
pub use catalog::{CATALOG, ResourceDescriptor};
pub use cli::{Cli, Command, VerbosityLevel};
pub use config::{
    AppConfig, ConfigError, IntakeConfig, NetworkConfig, ServerConfig, ValidationConfig,
};
pub use engine::{CheckCode, CheckError, CsvEngine, EngineReport};
pub use error::{DescriptorError, EngineError, IntakeError, ValidationError};
pub use http_client::HttpFetcher;
pub use intake::{ArchiveIntake, Workspace};
pub use output::Output;
pub use package::{
    PackageDescriptor, PackageOptions, PackageReport, PackageResource, PackageValidator,
};
pub use schema::{Field, FieldType, ForeignKey, SchemaRegistry, TableSchema};
pub use server::{AppState, router, serve};
pub use validator::{ResourceValidator, ValidationResult};
