use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
    /// Show all available debugging information
    Debug,
}

/// Validate Open Referral (HSDS) CSV data resources
#[derive(Parser, Debug, Clone)]
#[command(name = "validate-hsds")]
#[command(about = "Validate Open Referral CSV resources, uploaded archives, and data packages")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Quiet mode (summaries only)
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Emit reports as JSON instead of human-readable text
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP validation service
    Serve {
        /// Socket address to bind, e.g. "0.0.0.0:8080"
        #[arg(long = "bind")]
        bind: Option<String>,
    },

    /// Validate one CSV file against a named resource schema
    Csv {
        /// CSV file to validate
        file: PathBuf,

        /// Resource name, e.g. "contact"
        #[arg(short = 't', long = "type")]
        resource_type: String,
    },

    /// Validate a local zip archive against the whole resource catalog
    Archive {
        /// Zip archive to validate
        file: PathBuf,

        /// Number of resources validated concurrently
        #[arg(long = "concurrency")]
        concurrency: Option<usize>,
    },

    /// Validate a data package identified by a descriptor URI
    Package {
        /// Descriptor location: a local path or an http(s) URL
        uri: String,

        /// Check declared foreign-key relations across resources
        #[arg(long = "relations")]
        relations: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}
