//! Command-line entry point.
//!
//! Subcommands cover the same surface as the HTTP service: single CSV
//! resources, local zip archives, and whole data packages, plus `serve` to
//! run the service itself. Exit code 0 means the verdict passed, 1 means it
//! failed, 2 means the command could not run at all.

use std::process::ExitCode;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use validate_hsds::cli::{Cli, Command, VerbosityLevel};
use validate_hsds::config::AppConfig;
use validate_hsds::output::Output;
use validate_hsds::package::PackageOptions;
use validate_hsds::server::{self, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(&cli);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(cli: &Cli) {
    let default = match cli.verbosity() {
        VerbosityLevel::Quiet => "error",
        VerbosityLevel::Normal => "warn",
        VerbosityLevel::Verbose => "info",
        VerbosityLevel::Debug => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;

    if let Command::Serve { bind: Some(bind) } = &cli.command {
        config.server.bind = bind.clone();
        config.validate().context("invalid --bind address")?;
    }
    if let Command::Archive {
        concurrency: Some(concurrency),
        ..
    } = &cli.command
    {
        anyhow::ensure!(*concurrency > 0, "--concurrency must be greater than 0");
        config.validation.max_concurrent = *concurrency;
    }

    let state = AppState::from_config(config).context("failed to assemble validators")?;
    let output = Output::new(cli.verbosity());

    match cli.command {
        Command::Serve { .. } => {
            server::serve(state).await.context("server failed")?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Csv {
            file,
            resource_type,
        } => {
            let result = state
                .validator()
                .validate_file(&file, &resource_type)
                .await
                .with_context(|| format!("failed to validate {}", file.display()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", output.format_single(&result));
            }
            Ok(verdict(result.valid))
        }

        Command::Archive { file, .. } => {
            let payload = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let report = state
                .orchestrator()
                .validate_archive(payload)
                .await
                .context("archive validation failed")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", output.format_batch(&report));
            }
            Ok(verdict(!report.any_present_invalid()))
        }

        Command::Package { uri, relations } => {
            let report = state
                .packages()
                .validate_package(&uri, PackageOptions { relations })
                .await
                .with_context(|| format!("failed to validate package {uri}"))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", output.format_package(&report));
            }
            Ok(verdict(report.is_valid()))
        }
    }
}

fn verdict(valid: bool) -> ExitCode {
    if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
