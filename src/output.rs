//! Simple Output and Reporting
//!
//! Terminal formatting for validation reports produced by the CLI surface.

use crate::batch::{BatchReport, ResourceOutcome};
use crate::cli::VerbosityLevel;
use crate::engine::CheckError;
use crate::package::PackageReport;
use crate::validator::ValidationResult;

/// Simple output formatter for human-readable results.
pub struct Output {
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_single(&self, result: &ValidationResult) -> String {
        let mut output = String::new();
        if result.valid {
            output.push_str(&format!(
                "{}  {}\n",
                self.colorize("✓ VALID", "32"),
                result.resource
            ));
        } else {
            output.push_str(&format!(
                "{}  {} - {} error{}\n",
                self.colorize("✗ INVALID", "31"),
                result.resource,
                result.errors.len(),
                if result.errors.len() == 1 { "" } else { "s" }
            ));
        }
        if self.verbosity >= VerbosityLevel::Verbose || !result.valid {
            for error in &result.errors {
                output.push_str(&format!("    {}\n", format_check_error(error)));
            }
        }
        output
    }

    pub fn format_batch(&self, report: &BatchReport) -> String {
        let mut output = String::new();
        let absent = report.len() - report.present_count();
        let invalid = report.present_count() - report.valid_count();

        output.push_str("Archive Validation Summary:\n");
        output.push_str(&format!("  Resources: {}\n", report.len()));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Valid:", "32"),
            report.valid_count()
        ));
        if invalid > 0 {
            output.push_str(&format!("  {} {}\n", self.colorize("Invalid:", "31"), invalid));
        }
        if absent > 0 {
            output.push_str(&format!("  {} {}\n", self.colorize("Absent:", "36"), absent));
        }

        if self.verbosity == VerbosityLevel::Quiet {
            return output;
        }

        output.push('\n');
        for (name, outcome) in report.iter() {
            match outcome {
                ResourceOutcome::Checked(result) if result.valid => {
                    output.push_str(&format!("{}  {}\n", self.colorize("✓ VALID", "32"), name));
                }
                ResourceOutcome::Checked(result) => {
                    output.push_str(&format!(
                        "{}  {} - {} error{}\n",
                        self.colorize("✗ INVALID", "31"),
                        name,
                        result.errors.len(),
                        if result.errors.len() == 1 { "" } else { "s" }
                    ));
                    if self.verbosity >= VerbosityLevel::Verbose {
                        for error in &result.errors {
                            output.push_str(&format!("    {}\n", format_check_error(error)));
                        }
                    }
                }
                ResourceOutcome::Faulted(sentinel) => {
                    output.push_str(&format!(
                        "{}  {} - {}\n",
                        self.colorize("⚠ ERROR", "33"),
                        name,
                        sentinel.reason
                    ));
                }
                ResourceOutcome::Absent(_) => {
                    output.push_str(&format!("{}  {}\n", self.colorize("- ABSENT", "36"), name));
                }
            }
        }
        output
    }

    pub fn format_package(&self, report: &PackageReport) -> String {
        let mut output = String::new();
        let valid = report.results.iter().filter(|r| r.valid).count();

        output.push_str("Package Validation Summary:\n");
        output.push_str(&format!("  Resources: {}\n", report.results.len()));
        output.push_str(&format!("  {} {}\n", self.colorize("Valid:", "32"), valid));
        let invalid = report.results.len() - valid;
        if invalid > 0 {
            output.push_str(&format!("  {} {}\n", self.colorize("Invalid:", "31"), invalid));
        }

        if self.verbosity == VerbosityLevel::Quiet {
            return output;
        }

        output.push('\n');
        for result in &report.results {
            output.push_str(&self.format_single(result));
        }
        output
    }
}

fn format_check_error(error: &CheckError) -> String {
    let mut parts = Vec::new();
    if let Some(row) = error.row {
        parts.push(format!("row {row}"));
    }
    if let Some(field) = &error.field {
        parts.push(format!("field '{field}'"));
    }
    if parts.is_empty() {
        error.message.clone()
    } else {
        format!("{}: {}", parts.join(", "), error.message)
    }
}
