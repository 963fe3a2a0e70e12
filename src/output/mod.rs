//! Result reporting
//!
//! - `text`: human-readable report on stdout
//! - `json`: machine-readable report on stdout or to a file

pub mod json;
pub mod text;

use crate::config::{OutputConfig, OutputFormat};
use crate::coordinator::SelectionOutcome;
use crate::worker::WorkerReport;
use crate::Result;

/// Emit `outcome` in the configured format
///
/// `reports` is empty when the workers ran on remote nodes.
pub fn emit(
    output: &OutputConfig,
    mode: &str,
    outcome: &SelectionOutcome,
    reports: &[WorkerReport],
) -> Result<()> {
    match output.format {
        OutputFormat::Text => {
            text::print_outcome(outcome, reports);
            Ok(())
        }
        OutputFormat::Json => {
            let report = json::JsonReport::new(mode, outcome, reports);
            match output.json_path {
                Some(ref path) => {
                    json::write_json_output(path, &report, true)?;
                    tracing::info!(path = %path.display(), "JSON report written");
                    Ok(())
                }
                None => json::print_json(&report),
            }
        }
    }
}
