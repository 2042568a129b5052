//! Output renderer
//!
//! One call per command: JSON and YAML documents are rendered here, every
//! other format delegates to the command's own fallback (a table or a
//! sentence).

use miette::Result;
use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::cli::printer::Printer;
use crate::core::errors::CliError;

/// Render `value` as JSON or YAML, or run `fallback` for the default format
pub fn output_result<T, F>(p: &Printer, format: OutputFormat, value: &T, fallback: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(&Printer) -> Result<()>,
{
    match format {
        OutputFormat::Json => {
            p.output(&to_json(value)?);
            Ok(())
        }
        OutputFormat::Yaml => {
            p.output(&to_yaml(value)?);
            Ok(())
        }
        OutputFormat::None => Ok(()),
        OutputFormat::Default | OutputFormat::Pretty => fallback(p),
    }
}

/// Two-space indented JSON with a trailing newline
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    let mut out = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::decode("marshal output", e))?;
    out.push('\n');
    Ok(out)
}

/// YAML document with a trailing newline
pub fn to_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    let mut out = serde_yml::to_string(value).map_err(|e| CliError::decode("marshal output", e))?;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Fail when the API returned no body for a command that renders one
pub fn require_response<T>(value: Option<T>, what: &str) -> Result<T, CliError> {
    value.ok_or_else(|| CliError::decode(what, "response is empty"))
}
