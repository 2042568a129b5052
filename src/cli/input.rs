//! Input-model helpers shared by every leaf
//!
//! A leaf's `parse_input` turns clap arguments plus the global flag model
//! into a validated model. The checks here are the ones every leaf repeats:
//! project id presence, empty updates, positive limits, and payload files.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::printer::Printer;
use crate::core::errors::CliError;

/// A parsed leaf input; models embed the global flag model flattened
pub trait InputModel: Serialize + Sized {
    /// Dump the model at debug verbosity and hand it back
    fn finish(self, p: &Printer) -> Self {
        p.debug_input_model(&self);
        self
    }
}

/// Project id for a project-scoped leaf
pub fn project_id(global: &GlobalFlagModel) -> Result<String, CliError> {
    global.require_project_id().map(str::to_string)
}

/// Fail with `EmptyUpdate` unless at least one mutable field was supplied
pub fn ensure_any_set(supplied: &[bool]) -> Result<(), CliError> {
    if supplied.iter().any(|s| *s) {
        Ok(())
    } else {
        Err(CliError::EmptyUpdate)
    }
}

/// `--limit` style flags: absent, or strictly positive
pub fn positive_limit(flag: &str, value: Option<i64>) -> Result<Option<i64>, CliError> {
    match value {
        Some(n) if n < 1 => Err(CliError::flag(flag, "must be greater than 0")),
        other => Ok(other),
    }
}

/// `--page-size` style flags: at least one
pub fn page_size(flag: &str, value: i64) -> Result<i64, CliError> {
    if value < 1 {
        return Err(CliError::flag(flag, "must be greater than 0"));
    }
    Ok(value)
}

/// Decode a JSON payload supplied through a read-from-file flag
pub fn json_payload<T: DeserializeOwned>(flag: &str, raw: &str) -> Result<T, CliError> {
    serde_json::from_str(raw).map_err(|e| CliError::flag(flag, format!("encode payload: {}", e)))
}

/// Read a JSON or YAML configuration file, chosen by extension
pub fn config_file<T: DeserializeOwned>(flag: &str, path: &str) -> Result<T, CliError> {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot open configuration file {:?}", path), e))?;
    match extension.as_deref() {
        Some("json") => serde_json::from_str(&content).map_err(|e| {
            CliError::decode(format!("cannot deserialize json configuration from {:?}", path), e)
        }),
        Some("yaml") | Some("yml") => serde_yml::from_str(&content).map_err(|e| {
            CliError::decode(format!("cannot deserialize yaml configuration from {:?}", path), e)
        }),
        _ => Err(CliError::flag(
            flag,
            format!(
                "cannot determine configuration file format of {:?} by extension, must be '.json' or '.yaml'",
                path
            ),
        )),
    }
}

/// Repeated `key=value` labels
pub fn labels(arg: &str, raw: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    let mut out = BTreeMap::new();
    for label in raw {
        match label.split_once('=') {
            Some((k, v)) if !k.is_empty() && !v.contains('=') => {
                out.insert(k.to_string(), v.to_string());
            }
            _ => {
                return Err(CliError::arg(
                    arg,
                    "invalid label declaration. Must be in the form <key>=<value>",
                ))
            }
        }
    }
    Ok(out)
}

/// Reject strings longer than `max` characters
pub fn max_len(arg: &str, value: &str, max: usize) -> Result<(), CliError> {
    if value.chars().count() > max {
        return Err(CliError::arg(
            arg,
            format!("{} exceeds {} characters in length", arg, max),
        ));
    }
    Ok(())
}
