//! Custom flag kinds
//!
//! Every kind is a clap value parser, so a bad value is rejected while the
//! command line is parsed and never reaches a command body. Optional flags
//! are declared as `Option<T>`: `None` means the user did not pass the flag
//! and no default exists, which is what partial update payloads rely on.

use chrono::{DateTime, Utc};
use clap::builder::{StringValueParser, TypedValueParser};
use ipnet::IpNet;
use std::path::Path;
use thiserror::Error;

use crate::core::duration::{self, DurationError};

/// Largest file accepted by a read-from-file flag
pub const MAX_FILE_FLAG_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("invalid UUID")]
    InvalidUuid,

    #[error("invalid UUID in list at position {0}")]
    InvalidUuidInList(usize),

    #[error("must be one of {{{}}}", .0.join(", "))]
    NotOneOf(Vec<String>),

    #[error("must be true or false")]
    NotBool,

    #[error("cannot read file {path}: {source}")]
    CannotReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read file {path}: {size} bytes exceeds the limit of {max} bytes")]
    FileTooLarge { path: String, size: u64, max: u64 },

    #[error("must be RFC3339, for example 2024-01-01T00:00:00Z")]
    NotRfc3339,

    #[error("invalid CIDR")]
    InvalidCidr,

    #[error(transparent)]
    Duration(#[from] DurationError),
}

/// 8-4-4-4-12 hex digits, any letter case
pub fn uuid(value: &str) -> Result<String, FlagError> {
    let bytes = value.as_bytes();
    if bytes.len() != 36 {
        return Err(FlagError::InvalidUuid);
    }
    for (i, b) in bytes.iter().enumerate() {
        let ok = match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        };
        if !ok {
            return Err(FlagError::InvalidUuid);
        }
    }
    uuid::Uuid::parse_str(value).map_err(|_| FlagError::InvalidUuid)?;
    Ok(value.to_string())
}

/// Comma-separated UUIDs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UuidList(pub Vec<String>);

pub fn uuid_list(value: &str) -> Result<UuidList, FlagError> {
    if value.trim().is_empty() {
        return Ok(UuidList::default());
    }
    value
        .split(',')
        .enumerate()
        .map(|(i, item)| uuid(item.trim()).map_err(|_| FlagError::InvalidUuidInList(i + 1)))
        .collect::<Result<Vec<_>, _>>()
        .map(UuidList)
}

/// One of a fixed set of literals
///
/// With `ignore_case` the value is normalised to the declared spelling.
/// The empty string is accepted only when it is one of the choices.
#[derive(Debug, Clone, Copy)]
pub struct EnumFlag {
    choices: &'static [&'static str],
    ignore_case: bool,
}

pub fn enum_flag(choices: &'static [&'static str], ignore_case: bool) -> EnumFlag {
    EnumFlag {
        choices,
        ignore_case,
    }
}

impl EnumFlag {
    pub fn parse(&self, value: &str) -> Result<String, FlagError> {
        self.choices
            .iter()
            .find(|c| {
                if self.ignore_case {
                    c.eq_ignore_ascii_case(value)
                } else {
                    **c == value
                }
            })
            .map(|c| c.to_string())
            .ok_or_else(|| {
                FlagError::NotOneOf(
                    self.choices
                        .iter()
                        .map(|c| format!("{:?}", c))
                        .collect(),
                )
            })
    }
}

/// Clap value parser for an enum flag
pub fn enum_parser(
    choices: &'static [&'static str],
    ignore_case: bool,
) -> impl TypedValueParser<Value = String> {
    let flag = enum_flag(choices, ignore_case);
    StringValueParser::new().try_map(move |value| flag.parse(&value))
}

/// Strictly `true` or `false`
pub fn enum_bool(value: &str) -> Result<bool, FlagError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(FlagError::NotBool),
    }
}

/// A literal, or `@path` to use the content of a file
pub fn read_from_file(value: &str) -> Result<String, FlagError> {
    match value.strip_prefix('@') {
        Some(path) => read_file_capped(Path::new(path), MAX_FILE_FLAG_BYTES),
        None => Ok(value.to_string()),
    }
}

fn read_file_capped(path: &Path, max: u64) -> Result<String, FlagError> {
    let display = path.display().to_string();
    let meta = std::fs::metadata(path).map_err(|source| FlagError::CannotReadFile {
        path: display.clone(),
        source,
    })?;
    if meta.len() > max {
        return Err(FlagError::FileTooLarge {
            path: display,
            size: meta.len(),
            max,
        });
    }
    std::fs::read_to_string(path).map_err(|source| FlagError::CannotReadFile {
        path: display,
        source,
    })
}

/// RFC3339 timestamp with an explicit offset, converted to UTC
pub fn date_time(value: &str) -> Result<DateTime<Utc>, FlagError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| FlagError::NotRfc3339)
}

/// IPv4 or IPv6 network in CIDR notation
pub fn cidr(value: &str) -> Result<IpNet, FlagError> {
    value.parse::<IpNet>().map_err(|_| FlagError::InvalidCidr)
}

/// Session time limit, returned in its persisted form (`1d` becomes `24h`)
pub fn session_time_limit(value: &str) -> Result<String, FlagError> {
    Ok(duration::normalize_session_time_limit(value)?)
}
