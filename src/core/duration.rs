//! Duration grammar used by the session time limit
//!
//! A duration is one or more `<int><unit>` terms (`5h30m`, `90s`, `250ms`)
//! with units `h`, `m`, `s`, `ms`, `us` (or `µs`) and `ns`. The token `1d`
//! stands for one day and is normalised to `24h` before it is stored.

use std::time::Duration;
use thiserror::Error;

/// Longest accepted session time limit
pub const MAX_SESSION_TIME_LIMIT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("must not be empty")]
    Empty,

    #[error("unrecognised suffix {0:?}, use one of h, m, s, ms, us, ns")]
    UnrecognisedSuffix(String),

    #[error("missing unit after {0:?}")]
    MissingUnit(String),

    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("out of range, must be greater than 0 and at most 24h")]
    OutOfRange,
}

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "h" => 3_600_000_000_000,
        "m" => 60_000_000_000,
        "s" => 1_000_000_000,
        "ms" => 1_000_000,
        "us" | "µs" => 1_000,
        "ns" => 1,
        _ => return None,
    })
}

/// Parse a duration expression into a `Duration`
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DurationError::Empty);
    }
    if input == "1d" {
        return Ok(MAX_SESSION_TIME_LIMIT);
    }

    let mut total: u128 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return Err(DurationError::Invalid(input.to_string()));
        }
        let (digits, tail) = rest.split_at(digits_end);
        let value: u128 = digits
            .parse()
            .map_err(|_| DurationError::Invalid(input.to_string()))?;

        let unit_end = tail.find(|c: char| c.is_ascii_digit()).unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(digits.to_string()));
        }
        let nanos = unit_nanos(unit).ok_or_else(|| DurationError::UnrecognisedSuffix(unit.to_string()))?;

        total = total
            .checked_add(value.saturating_mul(nanos))
            .ok_or(DurationError::OutOfRange)?;
        rest = next;
    }

    let secs = u64::try_from(total / 1_000_000_000).map_err(|_| DurationError::OutOfRange)?;
    // remainder is always < 1e9
    let sub_nanos = (total % 1_000_000_000) as u32;
    Ok(Duration::new(secs, sub_nanos))
}

/// Validate a session time limit, returning the string to persist
///
/// `1d` becomes `24h`; any other accepted input is stored as typed.
pub fn normalize_session_time_limit(input: &str) -> Result<String, DurationError> {
    let trimmed = input.trim();
    let duration = parse_duration(trimmed)?;
    if duration.is_zero() || duration > MAX_SESSION_TIME_LIMIT {
        return Err(DurationError::OutOfRange);
    }
    if trimmed == "1d" {
        return Ok("24h".to_string());
    }
    Ok(trimmed.to_string())
}
