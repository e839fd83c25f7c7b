//! Strict `HH:MM:SS` timestamp handling.
//!
//! Every vision-facing tool exchanges timestamps in this exact format.
//! Partial seconds (`00:00:27,920`), fractional seconds, and sentinel tokens
//! like `END` are rejected rather than coerced.

use crate::error::{GlimtError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum number of timestamps the critic tool accepts.
pub const MAX_CRITIC_TIMESTAMPS: usize = 9;

fn hms_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{2}):([0-5]\d):([0-5]\d)$").expect("valid regex"))
}

/// Parse a strict `HH:MM:SS` timestamp into milliseconds.
pub fn parse_hms(timestamp: &str) -> Result<u64> {
    let captures = hms_pattern().captures(timestamp).ok_or_else(|| {
        GlimtError::InvalidInput(format!(
            "Timestamp '{}' is not in HH:MM:SS format",
            timestamp
        ))
    })?;

    // The pattern guarantees two-digit numeric groups.
    let hours: u64 = captures[1].parse().expect("digits");
    let minutes: u64 = captures[2].parse().expect("digits");
    let seconds: u64 = captures[3].parse().expect("digits");

    Ok((hours * 3600 + minutes * 60 + seconds) * 1000)
}

/// Parse a pipe-delimited timestamp list as accepted by the critic tool.
///
/// Rejects empty input, sentinel-only input (`END`), lists of more than
/// [`MAX_CRITIC_TIMESTAMPS`] entries, and any entry that is not strict
/// `HH:MM:SS`.
pub fn parse_timestamp_list(input: &str) -> Result<Vec<u64>> {
    let entries: Vec<&str> = input.split('|').map(str::trim).collect();

    if entries.is_empty() || entries[0].is_empty() || entries[0] == "END" {
        return Err(GlimtError::InvalidInput(
            "Timestamp list is empty or starts with a sentinel".to_string(),
        ));
    }
    if entries.len() > MAX_CRITIC_TIMESTAMPS {
        return Err(GlimtError::InvalidInput(format!(
            "Timestamp list has {} entries; at most {} are allowed",
            entries.len(),
            MAX_CRITIC_TIMESTAMPS
        )));
    }

    entries.iter().map(|entry| parse_hms(entry)).collect()
}

/// Format seconds as an `HH:MM:SS` timestamp string.
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}
