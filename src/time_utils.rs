// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and finish-time parsing.

use crate::error::AppError;
use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a finish time given as `HH:MM:SS` or `MM:SS` into seconds.
///
/// The leading component may have any number of digits; the others must be
/// below 60.
pub fn parse_time_to_seconds(input: &str) -> Result<u32, AppError> {
    let invalid = || {
        AppError::InvalidTimeFormat(format!(
            "'{}' (expected HH:MM:SS or MM:SS)",
            input.trim()
        ))
    };

    let parts: Vec<&str> = input.trim().split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return Err(invalid());
    }

    let mut values = Vec::with_capacity(parts.len());
    for part in &parts {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        values.push(part.parse::<u32>().map_err(|_| invalid())?);
    }

    let total = match values.as_slice() {
        [minutes, seconds] => {
            if *seconds >= 60 {
                return Err(invalid());
            }
            minutes.checked_mul(60).and_then(|m| m.checked_add(*seconds))
        }
        [hours, minutes, seconds] => {
            if *minutes >= 60 || *seconds >= 60 {
                return Err(invalid());
            }
            hours
                .checked_mul(3600)
                .and_then(|h| h.checked_add(minutes * 60 + seconds))
        }
        _ => None,
    };

    total.ok_or_else(invalid)
}

/// Format seconds as `HH:MM:SS` (one hour or more) or `MM:SS`.
pub fn format_seconds_to_time(total_seconds: u32) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours >= 1 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
