//! Ticket number formatting.
//!
//! A number is the service prefix followed by the day sequence, zero-padded to
//! the service's digit width: prefix `"A"`, padding `3`, sequence `7` gives
//! `A007`. Sequences wider than the padding are written in full (`A1000`).

use crate::queue::error::{QueueError, QueueResult};

pub const MAX_PADDING: i32 = 6;
pub const MAX_PREFIX_LEN: usize = 4;

pub fn format_number(prefix: &str, padding: i32, sequence: i32) -> String {
    let width = padding.max(0) as usize;
    format!("{prefix}{sequence:0width$}")
}

/// Recovers the sequence from a number issued under `prefix`.
///
/// Returns `None` for numbers issued under another prefix or with anything
/// but digits after it.
pub fn parse_sequence(prefix: &str, number: &str) -> Option<i32> {
    let digits = number.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Next sequence after the highest number already issued under `prefix`.
pub fn next_sequence<'a, I>(prefix: &str, issued: I) -> i32
where
    I: IntoIterator<Item = &'a str>,
{
    issued
        .into_iter()
        .filter_map(|number| parse_sequence(prefix, number))
        .max()
        .unwrap_or(0)
        + 1
}

pub fn validate_format(prefix: &str, padding: i32) -> QueueResult<()> {
    if prefix.is_empty() || prefix.chars().count() > MAX_PREFIX_LEN {
        return Err(QueueError::Validation(format!(
            "prefix must be 1 to {MAX_PREFIX_LEN} characters"
        )));
    }
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(QueueError::Validation(
            "prefix must be ASCII letters or digits".to_string(),
        ));
    }
    // A trailing digit would make "A1" + "01" indistinguishable from "A" + "101".
    if prefix.ends_with(|c: char| c.is_ascii_digit()) {
        return Err(QueueError::Validation(
            "prefix must not end with a digit".to_string(),
        ));
    }
    if !(1..=MAX_PADDING).contains(&padding) {
        return Err(QueueError::Validation(format!(
            "padding must be between 1 and {MAX_PADDING}"
        )));
    }
    Ok(())
}
