//! Parsing of one CSV line into a typed record

use crate::error::{MalformedReason, MalformedRowError};

/// Number of comma-separated fields in every data row
pub const FIELD_COUNT: usize = 4;

/// One parsed input row, borrowing from the line it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    /// e.g. hospital
    pub group_primary: &'a str,
    /// e.g. diagnosis
    pub group_secondary: &'a str,
    /// e.g. treatment
    pub category: &'a str,
    /// e.g. recovery time; finite and non-negative
    pub measure: f64,
}

/// Parse `line` into a record.
///
/// Returns `Ok(None)` for a line that is empty after trimming; such lines are
/// skipped silently and are not malformed. Fields are trimmed. There is no
/// quoting: a comma always separates fields.
///
/// A line holding U+FFFD came from bytes that were not valid UTF-8 and is
/// malformed, so two rows differing only in undecodable bytes never share a
/// group.
pub fn parse_record(line: &str) -> Result<Option<Record<'_>>, MalformedRowError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    if line.contains(char::REPLACEMENT_CHARACTER) {
        return Err(MalformedRowError::new(line, MalformedReason::InvalidEncoding));
    }

    let mut fields = line.split(',').map(str::trim);
    let (Some(group_primary), Some(group_secondary), Some(category), Some(raw_measure), None) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        let found = line.split(',').count();
        return Err(MalformedRowError::new(
            line,
            MalformedReason::ColumnCount { found },
        ));
    };

    let measure = parse_measure(raw_measure).map_err(|reason| MalformedRowError::new(line, reason))?;

    Ok(Some(Record {
        group_primary,
        group_secondary,
        category,
        measure,
    }))
}

fn parse_measure(raw: &str) -> Result<f64, MalformedReason> {
    let value: f64 = raw.parse().map_err(|_| MalformedReason::InvalidMeasure {
        value: raw.to_string(),
    })?;

    if !value.is_finite() {
        return Err(MalformedReason::InvalidMeasure {
            value: raw.to_string(),
        });
    }
    if value < 0.0 {
        return Err(MalformedReason::NegativeMeasure {
            value: raw.to_string(),
        });
    }

    Ok(value)
}
