//! Input validation for API requests.
//!
//! Structural checks are per-field functions returning `Result<(), String>`;
//! handlers compose them with a `ValidationErrorBuilder` so independent
//! fields all report together. Cross-field rules are [`Refinement`]s,
//! an ordered list evaluated only after the fields they reference pass
//! their structural checks, accumulating every failure rather than
//! stopping at the first.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use super::error::ValidationErrorBuilder;

lazy_static! {
    /// Regex for validating email addresses
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)+$"
    ).unwrap();
}

/// Validate a person's display name
pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name is required".to_string());
    }

    if trimmed.len() < 2 {
        return Err("Name must be at least 2 characters".to_string());
    }

    if trimmed.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err("Email is required".to_string());
    }

    if trimmed.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < 6 {
        return Err("Password must be at least 6 characters".to_string());
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    Ok(())
}

/// Validate a student id (free-form, but required)
pub fn validate_student_id(student_id: &str) -> Result<(), String> {
    if student_id.trim().is_empty() {
        return Err("Student ID is required".to_string());
    }

    if student_id.trim().len() > 50 {
        return Err("Student ID is too long (max 50 characters)".to_string());
    }

    Ok(())
}

/// Validate a semester identifier (free-form, but required)
pub fn validate_semester(semester: &str) -> Result<(), String> {
    if semester.trim().is_empty() {
        return Err("Semester is required".to_string());
    }

    Ok(())
}

/// Validate a phone number (optional field)
pub fn validate_phone(phone: &Option<String>) -> Result<(), String> {
    if let Some(p) = phone {
        let trimmed = p.trim();
        if trimmed.is_empty() {
            return Ok(()); // Empty string treated as not supplied
        }

        if trimmed.len() < 7 {
            return Err("Phone number must be at least 7 characters".to_string());
        }

        if trimmed.len() > 15 {
            return Err("Phone number is too long (max 15 characters)".to_string());
        }
    }

    Ok(())
}

/// Validate an event title
pub fn validate_title(title: &str) -> Result<(), String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err("Title is required".to_string());
    }

    if trimmed.len() < 2 {
        return Err("Title must be at least 2 characters".to_string());
    }

    if trimmed.len() > 100 {
        return Err("Title is too long (max 100 characters)".to_string());
    }

    Ok(())
}

/// Validate an event description (optional field)
pub fn validate_description(description: &Option<String>) -> Result<(), String> {
    if let Some(d) = description {
        if d.len() > 500 {
            return Err("Description is too long (max 500 characters)".to_string());
        }
    }

    Ok(())
}

/// Validate an event location (optional field)
pub fn validate_location(location: &Option<String>) -> Result<(), String> {
    if let Some(l) = location {
        if l.len() > 200 {
            return Err("Location is too long (max 200 characters)".to_string());
        }
    }

    Ok(())
}

/// Validate a free-text message (optional field)
pub fn validate_message(message: &Option<String>) -> Result<(), String> {
    if let Some(m) = message {
        if m.len() > 500 {
            return Err("Message is too long (max 500 characters)".to_string());
        }
    }

    Ok(())
}

/// Validate a required record identifier (trimmed, non-empty)
pub fn validate_identifier(id: &str, field_name: &str) -> Result<(), String> {
    if id.trim().is_empty() {
        return Err(format!("{} is required", field_name));
    }

    Ok(())
}

/// Coerce the `year` form value to an integer.
///
/// The form submits a string; absent stays absent and is never defaulted
/// to zero. A bare JSON number is accepted too.
pub fn coerce_year(value: &Option<serde_json::Value>) -> Result<Option<i32>, String> {
    let value = match value {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(v) => v,
    };

    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<i32>()
                .map(Some)
                .map_err(|_| "Year must be a number".to_string())
        }
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|y| i32::try_from(y).ok())
            .map(Some)
            .ok_or_else(|| "Year must be a number".to_string()),
        _ => Err("Year must be a number".to_string()),
    }
}

/// Parse a calendar date from form input (date of birth)
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| "Invalid date format, expected YYYY-MM-DD".to_string())
}

/// Parse an event timestamp from form input.
///
/// Accepts RFC 3339, the datetime-local format the frontend submits, and
/// a bare date (interpreted as midnight UTC).
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).expect("midnight").and_utc());
    }

    Err("Invalid date format".to_string())
}

/// A cross-field validation rule.
///
/// `check` returns false when the rule is violated; the failure is then
/// reported on every path in `paths`, which is also what gates the rule:
/// it is skipped when any of those fields already failed a structural
/// check.
pub struct Refinement<T> {
    pub paths: &'static [&'static str],
    pub message: &'static str,
    pub check: fn(&T) -> bool,
}

/// Evaluate refinement rules in order, accumulating every failure.
pub fn run_refinements<T>(
    candidate: &T,
    rules: &[Refinement<T>],
    errors: &mut ValidationErrorBuilder,
) {
    for rule in rules {
        if rule.paths.iter().any(|path| errors.has_error(path)) {
            continue;
        }
        if !(rule.check)(candidate) {
            for path in rule.paths {
                errors.add(*path, rule.message);
            }
        }
    }
}

/// Parsed date fields of an event payload, checked as a unit.
#[derive(Debug, Clone, Copy)]
pub struct EventDates {
    pub event_date: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Validation-time reference point; a date equal to this is not in
    /// the future.
    pub now: DateTime<Utc>,
}

/// Cross-field date rules shared by event create and update.
pub const EVENT_DATE_RULES: &[Refinement<EventDates>] = &[
    Refinement {
        paths: &["startDate", "endDate"],
        message: "Start and end dates must be provided together",
        check: |d| d.start_date.is_some() == d.end_date.is_some(),
    },
    Refinement {
        paths: &["endDate"],
        message: "End date must be after start date",
        check: |d| match (d.start_date, d.end_date) {
            (Some(start), Some(end)) => end > start,
            _ => true,
        },
    },
    Refinement {
        paths: &["eventDate"],
        message: "Event date must be in the future",
        check: |d| d.event_date.map_or(true, |v| v > d.now),
    },
    Refinement {
        paths: &["startDate"],
        message: "Start date must be in the future",
        check: |d| d.start_date.map_or(true, |v| v > d.now),
    },
    Refinement {
        paths: &["endDate"],
        message: "End date must be in the future",
        check: |d| d.end_date.map_or(true, |v| v > d.now),
    },
];
