//! Field validation for incident requests.
//!
//! Every check here is pure: nothing touches the store, so a request that
//! fails validation never mutates anything.

use incident_types::{NoteType, Severity, Status};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::LifecycleError;

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 255;
pub const NOTE_MIN_CHARS: usize = 1;
pub const NOTE_MAX_CHARS: usize = 1000;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("email regex must compile")
    })
}

/// Whether an author email counts as supplied. Blank strings do not.
pub fn is_supplied(email: &str) -> bool {
    !email.trim().is_empty()
}

/// Checks the syntactic shape of an email address. No host lookup.
pub fn validate_email(email: &str) -> Result<(), LifecycleError> {
    if email_re().is_match(email) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidEmail(email.to_string()))
    }
}

/// Title length is counted in characters, not bytes.
pub fn validate_title(title: &str) -> Result<(), LifecycleError> {
    let len = title.chars().count();
    if title.trim().is_empty() {
        return Err(LifecycleError::InvalidInput("title is required".to_string()));
    }
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&len) {
        return Err(LifecycleError::InvalidInput(format!(
            "title must be {TITLE_MIN_CHARS}-{TITLE_MAX_CHARS} characters, got {len}"
        )));
    }
    Ok(())
}

pub fn validate_note_content(content: &str) -> Result<(), LifecycleError> {
    let len = content.chars().count();
    if !(NOTE_MIN_CHARS..=NOTE_MAX_CHARS).contains(&len) {
        return Err(LifecycleError::InvalidNote(format!(
            "content must be {NOTE_MIN_CHARS}-{NOTE_MAX_CHARS} characters, got {len}"
        )));
    }
    Ok(())
}

pub fn parse_severity(raw: &str) -> Result<Severity, LifecycleError> {
    raw.parse()
        .map_err(|_| LifecycleError::InvalidSeverity(raw.to_string()))
}

pub fn parse_status(raw: &str) -> Result<Status, LifecycleError> {
    raw.parse()
        .map_err(|_| LifecycleError::InvalidStatus(raw.to_string()))
}

pub fn parse_note_type(raw: &str) -> Result<NoteType, LifecycleError> {
    raw.parse()
        .map_err(|e: incident_types::ParseEnumError| LifecycleError::InvalidNote(e.to_string()))
}
