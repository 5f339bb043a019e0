//! Identifier synthesis for tasks and events.
//!
//! Identifiers are `<namespace>/<kind>/...-<timestamp>-<random>`. They are
//! collision resistant in practice, not guaranteed unique.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Strategy for minting task and event identifiers.
pub trait IdGenerator: Send + Sync {
    /// Identifier for a new event under `namespace`.
    fn event_id(&self, namespace: &str, type_code: &str, subject: Option<&str>) -> String;

    /// Identifier for a new asynchronously dispatched task.
    fn task_id(&self, namespace: &str) -> String;
}

/// Default strategy: UTC timestamp with milliseconds plus 8 random hex chars.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampIds;

impl TimestampIds {
    fn stamp() -> String {
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string()
    }

    fn disambiguator() -> String {
        Uuid::new_v4().simple().to_string()[..8].to_string()
    }
}

impl IdGenerator for TimestampIds {
    fn event_id(&self, namespace: &str, type_code: &str, subject: Option<&str>) -> String {
        let code = match subject {
            Some(subject) => format!("{}.{}", type_code, encode_segment(subject)),
            None => type_code.to_string(),
        };
        format!(
            "{}/event/{}-{}-{}",
            namespace.trim_end_matches('/'),
            code,
            Self::stamp(),
            Self::disambiguator()
        )
    }

    fn task_id(&self, namespace: &str) -> String {
        format!(
            "{}/task/{}-{}",
            namespace.trim_end_matches('/'),
            Self::stamp(),
            Self::disambiguator()
        )
    }
}

/// Scheme, colon, then anything without whitespace.
static URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:[^\s]+$").expect("URI pattern is valid")
});

/// Encode a free-form value for use as one identifier segment.
///
/// Unreserved characters pass through, spaces become `+`, everything else is
/// percent-encoded, so the result never breaks URI syntax.
pub fn encode_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Whether `value` has URI syntax (scheme, colon, no whitespace).
pub fn is_uri(value: &str) -> bool {
    URI_RE.is_match(value)
}

pub fn validate_uri(value: &str) -> Result<()> {
    if is_uri(value) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(value.to_string()))
    }
}
