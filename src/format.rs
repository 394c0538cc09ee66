//! Named string format validators
//!
//! Implements the `format` keyword: each named validator accepts a string
//! iff it parses under the corresponding grammar. Unknown format names
//! are ignored by the caller, matching JSON-Schema tradition.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use uuid::Uuid;

/// Compiled validators for the named string formats.
pub struct FormatValidators {
    email: Regex,
    hostname: Regex,
    uri: Regex,
}

impl Default for FormatValidators {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatValidators {
    pub fn new() -> Self {
        Self {
            email: Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap(),
            hostname: Regex::new(
                r"^[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?(\.([a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?))*$",
            )
            .unwrap(),
            uri: Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").unwrap(),
        }
    }

    /// Check `value` against a named format.
    ///
    /// Returns `None` for unknown format names so the caller can skip the
    /// check instead of failing it.
    pub fn check(&self, format: &str, value: &str) -> Option<bool> {
        let ok = match format {
            "date-time" => is_datetime(value),
            "date" => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
            "time" => NaiveTime::parse_from_str(value, "%H:%M:%S%.f").is_ok(),
            "email" => self.email.is_match(value),
            "hostname" => self.hostname.is_match(value),
            "ipv4" => value.parse::<Ipv4Addr>().is_ok(),
            "ipv6" => value.parse::<Ipv6Addr>().is_ok(),
            "uri" => self.uri.is_match(value),
            "uuid" => Uuid::parse_str(value).is_ok(),
            "regex" => Regex::new(value).is_ok(),
            _ => return None,
        };
        Some(ok)
    }
}

/// ISO 8601 date-time, with or without a UTC offset.
fn is_datetime(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}
