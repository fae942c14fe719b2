//! Utility functions and types.

use std::fmt;

/// Redact wraps a secret so that its `Debug` output never leaks the value.
///
/// Values of 12 characters or more keep their first and last three
/// characters, which is enough to tell two secrets apart in logs. Shorter
/// values are replaced entirely.
pub struct Redact<'a>(&'a str);

impl<'a> From<&'a str> for Redact<'a> {
    fn from(value: &'a str) -> Self {
        Redact(value)
    }
}

impl<'a> From<&'a String> for Redact<'a> {
    fn from(value: &'a String) -> Self {
        Redact(value.as_str())
    }
}

impl<'a> From<&'a Option<String>> for Redact<'a> {
    fn from(value: &'a Option<String>) -> Self {
        Redact(value.as_deref().unwrap_or_default())
    }
}

impl fmt::Debug for Redact<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.len() {
            0 => f.write_str("EMPTY"),
            n if n < 12 => f.write_str("***"),
            n => write!(f, "{}***{}", &self.0[..3], &self.0[n - 3..]),
        }
    }
}
