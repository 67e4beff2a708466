//! `key=value` parameter tokens understood by the processing engine.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Untrusted rectangle keyword.
pub const UNTRUSTED_RECTANGLE: &str = "autoPROC_XdsKeyword_UNTRUSTED_RECTANGLE";
/// Untrusted ellipse keyword.
pub const UNTRUSTED_ELLIPSE: &str = "autoPROC_XdsKeyword_UNTRUSTED_ELLIPSE";
/// Untrusted quadrilateral keyword.
pub const UNTRUSTED_QUADRILATERAL: &str = "autoPROC_XdsKeyword_UNTRUSTED_QUADRILATERAL";
/// Explicit beam centre keyword.
pub const BEAM: &str = "beam";

/// A single `key=value` token.
///
/// `Display` gives the shell form `key="value"`; [`XdsParam::to_arg`] gives
/// the argv form without quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct XdsParam {
    pub key: String,
    pub value: String,
}

impl XdsParam {
    /// Creates a token.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Token carrying whitespace-separated pixel coordinates rounded to integers.
    pub fn pixels(key: impl Into<String>, values: &[f64]) -> Self {
        let value = values
            .iter()
            .map(|v| format_pixel(*v))
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(key, value)
    }

    /// Argument form passed to a child process (no shell quoting).
    #[must_use]
    pub fn to_arg(&self) -> String {
        format!("{}={}", self.key, self.value)
    }

    /// Parse the value as whitespace-separated numbers.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if any field is not a number.
    pub fn numbers(&self) -> Result<Vec<f64>> {
        self.value
            .split_whitespace()
            .map(|field| {
                field
                    .parse::<f64>()
                    .map_err(|_| Error::InvalidToken(format!("{}: '{field}' is not a number", self.key)))
            })
            .collect()
    }
}

impl fmt::Display for XdsParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=\"{}\"", self.key, self.value)
    }
}

impl FromStr for XdsParam {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some((key, value)) = s.split_once('=') else {
            return Err(Error::InvalidToken(format!("missing '=' in '{s}'")));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidToken(format!("empty key in '{s}'")));
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Ok(Self::new(key, value))
    }
}

fn format_pixel(value: f64) -> String {
    let rounded = value.round();
    // Avoid emitting "-0".
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.0}")
}
