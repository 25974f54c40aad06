//! Version identifiers used as version directory names

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlipwayError};

/// A `major.minor.patch` triple.
///
/// Ordering is lexicographic over the three components, which is exactly the
/// derived `Ord` given the field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionId {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `"X.Y.Z"`. Each part must be a non-empty run of ASCII digits.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid(s, "expected three dot-separated parts"));
        }
        Ok(Self {
            major: component(s, parts[0])?,
            minor: component(s, parts[1])?,
            patch: component(s, parts[2])?,
        })
    }
}

fn component(input: &str, part: &str) -> Result<u32> {
    // u32::from_str alone would also accept a leading '+'
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(input, "component is not a non-negative integer"));
    }
    part.parse::<u32>()
        .map_err(|_| invalid(input, "component is out of range"))
}

fn invalid(input: &str, reason: &'static str) -> SlipwayError {
    SlipwayError::InvalidVersion {
        input: input.to_string(),
        reason,
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionId {
    type Err = SlipwayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionId {
    type Error = SlipwayError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<VersionId> for String {
    fn from(value: VersionId) -> Self {
        value.to_string()
    }
}
