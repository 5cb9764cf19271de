//! Maven version strings
//!
//! Only `major.minor.patch` with an optional `-suffix` is understood. Anything
//! else parses to `None`: upstream metadata is full of oddities and a version
//! we cannot order is a version we do not index.

use std::cmp::Ordering;
use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Serialize, Serializer};

/// A parsed `major.minor.patch[-extra]` version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: Option<u32>,
    pub patch: Option<u32>,
    /// Pre-release suffix including its leading `-`, `None` for releases
    pub extra: Option<String>,
}

/// Release channel inferred from the version suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Release,
    Rc,
    Beta,
    Alpha,
    /// Suffixes such as `-SNAPSHOT` or `-dev01` that no channel claims
    Other,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32, extra: Option<&str>) -> Self {
        Self {
            major,
            minor: Some(minor),
            patch: Some(patch),
            extra: extra.map(str::to_string),
        }
    }

    /// Parse a version string, returning `None` if it is not `\d+.\d+.\d+(-.+)?`
    pub fn parse(input: &str) -> Option<Self> {
        let (core, extra) = match input.find('-') {
            Some(pos) => (&input[..pos], Some(&input[pos..])),
            None => (input, None),
        };
        if matches!(extra, Some(e) if e.len() < 2) {
            return None;
        }

        let mut parts = core.split('.');
        let major = parse_number(parts.next()?)?;
        let minor = parse_number(parts.next()?)?;
        let patch = parse_number(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            major,
            minor: Some(minor),
            patch: Some(patch),
            extra: extra.map(str::to_string),
        })
    }

    pub fn channel(&self) -> Channel {
        let Some(extra) = &self.extra else {
            return Channel::Release;
        };
        let extra = extra.to_lowercase();
        if extra.starts_with("-rc") {
            Channel::Rc
        } else if extra.starts_with("-beta") {
            Channel::Beta
        } else if extra.starts_with("-alpha") {
            Channel::Alpha
        } else {
            Channel::Other
        }
    }

    pub fn is_release(&self) -> bool {
        self.extra.is_none()
    }
}

fn parse_number(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
            // a release sorts above any pre-release of the same numbers
            .then_with(|| self.extra.is_none().cmp(&other.extra.is_none()))
            .then_with(|| self.extra.cmp(&other.extra))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        if let Some(minor) = self.minor {
            write!(f, ".{}", minor)?;
        }
        if let Some(patch) = self.patch {
            write!(f, ".{}", patch)?;
        }
        if let Some(ref extra) = self.extra {
            f.write_str(extra)?;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl ToSql for Version {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Version {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Version::parse(text).ok_or_else(|| {
            FromSqlError::Other(format!("stored version '{}' is not parseable", text).into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3, None));
        assert_eq!(v.channel(), Channel::Release);
        assert!(v.is_release());
    }

    #[test]
    fn test_parse_prerelease_keeps_dash() {
        let v = Version::parse("1.1.0-alpha01").unwrap();
        assert_eq!(v.extra.as_deref(), Some("-alpha01"));
        assert_eq!(v.channel(), Channel::Alpha);
        assert_eq!(v.to_string(), "1.1.0-alpha01");
    }

    #[test]
    fn test_parse_channels_case_insensitive() {
        assert_eq!(Version::parse("2.0.0-RC1").unwrap().channel(), Channel::Rc);
        assert_eq!(Version::parse("2.0.0-Beta3").unwrap().channel(), Channel::Beta);
        assert_eq!(Version::parse("2.0.0-SNAPSHOT").unwrap().channel(), Channel::Other);
    }

    #[test]
    fn test_parse_invalid() {
        for input in ["", "1", "1.2", "1.2.3.4", "a.b.c", "1.2.x", "1.2.3-", "-1.2.3", "1..3", " 1.2.3"] {
            assert_eq!(Version::parse(input), None, "expected '{}' to be rejected", input);
        }
    }

    #[test]
    fn test_parse_overflow_is_invalid() {
        assert_eq!(Version::parse("99999999999.0.0"), None);
    }

    #[test]
    fn test_ordering() {
        let parse = |s: &str| Version::parse(s).unwrap();
        assert!(parse("2.0.0") > parse("1.9.9"));
        assert!(parse("1.10.0") > parse("1.9.0"));
        assert!(parse("1.1.0") > parse("1.1.0-rc01"));
        assert!(parse("1.1.0-rc01") > parse("1.1.0-beta02"));
        assert!(parse("1.1.0-beta02") > parse("1.1.0-alpha05"));
        assert!(parse("1.1.0-alpha02") > parse("1.1.0-alpha01"));
        assert!(parse("1.1.0-alpha01") > parse("1.0.0"));
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Version::parse("1.0.0-beta01").unwrap()).unwrap();
        assert_eq!(json, "\"1.0.0-beta01\"");
    }
}
