//! Minimal semver: `MAJOR.MINOR.PATCH[-prerelease][+build]`, comparison,
//! and range satisfaction for the subset of operators the runtime needs
//! (`*`, `^`, `~`, `>=`, `>`, `<=`, `<`, and exact match).

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// A parsed semantic version. Build metadata is retained for display but
/// never affects comparison, per the semver spec.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

impl Version {
    /// The default version assigned to a hook that doesn't specify one.
    pub fn zero() -> Self {
        Version { major: 0, minor: 0, patch: 0, prerelease: None, build: None }
    }

    /// Parse `"MAJOR.MINOR.PATCH[-prerelease][+build]"`.
    pub fn parse(s: &str) -> Result<Self> {
        let (core_and_pre, build) = match s.split_once('+') {
            Some((head, build)) => (head, Some(build.to_string())),
            None => (s, None),
        };
        let (core, prerelease) = match core_and_pre.split_once('-') {
            Some((head, pre)) => (head, Some(pre.to_string())),
            None => (core_and_pre, None),
        };

        let mut parts = core.split('.');
        let (major, minor, patch) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(maj), Some(min), Some(pat), None) => (maj, min, pat),
            _ => return Err(Error::InvalidSemver(s.to_string())),
        };

        let parse_component = |value: &str| -> Result<u64> {
            if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::InvalidSemver(s.to_string()));
            }
            value.parse::<u64>().map_err(|_| Error::InvalidSemver(s.to_string()))
        };

        Ok(Version {
            major: parse_component(major)?,
            minor: parse_component(minor)?,
            patch: parse_component(patch)?,
            prerelease,
            build,
        })
    }

    /// Compare two versions, returning `-1`, `0`, or `1`, instead of a full
    /// `Ordering`, to mirror the runtime's documented contract at the public
    /// boundary.
    pub fn compare(&self, other: &Version) -> i32 {
        match self.cmp(other) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    /// Does `self` satisfy `range`?
    pub fn satisfies(&self, range: &str) -> Result<bool> {
        let range = range.trim();
        if range == "*" {
            return Ok(true);
        }
        if let Some(rest) = range.strip_prefix(">=") {
            let target = Version::parse(rest.trim())?;
            return Ok(self.cmp(&target) != Ordering::Less);
        }
        if let Some(rest) = range.strip_prefix("<=") {
            let target = Version::parse(rest.trim())?;
            return Ok(self.cmp(&target) != Ordering::Greater);
        }
        if let Some(rest) = range.strip_prefix('>') {
            let target = Version::parse(rest.trim())?;
            return Ok(self.cmp(&target) == Ordering::Greater);
        }
        if let Some(rest) = range.strip_prefix('<') {
            let target = Version::parse(rest.trim())?;
            return Ok(self.cmp(&target) == Ordering::Less);
        }
        if let Some(rest) = range.strip_prefix('^') {
            let target = Version::parse(rest.trim())?;
            return Ok(self.major == target.major && self.cmp(&target) != Ordering::Less);
        }
        if let Some(rest) = range.strip_prefix('~') {
            let target = Version::parse(rest.trim())?;
            return Ok(
                self.major == target.major
                    && self.minor == target.minor
                    && self.cmp(&target) != Ordering::Less,
            );
        }
        // Exact match falls through to full parse + equality.
        match Version::parse(range) {
            Ok(target) => Ok(self.cmp(&target) == Ordering::Equal),
            Err(_) => Err(Error::InvalidRange(range.to_string())),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                // No prerelease outranks any prerelease.
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}
