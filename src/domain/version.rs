use crate::error::{ReleaseError, Result};
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use super::Bump;

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-([0-9A-Za-z.-]+))?(?:\+([0-9A-Za-z.-]+))?$")
            .expect("static pattern compiles")
    })
}

/// Semantic version with optional prerelease and build metadata.
///
/// Canonical text form is `MAJOR.MINOR.PATCH[-prerelease][+build]`. Parsing
/// accepts an optional leading tag letter (`v1.2.3`), which is never emitted.
/// Values are immutable; [Version::bump] returns a new instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

impl Version {
    /// Create a plain numeric version
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    /// Parse a version from a tag string (e.g., "v1.2.3-rc.1+build5")
    pub fn parse(tag: &str) -> Result<Self> {
        let clean = tag
            .trim()
            .trim_start_matches('v')
            .trim_start_matches('V');

        let captures = version_pattern().captures(clean).ok_or_else(|| {
            ReleaseError::version(format!(
                "Invalid version format: '{}' - expected X.Y.Z[-pre][+build]",
                tag
            ))
        })?;

        let component = |idx: usize, name: &str| -> Result<u32> {
            captures
                .get(idx)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .ok_or_else(|| {
                    ReleaseError::version(format!("Invalid {} version in '{}'", name, tag))
                })
        };

        Ok(Version {
            major: component(1, "major")?,
            minor: component(2, "minor")?,
            patch: component(3, "patch")?,
            prerelease: captures.get(4).map(|m| m.as_str().to_string()),
            build: captures.get(5).map(|m| m.as_str().to_string()),
        })
    }

    /// Produce a new version bumped by the given magnitude.
    ///
    /// Major zeroes minor and patch; minor zeroes patch; patch increments
    /// patch only. Any bump (including `Bump::None`) drops prerelease and
    /// build metadata, so a bumped version is always a plain release.
    pub fn bump(&self, bump: Bump) -> Self {
        match bump {
            Bump::Major => Version::new(self.major + 1, 0, 0),
            Bump::Minor => Version::new(self.major, self.minor + 1, 0),
            Bump::Patch => Version::new(self.major, self.minor, self.patch + 1),
            Bump::None => Version::new(self.major, self.minor, self.patch),
        }
    }

    /// Compare release precedence: major, then minor, then patch.
    ///
    /// Prerelease and build metadata never participate, which is why this is
    /// a named method rather than an `Ord` impl (full-field equality would
    /// disagree with it).
    pub fn cmp_precedence(&self, other: &Version) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }

    /// True when `self` has strictly higher precedence than `other`
    pub fn precedes(&self, other: &Version) -> bool {
        self.cmp_precedence(other) == Ordering::Greater
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}
