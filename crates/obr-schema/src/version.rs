//! OSGi versions and version ranges.
//!
//! OSGi versions have the shape `major.minor.micro.qualifier`. Missing numeric
//! components default to zero and the qualifier compares lexically after the
//! numeric components, so `1.0.0.beta` sorts *after* `1.0.0`. That is the
//! opposite of semver pre-release ordering, which is why these are not
//! [`semver::Version`]s.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Errors produced while parsing versions or version ranges.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// A numeric component is empty or not a non-negative integer.
    #[error("Invalid version component '{component}' in '{input}'")]
    InvalidComponent {
        /// The full input string.
        input: String,
        /// The offending component.
        component: String,
    },

    /// The qualifier contains characters outside `[A-Za-z0-9_-]`.
    #[error("Invalid version qualifier '{qualifier}' in '{input}'")]
    InvalidQualifier {
        /// The full input string.
        input: String,
        /// The offending qualifier.
        qualifier: String,
    },

    /// The range is not `[a,b]`, `(a,b)`, a half-open mix of those, or a bare version.
    #[error("Invalid version range '{0}'")]
    InvalidRange(String),
}

/// An OSGi version.
///
/// # Example
///
/// ```
/// use obr_schema::Version;
///
/// let v = Version::parse("1.2").unwrap();
/// assert_eq!(v.to_string(), "1.2.0");
/// assert!(Version::parse("1.2.0.beta").unwrap() > v);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Version {
    major: u64,
    minor: u64,
    micro: u64,
    qualifier: String,
}

impl Version {
    /// Create a version from its numeric components with an empty qualifier.
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Strictly parse an OSGi version string. An empty string is `0.0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] if a numeric component is not an integer or
    /// the qualifier contains invalid characters.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let mut parts = trimmed.splitn(4, '.');
        let mut numbers = [0u64; 3];
        for slot in &mut numbers {
            match parts.next() {
                Some(component) => {
                    *slot = component.parse().map_err(|_| VersionError::InvalidComponent {
                        input: input.to_string(),
                        component: component.to_string(),
                    })?;
                }
                None => break,
            }
        }

        let qualifier = parts.next().unwrap_or_default();
        if !qualifier.chars().all(is_qualifier_char) {
            return Err(VersionError::InvalidQualifier {
                input: input.to_string(),
                qualifier: qualifier.to_string(),
            });
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier: qualifier.to_string(),
        })
    }

    /// Leniently turn arbitrary version text into an OSGi version.
    ///
    /// Tries strict OSGi syntax first, then semver (pre-release and build
    /// metadata become the qualifier), then takes up to three leading numeric
    /// groups and uses the remainder as qualifier. Never fails; text with no
    /// leading digits becomes `0.0.0` with the sanitized text as qualifier.
    ///
    /// ```
    /// use obr_schema::Version;
    ///
    /// assert_eq!(Version::clean("1.0-SNAPSHOT").to_string(), "1.0.0.SNAPSHOT");
    /// assert_eq!(Version::clean("2.1.3-rc.1").to_string(), "2.1.3.rc_1");
    /// ```
    pub fn clean(input: &str) -> Self {
        let trimmed = input.trim();
        if let Ok(version) = Self::parse(trimmed) {
            return version;
        }

        let unprefixed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if let Ok(sv) = semver::Version::parse(unprefixed) {
            let mut qualifier = sv.pre.as_str().to_string();
            if !sv.build.is_empty() {
                if !qualifier.is_empty() {
                    qualifier.push('_');
                }
                qualifier.push_str(sv.build.as_str());
            }
            return Self {
                major: sv.major,
                minor: sv.minor,
                micro: sv.patch,
                qualifier: sanitize_qualifier(&qualifier),
            };
        }

        let mut numbers = Vec::with_capacity(3);
        let mut rest = unprefixed;
        while numbers.len() < 3 {
            let digits = rest.chars().take_while(char::is_ascii_digit).count();
            let Some(number) = rest[..digits].parse::<u64>().ok() else {
                break;
            };
            numbers.push(number);
            rest = &rest[digits..];
            match rest.strip_prefix('.') {
                Some(after) if after.starts_with(|c: char| c.is_ascii_digit()) => rest = after,
                _ => break,
            }
        }

        Self {
            major: numbers.first().copied().unwrap_or(0),
            minor: numbers.get(1).copied().unwrap_or(0),
            micro: numbers.get(2).copied().unwrap_or(0),
            qualifier: sanitize_qualifier(rest.trim_start_matches(['.', '-', '_'])),
        }
    }

    /// Major component.
    pub fn major(&self) -> u64 {
        self.major
    }

    /// Minor component.
    pub fn minor(&self) -> u64 {
        self.minor
    }

    /// Micro component.
    pub fn micro(&self) -> u64 {
        self.micro
    }

    /// Qualifier, empty when absent.
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

fn is_qualifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn sanitize_qualifier(raw: &str) -> String {
    raw.chars()
        .map(|c| if is_qualifier_char(c) { c } else { '_' })
        .collect()
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.micro)
            .cmp(&(other.major, other.minor, other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// An interval of versions, e.g. `[1.0,2.0)`.
///
/// A bare version `v` denotes `[v, infinity)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    floor: Version,
    floor_inclusive: bool,
    ceiling: Option<Version>,
    ceiling_inclusive: bool,
}

impl VersionRange {
    /// The range containing every version at or above `floor`.
    pub fn at_least(floor: Version) -> Self {
        Self {
            floor,
            floor_inclusive: true,
            ceiling: None,
            ceiling_inclusive: false,
        }
    }

    /// Parse interval notation or a bare version.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidRange`] for malformed brackets, or the
    /// underlying version error for a malformed endpoint.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let floor_inclusive = match trimmed.chars().next() {
            Some('[') => true,
            Some('(') => false,
            _ => return Ok(Self::at_least(Version::parse(trimmed)?)),
        };
        let ceiling_inclusive = match trimmed.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(VersionError::InvalidRange(input.to_string())),
        };

        let inner = &trimmed[1..trimmed.len() - 1];
        let (low, high) = inner
            .split_once(',')
            .ok_or_else(|| VersionError::InvalidRange(input.to_string()))?;

        let floor = Version::parse(low)?;
        let ceiling = Version::parse(high)?;
        if ceiling < floor {
            return Err(VersionError::InvalidRange(input.to_string()));
        }

        Ok(Self {
            floor,
            floor_inclusive,
            ceiling: Some(ceiling),
            ceiling_inclusive,
        })
    }

    /// Lower bound.
    pub fn floor(&self) -> &Version {
        &self.floor
    }

    /// Upper bound, `None` when unbounded.
    pub fn ceiling(&self) -> Option<&Version> {
        self.ceiling.as_ref()
    }

    /// Whether `version` lies inside the range.
    pub fn includes(&self, version: &Version) -> bool {
        let above_floor = if self.floor_inclusive {
            version >= &self.floor
        } else {
            version > &self.floor
        };
        let below_ceiling = match &self.ceiling {
            None => true,
            Some(ceiling) if self.ceiling_inclusive => version <= ceiling,
            Some(ceiling) => version < ceiling,
        };
        above_floor && below_ceiling
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ceiling {
            None if self.floor_inclusive => write!(f, "{}", self.floor),
            None => write!(f, "({},)", self.floor),
            Some(ceiling) => write!(
                f,
                "{}{},{}{}",
                if self.floor_inclusive { '[' } else { '(' },
                self.floor,
                ceiling,
                if self.ceiling_inclusive { ']' } else { ')' }
            ),
        }
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_versions() {
        assert_eq!(Version::parse("1").unwrap(), Version::new(1, 0, 0));
        assert_eq!(Version::parse("1.2").unwrap(), Version::new(1, 2, 0));
        assert_eq!(Version::parse("").unwrap(), Version::default());
        assert_eq!(Version::parse("1.2.3.q-1").unwrap().qualifier(), "q-1");
    }

    #[test]
    fn rejects_malformed_versions() {
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("a.b").is_err());
        assert!(Version::parse("1.2.3.bad qualifier").is_err());
    }

    #[test]
    fn qualifier_sorts_after_release() {
        let release = Version::parse("1.0.0").unwrap();
        let qualified = Version::parse("1.0.0.SNAPSHOT").unwrap();
        assert!(qualified > release);
        assert!(Version::parse("1.10").unwrap() > Version::parse("1.9.9").unwrap());
    }

    #[test]
    fn clean_handles_maven_and_semver() {
        assert_eq!(Version::clean("1.0-SNAPSHOT").to_string(), "1.0.0.SNAPSHOT");
        assert_eq!(Version::clean("v2.0.1").to_string(), "2.0.1");
        assert_eq!(Version::clean("3.1.4-beta.2+build.7").qualifier(), "beta_2_build_7");
        assert_eq!(Version::clean("garbage").to_string(), "0.0.0.garbage");
    }

    #[test]
    fn range_bounds() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.includes(&Version::new(1, 0, 0)));
        assert!(range.includes(&Version::new(1, 9, 9)));
        assert!(!range.includes(&Version::new(2, 0, 0)));

        let open = VersionRange::parse("(1.0,2.0]").unwrap();
        assert!(!open.includes(&Version::new(1, 0, 0)));
        assert!(open.includes(&Version::new(2, 0, 0)));

        let bare = VersionRange::parse("1.5").unwrap();
        assert!(bare.includes(&Version::new(99, 0, 0)));
        assert!(!bare.includes(&Version::new(1, 4, 0)));
    }

    #[test]
    fn range_rejects_inverted_bounds() {
        assert!(VersionRange::parse("[2.0,1.0]").is_err());
        assert!(VersionRange::parse("[1.0;2.0]").is_err());
        assert!(VersionRange::parse("[1.0,2.0").is_err());
    }

    #[test]
    fn range_display_round_trips() {
        for text in ["[1.0.0,2.0.0)", "(1.0.0,1.5.0]", "1.2.0"] {
            assert_eq!(VersionRange::parse(text).unwrap().to_string(), text);
        }
    }
}
