//! Typed capability property values.

use crate::version::{Version, VersionError, VersionRange};
use std::fmt;
use std::str::FromStr;

/// Errors produced while building a [`PropertyValue`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// The declared type name is not one of the supported types.
    #[error("Unknown property type '{0}'")]
    UnknownType(String),

    /// The text does not parse as the declared type.
    #[error("Invalid {ty} value '{value}': {reason}")]
    InvalidValue {
        /// Declared type.
        ty: PropertyType,
        /// Raw text.
        value: String,
        /// Parser message.
        reason: String,
    },
}

/// The declared type of a property, as written in repository metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropertyType {
    /// Plain text (also used for `uri`).
    #[default]
    String,
    /// Signed 64-bit integer.
    Long,
    /// 64-bit float.
    Double,
    /// OSGi version.
    Version,
    /// OSGi version range.
    VersionRange,
    /// Comma separated list of strings.
    StringArray,
}

impl PropertyType {
    /// Canonical type name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Long => "long",
            Self::Double => "double",
            Self::Version => "version",
            Self::VersionRange => "range",
            Self::StringArray => "set",
        }
    }
}

impl FromStr for PropertyType {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "string" | "uri" | "url" => Ok(Self::String),
            "long" => Ok(Self::Long),
            "double" => Ok(Self::Double),
            "version" => Ok(Self::Version),
            "range" | "version-range" => Ok(Self::VersionRange),
            "set" | "list" => Ok(Self::StringArray),
            other => Err(PropertyError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability property value, typed once when the capability is built.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Plain text.
    String(String),
    /// Integer.
    Long(i64),
    /// Float.
    Double(f64),
    /// OSGi version, compared by version order.
    Version(Version),
    /// OSGi version range.
    VersionRange(VersionRange),
    /// List of strings; filters match when any element matches.
    StringArray(Vec<String>),
}

impl PropertyValue {
    /// Parse `text` as the given type.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::InvalidValue`] if `text` does not parse as `ty`.
    pub fn parse(ty: PropertyType, text: &str) -> Result<Self, PropertyError> {
        let invalid = |reason: String| PropertyError::InvalidValue {
            ty,
            value: text.to_string(),
            reason,
        };

        Ok(match ty {
            PropertyType::String => Self::String(text.to_string()),
            PropertyType::Long => Self::Long(
                text.trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?,
            ),
            PropertyType::Double => Self::Double(
                text.trim()
                    .parse()
                    .map_err(|e: std::num::ParseFloatError| invalid(e.to_string()))?,
            ),
            PropertyType::Version => Self::Version(
                Version::parse(text).map_err(|e: VersionError| invalid(e.to_string()))?,
            ),
            PropertyType::VersionRange => Self::VersionRange(
                VersionRange::parse(text).map_err(|e: VersionError| invalid(e.to_string()))?,
            ),
            PropertyType::StringArray => Self::StringArray(split_list(text)),
        })
    }

    /// Parse from a type name and text, as found in repository metadata.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::UnknownType`] for an unsupported type name, or
    /// [`PropertyError::InvalidValue`] if the text does not parse.
    pub fn parse_typed(type_name: &str, text: &str) -> Result<Self, PropertyError> {
        Self::parse(type_name.parse()?, text)
    }

    /// The variant's type.
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::String(_) => PropertyType::String,
            Self::Long(_) => PropertyType::Long,
            Self::Double(_) => PropertyType::Double,
            Self::Version(_) => PropertyType::Version,
            Self::VersionRange(_) => PropertyType::VersionRange,
            Self::StringArray(_) => PropertyType::StringArray,
        }
    }

    /// The value viewed as a set of strings, used by subset and superset tests.
    pub fn as_set(&self) -> Vec<String> {
        match self {
            Self::StringArray(items) => items.clone(),
            Self::String(s) => split_list(s),
            other => vec![other.to_string()],
        }
    }
}

/// Split a comma separated list, trimming entries and dropping empty ones.
pub(crate) fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Long(n) => write!(f, "{n}"),
            Self::Double(x) => write!(f, "{x}"),
            Self::Version(v) => write!(f, "{v}"),
            Self::VersionRange(r) => write!(f, "{r}"),
            Self::StringArray(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        Self::Long(n)
    }
}

impl From<f64> for PropertyValue {
    fn from(x: f64) -> Self {
        Self::Double(x)
    }
}

impl From<Version> for PropertyValue {
    fn from(v: Version) -> Self {
        Self::Version(v)
    }
}

impl From<VersionRange> for PropertyValue {
    fn from(r: VersionRange) -> Self {
        Self::VersionRange(r)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(items: Vec<String>) -> Self {
        Self::StringArray(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_type() {
        assert_eq!(
            PropertyValue::parse_typed("long", " 42 ").unwrap(),
            PropertyValue::Long(42)
        );
        assert_eq!(
            PropertyValue::parse_typed("version", "1.2").unwrap(),
            PropertyValue::Version(Version::new(1, 2, 0))
        );
        assert_eq!(
            PropertyValue::parse_typed("set", "a, b,,c").unwrap(),
            PropertyValue::StringArray(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(
            PropertyValue::parse_typed("uri", "http://x").unwrap(),
            PropertyValue::String("http://x".into())
        );
        assert!(matches!(
            PropertyValue::parse_typed("range", "[1,2)").unwrap(),
            PropertyValue::VersionRange(_)
        ));
    }

    #[test]
    fn reports_bad_values() {
        assert!(matches!(
            PropertyValue::parse_typed("long", "ten"),
            Err(PropertyError::InvalidValue { ty: PropertyType::Long, .. })
        ));
        assert!(matches!(
            PropertyValue::parse_typed("blob", "x"),
            Err(PropertyError::UnknownType(_))
        ));
    }

    #[test]
    fn string_viewed_as_set() {
        let value = PropertyValue::from("x, y");
        assert_eq!(value.as_set(), vec!["x".to_string(), "y".to_string()]);
    }
}
