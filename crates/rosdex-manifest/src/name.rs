use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize};

/// Validate a package, repository, or group name.
///
/// Names are compared verbatim (no case folding), so validation only rejects values that could
/// never name a package: empty strings, whitespace, path separators, leading punctuation, and a
/// trailing `-` or `.`.
fn validate(name: &str) -> Result<(), InvalidNameError> {
    let mut last = None;
    for char in name.bytes() {
        match char {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => {}
            b'-' | b'_' | b'.' => {
                // Names can't start with punctuation.
                if last.is_none() {
                    return Err(InvalidNameError(name.to_string()));
                }
            }
            _ => return Err(InvalidNameError(name.to_string())),
        }
        last = Some(char);
    }

    match last {
        None | Some(b'-' | b'.') => Err(InvalidNameError(name.to_string())),
        Some(_) => Ok(()),
    }
}

/// Reads a name from a string, or from an integer such as an unquoted YAML key `2:`.
struct NameVisitor;

impl Visitor<'_> for NameVisitor {
    type Value = String;

    fn expecting(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str("a package or group name")
    }

    fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(value.to_string())
    }

    fn visit_string<E: serde::de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(value)
    }

    fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(value.to_string())
    }

    fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(value.to_string())
    }
}

/// The name of a package, as declared in its `package.xml`.
///
/// Repository names share the same syntax and are represented with the same type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Create a validated package name from an owned string.
    pub fn from_owned(name: String) -> Result<Self, InvalidNameError> {
        validate(&name)?;
        Ok(Self(name))
    }

    /// Returns the underlying package name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PackageName {
    type Err = InvalidNameError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        validate(name)?;
        Ok(Self(name.to_string()))
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = deserializer.deserialize_any(NameVisitor)?;
        Self::from_owned(name).map_err(serde::de::Error::custom)
    }
}

impl Display for PackageName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The name of a package group, as used by `<member_of_group>` and `<group_depend>`.
///
/// Groups are not packages: a group name need not match any package or repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    /// Create a validated group name from an owned string.
    pub fn from_owned(name: String) -> Result<Self, InvalidNameError> {
        validate(&name)?;
        Ok(Self(name))
    }

    /// Returns the underlying group name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for GroupName {
    type Err = InvalidNameError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        validate(name)?;
        Ok(Self(name.to_string()))
    }
}

impl<'de> Deserialize<'de> for GroupName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = deserializer.deserialize_any(NameVisitor)?;
        Self::from_owned(name).map_err(serde::de::Error::custom)
    }
}

impl Display for GroupName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for GroupName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Invalid [`PackageName`] or [`GroupName`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvalidNameError(String);

impl InvalidNameError {
    /// Returns the invalid name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for InvalidNameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Not a valid package or group name: \"{}\". Names must start with a letter or digit \
            and may only contain -, _, ., and alphanumeric characters.",
            self.0
        )
    }
}

impl Error for InvalidNameError {}
