//! Validated value types shared across the drive workspace.
//!
//! Values coming back from the storage backend, or typed in by a user, are checked once at the
//! edge and carried around in these wrappers afterwards.

/// Errors that can occur when creating validated types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypesError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The identifier contained a character that cannot appear in a URL path segment
    #[error("Identifier {0:?} contains a disallowed character")]
    InvalidIdentifier(String),
}

/// An opaque, backend-issued resource identifier.
///
/// Identifiers are interpolated into request paths (`/v1/files/files/{id}/content`), so a
/// `ResourceId` is never empty and never contains whitespace or a `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    /// Validates and wraps a backend identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::Empty`] for an empty input and
    /// [`TypesError::InvalidIdentifier`] if the input contains whitespace, `/`, `?` or `#`.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TypesError> {
        let raw = input.as_ref();
        if raw.is_empty() {
            return Err(TypesError::Empty);
        }
        if raw
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'))
        {
            return Err(TypesError::InvalidIdentifier(raw.to_owned()));
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ResourceId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for ResourceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ResourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ResourceId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A string that holds at least one non-whitespace character, stored trimmed.
///
/// Used for user-supplied names such as a new folder's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Trims `input` and rejects it if nothing is left.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TypesError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypesError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}
