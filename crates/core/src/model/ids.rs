use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between the normalized name and school inside a `StudentKey`.
pub const KEY_SEPARATOR: &str = "::";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyError {
    #[error("student key cannot be empty")]
    Empty,

    #[error("student key must contain `::`: {0}")]
    MissingSeparator(String),
}

/// Composite student identity: normalized name and school joined by `::`.
///
/// Two submissions whose name and school agree after trimming and lowercasing
/// land on the same key and therefore the same student record.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentKey(String);

impl StudentKey {
    /// Derive the key for a name/school pair. A missing school normalizes to
    /// the empty string.
    #[must_use]
    pub fn derive(name: &str, school: Option<&str>) -> Self {
        let name = normalize(name);
        let school = normalize(school.unwrap_or_default());
        Self(format!("{name}{KEY_SEPARATOR}{school}"))
    }

    /// Wrap a key read back from storage without re-normalizing it.
    #[must_use]
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize(part: &str) -> String {
    part.trim().to_lowercase()
}

impl FromStr for StudentKey {
    type Err = KeyError;

    /// Parses a key typed by a caller. The key is taken verbatim; only its
    /// shape is checked.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyError::Empty);
        }
        if !s.contains(KEY_SEPARATOR) {
            return Err(KeyError::MissingSeparator(s.to_owned()));
        }
        Ok(Self(s.to_owned()))
    }
}

/// Store-generated session identifier (a push id).
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for StudentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StudentKey({:?})", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for StudentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_ignores_case_and_surrounding_whitespace() {
        let a = StudentKey::derive("  Aya ", Some("AL-Noor  "));
        let b = StudentKey::derive("aya", Some("al-noor"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "aya::al-noor");
    }

    #[test]
    fn derive_keeps_inner_whitespace() {
        let key = StudentKey::derive("Aya  Salem", None);
        assert_eq!(key.as_str(), "aya  salem::");
    }

    #[test]
    fn missing_school_matches_empty_school() {
        assert_eq!(
            StudentKey::derive("Omar", None),
            StudentKey::derive("omar", Some("   "))
        );
    }

    #[test]
    fn derive_lowercases_non_ascii() {
        let key = StudentKey::derive("ÉLISE", Some("Lycée"));
        assert_eq!(key.as_str(), "élise::lycée");
    }

    #[test]
    fn parse_rejects_keys_without_separator() {
        assert_eq!("".parse::<StudentKey>().unwrap_err(), KeyError::Empty);
        assert!(matches!(
            "aya".parse::<StudentKey>(),
            Err(KeyError::MissingSeparator(_))
        ));
        assert_eq!(
            "aya::al-noor".parse::<StudentKey>().unwrap(),
            StudentKey::derive("Aya", Some("Al-Noor"))
        );
    }

    #[test]
    fn session_id_serializes_as_plain_string() {
        let id = SessionId::new("-Nabc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"-Nabc\"");
    }
}
