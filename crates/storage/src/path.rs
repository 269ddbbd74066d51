use std::fmt;

use crate::repository::StorageError;

/// Characters the tree database refuses inside a key.
const FORBIDDEN: &[char] = &['.', '$', '#', '[', ']', '/'];

/// Longest key the tree database accepts, in UTF-8 bytes.
const MAX_SEGMENT_BYTES: usize = 768;

/// Slash-separated location inside the tree database.
///
/// Every segment is checked against the database's key rules on construction,
/// so adapters can splice segments into URLs without further validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated path. Leading, trailing and repeated slashes are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidPath` if a segment breaks the key rules.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        raw.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(Self::root(), |path, segment| path.child(segment))
    }

    /// Append one key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidPath` if the key is empty, too long, or
    /// contains `.`, `$`, `#`, `[`, `]`, `/` or a control character.
    pub fn child(mut self, segment: impl AsRef<str>) -> Result<Self, StorageError> {
        let segment = segment.as_ref();
        validate_segment(segment)?;
        self.segments.push(segment.to_owned());
        Ok(self)
    }

    #[must_use]
    pub fn join(&self, other: &TreePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

fn validate_segment(segment: &str) -> Result<(), StorageError> {
    if segment.is_empty() {
        return Err(StorageError::InvalidPath("empty key".into()));
    }
    if segment.len() > MAX_SEGMENT_BYTES {
        return Err(StorageError::InvalidPath(format!(
            "key longer than {MAX_SEGMENT_BYTES} bytes"
        )));
    }
    if let Some(bad) = segment
        .chars()
        .find(|c| FORBIDDEN.contains(c) || c.is_control())
    {
        return Err(StorageError::InvalidPath(format!(
            "key {segment:?} contains {bad:?}"
        )));
    }
    Ok(())
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}
