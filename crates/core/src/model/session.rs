use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ids::{SessionId, StudentKey};
use crate::model::wire;

/// Stored school name when a submission leaves the school blank.
pub const UNSPECIFIED_SCHOOL: &str = "غير محدد";

/// Where a session's recording lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredAudio {
    /// Encoded payload (usually a `data:` URL) kept inside the session record.
    Inline(String),
    /// Retrieval URL of a blob uploaded next to the record.
    Url(String),
}

/// One timed reading attempt as persisted under a student.
///
/// Records are stored unvalidated, so every field is read leniently: missing
/// or mistyped values load as defaults instead of failing the whole read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Session {
    #[serde(deserialize_with = "wire::or_default")]
    pub id: SessionId,
    #[serde(deserialize_with = "wire::text")]
    pub date: String,
    #[serde(deserialize_with = "wire::count")]
    pub level: u32,
    #[serde(deserialize_with = "wire::text")]
    pub text_title: String,
    #[serde(deserialize_with = "wire::count")]
    pub text_index: u32,
    #[serde(deserialize_with = "wire::count")]
    pub words_read: u32,
    #[serde(deserialize_with = "wire::count")]
    pub total_words: u32,
    #[serde(deserialize_with = "wire::real", serialize_with = "wire::compact")]
    pub elapsed_seconds: f64,
    #[serde(deserialize_with = "wire::real", serialize_with = "wire::compact")]
    pub speed: f64,
    #[serde(deserialize_with = "wire::real", serialize_with = "wire::compact")]
    pub completion: f64,
    #[serde(
        deserialize_with = "wire::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_data_url: Option<String>,
    #[serde(
        deserialize_with = "wire::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Value>,
}

/// A session as submitted by the reading exercise, before it has an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewSession {
    pub student_name: String,
    pub school_name: Option<String>,
    pub grade: Option<String>,
    pub date: String,
    pub level: u32,
    pub text_title: String,
    pub text_index: u32,
    pub words_read: u32,
    pub total_words: u32,
    pub elapsed_seconds: f64,
    pub speed: f64,
    pub completion: f64,
    /// Raw recording: a `data:` URL or bare base64.
    #[serde(alias = "audioDataUrl", skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Value>,
}

impl NewSession {
    #[must_use]
    pub fn student_key(&self) -> StudentKey {
        StudentKey::derive(&self.student_name, self.school_name.as_deref())
    }

    /// School as written to the student record; blank becomes the sentinel.
    #[must_use]
    pub fn stored_school(&self) -> &str {
        match self.school_name.as_deref() {
            Some(school) if !school.is_empty() => school,
            _ => UNSPECIFIED_SCHOOL,
        }
    }

    #[must_use]
    pub fn stored_grade(&self) -> &str {
        self.grade.as_deref().unwrap_or_default()
    }

    /// Build the persisted record. The raw audio payload is dropped; `audio`
    /// says what to keep in its place.
    #[must_use]
    pub fn into_session(self, id: SessionId, audio: Option<StoredAudio>) -> Session {
        let (audio_data_url, audio_url) = match audio {
            Some(StoredAudio::Inline(data)) => (Some(data), None),
            Some(StoredAudio::Url(url)) => (None, Some(url)),
            None => (None, None),
        };
        Session {
            id,
            date: self.date,
            level: self.level,
            text_title: self.text_title,
            text_index: self.text_index,
            words_read: self.words_read,
            total_words: self.total_words,
            elapsed_seconds: self.elapsed_seconds,
            speed: self.speed,
            completion: self.completion,
            audio_data_url,
            audio_url,
            evaluation: self.evaluation.filter(|v| !is_blank(v)),
        }
    }
}

/// `null`, `false`, `0` and `""` carry no evaluation and are not stored.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Flatten a stored `sessions` map into a list in key order.
///
/// Push ids sort by creation time, so key order is insertion order. Records
/// missing their own `id` take the map key.
#[must_use]
pub fn sessions_from_map(map: BTreeMap<String, Session>) -> Vec<Session> {
    map.into_iter()
        .map(|(key, mut session)| {
            if session.id.is_empty() {
                session.id = SessionId::from(key);
            }
            session
        })
        .collect()
}

/// Flatten a stored `sessions` node, reading each entry leniently.
#[must_use]
pub fn sessions_from_value(value: Value) -> Vec<Session> {
    let map = match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, entry)| (key, serde_json::from_value(entry).unwrap_or_default()))
            .collect(),
        _ => BTreeMap::new(),
    };
    sessions_from_map(map)
}

/// Stable ascending sort on the raw date string.
pub fn sort_by_date(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| a.date.cmp(&b.date));
}
