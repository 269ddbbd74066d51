use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ids::StudentKey;
use crate::model::session::{Session, UNSPECIFIED_SCHOOL, sessions_from_map};
use crate::model::wire;

/// Persisted shape of a student node: display fields plus the sessions map.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StudentNode {
    #[serde(deserialize_with = "wire::opt_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "wire::opt_text")]
    pub school: Option<String>,
    #[serde(deserialize_with = "wire::opt_text")]
    pub grade: Option<String>,
    #[serde(deserialize_with = "wire::entries")]
    pub sessions: BTreeMap<String, Session>,
}

impl StudentNode {
    /// Read a stored node; a node that is not an object has no fields.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    #[must_use]
    pub fn into_student(self, key: StudentKey) -> Student {
        Student {
            key,
            name: self.name.unwrap_or_default(),
            school: school_or_sentinel(self.school),
            grade: self.grade.unwrap_or_default(),
            sessions: sessions_from_map(self.sessions),
        }
    }

    #[must_use]
    pub fn summarize(self, key: StudentKey) -> StudentSummary {
        StudentSummary::from_student(&self.into_student(key))
    }
}

fn school_or_sentinel(school: Option<String>) -> String {
    school
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNSPECIFIED_SCHOOL.to_owned())
}

/// A student with all sessions, in storage order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub key: StudentKey,
    pub name: String,
    pub school: String,
    pub grade: String,
    pub sessions: Vec<Session>,
}

/// Derived per-student statistics. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub key: StudentKey,
    pub name: String,
    pub school: String,
    pub grade: String,
    pub total_sessions: usize,
    pub total_words: u64,
    /// Rounded mean speed; 0 without sessions.
    pub avg_speed: i64,
    /// Highest speed; 0 without sessions.
    #[serde(serialize_with = "wire::compact")]
    pub best_speed: f64,
    /// Greatest non-empty date string.
    pub last_date: Option<String>,
}

impl StudentSummary {
    #[must_use]
    pub fn from_student(student: &Student) -> Self {
        let sessions = &student.sessions;
        let total_sessions = sessions.len();
        let mut total_words = 0_u64;
        let mut sum_speed = 0.0_f64;
        let mut best_speed = 0.0_f64;
        let mut last_date: Option<&str> = None;

        for session in sessions {
            total_words += u64::from(session.words_read);
            sum_speed += session.speed;
            if session.speed > best_speed {
                best_speed = session.speed;
            }
            if !session.date.is_empty() && last_date.is_none_or(|last| session.date.as_str() > last)
            {
                last_date = Some(session.date.as_str());
            }
        }

        let avg_speed = rounded_mean(sum_speed, total_sessions);

        Self {
            key: student.key.clone(),
            name: student.name.clone(),
            school: student.school.clone(),
            grade: student.grade.clone(),
            total_sessions,
            total_words,
            avg_speed,
            best_speed,
            last_date: last_date.map(str::to_owned),
        }
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn rounded_mean(sum: f64, count: usize) -> i64 {
    if count == 0 {
        return 0;
    }
    (sum / count as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionId;
    use serde_json::json;

    fn session(speed: f64, words: u32, date: &str) -> Session {
        Session {
            id: SessionId::new(format!("{date}-{speed}")),
            date: date.into(),
            speed,
            words_read: words,
            ..Session::default()
        }
    }

    fn student(sessions: Vec<Session>) -> Student {
        Student {
            key: StudentKey::derive("Aya", Some("Al-Noor")),
            name: "Aya".into(),
            school: "Al-Noor".into(),
            grade: "3".into(),
            sessions,
        }
    }

    #[test]
    fn empty_student_summarizes_to_zeroes() {
        let summary = StudentSummary::from_student(&student(Vec::new()));
        assert_eq!(summary.total_sessions, 0);
        assert_eq!(summary.total_words, 0);
        assert_eq!(summary.avg_speed, 0);
        assert!(summary.best_speed.abs() < f64::EPSILON);
        assert_eq!(summary.last_date, None);
    }

    #[test]
    fn average_is_rounded_mean() {
        let summary = StudentSummary::from_student(&student(vec![
            session(80.0, 40, "2024-01-01"),
            session(100.0, 60, "2024-01-02"),
        ]));
        assert_eq!(summary.avg_speed, 90);
        assert!((summary.best_speed - 100.0).abs() < f64::EPSILON);
        assert_eq!(summary.total_words, 100);

        let odd = StudentSummary::from_student(&student(vec![
            session(80.0, 0, "a"),
            session(81.0, 0, "b"),
        ]));
        assert_eq!(odd.avg_speed, 81);
    }

    #[test]
    fn last_date_is_greatest_string_and_skips_blanks() {
        let summary = StudentSummary::from_student(&student(vec![
            session(10.0, 1, "2024-05-01"),
            session(10.0, 1, ""),
            session(10.0, 1, "2024-12-31"),
            session(10.0, 1, "2024-02-01"),
        ]));
        assert_eq!(summary.last_date.as_deref(), Some("2024-12-31"));
    }

    #[test]
    fn node_defaults_missing_display_fields() {
        let node: StudentNode = serde_json::from_value(json!({
            "sessions": { "-N1": { "date": "2024-01-01", "speed": 70 } }
        }))
        .unwrap();
        let summary = node.summarize(StudentKey::from_stored("x::"));
        assert_eq!(summary.name, "");
        assert_eq!(summary.school, UNSPECIFIED_SCHOOL);
        assert_eq!(summary.grade, "");
        assert_eq!(summary.total_sessions, 1);
    }

    #[test]
    fn summary_serializes_null_last_date() {
        let summary = StudentSummary::from_student(&student(Vec::new()));
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["lastDate"], json!(null));
        assert_eq!(value["totalSessions"], json!(0));
        assert_eq!(value["key"], json!("aya::al-noor"));
    }

    #[test]
    fn speeds_serialize_as_whole_numbers_when_possible() {
        let summary = StudentSummary::from_student(&student(vec![
            session(100.0, 10, "2024-01-01"),
            session(95.5, 10, "2024-01-02"),
        ]));
        let text = serde_json::to_string(&summary).unwrap();
        assert!(text.contains(r#""avgSpeed":98,"#), "{text}");
        assert!(text.contains(r#""bestSpeed":100,"#), "{text}");
    }

    #[test]
    fn mistyped_nodes_still_summarize() {
        let node = StudentNode::from_value(json!({
            "name": "Omar",
            "grade": 4,
            "sessions": {
                "-N1": { "level": "A1", "wordsRead": 12.5, "speed": "70", "date": "2024-01-01" },
                "-N2": "garbage"
            }
        }));
        let summary = node.summarize(StudentKey::from_stored("omar::"));
        assert_eq!(summary.grade, "4");
        assert_eq!(summary.total_sessions, 2);
        assert_eq!(summary.total_words, 12);
        assert!((summary.best_speed - 70.0).abs() < f64::EPSILON);
        assert_eq!(summary.avg_speed, 35);

        let scalar = StudentNode::from_value(json!("not a student"));
        assert_eq!(scalar, StudentNode::default());
    }
}
