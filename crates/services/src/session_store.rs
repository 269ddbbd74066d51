use std::sync::Arc;

use reading_core::Clock;
use reading_core::collate;
use reading_core::model::{
    NewSession, Session, SessionId, StoredAudio, Student, StudentKey, StudentNode,
    StudentSummary, sessions_from_value, sort_by_date,
};
use serde_json::Value;
use storage::{BlobStore, Storage, StorageError, TreePath, TreeStore};
use tracing::{debug, info, warn};

use crate::config::{AudioMode, StoreConfig, StoreSettings};
use crate::error::{SessionStoreError, StoreInitError};

const STUDENTS: &str = "students";
const SESSIONS: &str = "sessions";
const EVALUATION: &str = "evaluation";

/// Reading-session records keyed by student, over a tree database and an
/// optional blob store.
///
/// Build one at startup and clone it into callers. A store built with
/// [`SessionStore::disabled`] answers every operation with an empty result
/// (`None`, an empty list, or `false`) and never touches a backend.
///
/// Writes are not coordinated between callers: concurrent appends for one
/// student race on its display fields and the last write wins.
#[derive(Clone)]
pub struct SessionStore {
    backend: Option<Arc<Backend>>,
}

struct Backend {
    tree: Arc<dyn TreeStore>,
    blobs: Option<Arc<dyn BlobStore>>,
    settings: StoreSettings,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Storage, settings: StoreSettings) -> Self {
        Self {
            backend: Some(Arc::new(Backend {
                tree: storage.tree,
                blobs: storage.blobs,
                settings,
            })),
        }
    }

    /// Store backed by in-memory tree and blob backends.
    #[must_use]
    pub fn in_memory(clock: Clock, settings: StoreSettings) -> Self {
        Self::new(Storage::in_memory(clock), settings)
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    /// Connect to the hosted backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `StoreInitError` if the root path is invalid, blob audio lacks
    /// a bucket, or the HTTP client cannot be built.
    pub fn initialize(config: &StoreConfig, clock: Clock) -> Result<Self, StoreInitError> {
        TreePath::parse(&config.settings.root)
            .and_then(|root| root.child(STUDENTS))
            .map_err(StoreInitError::InvalidRoot)?;
        let storage = Storage::firebase(&config.firebase()?, clock)?;
        info!(
            database = %config.database_url,
            root = %config.settings.root,
            audio = ?config.settings.audio,
            blobs = storage.blobs.is_some(),
            "session store initialized"
        );
        Ok(Self::new(storage, config.settings.clone()))
    }

    /// Read configuration from the environment and connect.
    ///
    /// # Errors
    ///
    /// Returns `StoreInitError::MissingConfig` when the database URL is not
    /// set, so the caller can decide whether to fall back to
    /// [`SessionStore::disabled`].
    pub fn from_env(clock: Clock) -> Result<Self, StoreInitError> {
        Self::initialize(&StoreConfig::from_env()?, clock)
    }

    /// Persist a new session and return its id; `None` when disabled.
    ///
    /// The student's name, school and grade are overwritten with the values
    /// from this submission, in the same request as the session itself. A
    /// failed audio upload is logged and the session is saved without audio.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError::Storage` if the backend rejects the write.
    pub async fn append_session(
        &self,
        session: NewSession,
    ) -> Result<Option<SessionId>, SessionStoreError> {
        match &self.backend {
            Some(backend) => backend.append_session(session).await.map(Some),
            None => {
                debug!("session store disabled; append skipped");
                Ok(None)
            }
        }
    }

    /// Summaries of every student, ordered by display name.
    ///
    /// Reads the whole student tree in one request and aggregates locally.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError::Storage` on backend failures.
    pub async fn list_students(&self) -> Result<Vec<StudentSummary>, SessionStoreError> {
        match &self.backend {
            Some(backend) => backend.list_students().await,
            None => Ok(Vec::new()),
        }
    }

    /// One student with sessions in storage order; `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError::Storage` on backend failures.
    pub async fn get_student(
        &self,
        key: &StudentKey,
    ) -> Result<Option<Student>, SessionStoreError> {
        match &self.backend {
            Some(backend) => backend.get_student(key).await,
            None => Ok(None),
        }
    }

    /// A student's sessions, ascending by date string. Sessions sharing a
    /// date keep their storage order.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError::Storage` on backend failures.
    pub async fn list_sessions(&self, key: &StudentKey) -> Result<Vec<Session>, SessionStoreError> {
        match &self.backend {
            Some(backend) => backend.list_sessions(key).await,
            None => Ok(Vec::new()),
        }
    }

    /// Overwrite a session's evaluation. Returns `false` only when disabled.
    ///
    /// The session is not checked for existence; writing to an unknown id
    /// creates a record holding just the evaluation.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError::Storage` if the backend rejects the write.
    pub async fn set_evaluation(
        &self,
        key: &StudentKey,
        session_id: &SessionId,
        evaluation: Value,
    ) -> Result<bool, SessionStoreError> {
        match &self.backend {
            Some(backend) => backend
                .set_evaluation(key, session_id, evaluation)
                .await
                .map(|()| true),
            None => Ok(false),
        }
    }
}

impl Backend {
    fn students_path(&self) -> Result<TreePath, StorageError> {
        TreePath::parse(&self.settings.root)?.child(STUDENTS)
    }

    fn student_path(&self, key: &StudentKey) -> Result<TreePath, StorageError> {
        self.students_path()?.child(key.as_str())
    }

    async fn append_session(&self, mut session: NewSession) -> Result<SessionId, SessionStoreError> {
        let key = session.student_key();
        let student = self.student_path(&key)?;
        let id = SessionId::from(self.tree.push_key());
        let audio = self.store_audio(&key, &id, session.audio.take()).await;

        let mut writes = vec![
            (
                TreePath::root().child("name")?,
                Value::from(session.student_name.clone()),
            ),
            (
                TreePath::root().child("school")?,
                Value::from(session.stored_school()),
            ),
            (
                TreePath::root().child("grade")?,
                Value::from(session.stored_grade()),
            ),
        ];
        let record = session.into_session(id.clone(), audio);
        let payload = serde_json::to_value(&record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        writes.push((TreePath::root().child(SESSIONS)?.child(id.as_str())?, payload));

        self.tree.update(&student, writes).await?;
        debug!(student = %key, session = %id, "session appended");
        Ok(id)
    }

    /// Decide what replaces the raw recording in the stored record.
    async fn store_audio(
        &self,
        key: &StudentKey,
        id: &SessionId,
        payload: Option<String>,
    ) -> Option<StoredAudio> {
        let payload = payload.filter(|p| !p.is_empty())?;
        let folder = match &self.settings.audio {
            AudioMode::Inline => return Some(StoredAudio::Inline(payload)),
            AudioMode::Blob { folder } => folder.trim_matches('/'),
        };
        let Some(blobs) = &self.blobs else {
            warn!(student = %key, session = %id, "no blob store configured; dropping audio");
            return None;
        };

        let path = format!("{folder}/{key}/{id}");
        match upload(blobs.as_ref(), &path, &payload).await {
            Ok(url) => Some(StoredAudio::Url(url)),
            Err(err) => {
                warn!(%err, path = %path, "audio upload failed; saving session without audio");
                None
            }
        }
    }

    async fn list_students(&self) -> Result<Vec<StudentSummary>, SessionStoreError> {
        let Some(Value::Object(nodes)) = self.tree.get(&self.students_path()?).await? else {
            return Ok(Vec::new());
        };
        let mut summaries: Vec<StudentSummary> = nodes
            .into_iter()
            .map(|(key, node)| StudentNode::from_value(node).summarize(StudentKey::from_stored(key)))
            .collect();
        summaries.sort_by(|a, b| collate::compare(&a.name, &b.name).then_with(|| a.key.cmp(&b.key)));
        debug!(students = summaries.len(), "students listed");
        Ok(summaries)
    }

    async fn get_student(&self, key: &StudentKey) -> Result<Option<Student>, SessionStoreError> {
        let Some(node) = self.tree.get(&self.student_path(key)?).await? else {
            return Ok(None);
        };
        Ok(Some(StudentNode::from_value(node).into_student(key.clone())))
    }

    async fn list_sessions(&self, key: &StudentKey) -> Result<Vec<Session>, SessionStoreError> {
        let path = self.student_path(key)?.child(SESSIONS)?;
        let Some(map) = self.tree.get(&path).await? else {
            return Ok(Vec::new());
        };
        let mut sessions = sessions_from_value(map);
        sort_by_date(&mut sessions);
        Ok(sessions)
    }

    async fn set_evaluation(
        &self,
        key: &StudentKey,
        session_id: &SessionId,
        evaluation: Value,
    ) -> Result<(), SessionStoreError> {
        let path = self
            .student_path(key)?
            .child(SESSIONS)?
            .child(session_id.as_str())?
            .child(EVALUATION)?;
        self.tree.set(&path, evaluation).await?;
        debug!(student = %key, session = %session_id, "evaluation updated");
        Ok(())
    }
}

async fn upload(blobs: &dyn BlobStore, path: &str, payload: &str) -> Result<String, StorageError> {
    blobs.upload_base64(path, payload).await?;
    blobs.download_url(path).await
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SessionStore>();
    }

    #[test]
    fn disabled_store_has_no_backend() {
        assert!(SessionStore::disabled().backend.is_none());
        assert!(
            SessionStore::in_memory(Clock::default_clock(), StoreSettings::default())
                .backend
                .is_some()
        );
    }

    #[test]
    fn invalid_root_fails_initialization() {
        let mut config = StoreConfig::from_lookup(|name| {
            (name == crate::config::ENV_DB_URL).then(|| "https://demo.firebaseio.com".to_owned())
        })
        .unwrap();
        config.settings.root = "/bad.root".into();
        assert!(matches!(
            SessionStore::initialize(&config, Clock::default_clock()),
            Err(StoreInitError::InvalidRoot(_))
        ));
    }
}
