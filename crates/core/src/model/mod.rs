mod ids;
mod session;
mod student;
mod wire;

pub use ids::{KEY_SEPARATOR, KeyError, SessionId, StudentKey};
pub use session::{
    NewSession, Session, StoredAudio, UNSPECIFIED_SCHOOL, sessions_from_map, sessions_from_value,
    sort_by_date,
};
pub use student::{Student, StudentNode, StudentSummary};
