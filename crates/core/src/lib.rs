#![forbid(unsafe_code)]

pub mod collate;
pub mod model;
pub mod push_id;
pub mod time;

pub use push_id::PushIdGenerator;
pub use time::Clock;
