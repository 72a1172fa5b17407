//! `gatehouse-sessions` — sliding-TTL sessions keyed by (token, key).
//!
//! Sessions live in memory. A background worker purges idle ones; a durable
//! manager loads its snapshot file on open and rewrites it on close.

pub mod error;
pub mod manager;
pub mod session;
mod snapshot;
pub mod worker;

pub use error::{SessionError, SessionResult};
pub use manager::{SNAPSHOT_FILE, SessionKeys, SessionManager};
pub use session::Session;
pub use worker::PurgeWorker;
