//! `gatehouse-core` — shared building blocks for the identity and session crates.
//!
//! This crate holds no storage or transport concerns: identifiers, the
//! decimal id counter, the clock abstraction and process configuration.

pub mod clock;
pub mod config;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{HashSettings, SessionSettings, Settings};
pub use error::{CoreError, CoreResult};
pub use id::{UserId, next_decimal};
