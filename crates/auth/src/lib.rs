//! `gatehouse-auth` — users, group membership and resource permissions.
//!
//! All state lives in a [`gatehouse_store::Store`]; every mutation runs inside
//! a single store transaction. Password hashing runs before a transaction is
//! opened, never inside one.

pub mod groups;
pub mod hasher;
pub mod identity;
pub mod mac;
pub mod permissions;
pub mod user;

pub use groups::{GroupError, GroupSet, GroupStore};
pub use hasher::{Argon2Hasher, HashError, PasswordHasher};
pub use identity::{IdentityError, IdentityStore};
pub use mac::{TokenEncoding, create_mac, random_token, verify_mac};
pub use permissions::{Action, PermissionEngine, PermissionError};
pub use user::{InvalidStatus, Status, User};
