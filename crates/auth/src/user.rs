//! The user record.

use core::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gatehouse_core::UserId;
use gatehouse_store::{Codec, CodecError};

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// User account status.
///
/// Persisted as a numeric code: 1 = Active, 2 = Inactive, 3 = Banned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Status {
    Active,
    /// Freshly created accounts start here until activated.
    #[default]
    Inactive,
    /// Deactivated; refused at login. There is no hard delete.
    Banned,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("bad status code {0}")]
pub struct InvalidStatus(pub u64);

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Active => 1,
            Status::Inactive => 2,
            Status::Banned => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, InvalidStatus> {
        match code {
            1 => Ok(Status::Active),
            2 => Ok(Status::Inactive),
            3 => Ok(Status::Banned),
            other => Err(InvalidStatus(u64::from(other))),
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = InvalidStatus;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Status::from_code(code)
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Status::Active => write!(f, "Active"),
            Status::Inactive => write!(f, "Inactive"),
            Status::Banned => write!(f, "Banned"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A system user.
///
/// `P` is the caller's profile payload. The identity store never looks inside
/// it; it is decoded with the type the store was constructed with.
///
/// # Invariants (enforced by `IdentityStore`)
/// - `id` is assigned once by the store and never changes.
/// - `username` is unique across users.
/// - `password_hash` is never plaintext once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User<P = serde_json::Value> {
    #[serde(default, skip_serializing_if = "UserId::is_empty")]
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub profile: Option<P>,
}

impl<P> User<P> {
    /// A not-yet-persisted user (no id, no password, `Inactive`).
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: UserId::default(),
            username: username.into(),
            password_hash: String::new(),
            status: Status::default(),
            created_at: DateTime::<Utc>::default(),
            last_updated_at: DateTime::<Utc>::default(),
            profile: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_profile(mut self, profile: P) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Codec
// ─────────────────────────────────────────────────────────────────────────────

/// JSON codec for `User<P>`.
///
/// The status code is checked before the full decode so an unknown code
/// surfaces as [`InvalidStatus`] instead of a generic parse error.
pub(crate) struct UserCodec<P>(PhantomData<fn() -> P>);

impl<P> UserCodec<P> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<P> Codec for UserCodec<P>
where
    P: Serialize + DeserializeOwned,
{
    type Value = User<P>;

    fn encode(&self, user: &User<P>) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(user)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<User<P>, CodecError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let code = value
            .get("status")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or_default();
        u8::try_from(code)
            .map_err(|_| InvalidStatus(code))
            .and_then(Status::from_code)?;
        Ok(serde_json::from_value(value)?)
    }
}
