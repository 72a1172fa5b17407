//! Identity store: users, the username index and the id counter.
//!
//! Three buckets back this component:
//! - `users`: user id → `User<P>` (JSON)
//! - `logins`: username → user id
//! - `index`: counter name → last issued decimal id
//!
//! Every mutation runs in one `Store::update`. Password hashing happens before
//! the transaction is opened so the single-writer section never does
//! CPU-bound work.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use gatehouse_core::{SharedClock, SystemClock, UserId, next_decimal};
use gatehouse_store::{Bucket, Store, StoreError, TextCodec, Txn, WriteTxn};

use crate::hasher::{Argon2Hasher, HashError, PasswordHasher};
use crate::user::{InvalidStatus, Status, User, UserCodec};

pub const USERS_BUCKET: &str = "users";
pub const LOGINS_BUCKET: &str = "logins";
pub const INDEX_BUCKET: &str = "index";

/// Counter key in the `index` bucket for user ids.
const USERS_COUNTER: &str = "users";

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("user already exists")]
    UserExists,

    #[error("user not found")]
    UserNotFound,

    #[error("user has no id")]
    NoID,

    #[error("user has no password")]
    NoPassword,

    #[error("password is not hashed")]
    PlainPassword,

    #[error("bad status code {0}")]
    BadStatus(u64),

    #[error("new user already carries an id")]
    NewUserWithID,

    #[error("username is empty")]
    EmptyUsername,

    #[error("user id cannot be changed")]
    IdChanged,

    #[error("invalid login")]
    InvalidLogin,

    #[error("edit cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("identity data corrupted: {0}")]
    Corrupted(String),

    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        if let Some(InvalidStatus(code)) = err
            .codec_source()
            .and_then(|source| source.downcast_ref::<InvalidStatus>())
        {
            return IdentityError::BadStatus(*code);
        }
        match err {
            StoreError::MissingBucket(bucket) => {
                error!(bucket = %bucket, "identity bucket missing");
                IdentityError::Corrupted(format!("missing bucket '{bucket}'"))
            }
            other => IdentityError::Store(other),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Transactional user store with unique usernames and monotonic ids.
pub struct IdentityStore<P = serde_json::Value, H = Argon2Hasher> {
    store: Store,
    hasher: H,
    clock: SharedClock,
    users: Bucket<UserCodec<P>>,
    logins: Bucket<TextCodec>,
    index: Bucket<TextCodec>,
}

impl<P, H> IdentityStore<P, H>
where
    P: Serialize + DeserializeOwned,
    H: PasswordHasher,
{
    /// Bind to `store`, creating the identity buckets if needed.
    pub fn new(store: Store, hasher: H) -> Result<Self, IdentityError> {
        store.ensure_buckets(&[USERS_BUCKET, LOGINS_BUCKET, INDEX_BUCKET])?;
        Ok(Self {
            store,
            hasher,
            clock: SystemClock::shared(),
            users: Bucket::new(USERS_BUCKET, UserCodec::new()),
            logins: Bucket::new(LOGINS_BUCKET, TextCodec),
            index: Bucket::new(INDEX_BUCKET, TextCodec),
        })
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Create an `Inactive` user with no profile.
    pub fn create_user(&self, username: &str, password: &str) -> Result<UserId, IdentityError> {
        self.insert_user(User::new(username), password)
    }

    /// Persist a caller-prepared user.
    ///
    /// The username is checked against the index before an id is allocated,
    /// so a conflict never consumes a counter value.
    pub fn insert_user(&self, mut user: User<P>, password: &str) -> Result<UserId, IdentityError> {
        if !user.id.is_empty() {
            return Err(IdentityError::NewUserWithID);
        }
        if user.username.is_empty() {
            return Err(IdentityError::EmptyUsername);
        }
        user.password_hash = self.hash_password(password)?;

        let now = self.clock.now();
        user.created_at = now;
        user.last_updated_at = now;

        let id = self.store.update(|tx| {
            if tx.contains(&self.logins, &user.username)? {
                return Err(IdentityError::UserExists);
            }
            let id = self.next_id(tx)?;
            user.id = id.clone();
            tx.put(&self.users, id.as_str(), &user)?;
            tx.put(&self.logins, user.username.clone(), &id.to_string())?;
            Ok(id)
        })?;

        info!(user_id = %id, username = %user.username, "user created");
        Ok(id)
    }

    /// Allocate the next user id inside an open write transaction.
    ///
    /// The counter is persisted by the same transaction, so an aborted
    /// transaction does not consume an id.
    pub fn next_id(&self, tx: &mut WriteTxn) -> Result<UserId, IdentityError> {
        let current = tx.get(&self.index, USERS_COUNTER)?;
        let next = next_decimal(current.as_deref()).map_err(|e| {
            error!(error = %e, "user id counter unreadable");
            IdentityError::Corrupted(e.to_string())
        })?;
        tx.put(&self.index, USERS_COUNTER, &next)?;
        Ok(UserId::new(next))
    }

    /// Load, mutate and re-validate a user in one transaction.
    ///
    /// Returning an error from `mutate` discards the edit.
    pub fn edit_user_by_id<F>(&self, id: &UserId, mutate: F) -> Result<User<P>, IdentityError>
    where
        F: FnOnce(&mut User<P>) -> Result<(), IdentityError>,
    {
        self.store.update(|tx| self.edit_in(tx, id, mutate))
    }

    pub fn edit_user_by_name<F>(&self, username: &str, mutate: F) -> Result<User<P>, IdentityError>
    where
        F: FnOnce(&mut User<P>) -> Result<(), IdentityError>,
    {
        self.store.update(|tx| {
            let id = self.lookup_id(&*tx, username)?;
            self.edit_in(tx, &id, mutate)
        })
    }

    fn edit_in<F>(&self, tx: &mut WriteTxn, id: &UserId, mutate: F) -> Result<User<P>, IdentityError>
    where
        F: FnOnce(&mut User<P>) -> Result<(), IdentityError>,
    {
        let mut user = tx
            .get(&self.users, id.as_str())?
            .ok_or(IdentityError::UserNotFound)?;
        let previous_name = user.username.clone();

        mutate(&mut user)?;
        self.validate(&user, id)?;

        if user.username != previous_name {
            if tx.contains(&self.logins, &user.username)? {
                return Err(IdentityError::UserExists);
            }
            tx.delete(&self.logins, &previous_name)?;
            tx.put(&self.logins, user.username.clone(), &id.to_string())?;
            debug!(user_id = %id, from = %previous_name, to = %user.username, "username changed");
        }

        user.last_updated_at = self.clock.now();
        tx.put(&self.users, id.as_str(), &user)?;
        debug!(user_id = %id, "user updated");
        Ok(user)
    }

    fn validate(&self, user: &User<P>, id: &UserId) -> Result<(), IdentityError> {
        if user.id.is_empty() {
            return Err(IdentityError::NoID);
        }
        if &user.id != id {
            return Err(IdentityError::IdChanged);
        }
        if user.username.is_empty() {
            return Err(IdentityError::EmptyUsername);
        }
        if user.password_hash.is_empty() {
            return Err(IdentityError::NoPassword);
        }
        if !self.hasher.is_hashed(&user.password_hash) {
            return Err(IdentityError::PlainPassword);
        }
        Ok(())
    }

    fn lookup_id<T: Txn>(&self, tx: &T, username: &str) -> Result<UserId, IdentityError> {
        tx.get(&self.logins, username)?
            .map(UserId::from)
            .ok_or(IdentityError::UserNotFound)
    }

    pub fn get_user_by_id(&self, id: &UserId) -> Result<User<P>, IdentityError> {
        self.store.read(|tx| {
            tx.get(&self.users, id.as_str())?
                .ok_or(IdentityError::UserNotFound)
        })
    }

    pub fn get_user_by_name(&self, username: &str) -> Result<User<P>, IdentityError> {
        self.store.read(|tx| {
            let id = self.lookup_id(tx, username)?;
            tx.get(&self.users, id.as_str())?
                .ok_or_else(|| {
                    error!(user_id = %id, username, "login index points at a missing user");
                    IdentityError::Corrupted(format!("no user record for id {id}"))
                })
        })
    }

    /// Resolve a username through the index without loading the record.
    pub fn user_id(&self, username: &str) -> Result<UserId, IdentityError> {
        self.store.read(|tx| self.lookup_id(tx, username))
    }

    /// Visit every user in lexicographic key order (`"10"` sorts before `"2"`).
    /// A visitor error stops the walk.
    pub fn for_each_user<F>(&self, mut visit: F) -> Result<(), IdentityError>
    where
        F: FnMut(User<P>) -> Result<(), IdentityError>,
    {
        self.store
            .read(|tx| tx.for_each(&self.users, |_, user| visit(user)))
    }

    /// Hash a plaintext password outside any transaction.
    pub fn hash_password(&self, password: &str) -> Result<String, IdentityError> {
        if password.is_empty() {
            return Err(IdentityError::NoPassword);
        }
        Ok(self.hasher.hash(password)?)
    }

    /// Replace a user's password.
    pub fn set_password(&self, id: &UserId, password: &str) -> Result<User<P>, IdentityError> {
        let hash = self.hash_password(password)?;
        self.edit_user_by_id(id, move |user| {
            user.password_hash = hash;
            Ok(())
        })
    }

    /// Check credentials. Unknown users, wrong passwords and banned accounts
    /// all yield [`IdentityError::InvalidLogin`].
    pub fn verify_login(&self, username: &str, password: &str) -> Result<User<P>, IdentityError> {
        let user = match self.get_user_by_name(username) {
            Ok(user) => user,
            Err(IdentityError::UserNotFound) => return Err(IdentityError::InvalidLogin),
            Err(e) => return Err(e),
        };
        if user.status == Status::Banned {
            warn!(user_id = %user.id, "login refused for banned user");
            return Err(IdentityError::InvalidLogin);
        }
        if !self.hasher.verify(&user.password_hash, password) {
            return Err(IdentityError::InvalidLogin);
        }
        Ok(user)
    }
}
