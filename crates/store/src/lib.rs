//! `gatehouse-store` — embedded transactional key/value store.
//!
//! Named buckets of string keys, serializable read-write transactions
//! (`Store::update`) and snapshot read transactions (`Store::read`). Each
//! bucket is bound to a [`Codec`] that turns stored bytes into typed values.
//!
//! A store is either purely in-memory or backed by a single snapshot file that
//! is atomically replaced on every committed write, optionally encrypted at
//! rest.

pub mod bucket;
pub mod cipher;
pub mod codec;
pub mod error;
mod snapshot;
pub mod store;
pub mod txn;

pub use bucket::Bucket;
pub use cipher::SnapshotCipher;
pub use codec::{Codec, CodecError, JsonCodec, TextCodec};
pub use error::StoreError;
pub use store::Store;
pub use txn::{ReadTxn, Txn, WriteTxn};
