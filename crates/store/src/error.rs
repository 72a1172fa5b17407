use thiserror::Error;

use crate::codec::CodecError;

/// Store operation error.
///
/// - **MissingBucket**: a transaction addressed a bucket that was never created.
///   Callers that create their buckets up front should treat this as corruption.
/// - **Codec**: a value could not be encoded or decoded by the bucket's codec.
/// - **Io** / **Snapshot**: the backing file could not be read or written.
/// - **Cipher**: an encrypted file could not be sealed or opened (wrong key,
///   tampered or truncated file).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket not found: {0}")]
    MissingBucket(String),

    #[error("codec failure in bucket '{bucket}': {source}")]
    Codec {
        bucket: String,
        #[source]
        source: CodecError,
    },

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error("store cipher error: {0}")]
    Cipher(String),
}

impl StoreError {
    pub fn codec(bucket: impl Into<String>, source: CodecError) -> Self {
        Self::Codec {
            bucket: bucket.into(),
            source,
        }
    }

    /// The codec's own error, if this is a codec failure.
    pub fn codec_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            StoreError::Codec { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
