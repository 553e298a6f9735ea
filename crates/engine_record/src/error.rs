//! Recording error types.

/// Errors that can occur while persisting or reading back records.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Failed to encode a record to MessagePack.
    #[error("failed to encode record: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a record from MessagePack.
    #[error("failed to decode record: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The underlying sink or source failed.
    #[error("record I/O error: {0}")]
    Io(#[from] std::io::Error),
}
