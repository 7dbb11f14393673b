//! Errors raised while decoding client frames.

/// A frame that cannot be turned into a [`crate::Packet`].
///
/// The frame is dropped; the connection that sent it survives.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not a JSON object with a string `type`.
    #[error("packet has no type")]
    MissingType,

    /// The `type` is not one this server understands.
    #[error("unknown packet type: {0}")]
    UnknownType(String),

    /// The JSON is invalid or the payload does not fit the type's schema.
    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),
}
