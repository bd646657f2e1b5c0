//! Error types for the protocol layer.
//!
//! Every read from a payload is fallible: the server controls the bytes,
//! so a short or malformed body must surface as a `ProtocolError`
//! rather than a panic inside the tick loop.

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A read needed more bytes than the payload had left.
    #[error("read of {needed} bytes at offset {offset} runs past the {len}-byte payload")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// A write would have gone past the fixed packet capacity.
    ///
    /// Writes never panic. The packet remembers the first overflow and
    /// reports it here when it is encoded.
    #[error("packet overflow: {attempted} bytes exceed capacity of {capacity}")]
    Overflow { attempted: usize, capacity: usize },

    /// A string, byte array, array, or frame was longer than a `u16`
    /// length prefix can describe.
    #[error("length {0} does not fit a 16-bit length prefix")]
    LengthOverflow(usize),

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The bytes decoded, but into a value the protocol does not allow,
    /// e.g. an unknown enum discriminant or a negative duration.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
