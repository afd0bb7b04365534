//! Frames carried by a relay session.

use bytes::Bytes;

/// One message on a duplex connection.
///
/// Ping/pong never reach this level; the socket libraries answer them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    /// The sending side is going away.
    Close,
}

impl Frame {
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Self::Close)
    }

    /// Payload size in bytes, zero for `Close`.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
            Self::Close => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
