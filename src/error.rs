//! Error types
//!
//! `MediaError` covers codec configuration decoding, `QueueError` covers the
//! publisher/subscriber queue.

use crate::media::MediaKind;

/// Error decoding a codec configuration blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// AVCDecoderConfigurationRecord could not be decoded
    InvalidAvcConfig(&'static str),
    /// MPEG-4 AudioSpecificConfig could not be decoded
    InvalidAacConfig(&'static str),
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaError::InvalidAvcConfig(reason) => write!(f, "Invalid AVC config: {}", reason),
            MediaError::InvalidAacConfig(reason) => write!(f, "Invalid AAC config: {}", reason),
        }
    }
}

impl std::error::Error for MediaError {}

/// Error type for queue operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// A sequence header payload failed to decode; the packet was not enqueued
    InvalidSequenceHeader {
        /// Media kind of the rejected packet
        kind: MediaKind,
        /// Underlying decode failure
        source: MediaError,
    },
    /// The queue is closed and no more data exists for this call
    EndOfStream,
}

impl QueueError {
    /// Check if this is the end-of-stream condition
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, QueueError::EndOfStream)
    }
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::InvalidSequenceHeader { kind, source } => {
                write!(f, "Invalid {} sequence header: {}", kind, source)
            }
            QueueError::EndOfStream => write!(f, "End of stream"),
        }
    }
}

impl std::error::Error for QueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueueError::InvalidSequenceHeader { source, .. } => Some(source),
            QueueError::EndOfStream => None,
        }
    }
}

/// Result alias for queue operations
pub type Result<T, E = QueueError> = std::result::Result<T, E>;
