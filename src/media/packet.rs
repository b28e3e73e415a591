//! Media packet type
//!
//! One encoded access unit as produced by a demuxer and fanned out to every
//! subscriber cursor.

use std::time::Duration;

use bytes::Bytes;

/// Kind of elementary stream a packet belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Video stream
    Video,
    /// Audio stream
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single encoded media packet
///
/// Cheap to clone: the payload is reference counted, so every cursor that
/// reads the packet shares the same allocation. The `jumped` marker belongs
/// to the clone a reader observes, never to the buffered original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Stream index into the queue's stream table
    pub idx: usize,
    /// Media kind
    pub kind: MediaKind,
    /// Whether this is a key-frame (video only)
    pub is_keyframe: bool,
    /// Whether the payload is codec configuration rather than media
    pub is_seq_header: bool,
    /// Presentation timestamp
    pub time: Duration,
    /// Composition time offset (for B-frames)
    pub composition_time: Duration,
    /// Payload (zero-copy via reference counting)
    pub data: Bytes,
    /// Set when the reader crossed evicted data that included a sequence header
    pub jumped: bool,
}

impl Packet {
    /// Create a video packet
    pub fn video(time: Duration, data: Bytes, is_keyframe: bool) -> Self {
        Self {
            idx: 0,
            kind: MediaKind::Video,
            is_keyframe,
            is_seq_header: false,
            time,
            composition_time: Duration::ZERO,
            data,
            jumped: false,
        }
    }

    /// Create an audio packet
    pub fn audio(time: Duration, data: Bytes) -> Self {
        Self {
            idx: 0,
            kind: MediaKind::Audio,
            is_keyframe: false,
            is_seq_header: false,
            time,
            composition_time: Duration::ZERO,
            data,
            jumped: false,
        }
    }

    /// Set the stream index
    pub fn with_index(mut self, idx: usize) -> Self {
        self.idx = idx;
        self
    }

    /// Set the composition time offset
    pub fn with_composition_time(mut self, offset: Duration) -> Self {
        self.composition_time = offset;
        self
    }

    /// Mark this packet as a sequence header
    pub fn sequence_header(mut self) -> Self {
        self.is_seq_header = true;
        self
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    pub fn is_audio(&self) -> bool {
        self.kind == MediaKind::Audio
    }

    /// Check if this is a video key-frame, the retention trigger
    pub fn is_video_keyframe(&self) -> bool {
        self.is_video() && self.is_keyframe
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
