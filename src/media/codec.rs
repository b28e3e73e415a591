//! Stream descriptors
//!
//! One `CodecData` describes one elementary stream of the queue's stream
//! table. Descriptors come either from the publisher's header or from
//! in-band sequence headers decoded with [`decode_avc_config`] and
//! [`decode_aac_config`].

use bytes::Bytes;

use super::aac::AudioSpecificConfig;
use super::h264::AvcConfig;
use super::packet::MediaKind;
use crate::error::MediaError;

/// Codec of an elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    H264,
    Aac,
}

impl CodecType {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            CodecType::H264 => MediaKind::Video,
            CodecType::Aac => MediaKind::Audio,
        }
    }

    pub fn is_video(&self) -> bool {
        self.media_kind() == MediaKind::Video
    }

    pub fn is_audio(&self) -> bool {
        self.media_kind() == MediaKind::Audio
    }
}

/// Codec parameters for one elementary stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecData {
    H264(AvcConfig),
    Aac(AudioSpecificConfig),
}

impl CodecData {
    pub fn codec_type(&self) -> CodecType {
        match self {
            CodecData::H264(_) => CodecType::H264,
            CodecData::Aac(_) => CodecType::Aac,
        }
    }

    pub fn is_video(&self) -> bool {
        self.codec_type().is_video()
    }

    pub fn is_audio(&self) -> bool {
        self.codec_type().is_audio()
    }

    /// Raw configuration bytes as carried by the sequence header
    pub fn raw(&self) -> &Bytes {
        match self {
            CodecData::H264(config) => &config.raw,
            CodecData::Aac(config) => &config.raw,
        }
    }

    /// Short human readable description, used in logs
    pub fn describe(&self) -> String {
        match self {
            CodecData::H264(config) => {
                format!("H.264 {} {}", config.profile_name(), config.level_string())
            }
            CodecData::Aac(config) => format!(
                "{} {}Hz {}ch",
                config.profile().map(|p| p.name()).unwrap_or("AAC"),
                config.sampling_frequency,
                config.channels()
            ),
        }
    }
}

/// Decode a video sequence header payload
pub fn decode_avc_config(data: Bytes) -> Result<CodecData, MediaError> {
    AvcConfig::parse(data).map(CodecData::H264)
}

/// Decode an audio sequence header payload
pub fn decode_aac_config(data: Bytes) -> Result<CodecData, MediaError> {
    AudioSpecificConfig::parse(data).map(CodecData::Aac)
}
