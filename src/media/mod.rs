//! Media types handled by the queue
//!
//! This module provides:
//! - The `Packet` type fanned out to subscribers
//! - H.264 decoder configuration parsing
//! - AAC AudioSpecificConfig parsing
//! - `CodecData` stream descriptors built from either

pub mod aac;
pub mod codec;
pub mod h264;
pub mod packet;

pub use aac::{AacProfile, AudioSpecificConfig};
pub use codec::{decode_aac_config, decode_avc_config, CodecData, CodecType};
pub use h264::AvcConfig;
pub use packet::{MediaKind, Packet};
