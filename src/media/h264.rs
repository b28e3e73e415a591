//! H.264/AVC decoder configuration
//!
//! Video sequence-header packets carry an AVCDecoderConfigurationRecord:
//! ```text
//! configurationVersion (1) | AVCProfileIndication (1) | profile_compatibility (1)
//! | AVCLevelIndication (1) | lengthSizeMinusOne (1, lower 2 bits)
//! | numOfSPS (1, lower 5 bits) | { spsLength (2) | spsNALUnit }*
//! | numOfPPS (1) | { ppsLength (2) | ppsNALUnit }*
//! ```

use bytes::{Buf, Bytes};

use crate::error::MediaError;

const PROFILE_NAMES: [(u8, &str); 7] = [
    (66, "Baseline"),
    (77, "Main"),
    (88, "Extended"),
    (100, "High"),
    (110, "High 10"),
    (122, "High 4:2:2"),
    (244, "High 4:4:4"),
];

/// Decoded video sequence header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcConfig {
    /// `profile_idc`
    pub profile: u8,
    pub compatibility: u8,
    /// `level_idc`, ten times the level number
    pub level: u8,
    /// Bytes in each NAL unit length prefix
    pub nalu_length_size: u8,
    pub sps: Vec<Bytes>,
    pub pps: Vec<Bytes>,
    /// The record exactly as received
    pub raw: Bytes,
}

impl AvcConfig {
    /// Decode an AVCDecoderConfigurationRecord
    pub fn parse(data: Bytes) -> Result<Self, MediaError> {
        let (version, profile, compatibility, level, length_size, sps_count) = match &data[..] {
            &[v, p, c, l, n, s, _, ..] => (v, p, c, l, n, s),
            _ => return Err(MediaError::InvalidAvcConfig("record too short")),
        };
        if version != 1 {
            return Err(MediaError::InvalidAvcConfig("unsupported configuration version"));
        }

        let mut body = data.slice(6..);

        let sps_count = (sps_count & 0x1F) as usize;
        if sps_count == 0 {
            return Err(MediaError::InvalidAvcConfig("no SPS"));
        }
        let sps = read_parameter_sets(&mut body, sps_count)?;

        if !body.has_remaining() {
            return Err(MediaError::InvalidAvcConfig("missing PPS count"));
        }
        let pps_count = body.get_u8() as usize;
        let pps = read_parameter_sets(&mut body, pps_count)?;

        Ok(Self {
            profile,
            compatibility,
            level,
            nalu_length_size: (length_size & 0x03) + 1,
            sps,
            pps,
            raw: data,
        })
    }

    pub fn profile_name(&self) -> &'static str {
        PROFILE_NAMES
            .iter()
            .find(|(idc, _)| *idc == self.profile)
            .map_or("Unknown", |(_, name)| *name)
    }

    /// Level in dotted form, "3.1" for `level_idc` 31
    pub fn level_string(&self) -> String {
        format!("{}.{}", self.level / 10, self.level % 10)
    }
}

fn read_parameter_sets(data: &mut Bytes, count: usize) -> Result<Vec<Bytes>, MediaError> {
    let mut sets = Vec::with_capacity(count);
    for _ in 0..count {
        if data.len() < 2 {
            return Err(MediaError::InvalidAvcConfig("truncated parameter set length"));
        }
        let len = data.get_u16() as usize;
        if data.len() < len {
            return Err(MediaError::InvalidAvcConfig("truncated parameter set"));
        }
        sets.push(data.copy_to_bytes(len));
    }
    Ok(sets)
}
