//! AAC audio configuration
//!
//! Audio sequence-header packets carry a bit-packed MPEG-4 AudioSpecificConfig:
//! ```text
//! audioObjectType (5) | samplingFrequencyIndex (4) | [samplingFrequency (24)]
//! | channelConfiguration (4) | frameLengthFlag (1) | dependsOnCoreCoder (1)
//! | extensionFlag (1)
//! ```

use bytes::Bytes;

use crate::error::MediaError;

/// MPEG-4 audio object types a live encoder is likely to announce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacProfile {
    Main,
    Lc,
    Ssr,
    Ltp,
    /// Spectral band replication, announced by HE-AAC encoders
    Sbr,
    Scalable,
}

impl AacProfile {
    const ALL: [(u8, AacProfile, &'static str); 6] = [
        (1, AacProfile::Main, "AAC Main"),
        (2, AacProfile::Lc, "AAC LC"),
        (3, AacProfile::Ssr, "AAC SSR"),
        (4, AacProfile::Ltp, "AAC LTP"),
        (5, AacProfile::Sbr, "HE-AAC"),
        (6, AacProfile::Scalable, "AAC Scalable"),
    ];

    pub fn from_object_type(object_type: u8) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(ot, _, _)| *ot == object_type)
            .map(|(_, profile, _)| *profile)
    }

    /// Display name used in stream descriptions
    pub fn name(&self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, profile, _)| profile == self)
            .map(|(_, _, name)| *name)
            .unwrap_or("AAC")
    }
}

/// Decoded audio sequence header
///
/// Only the leading fields are decoded; extension payloads stay in `raw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    pub audio_object_type: u8,
    /// Index into the standard rate table, 15 when the rate is explicit
    pub sampling_frequency_index: u8,
    /// Hz
    pub sampling_frequency: u32,
    pub channel_configuration: u8,
    /// Set for 960 sample frames
    pub frame_length_flag: bool,
    /// The header exactly as received
    pub raw: Bytes,
}

impl AudioSpecificConfig {
    const SAMPLING_FREQUENCIES: [u32; 13] = [
        96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
    ];

    /// Decode an audio sequence-header payload
    pub fn parse(data: Bytes) -> Result<Self, MediaError> {
        let mut bits = BitReader::new(&data);

        let audio_object_type = match bits.read(5, "truncated object type")? {
            0 => return Err(MediaError::InvalidAacConfig("null audio object type")),
            31 => 32 + bits.read(6, "truncated extended object type")?,
            ot => ot,
        } as u8;

        let sampling_frequency_index = bits.read(4, "truncated sampling index")? as u8;
        let sampling_frequency = match sampling_frequency_index {
            0x0F => bits.read(24, "truncated explicit frequency")?,
            idx => *Self::SAMPLING_FREQUENCIES
                .get(idx as usize)
                .ok_or(MediaError::InvalidAacConfig("reserved sampling index"))?,
        };

        let channel_configuration = bits.read(4, "truncated channel configuration")? as u8;
        let frame_length_flag = bits.read(1, "truncated frame length flag")? == 1;

        Ok(AudioSpecificConfig {
            audio_object_type,
            sampling_frequency_index,
            sampling_frequency,
            channel_configuration,
            frame_length_flag,
            raw: data,
        })
    }

    pub fn profile(&self) -> Option<AacProfile> {
        AacProfile::from_object_type(self.audio_object_type)
    }

    /// Output channel count, 0 when the layout is carried in-band
    pub fn channels(&self) -> u8 {
        match self.channel_configuration {
            7 => 8,
            n @ 1..=6 => n,
            _ => 0,
        }
    }

    pub fn samples_per_frame(&self) -> u32 {
        match self.frame_length_flag {
            true => 960,
            false => 1024,
        }
    }
}

/// MSB-first reader over a byte slice
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Read `n` bits (at most 32), failing with `what` past the end
    fn read(&mut self, n: usize, what: &'static str) -> Result<u32, MediaError> {
        if self.pos + n > self.data.len() * 8 {
            return Err(MediaError::InvalidAacConfig(what));
        }
        let mut value = 0u32;
        for _ in 0..n {
            let bit = (self.data[self.pos / 8] >> (7 - self.pos % 8)) & 1;
            value = (value << 1) | bit as u32;
            self.pos += 1;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lc_stereo() {
        // AAC-LC, 44100 Hz, Stereo
        let config = AudioSpecificConfig::parse(Bytes::from_static(&[0x12, 0x10])).unwrap();
        assert_eq!(config.audio_object_type, 2);
        assert_eq!(config.sampling_frequency_index, 4);
        assert_eq!(config.sampling_frequency, 44100);
        assert_eq!(config.channel_configuration, 2);
        assert_eq!(config.channels(), 2);
        assert_eq!(config.profile(), Some(AacProfile::Lc));
        assert_eq!(config.samples_per_frame(), 1024);
        assert_eq!(config.raw.as_ref(), &[0x12, 0x10]);
    }

    #[test]
    fn test_common_encoder_headers() {
        // b0 = (obj << 3) | (idx >> 1), b1 = ((idx & 1) << 7) | (ch << 3) | (frame_len << 2)
        let test_cases = [
            (&[0x12, 0x10][..], 44100, 2, 1024),
            (&[0x11, 0x90][..], 48000, 2, 1024),
            (&[0x11, 0x88][..], 48000, 1, 1024),
            (&[0x11, 0x94][..], 48000, 2, 960),
        ];

        for (data, expected_freq, expected_channels, expected_samples) in test_cases {
            let config = AudioSpecificConfig::parse(Bytes::copy_from_slice(data)).unwrap();
            assert_eq!(
                config.sampling_frequency, expected_freq,
                "rate for {:02X?}",
                data
            );
            assert_eq!(config.channel_configuration, expected_channels);
            assert_eq!(config.samples_per_frame(), expected_samples);
        }
    }

    #[test]
    fn test_explicit_sampling_frequency() {
        // obj=2, idx=15, freq=44100 (0x00AC44), ch=2
        // bits: 00010 1111 000000001010110001000100 0010 ...
        let data = Bytes::from_static(&[0x17, 0x80, 0x56, 0x22, 0x10]);
        let config = AudioSpecificConfig::parse(data).unwrap();
        assert_eq!(config.sampling_frequency_index, 15);
        assert_eq!(config.sampling_frequency, 44100);
        assert_eq!(config.channel_configuration, 2);
    }

    #[test]
    fn test_escaped_object_type() {
        // 11111 000001 => object type 33, then 44100 Hz stereo
        let config = AudioSpecificConfig::parse(Bytes::from_static(&[0xF8, 0x28, 0x40])).unwrap();
        assert_eq!(config.audio_object_type, 33);
        assert_eq!(config.profile(), None);
        assert_eq!(config.sampling_frequency, 44100);
        assert_eq!(config.channel_configuration, 2);
    }

    #[test]
    fn test_explicit_sampling_frequency_truncated() {
        let data = Bytes::from_static(&[0x17, 0x80, 0x56]);
        assert_eq!(
            AudioSpecificConfig::parse(data),
            Err(MediaError::InvalidAacConfig("truncated explicit frequency"))
        );
    }

    #[test]
    fn test_reserved_sampling_index() {
        // obj=2, idx=13
        let data = Bytes::from_static(&[0x16, 0x90]);
        assert_eq!(
            AudioSpecificConfig::parse(data),
            Err(MediaError::InvalidAacConfig("reserved sampling index"))
        );
    }

    #[test]
    fn test_short_headers_rejected() {
        assert!(AudioSpecificConfig::parse(Bytes::from_static(&[0x12])).is_err());
        assert!(AudioSpecificConfig::parse(Bytes::new()).is_err());
    }

    #[test]
    fn test_null_object_type() {
        assert!(AudioSpecificConfig::parse(Bytes::from_static(&[0x00, 0x10])).is_err());
    }

    #[test]
    fn test_channels_mapping() {
        let mut config = AudioSpecificConfig::parse(Bytes::from_static(&[0x12, 0x10])).unwrap();
        for (value, expected) in [(0, 0), (1, 1), (6, 6), (7, 8), (8, 0)] {
            config.channel_configuration = value;
            assert_eq!(config.channels(), expected);
        }
    }

    #[test]
    fn test_profile_lookup() {
        assert_eq!(AacProfile::from_object_type(5), Some(AacProfile::Sbr));
        assert_eq!(AacProfile::from_object_type(7), None);
        assert_eq!(AacProfile::Lc.name(), "AAC LC");
        assert_eq!(AacProfile::Sbr.name(), "HE-AAC");
    }
}
