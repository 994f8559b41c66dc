//! Audio stream format (`strf` of an `auds` stream).
//!
//! The payload is a `WAVEFORMAT` (14 bytes), `PCMWAVEFORMAT` (16 bytes) or
//! `WAVEFORMATEX` (18 bytes plus `cbSize` bytes of codec data).

use std::fmt::{Display, Formatter};

use anyhow::{Result, ensure};
use log::{debug, warn};

use crate::structs::fourcc::FourCC;
use crate::utils::byte_reader::LeSliceReader;
use crate::utils::errors::HeaderError;

pub const WAVE_FORMAT_MIN_SIZE: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormatTag {
    #[default]
    Pcm,
    Adpcm,
    IeeeFloat,
    ALaw,
    MuLaw,
    ImaAdpcm,
    Gsm610,
    Mp2,
    Mp3,
    Aac,
    Extensible,
    Other(u16),
}

impl From<u16> for AudioFormatTag {
    fn from(value: u16) -> Self {
        match value {
            0x0001 => Self::Pcm,
            0x0002 => Self::Adpcm,
            0x0003 => Self::IeeeFloat,
            0x0006 => Self::ALaw,
            0x0007 => Self::MuLaw,
            0x0011 => Self::ImaAdpcm,
            0x0031 => Self::Gsm610,
            0x0050 => Self::Mp2,
            0x0055 => Self::Mp3,
            0x00FF => Self::Aac,
            0xFFFE => Self::Extensible,
            _ => Self::Other(value),
        }
    }
}

impl From<AudioFormatTag> for u16 {
    fn from(value: AudioFormatTag) -> Self {
        match value {
            AudioFormatTag::Pcm => 0x0001,
            AudioFormatTag::Adpcm => 0x0002,
            AudioFormatTag::IeeeFloat => 0x0003,
            AudioFormatTag::ALaw => 0x0006,
            AudioFormatTag::MuLaw => 0x0007,
            AudioFormatTag::ImaAdpcm => 0x0011,
            AudioFormatTag::Gsm610 => 0x0031,
            AudioFormatTag::Mp2 => 0x0050,
            AudioFormatTag::Mp3 => 0x0055,
            AudioFormatTag::Aac => 0x00FF,
            AudioFormatTag::Extensible => 0xFFFE,
            AudioFormatTag::Other(v) => v,
        }
    }
}

impl Display for AudioFormatTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AudioFormatTag::Pcm => "PCM",
            AudioFormatTag::Adpcm => "MS ADPCM",
            AudioFormatTag::IeeeFloat => "IEEE float",
            AudioFormatTag::ALaw => "A-law",
            AudioFormatTag::MuLaw => "mu-law",
            AudioFormatTag::ImaAdpcm => "IMA ADPCM",
            AudioFormatTag::Gsm610 => "GSM 6.10",
            AudioFormatTag::Mp2 => "MPEG-1 Layer II",
            AudioFormatTag::Mp3 => "MPEG-1 Layer III",
            AudioFormatTag::Aac => "AAC",
            AudioFormatTag::Extensible => "Extensible",
            AudioFormatTag::Other(v) => return write!(f, "Unknown({v:#06X})"),
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioFormat {
    pub format_tag: AudioFormatTag,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    /// 0 when the payload is a bare `WAVEFORMAT`.
    pub bits_per_sample: u16,
    pub extra_data: Vec<u8>,
}

impl AudioFormat {
    pub fn read(payload: &[u8]) -> Result<Self> {
        ensure!(
            payload.len() >= WAVE_FORMAT_MIN_SIZE,
            HeaderError::Truncated {
                chunk: FourCC::STRF,
                needed: WAVE_FORMAT_MIN_SIZE,
                got: payload.len(),
            }
        );

        let reader = &mut LeSliceReader::from_slice(payload);
        let mut format = Self {
            format_tag: reader.get_u16()?.into(),
            channels: reader.get_u16()?,
            sample_rate: reader.get_u32()?,
            avg_bytes_per_sec: reader.get_u32()?,
            block_align: reader.get_u16()?,
            ..Default::default()
        };

        if reader.available()? >= 2 {
            format.bits_per_sample = reader.get_u16()?;
        }

        if reader.available()? >= 2 {
            let cb_size = reader.get_u16()? as usize;
            format.extra_data = reader.get_bytes_up_to(cb_size)?;
            if format.extra_data.len() < cb_size {
                warn!(
                    "strf: cbSize {cb_size} exceeds payload, {} bytes of codec data available",
                    format.extra_data.len()
                );
            }
        }

        debug!(
            "strf: {} {} ch, {} Hz, {} bits, block align {}",
            format.format_tag,
            format.channels,
            format.sample_rate,
            format.bits_per_sample,
            format.block_align
        );

        Ok(format)
    }

    pub fn is_pcm(&self) -> bool {
        self.format_tag == AudioFormatTag::Pcm
    }
}

#[cfg(test)]
pub(crate) fn audio_format_bytes(channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let mut data = Vec::with_capacity(18);
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&channels.to_le_bytes());
    data.extend_from_slice(&sample_rate.to_le_bytes());
    data.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    data.extend_from_slice(&block_align.to_le_bytes());
    data.extend_from_slice(&bits.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data
}

#[test]
fn read_pcm_format() -> Result<()> {
    let payload = audio_format_bytes(2, 44100, 16);

    let format = AudioFormat::read(&payload)?;
    assert_eq!(format.format_tag, AudioFormatTag::Pcm);
    assert_eq!(format.channels, 2);
    assert_eq!(format.sample_rate, 44100);
    assert_eq!(format.bits_per_sample, 16);
    assert_eq!(format.block_align, 4);
    assert_eq!(format.avg_bytes_per_sec, 176_400);
    assert!(format.extra_data.is_empty());

    let short = AudioFormat::read(&payload[..16])?;
    assert_eq!(short.bits_per_sample, 16);

    let bare = AudioFormat::read(&payload[..14])?;
    assert_eq!(bare.bits_per_sample, 0);

    assert!(AudioFormat::read(&payload[..12]).is_err());
    Ok(())
}

#[test]
fn read_extended_format() -> Result<()> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&0x55u16.to_le_bytes());
    payload.extend_from_slice(&2u16.to_le_bytes());
    payload.extend_from_slice(&48_000u32.to_le_bytes());
    payload.extend_from_slice(&16_000u32.to_le_bytes());
    payload.extend_from_slice(&1u16.to_le_bytes());
    payload.extend_from_slice(&0u16.to_le_bytes());
    payload.extend_from_slice(&12u16.to_le_bytes());
    payload.extend_from_slice(&[1, 2, 3, 4, 5]);

    let format = AudioFormat::read(&payload)?;
    assert_eq!(format.format_tag, AudioFormatTag::Mp3);
    assert_eq!(format.format_tag.to_string(), "MPEG-1 Layer III");
    assert_eq!(format.extra_data, vec![1, 2, 3, 4, 5]);
    assert!(!format.is_pcm());
    assert_eq!(u16::from(AudioFormatTag::from(0x1234)), 0x1234);
    Ok(())
}
