//! Per-stream timing and type metadata (`strh`).

use std::fmt::{Display, Formatter};

use anyhow::{Result, ensure};
use log::debug;

use crate::structs::fourcc::FourCC;
use crate::utils::byte_reader::LeSliceReader;
use crate::utils::errors::HeaderError;

/// `strh` payload without the frame rectangle, as written by some muxers.
pub const STREAM_HEADER_MIN_SIZE: usize = 48;

/// Media carried by a stream, from `fccType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Video,
    Other(FourCC),
}

impl From<FourCC> for StreamKind {
    fn from(value: FourCC) -> Self {
        match value {
            FourCC::AUDS => Self::Audio,
            FourCC::VIDS => Self::Video,
            other => Self::Other(other),
        }
    }
}

impl Display for StreamKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Audio => write!(f, "audio"),
            StreamKind::Video => write!(f, "video"),
            StreamKind::Other(fcc) => write!(f, "other ({fcc})"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameRect {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamHeader {
    pub fcc_type: FourCC,
    pub fcc_handler: FourCC,
    pub flags: u32,
    pub priority: u16,
    pub language: u16,
    pub initial_frames: u32,
    pub scale: u32,
    pub rate: u32,
    pub start: u32,
    pub length: u32,
    pub suggested_buffer_size: u32,
    pub quality: u32,
    pub sample_size: u32,
    pub frame: Option<FrameRect>,
}

impl StreamHeader {
    pub fn read(payload: &[u8]) -> Result<Self> {
        ensure!(
            payload.len() >= STREAM_HEADER_MIN_SIZE,
            HeaderError::Truncated {
                chunk: FourCC::STRH,
                needed: STREAM_HEADER_MIN_SIZE,
                got: payload.len(),
            }
        );

        let reader = &mut LeSliceReader::from_slice(payload);
        let mut header = Self {
            fcc_type: reader.get_fourcc()?,
            fcc_handler: reader.get_fourcc()?,
            flags: reader.get_u32()?,
            priority: reader.get_u16()?,
            language: reader.get_u16()?,
            initial_frames: reader.get_u32()?,
            scale: reader.get_u32()?,
            rate: reader.get_u32()?,
            start: reader.get_u32()?,
            length: reader.get_u32()?,
            suggested_buffer_size: reader.get_u32()?,
            quality: reader.get_u32()?,
            sample_size: reader.get_u32()?,
            frame: None,
        };

        if reader.available()? >= 8 {
            header.frame = Some(FrameRect {
                left: reader.get_i16()?,
                top: reader.get_i16()?,
                right: reader.get_i16()?,
                bottom: reader.get_i16()?,
            });
        }

        debug!(
            "strh: {} handler '{}', rate {}/{}, length {}",
            header.kind(),
            header.fcc_handler,
            header.rate,
            header.scale,
            header.length
        );

        Ok(header)
    }

    pub fn kind(&self) -> StreamKind {
        self.fcc_type.into()
    }

    /// `rate / scale`: frames per second for video, samples or blocks per
    /// second for audio. A zero scale is treated as 1.
    pub fn rate_per_second(&self) -> f64 {
        self.rate as f64 / self.scale.max(1) as f64
    }

    /// Stream length in seconds.
    pub fn duration_seconds(&self) -> f64 {
        let rate = self.rate_per_second();
        if rate <= 0.0 {
            0.0
        } else {
            self.length as f64 / rate
        }
    }
}

#[cfg(test)]
pub(crate) fn stream_header_bytes(
    fcc_type: &[u8; 4],
    handler: &[u8; 4],
    scale: u32,
    rate: u32,
    length: u32,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(56);
    data.extend_from_slice(fcc_type);
    data.extend_from_slice(handler);
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    for value in [0, scale, rate, 0, length, 4096, u32::MAX, 0] {
        data.extend_from_slice(&value.to_le_bytes());
    }
    for value in [0i16, 0, 320, 240] {
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

#[test]
fn read_video_stream_header() -> Result<()> {
    let payload = stream_header_bytes(b"vids", b"MJPG", 1, 25, 250);

    let header = StreamHeader::read(&payload)?;
    assert_eq!(header.kind(), StreamKind::Video);
    assert_eq!(header.fcc_handler, FourCC(*b"MJPG"));
    assert_eq!(header.length, 250);
    assert_eq!(header.suggested_buffer_size, 4096);
    assert_eq!(
        header.frame,
        Some(FrameRect {
            left: 0,
            top: 0,
            right: 320,
            bottom: 240
        })
    );
    assert!((header.duration_seconds() - 10.0).abs() < f64::EPSILON);
    Ok(())
}

#[test]
fn read_short_stream_header() -> Result<()> {
    let payload = stream_header_bytes(b"auds", b"\0\0\0\0", 0, 44100, 0);

    let header = StreamHeader::read(&payload[..48])?;
    assert_eq!(header.kind(), StreamKind::Audio);
    assert_eq!(header.frame, None);
    assert_eq!(header.rate_per_second(), 44100.0);
    assert_eq!(header.duration_seconds(), 0.0);

    assert!(StreamHeader::read(&payload[..40]).is_err());
    Ok(())
}
