//! Global AVI metadata (`avih`).

use anyhow::{Result, ensure};
use log::debug;

use crate::structs::fourcc::FourCC;
use crate::utils::byte_reader::LeSliceReader;
use crate::utils::errors::HeaderError;

pub const AVIF_HASINDEX: u32 = 0x0000_0010;
pub const AVIF_MUSTUSEINDEX: u32 = 0x0000_0020;
pub const AVIF_ISINTERLEAVED: u32 = 0x0000_0100;
pub const AVIF_TRUSTCKTYPE: u32 = 0x0000_0800;
pub const AVIF_WASCAPTUREFILE: u32 = 0x0001_0000;
pub const AVIF_COPYRIGHTED: u32 = 0x0002_0000;

const FLAG_NAMES: [(u32, &str); 6] = [
    (AVIF_HASINDEX, "HASINDEX"),
    (AVIF_MUSTUSEINDEX, "MUSTUSEINDEX"),
    (AVIF_ISINTERLEAVED, "ISINTERLEAVED"),
    (AVIF_TRUSTCKTYPE, "TRUSTCKTYPE"),
    (AVIF_WASCAPTUREFILE, "WASCAPTUREFILE"),
    (AVIF_COPYRIGHTED, "COPYRIGHTED"),
];

/// Size of the `avih` payload.
pub const MAIN_HEADER_SIZE: usize = 56;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainHeader {
    pub micro_sec_per_frame: u32,
    pub max_bytes_per_sec: u32,
    pub padding_granularity: u32,
    pub flags: u32,
    pub total_frames: u32,
    pub initial_frames: u32,
    pub streams: u32,
    pub suggested_buffer_size: u32,
    pub width: u32,
    pub height: u32,
    pub _reserved: [u32; 4],
}

impl MainHeader {
    pub fn read(payload: &[u8]) -> Result<Self> {
        ensure!(
            payload.len() >= MAIN_HEADER_SIZE,
            HeaderError::Truncated {
                chunk: FourCC::AVIH,
                needed: MAIN_HEADER_SIZE,
                got: payload.len(),
            }
        );

        let reader = &mut LeSliceReader::from_slice(payload);
        let header = Self {
            micro_sec_per_frame: reader.get_u32()?,
            max_bytes_per_sec: reader.get_u32()?,
            padding_granularity: reader.get_u32()?,
            flags: reader.get_u32()?,
            total_frames: reader.get_u32()?,
            initial_frames: reader.get_u32()?,
            streams: reader.get_u32()?,
            suggested_buffer_size: reader.get_u32()?,
            width: reader.get_u32()?,
            height: reader.get_u32()?,
            _reserved: [
                reader.get_u32()?,
                reader.get_u32()?,
                reader.get_u32()?,
                reader.get_u32()?,
            ],
        };

        debug!(
            "avih: {}x{}, {} streams, {} frames, {} us/frame",
            header.width,
            header.height,
            header.streams,
            header.total_frames,
            header.micro_sec_per_frame
        );

        Ok(header)
    }

    /// Frames per second, `None` when the frame period is 0.
    pub fn frame_rate(&self) -> Option<f64> {
        (self.micro_sec_per_frame > 0).then(|| 1_000_000f64 / self.micro_sec_per_frame as f64)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.total_frames as f64 * self.micro_sec_per_frame as f64 / 1_000_000f64
    }

    pub fn has_index(&self) -> bool {
        self.flags & AVIF_HASINDEX != 0
    }

    pub fn is_interleaved(&self) -> bool {
        self.flags & AVIF_ISINTERLEAVED != 0
    }

    /// Names of the known `AVIF_*` bits set in `flags`.
    pub fn flag_names(&self) -> Vec<&'static str> {
        FLAG_NAMES
            .iter()
            .filter(|(bit, _)| self.flags & bit != 0)
            .map(|&(_, name)| name)
            .collect()
    }
}

#[test]
fn read_main_header() -> Result<()> {
    let fields: [u32; 14] = [33_333, 1_000_000, 0, 0x110, 300, 0, 2, 65_536, 320, 240, 0, 0, 0, 0];
    let payload: Vec<u8> = fields.iter().flat_map(|v| v.to_le_bytes()).collect();

    let header = MainHeader::read(&payload)?;
    assert_eq!(header.width, 320);
    assert_eq!(header.height, 240);
    assert_eq!(header.streams, 2);
    assert_eq!(header.total_frames, 300);
    assert!(header.has_index());
    assert!(header.is_interleaved());
    assert!((header.frame_rate().unwrap() - 30.0).abs() < 0.01);
    assert!((header.duration_seconds() - 10.0).abs() < 0.01);

    assert!(MainHeader::read(&payload[..40]).is_err());
    Ok(())
}

#[test]
fn flag_names_follow_bits() {
    let header = MainHeader {
        flags: AVIF_HASINDEX | AVIF_TRUSTCKTYPE | AVIF_COPYRIGHTED | 0x4,
        ..Default::default()
    };
    assert_eq!(header.flag_names(), vec!["HASINDEX", "TRUSTCKTYPE", "COPYRIGHTED"]);
    assert!(MainHeader::default().flag_names().is_empty());
}
