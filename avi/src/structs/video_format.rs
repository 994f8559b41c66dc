//! Video stream format (`strf` of a `vids` stream): a `BITMAPINFOHEADER`,
//! optionally followed by a palette or codec data.

use anyhow::{Result, ensure};
use log::debug;

use crate::structs::fourcc::FourCC;
use crate::utils::byte_reader::LeSliceReader;
use crate::utils::errors::HeaderError;

pub const BITMAP_INFO_HEADER_SIZE: usize = 40;

/// `biCompression` value of uncompressed RGB frames.
pub const BI_RGB: FourCC = FourCC([0, 0, 0, 0]);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoFormat {
    pub header_size: u32,
    pub width: i32,
    /// Negative for top-down bitmaps.
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: FourCC,
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub colors_used: u32,
    pub colors_important: u32,
    pub extra_data: Vec<u8>,
}

impl VideoFormat {
    pub fn read(payload: &[u8]) -> Result<Self> {
        ensure!(
            payload.len() >= BITMAP_INFO_HEADER_SIZE,
            HeaderError::Truncated {
                chunk: FourCC::STRF,
                needed: BITMAP_INFO_HEADER_SIZE,
                got: payload.len(),
            }
        );

        let reader = &mut LeSliceReader::from_slice(payload);
        let mut format = Self {
            header_size: reader.get_u32()?,
            width: reader.get_i32()?,
            height: reader.get_i32()?,
            planes: reader.get_u16()?,
            bit_count: reader.get_u16()?,
            compression: reader.get_fourcc()?,
            size_image: reader.get_u32()?,
            x_pels_per_meter: reader.get_i32()?,
            y_pels_per_meter: reader.get_i32()?,
            colors_used: reader.get_u32()?,
            colors_important: reader.get_u32()?,
            extra_data: Vec::new(),
        };

        let remaining = reader.available()? as usize;
        format.extra_data = reader.get_bytes_up_to(remaining)?;

        debug!(
            "strf: {}x{} {} bits, compression '{}'",
            format.width, format.height, format.bit_count, format.compression
        );

        Ok(format)
    }

    pub fn is_uncompressed(&self) -> bool {
        self.compression == BI_RGB
    }
}

#[cfg(test)]
pub(crate) fn video_format_bytes(
    width: i32,
    height: i32,
    bit_count: u16,
    compression: &[u8; 4],
) -> Vec<u8> {
    let mut data = Vec::with_capacity(40);
    data.extend_from_slice(&40u32.to_le_bytes());
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&bit_count.to_le_bytes());
    data.extend_from_slice(compression);
    let size_image = (width * height.abs()) as u32 * (bit_count as u32 / 8);
    data.extend_from_slice(&size_image.to_le_bytes());
    data.extend_from_slice(&[0u8; 16]);
    data
}

#[test]
fn read_bitmap_info_header() -> Result<()> {
    let mut payload = video_format_bytes(320, -240, 24, b"MJPG");
    payload.extend_from_slice(&[9, 8, 7]);

    let format = VideoFormat::read(&payload)?;
    assert_eq!(format.header_size, 40);
    assert_eq!(format.width, 320);
    assert_eq!(format.height, -240);
    assert_eq!(format.bit_count, 24);
    assert_eq!(format.compression, FourCC(*b"MJPG"));
    assert_eq!(format.size_image, 320 * 240 * 3);
    assert_eq!(format.extra_data, vec![9, 8, 7]);
    assert!(!format.is_uncompressed());

    assert!(VideoFormat::read(&payload[..39]).is_err());
    Ok(())
}
