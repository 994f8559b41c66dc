//! Synthetic AVI files for tests.

use super::sink::VideoSink;
use crate::structs::audio_format::audio_format_bytes;
use crate::structs::stream_header::stream_header_bytes;
use crate::structs::video_format::video_format_bytes;

pub fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(payload.len() + 9);
    data.extend_from_slice(id);
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(payload);
    if payload.len() % 2 != 0 {
        data.push(0);
    }
    data
}

pub fn list(list_type: &[u8; 4], parts: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = parts.concat();
    let mut data = Vec::with_capacity(body.len() + 12);
    data.extend_from_slice(b"LIST");
    data.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
    data.extend_from_slice(list_type);
    data.extend_from_slice(&body);
    data
}

pub fn riff_avi(parts: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = parts.concat();
    let mut data = Vec::with_capacity(body.len() + 12);
    data.extend_from_slice(b"RIFF");
    data.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
    data.extend_from_slice(b"AVI ");
    data.extend_from_slice(&body);
    data
}

pub fn avih(streams: u32, width: u32, height: u32) -> Vec<u8> {
    let fields: [u32; 14] = [
        40_000, 0, 0, 0x10, 3, 0, streams, 0, width, height, 0, 0, 0, 0,
    ];
    chunk(b"avih", &fields.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>())
}

pub fn audio_strl(channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
    list(
        b"strl",
        &[
            chunk(b"strh", &stream_header_bytes(b"auds", b"\0\0\0\0", 1, sample_rate, 0)),
            chunk(b"strf", &audio_format_bytes(channels, sample_rate, bits)),
        ],
    )
}

pub fn video_strl(width: i32, height: i32) -> Vec<u8> {
    list(
        b"strl",
        &[
            chunk(b"strh", &stream_header_bytes(b"vids", b"MJPG", 1, 25, 3)),
            chunk(b"strf", &video_format_bytes(width, height, 24, b"MJPG")),
            chunk(b"strn", b"camera\0"),
        ],
    )
}

/// Deterministic payload bytes so misrouted or shifted data is visible.
pub fn payload(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_mul(31).wrapping_add(i as u8))
        .collect()
}

/// Records every frame bracket it receives.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameRecorder {
    pub frames: Vec<(usize, Vec<u8>)>,
    pub open: bool,
}

impl VideoSink for FrameRecorder {
    fn begin_frame(&mut self, size: usize) {
        assert!(!self.open, "begin_frame while a frame is open");
        self.open = true;
        self.frames.push((size, Vec::new()));
    }

    fn write(&mut self, data: &[u8]) -> usize {
        assert!(self.open, "write outside a frame");
        if let Some((_, bytes)) = self.frames.last_mut() {
            bytes.extend_from_slice(data);
        }
        data.len()
    }

    fn end_frame(&mut self) {
        assert!(self.open, "end_frame without begin_frame");
        self.open = false;
    }
}
