//! RIFF structure descriptors.
//!
//! A [`Structure`] describes one recognized element of the file without owning
//! its payload:
//!
//! - **LIST**: `"LIST"` size list-type, followed by nested structures
//! - **CHUNK**: tag size, followed by `size` payload bytes
//! - **Stream data**: a chunk inside `movi` whose tag is `##wb`, `##db` or
//!   `##dc` (two-digit stream index plus payload type)
//!
//! Declared sizes exclude the 8-byte header and are word aligned on disk: an
//! odd size is followed by one pad byte that belongs to no structure.

use std::fmt::{Display, Formatter};

use super::fourcc::FourCC;

/// Size of `"LIST"` + size + list type.
pub const LIST_HEADER_SIZE: usize = 12;

/// Size of tag + size.
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Payload type encoded in the last two characters of a stream-data tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Audio,
    VideoUncompressed,
    VideoCompressed,
    Unknown([u8; 2]),
}

impl PayloadType {
    pub fn from_suffix(suffix: [u8; 2]) -> Self {
        match &suffix {
            b"wb" => Self::Audio,
            b"db" => Self::VideoUncompressed,
            b"dc" => Self::VideoCompressed,
            _ => Self::Unknown(suffix),
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::VideoUncompressed | Self::VideoCompressed)
    }
}

impl Display for PayloadType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadType::Audio => write!(f, "audio"),
            PayloadType::VideoUncompressed => write!(f, "uncompressed video"),
            PayloadType::VideoCompressed => write!(f, "compressed video"),
            PayloadType::Unknown(s) => {
                write!(f, "unknown ({}{})", s[0] as char, s[1] as char)
            }
        }
    }
}

/// What the caller expects at the current read position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseKind {
    List,
    Chunk,
    StreamData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureKind {
    List,
    Chunk,
    StreamData {
        stream: Option<u16>,
        payload: PayloadType,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Structure {
    pub kind: StructureKind,
    /// Tag found at the start of the header (`LIST`, `RIFF` or the chunk id).
    pub id: FourCC,
    /// List type for lists, chunk id otherwise.
    pub fourcc: FourCC,
    /// Declared payload size as stored in the header.
    pub size: u32,
    /// Payload bytes not yet consumed or forwarded.
    pub open: u64,
    /// Absolute offset of the header.
    pub start: u64,
    /// Absolute offset of the first byte after payload and pad byte.
    pub end_offset: u64,
}

impl Structure {
    /// Decodes the header at the front of `buffer`, located at absolute
    /// offset `position`.
    ///
    /// Returns `None` when `buffer` does not yet hold the whole header. The tag
    /// is not checked; callers compare [`Structure::id`] and
    /// [`Structure::fourcc`] against what they expect.
    pub fn recognize(buffer: &[u8], position: u64, kind: ParseKind) -> Option<Self> {
        let header_len = match kind {
            ParseKind::List => LIST_HEADER_SIZE,
            ParseKind::Chunk | ParseKind::StreamData => CHUNK_HEADER_SIZE,
        };
        if buffer.len() < header_len {
            return None;
        }

        let id = FourCC::from_slice(buffer)?;
        let size = u32::from_le_bytes(buffer[4..8].try_into().ok()?);
        let end_offset = position + CHUNK_HEADER_SIZE as u64 + padded(size);

        let (kind, fourcc, open) = match kind {
            ParseKind::List => (
                StructureKind::List,
                FourCC::from_slice(&buffer[8..])?,
                (size as u64).saturating_sub(4),
            ),
            ParseKind::Chunk => (StructureKind::Chunk, id, size as u64),
            ParseKind::StreamData => (
                StructureKind::StreamData {
                    stream: stream_index(&id),
                    payload: PayloadType::from_suffix([id.0[2], id.0[3]]),
                },
                id,
                size as u64,
            ),
        };

        Some(Self {
            kind,
            id,
            fourcc,
            size,
            open,
            start: position,
            end_offset,
        })
    }

    pub fn is_valid(&self) -> bool {
        match self.kind {
            StructureKind::List => true,
            StructureKind::Chunk => self.open > 0,
            StructureKind::StreamData { payload, .. } => payload.is_audio() || payload.is_video(),
        }
    }

    pub fn is_list(&self, list_type: FourCC) -> bool {
        self.kind == StructureKind::List && self.id == FourCC::LIST && self.fourcc == list_type
    }

    pub fn header_len(&self) -> usize {
        match self.kind {
            StructureKind::List => LIST_HEADER_SIZE,
            _ => CHUNK_HEADER_SIZE,
        }
    }

    /// Header, payload and pad byte.
    pub fn total_len(&self) -> u64 {
        self.end_offset - self.start
    }

    pub fn payload_type(&self) -> Option<PayloadType> {
        match self.kind {
            StructureKind::StreamData { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn stream_index(&self) -> Option<u16> {
        match self.kind {
            StructureKind::StreamData { stream, .. } => stream,
            _ => None,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.payload_type().is_some_and(|p| p.is_audio())
    }

    pub fn is_video(&self) -> bool {
        self.payload_type().is_some_and(|p| p.is_video())
    }

    /// The declared payload, if `buffer` (starting at this header) holds all of it.
    pub fn payload<'a>(&self, buffer: &'a [u8]) -> Option<&'a [u8]> {
        let start = CHUNK_HEADER_SIZE;
        buffer.get(start..start + self.size as usize)
    }
}

impl Display for Structure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            StructureKind::List => write!(f, "{} '{}'", self.id, self.fourcc)?,
            _ => write!(f, "'{}'", self.fourcc)?,
        }
        write!(f, " ({}-{}) size: {}", self.start, self.end_offset, self.size)
    }
}

/// Declared size rounded up to the next even number.
pub fn padded(size: u32) -> u64 {
    size as u64 + (size & 1) as u64
}

fn stream_index(id: &FourCC) -> Option<u16> {
    let [tens, ones, ..] = id.0;
    if tens.is_ascii_digit() && ones.is_ascii_digit() {
        Some(((tens - b'0') * 10 + (ones - b'0')) as u16)
    } else {
        None
    }
}

#[test]
fn recognize_list() {
    let data = b"LIST\x04\x01\x00\x00hdrlavih";
    let list = Structure::recognize(data, 12, ParseKind::List).unwrap();

    assert!(list.is_list(FourCC::HDRL));
    assert!(list.is_valid());
    assert_eq!(list.size, 260);
    assert_eq!(list.open, 256);
    assert_eq!(list.end_offset, 12 + 8 + 260);
    assert_eq!(list.header_len(), LIST_HEADER_SIZE);

    assert!(Structure::recognize(&data[..11], 12, ParseKind::List).is_none());
}

#[test]
fn recognize_odd_chunk_includes_pad() {
    let data = b"strf\x13\x00\x00\x00";
    let chunk = Structure::recognize(data, 100, ParseKind::Chunk).unwrap();

    assert_eq!(chunk.fourcc, FourCC::STRF);
    assert_eq!(chunk.size, 19);
    assert_eq!(chunk.end_offset, 100 + 8 + 20);
    assert_eq!(chunk.total_len(), 28);
    assert!(chunk.is_valid());

    let empty = Structure::recognize(b"JUNK\x00\x00\x00\x00", 0, ParseKind::Chunk).unwrap();
    assert!(!empty.is_valid());
}

#[test]
fn recognize_stream_data() {
    let audio = Structure::recognize(b"01wb\x10\x00\x00\x00", 0, ParseKind::StreamData).unwrap();
    assert!(audio.is_audio());
    assert_eq!(audio.stream_index(), Some(1));
    assert!(audio.is_valid());

    let video = Structure::recognize(b"00dc\x10\x00\x00\x00", 0, ParseKind::StreamData).unwrap();
    assert!(video.is_video());
    assert_eq!(video.payload_type(), Some(PayloadType::VideoCompressed));

    let text = Structure::recognize(b"02tx\x10\x00\x00\x00", 0, ParseKind::StreamData).unwrap();
    assert!(!text.is_valid());
    assert_eq!(text.payload_type(), Some(PayloadType::Unknown(*b"tx")));

    let junk = Structure::recognize(b"JUNK\x10\x00\x00\x00", 0, ParseKind::StreamData).unwrap();
    assert_eq!(junk.stream_index(), None);
}

#[test]
fn payload_requires_full_chunk() {
    let data = b"avih\x03\x00\x00\x00abc";
    let chunk = Structure::recognize(data, 0, ParseKind::Chunk).unwrap();

    assert_eq!(chunk.payload(data), Some(&b"abc"[..]));
    assert_eq!(chunk.payload(&data[..10]), None);
}
