//! Four character codes.
//!
//! Every RIFF structure is identified by a 4-byte ASCII tag. Tags are not
//! NUL-terminated and may contain spaces (`"AVI "`, `"rec "`).

use std::fmt::{Debug, Display, Formatter};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const RIFF: FourCC = FourCC(*b"RIFF");
    pub const LIST: FourCC = FourCC(*b"LIST");
    pub const AVI: FourCC = FourCC(*b"AVI ");
    pub const HDRL: FourCC = FourCC(*b"hdrl");
    pub const AVIH: FourCC = FourCC(*b"avih");
    pub const STRL: FourCC = FourCC(*b"strl");
    pub const STRH: FourCC = FourCC(*b"strh");
    pub const STRF: FourCC = FourCC(*b"strf");
    pub const MOVI: FourCC = FourCC(*b"movi");
    pub const REC: FourCC = FourCC(*b"rec ");
    pub const IDX1: FourCC = FourCC(*b"idx1");
    pub const JUNK: FourCC = FourCC(*b"JUNK");

    pub const AUDS: FourCC = FourCC(*b"auds");
    pub const VIDS: FourCC = FourCC(*b"vids");

    /// Reads a tag from the first 4 bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        Some(Self(bytes.get(..4)?.try_into().ok()?))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn to_u32_le(self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(value: &[u8; 4]) -> Self {
        Self(*value)
    }
}

impl From<u32> for FourCC {
    fn from(value: u32) -> Self {
        Self(value.to_le_bytes())
    }
}

impl Display for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02X}")?;
            }
        }
        Ok(())
    }
}

impl Debug for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCC(\"{self}\")")
    }
}

#[test]
fn fourcc_display() {
    assert_eq!(FourCC::AVI.to_string(), "AVI ");
    assert_eq!(FourCC([b'0', b'0', 0, 0xFF]).to_string(), "00\\x00\\xFF");
    assert_eq!(FourCC::from_slice(b"movieXYZ"), Some(FourCC(*b"movi")));
    assert_eq!(FourCC::from_slice(b"mov"), None);
    assert_eq!(FourCC::from(0x6976_6F6Du32), FourCC::MOVI);
}
