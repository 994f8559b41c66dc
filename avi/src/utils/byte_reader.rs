//! Little-endian byte cursor for RIFF header payloads.
//!
//! RIFF stores every integer little-endian and byte aligned. The reader wraps a
//! [`bitstream_io::BitReader`] over a slice and only ever moves in whole bytes.

use std::io;

use bitstream_io::{BitRead, BitReader, LittleEndian, UnsignedInteger};

use crate::structs::fourcc::FourCC;

#[derive(Debug)]
pub struct LeReader<R: io::Read + io::Seek> {
    bs: BitReader<R, LittleEndian>,
    len: u64,
}

pub type LeSliceReader<'a> = LeReader<io::Cursor<&'a [u8]>>;

impl<R> LeReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes,
        }
    }

    #[inline(always)]
    fn get_n<I: UnsignedInteger>(&mut self, bytes: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(bytes << 3) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read of {bytes} bytes out of bounds at byte {}",
                    self.position().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn get_u8(&mut self) -> io::Result<u8> {
        self.get_n(1)
    }

    #[inline(always)]
    pub fn get_u16(&mut self) -> io::Result<u16> {
        self.get_n(2)
    }

    #[inline(always)]
    pub fn get_u32(&mut self) -> io::Result<u32> {
        self.get_n(4)
    }

    #[inline(always)]
    pub fn get_i16(&mut self) -> io::Result<i16> {
        self.get_u16().map(|v| v as i16)
    }

    #[inline(always)]
    pub fn get_i32(&mut self) -> io::Result<i32> {
        self.get_u32().map(|v| v as i32)
    }

    pub fn get_fourcc(&mut self) -> io::Result<FourCC> {
        let mut tag = [0u8; 4];
        self.bs.read_bytes(&mut tag)?;
        Ok(FourCC(tag))
    }

    /// Reads `n` bytes, clamped to what is left in the payload.
    pub fn get_bytes_up_to(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let n = n.min(self.available()? as usize);
        let mut buf = vec![0u8; n];
        self.bs.read_bytes(&mut buf)?;
        Ok(buf)
    }

    pub fn skip_bytes(&mut self, n: u32) -> io::Result<()> {
        if n as u64 > self.available()? {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "skip_bytes: out of bounds",
            ));
        }
        self.bs.skip(n << 3)
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.position().map(|pos| self.len - pos)
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|bits| bits >> 3)
    }
}

impl<'a> LeSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

#[test]
fn reads_little_endian_fields() -> io::Result<()> {
    let data = [
        0x34, 0x12, 0x78, 0x56, 0x34, 0x12, b'v', b'i', b'd', b's', 0xFF, 0xFF, 0xAA,
    ];
    let reader = &mut LeSliceReader::from_slice(&data);

    assert_eq!(reader.get_u16()?, 0x1234);
    assert_eq!(reader.get_u32()?, 0x1234_5678);
    assert_eq!(reader.get_fourcc()?, FourCC::VIDS);
    assert_eq!(reader.get_i16()?, -1);
    assert_eq!(reader.available()?, 1);
    assert_eq!(reader.get_bytes_up_to(8)?, vec![0xAA]);
    assert!(reader.get_u8().is_err());
    Ok(())
}

#[test]
fn skip_past_end_fails() {
    let data = [0u8; 6];
    let reader = &mut LeSliceReader::from_slice(&data);

    assert!(reader.skip_bytes(4).is_ok());
    assert!(reader.skip_bytes(4).is_err());
    assert_eq!(reader.get_u16().ok(), Some(0));
}
