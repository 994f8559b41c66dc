use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use anyhow::ensure;
use avi::structs::audio_format::AudioFormat;
use avitool_macros::{ToBytes, riff_chunk};

use crate::join_bytes_le;

/// `RIFF` size `WAVE`, `fmt ` chunk with a 16-byte body, `data` header.
pub const WAV_HEADER_SIZE: u64 = 12 + 8 + 16 + 8;

pub trait RiffChunk {
    fn chunk_id(&self) -> &[u8; 4];
    fn chunk_data(&self) -> Vec<u8>;

    fn write_all<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let data = self.chunk_data();
        writer.write_all(self.chunk_id())?;
        writer.write_all(&(data.len() as u32).to_le_bytes())?;
        writer.write_all(&data)?;
        if data.len() % 2 != 0 {
            writer.write_all(&[0])?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ToBytes)]
#[riff_chunk(b"fmt ")]
pub struct WaveFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

/// Placeholder written before the stream format is known.
impl Default for WaveFormat {
    fn default() -> Self {
        Self {
            format_tag: 1,
            channels: 2,
            sample_rate: 48000,
            avg_bytes_per_sec: 48000 * 4,
            block_align: 4,
            bits_per_sample: 16,
        }
    }
}

/// Only PCM fits the 16-byte `fmt ` body; other tags need `cbSize` and
/// codec data that this writer does not carry.
impl TryFrom<&AudioFormat> for WaveFormat {
    type Error = anyhow::Error;

    fn try_from(format: &AudioFormat) -> anyhow::Result<Self> {
        ensure!(
            format.is_pcm(),
            "WAV output needs PCM audio, the stream is {}",
            format.format_tag
        );
        ensure!(
            format.channels > 0 && format.bits_per_sample > 0,
            "PCM format declares {} channels at {} bits",
            format.channels,
            format.bits_per_sample
        );

        Ok(Self {
            format_tag: format.format_tag.into(),
            channels: format.channels,
            sample_rate: format.sample_rate,
            avg_bytes_per_sec: format.avg_bytes_per_sec,
            block_align: format.block_align,
            bits_per_sample: format.bits_per_sample,
        })
    }
}

/// RIFF WAVE writer.
///
/// The stream format is usually not known until the container headers are
/// parsed, so [`WAVWriter::new`] writes a placeholder header and
/// [`WAVWriter::finish`] rewrites it with the final format and sizes.
pub struct WAVWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    data_written: u64,
    format: WaveFormat,
}

impl<W: Write + Seek> WAVWriter<W> {
    pub fn new(writer: W) -> io::Result<Self> {
        let mut wav = Self {
            writer: BufWriter::new(writer),
            data_written: 0,
            format: WaveFormat::default(),
        };
        wav.write_header()?;
        Ok(wav)
    }

    pub fn set_format(&mut self, format: WaveFormat) {
        self.format = format;
    }

    fn write_header(&mut self) -> io::Result<()> {
        let padded_data = self.data_written + (self.data_written & 1);
        let riff_size = u32::try_from(WAV_HEADER_SIZE - 8 + padded_data).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "WAV data exceeds 4 GiB, the RIFF size field would overflow",
            )
        })?;

        self.writer
            .write_all(&join_bytes_le!(*b"RIFF", riff_size, *b"WAVE"))?;
        self.format.write_all(&mut self.writer)?;
        self.writer
            .write_all(&join_bytes_le!(*b"data", self.data_written as u32))?;

        Ok(())
    }

    /// Appends raw sample bytes to the `data` chunk.
    pub fn write_samples(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.data_written += data.len() as u64;
        Ok(())
    }

    /// Pads the `data` chunk and rewrites the header with the final sizes.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.data_written % 2 != 0 {
            self.writer.write_all(&[0])?;
        }
        let end = self.writer.stream_position()?;

        self.writer.seek(SeekFrom::Start(0))?;
        self.write_header()?;

        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        Ok(())
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }

    pub fn stats(&self) -> WAVStats {
        WAVStats {
            data_written: self.data_written,
            sample_rate: self.format.sample_rate,
            channels: self.format.channels,
            bits_per_sample: self.format.bits_per_sample,
        }
    }
}

impl<W: Write + Seek> Write for WAVWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_samples(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[derive(Debug, Clone)]
pub struct WAVStats {
    pub data_written: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use avi::structs::audio_format::AudioFormatTag;
    use std::io::Cursor;

    fn u32_at(buffer: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(buffer[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_wav_header_write() -> io::Result<()> {
        let mut writer = WAVWriter::new(Cursor::new(Vec::new()))?;
        writer.set_format(WaveFormat {
            format_tag: 1,
            channels: 2,
            sample_rate: 44100,
            avg_bytes_per_sec: 176_400,
            block_align: 4,
            bits_per_sample: 16,
        });
        writer.write_samples(&[1, 2, 3, 4, 5, 6, 7, 8])?;
        writer.finish()?;

        let buffer = writer.into_inner()?.into_inner();
        assert_eq!(buffer.len(), WAV_HEADER_SIZE as usize + 8);
        assert_eq!(&buffer[0..4], b"RIFF");
        assert_eq!(u32_at(&buffer, 4), 36 + 8);
        assert_eq!(&buffer[8..16], b"WAVEfmt ");
        assert_eq!(u32_at(&buffer, 16), 16);
        assert_eq!(u32_at(&buffer, 24), 44100);
        assert_eq!(&buffer[36..40], b"data");
        assert_eq!(u32_at(&buffer, 40), 8);
        assert_eq!(&buffer[44..], &[1, 2, 3, 4, 5, 6, 7, 8]);

        Ok(())
    }

    #[test]
    fn test_wav_odd_data_is_padded() -> io::Result<()> {
        let mut writer = WAVWriter::new(Cursor::new(Vec::new()))?;
        writer.write_all(&[9, 9, 9])?;
        writer.finish()?;

        assert_eq!(writer.stats().data_written, 3);

        let buffer = writer.into_inner()?.into_inner();
        assert_eq!(buffer.len(), WAV_HEADER_SIZE as usize + 4);
        assert_eq!(u32_at(&buffer, 4), 36 + 4);
        assert_eq!(u32_at(&buffer, 40), 3);
        assert_eq!(buffer.last(), Some(&0));

        Ok(())
    }

    #[test]
    fn test_fmt_chunk_bytes() {
        let format = WaveFormat::default();
        assert_eq!(format.chunk_id(), b"fmt ");
        assert_eq!(format.chunk_data().len(), 16);
        assert_eq!(&format.chunk_data()[..4], &[1, 0, 2, 0]);
    }

    #[test]
    fn test_fmt_from_pcm_stream() -> anyhow::Result<()> {
        let pcm = AudioFormat {
            format_tag: AudioFormatTag::Pcm,
            channels: 1,
            sample_rate: 22050,
            avg_bytes_per_sec: 44100,
            block_align: 2,
            bits_per_sample: 16,
            extra_data: Vec::new(),
        };

        let format = WaveFormat::try_from(&pcm)?;
        assert_eq!(format.format_tag, 1);
        assert_eq!(format.sample_rate, 22050);
        assert_eq!(format.chunk_data().len(), 16);
        Ok(())
    }

    #[test]
    fn test_fmt_rejects_non_pcm_stream() {
        let extensible = AudioFormat {
            format_tag: AudioFormatTag::Extensible,
            channels: 2,
            sample_rate: 48000,
            avg_bytes_per_sec: 192_000,
            block_align: 4,
            bits_per_sample: 16,
            extra_data: vec![0; 22],
        };
        assert!(WaveFormat::try_from(&extensible).is_err());

        let adpcm = AudioFormat {
            format_tag: AudioFormatTag::Adpcm,
            bits_per_sample: 4,
            extra_data: vec![0xF9, 0x01],
            ..extensible
        };
        assert!(WaveFormat::try_from(&adpcm).is_err());

        let bare = AudioFormat {
            format_tag: AudioFormatTag::Pcm,
            bits_per_sample: 0,
            ..Default::default()
        };
        assert!(WaveFormat::try_from(&bare).is_err());
    }
}
