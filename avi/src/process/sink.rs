use std::io::{self, Write};

use log::warn;

/// Receives raw elementary audio payload.
///
/// `write` returns how many bytes were taken. Bytes that are not taken stay
/// buffered in the demuxer and are offered again on the next
/// [`Demuxer::write`](super::demux::Demuxer::write).
pub trait AudioSink {
    fn write(&mut self, data: &[u8]) -> usize;
}

/// Receives raw elementary video payload, bracketed per chunk.
///
/// Every video chunk produces exactly one `begin_frame(size)`, `size` bytes
/// through `write` and one `end_frame`.
pub trait VideoSink {
    fn begin_frame(&mut self, size: usize);
    fn write(&mut self, data: &[u8]) -> usize;
    fn end_frame(&mut self);
}

/// Discards everything it is given.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn write(&mut self, data: &[u8]) -> usize {
        data.len()
    }
}

impl VideoSink for NullSink {
    fn begin_frame(&mut self, _size: usize) {}

    fn write(&mut self, data: &[u8]) -> usize {
        data.len()
    }

    fn end_frame(&mut self) {}
}

impl AudioSink for Vec<u8> {
    fn write(&mut self, data: &[u8]) -> usize {
        self.extend_from_slice(data);
        data.len()
    }
}

impl VideoSink for Vec<u8> {
    fn begin_frame(&mut self, _size: usize) {}

    fn write(&mut self, data: &[u8]) -> usize {
        self.extend_from_slice(data);
        data.len()
    }

    fn end_frame(&mut self) {}
}

impl<T: AudioSink + ?Sized> AudioSink for Box<T> {
    fn write(&mut self, data: &[u8]) -> usize {
        (**self).write(data)
    }
}

impl<T: VideoSink + ?Sized> VideoSink for Box<T> {
    fn begin_frame(&mut self, size: usize) {
        (**self).begin_frame(size)
    }

    fn write(&mut self, data: &[u8]) -> usize {
        (**self).write(data)
    }

    fn end_frame(&mut self) {
        (**self).end_frame()
    }
}

/// Adapts any [`io::Write`] into a sink.
///
/// I/O errors cannot travel through the sink interface, so the first error is
/// kept and every later write is refused; check [`WriteSink::error`] or
/// [`WriteSink::into_inner`] when done.
#[derive(Debug)]
pub struct WriteSink<W: Write> {
    inner: W,
    error: Option<io::Error>,
    bytes_written: u64,
    frames: u64,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            error: None,
            bytes_written: 0,
            frames: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Flushes and returns the writer, or the first error seen.
    pub fn into_inner(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_all(&mut self, data: &[u8]) -> usize {
        if self.error.is_some() {
            return 0;
        }
        match self.inner.write_all(data) {
            Ok(()) => {
                self.bytes_written += data.len() as u64;
                data.len()
            }
            Err(e) => {
                warn!("Sink write failed after {} bytes: {e}", self.bytes_written);
                self.error = Some(e);
                0
            }
        }
    }
}

impl<W: Write> AudioSink for WriteSink<W> {
    fn write(&mut self, data: &[u8]) -> usize {
        self.write_all(data)
    }
}

impl<W: Write> VideoSink for WriteSink<W> {
    fn begin_frame(&mut self, _size: usize) {
        self.frames += 1;
    }

    fn write(&mut self, data: &[u8]) -> usize {
        self.write_all(data)
    }

    fn end_frame(&mut self) {}
}
