use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use avi::process::sink::{AudioSink, VideoSink, WriteSink};
use avi::structs::audio_format::AudioFormat;

use crate::wav::{WAVWriter, WaveFormat};

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

/// Destination of the audio elementary stream.
pub enum AudioOutput {
    Discard,
    Raw(WriteSink<BufWriter<File>>),
    Wav(WriteSink<WAVWriter<File>>),
}

impl AudioOutput {
    pub fn create(path: Option<&Path>, wav: bool) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::Discard);
        };

        let file = create_file(path)?;
        log::info!("Writing audio to {}", path.display());
        Ok(if wav {
            Self::Wav(WriteSink::new(WAVWriter::new(file)?))
        } else {
            Self::Raw(WriteSink::new(BufWriter::new(file)))
        })
    }

    pub fn is_discard(&self) -> bool {
        matches!(self, Self::Discard)
    }

    pub fn error(&self) -> Option<&io::Error> {
        match self {
            Self::Discard => None,
            Self::Raw(sink) => sink.error(),
            Self::Wav(sink) => sink.error(),
        }
    }

    /// Flushes the output and, for WAV, writes the final header.
    ///
    /// WAV output fails without a PCM `format`.
    ///
    /// Returns the number of payload bytes written.
    pub fn finish(self, format: Option<&AudioFormat>) -> Result<u64> {
        match self {
            Self::Discard => Ok(0),
            Self::Raw(sink) => {
                let written = sink.bytes_written();
                sink.into_inner().context("Failed to write audio")?;
                Ok(written)
            }
            Self::Wav(sink) => {
                let written = sink.bytes_written();
                let mut wav = sink.into_inner().context("Failed to write audio")?;

                let Some(format) = format else {
                    bail!("No audio format found, cannot write the WAV header");
                };
                wav.set_format(WaveFormat::try_from(format)?);

                wav.finish().context("Failed to finalize WAV header")?;
                Ok(written)
            }
        }
    }
}

impl AudioSink for AudioOutput {
    fn write(&mut self, data: &[u8]) -> usize {
        match self {
            Self::Discard => data.len(),
            Self::Raw(sink) => AudioSink::write(sink, data),
            Self::Wav(sink) => AudioSink::write(sink, data),
        }
    }
}

/// Destination of the video elementary stream.
pub enum VideoOutput {
    Discard,
    Single(WriteSink<BufWriter<File>>),
    Frames(FrameFiles),
}

impl VideoOutput {
    pub fn create(path: Option<&Path>, split_frames: bool) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::Discard);
        };

        if split_frames {
            log::info!("Writing video frames to {}", FrameFiles::pattern(path));
            Ok(Self::Frames(FrameFiles::new(path)))
        } else {
            let file = create_file(path)?;
            log::info!("Writing video to {}", path.display());
            Ok(Self::Single(WriteSink::new(BufWriter::new(file))))
        }
    }

    pub fn error(&self) -> Option<&io::Error> {
        match self {
            Self::Discard => None,
            Self::Single(sink) => sink.error(),
            Self::Frames(frames) => frames.error.as_ref(),
        }
    }

    /// Returns the number of payload bytes written.
    pub fn finish(self) -> Result<u64> {
        match self {
            Self::Discard => Ok(0),
            Self::Single(sink) => {
                let written = sink.bytes_written();
                sink.into_inner().context("Failed to write video")?;
                Ok(written)
            }
            Self::Frames(frames) => frames.finish(),
        }
    }
}

impl VideoSink for VideoOutput {
    fn begin_frame(&mut self, size: usize) {
        match self {
            Self::Discard => {}
            Self::Single(sink) => sink.begin_frame(size),
            Self::Frames(frames) => frames.begin_frame(size),
        }
    }

    fn write(&mut self, data: &[u8]) -> usize {
        match self {
            Self::Discard => data.len(),
            Self::Single(sink) => VideoSink::write(sink, data),
            Self::Frames(frames) => frames.write(data),
        }
    }

    fn end_frame(&mut self) {
        match self {
            Self::Discard => {}
            Self::Single(sink) => sink.end_frame(),
            Self::Frames(frames) => frames.end_frame(),
        }
    }
}

/// Writes every video frame to its own numbered file.
///
/// `out/frame.jpg` becomes `out/frame_000000.jpg`, `out/frame_000001.jpg`, ...
pub struct FrameFiles {
    base: PathBuf,
    index: u64,
    current: Option<BufWriter<File>>,
    error: Option<io::Error>,
    bytes_written: u64,
}

impl FrameFiles {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            index: 0,
            current: None,
            error: None,
            bytes_written: 0,
        }
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        let stem = self
            .base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());
        let name = match self.base.extension() {
            Some(ext) => format!("{stem}_{index:06}.{}", ext.to_string_lossy()),
            None => format!("{stem}_{index:06}"),
        };
        self.base.with_file_name(name)
    }

    fn pattern(base: &Path) -> String {
        Self::new(base).frame_path(0).display().to_string()
    }

    fn record(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            log::warn!("Frame {} write failed: {e}", self.index);
            if self.error.is_none() {
                self.error = Some(e);
            }
        }
    }

    fn close_current(&mut self) {
        if let Some(mut file) = self.current.take() {
            let result = file.flush();
            self.record(result);
        }
    }

    fn begin_frame(&mut self, _size: usize) {
        if self.error.is_some() {
            return;
        }
        self.close_current();

        let path = self.frame_path(self.index);
        match create_file(&path) {
            Ok(file) => self.current = Some(BufWriter::new(file)),
            Err(e) => {
                log::warn!("{e:#}");
                self.error = Some(io::Error::other(format!("{e:#}")));
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> usize {
        if self.error.is_some() {
            return 0;
        }
        let Some(file) = self.current.as_mut() else {
            return data.len();
        };

        let result = file.write_all(data);
        if result.is_ok() {
            self.bytes_written += data.len() as u64;
            return data.len();
        }
        self.record(result);
        0
    }

    fn end_frame(&mut self) {
        self.close_current();
        self.index += 1;
    }

    fn finish(mut self) -> Result<u64> {
        self.close_current();
        if let Some(e) = self.error.take() {
            return Err(anyhow::Error::from(e).context("Failed to write video frames"));
        }
        log::info!("Wrote {} frame files", self.index);
        Ok(self.bytes_written)
    }
}
