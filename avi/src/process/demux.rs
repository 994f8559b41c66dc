use std::fmt::{Debug, Formatter};

use log::{debug, error, info, trace, warn};

use super::sink::{AudioSink, NullSink, VideoSink};
use crate::log_or_err;
use crate::structs::audio_format::AudioFormat;
use crate::structs::chunk::{LIST_HEADER_SIZE, ParseKind, Structure};
use crate::structs::fourcc::FourCC;
use crate::structs::main_header::MainHeader;
use crate::structs::scope::ScopeStack;
use crate::structs::stream_header::{StreamHeader, StreamKind};
use crate::structs::video_format::VideoFormat;
use crate::utils::accumulator::ByteAccumulator;
use crate::utils::errors::DemuxError;

/// Accumulator size used by [`Demuxer::new`].
///
/// Large enough for the header chunks of common files, including an 8-bit
/// palettised `strf`.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Smallest accepted accumulator size. Must hold a `LIST` header followed by
/// a chunk header.
pub const MIN_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Waiting for `RIFF` size `AVI `.
    ParseHeader,
    ParseHdrl,
    ParseAvih,
    /// `LIST strl` followed by its `strh` chunk.
    ParseStrl,
    ParseStrf,
    /// Scanning for the next `LIST` after a stream format.
    AfterStrf,
    ParseMovi,
    /// Waiting for the next stream-data header inside `movi`.
    SubChunk,
    /// Forwarding the payload of the current stream-data chunk.
    SubChunkContinue,
    ParseRec,
    /// Discarding a structure of no interest by its declared size.
    SkipStructure,
    /// Past the media data. Everything is discarded.
    ParseIgnore,
}

/// Result of one [`Demuxer::write`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// `n` bytes were taken and the demuxer stopped for a reason other than
    /// running out of input: a sink refused more data or the media data
    /// has ended.
    Consumed(usize),
    /// All input was taken and the demuxer is waiting for more.
    NeedMoreData,
    /// The demuxer hit a fatal error and is inactive. Nothing from the
    /// failing call counts as processed.
    FatalError,
}

impl WriteOutcome {
    /// Number of input bytes taken by a call that was given `input_len` bytes.
    pub fn accepted(&self, input_len: usize) -> usize {
        match self {
            WriteOutcome::Consumed(n) => *n,
            WriteOutcome::NeedMoreData => input_len,
            WriteOutcome::FatalError => 0,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, WriteOutcome::FatalError)
    }
}

/// Headers retained from `hdrl`.
///
/// Only one audio and one video stream are tracked. A second stream of the
/// same kind replaces the first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AviHeaders {
    pub main_header: Option<MainHeader>,
    pub stream_header_audio: Option<StreamHeader>,
    pub stream_header_video: Option<StreamHeader>,
    pub audio_format: Option<AudioFormat>,
    pub video_format: Option<VideoFormat>,
    /// Kinds of all declared streams in file order.
    pub streams: Vec<StreamKind>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub audio_chunks: u64,
    pub audio_bytes: u64,
    pub video_frames: u64,
    pub video_bytes: u64,
    /// `JUNK`, unknown lists and unknown stream data.
    pub skipped_bytes: u64,
    /// Everything after the media data, usually `idx1`.
    pub ignored_bytes: u64,
}

pub type ValidationCallback = Box<dyn FnMut(&AviHeaders) -> bool>;

/// Incremental AVI demultiplexer.
///
/// Bytes are pushed with [`Demuxer::write`] in pieces of any size. Headers
/// become available through the query methods as soon as they are parsed,
/// and elementary stream payload is forwarded to the audio and video sinks
/// without waiting for whole chunks.
///
/// # Example
///
/// ```rust
/// use avi::process::demux::{Demuxer, WriteOutcome};
/// use avi::process::sink::NullSink;
///
/// let mut demuxer = Demuxer::new(Vec::<u8>::new(), NullSink);
///
/// // Not an AVI file
/// let outcome = demuxer.write(b"RIFF\x04\x00\x00\x00WAVE");
/// assert_eq!(outcome, WriteOutcome::FatalError);
/// assert!(!demuxer.is_active());
/// ```
pub struct Demuxer<A: AudioSink = NullSink, V: VideoSink = NullSink> {
    buffer: ByteAccumulator,
    scopes: ScopeStack,
    state: ParseState,
    position: u64,
    active: bool,
    stalled: bool,
    metadata_ready: bool,
    headers: AviHeaders,
    current_stream: Option<StreamKind>,
    current_data: Option<Structure>,
    frame_open: bool,
    skip: u64,
    skip_next: ParseState,
    movi_end: u64,
    audio: A,
    video: V,
    audio_muted: bool,
    validation: Option<ValidationCallback>,
    stats: DemuxStats,
    fail_level: log::Level,
}

impl<A: AudioSink + Default, V: VideoSink + Default> Default for Demuxer<A, V> {
    fn default() -> Self {
        Self::new(A::default(), V::default())
    }
}

impl<A: AudioSink, V: VideoSink> Debug for Demuxer<A, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Demuxer")
            .field("state", &self.state)
            .field("position", &self.position)
            .field("buffered", &self.buffer.available())
            .field("capacity", &self.buffer.capacity())
            .field("active", &self.active)
            .field("metadata_ready", &self.metadata_ready)
            .field("scope_depth", &self.scopes.depth())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<A: AudioSink, V: VideoSink> Demuxer<A, V> {
    pub fn new(audio: A, video: V) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, audio, video)
    }

    /// Creates a demuxer whose accumulator holds `capacity` bytes.
    ///
    /// The capacity bounds the largest header chunk that can be decoded.
    /// Values below [`MIN_CAPACITY`] are raised to it.
    pub fn with_capacity(capacity: usize, audio: A, video: V) -> Self {
        Self {
            buffer: ByteAccumulator::with_capacity(capacity.max(MIN_CAPACITY)),
            scopes: ScopeStack::default(),
            state: ParseState::ParseHeader,
            position: 0,
            active: true,
            stalled: false,
            metadata_ready: false,
            headers: AviHeaders::default(),
            current_stream: None,
            current_data: None,
            frame_open: false,
            skip: 0,
            skip_next: ParseState::ParseHeader,
            movi_end: 0,
            audio,
            video,
            audio_muted: false,
            validation: None,
            stats: DemuxStats::default(),
            fail_level: log::Level::Error,
        }
    }

    /// Pushes input and parses as far as the buffered bytes allow.
    ///
    /// Input that does not fit the accumulator is appended after parsing has
    /// made room, so a single call may take more bytes than the capacity.
    /// Bytes that were not taken must be offered again.
    pub fn write(&mut self, data: &[u8]) -> WriteOutcome {
        if !self.active {
            debug!("{}", DemuxError::Inactive);
            return WriteOutcome::FatalError;
        }

        let mut accepted = 0;
        loop {
            accepted += self.buffer.append(&data[accepted..]);

            let progressed = match self.drive() {
                Ok(progressed) => progressed,
                Err(e) => return self.fail(e),
            };

            if accepted == data.len() {
                break;
            }
            if !progressed && self.buffer.is_full() {
                break;
            }
        }

        if accepted == data.len() && !self.stalled && self.state != ParseState::ParseIgnore {
            WriteOutcome::NeedMoreData
        } else {
            WriteOutcome::Consumed(accepted)
        }
    }

    /// Clears all parse state so a new file can be written.
    ///
    /// Sinks and settings (mute, validation callback, fail level) are kept.
    /// A video frame left open by the previous file is closed first.
    pub fn reset(&mut self) {
        if self.frame_open {
            self.video.end_frame();
        }

        self.buffer.clear();
        self.scopes.clear();
        self.state = ParseState::ParseHeader;
        self.position = 0;
        self.active = true;
        self.stalled = false;
        self.metadata_ready = false;
        self.headers = AviHeaders::default();
        self.current_stream = None;
        self.current_data = None;
        self.frame_open = false;
        self.skip = 0;
        self.skip_next = ParseState::ParseHeader;
        self.movi_end = 0;
        self.stats = DemuxStats::default();
        debug!("Demuxer reset");
    }

    pub fn main_header(&self) -> Option<&MainHeader> {
        self.headers.main_header.as_ref()
    }

    pub fn stream_header_audio(&self) -> Option<&StreamHeader> {
        self.headers.stream_header_audio.as_ref()
    }

    pub fn stream_header_video(&self) -> Option<&StreamHeader> {
        self.headers.stream_header_video.as_ref()
    }

    pub fn audio_format(&self) -> Option<&AudioFormat> {
        self.headers.audio_format.as_ref()
    }

    pub fn video_format(&self) -> Option<&VideoFormat> {
        self.headers.video_format.as_ref()
    }

    pub fn headers(&self) -> &AviHeaders {
        &self.headers
    }

    /// False after a fatal error until [`Demuxer::reset`].
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once `movi` has been reached and all headers are parsed.
    pub fn is_metadata_ready(&self) -> bool {
        self.metadata_ready
    }

    /// True once the media data has ended.
    pub fn is_finished(&self) -> bool {
        self.state == ParseState::ParseIgnore
    }

    /// Absolute file offset of the first buffered byte.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn stats(&self) -> &DemuxStats {
        &self.stats
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.depth()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.available()
    }

    /// Drops audio payload instead of forwarding it. Audio chunks are still
    /// parsed and counted.
    pub fn set_audio_muted(&mut self, muted: bool) {
        self.audio_muted = muted;
    }

    /// Installs a callback run once when `movi` is reached. Returning false
    /// rejects the file and deactivates the demuxer.
    pub fn set_validation_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&AviHeaders) -> bool + 'static,
    {
        self.validation = Some(Box::new(callback));
    }

    /// Level at or above which recoverable problems become fatal.
    ///
    /// The default, [`log::Level::Error`], only logs them. [`log::Level::Warn`]
    /// turns warnings such as unknown stream data into fatal errors.
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.fail_level = level;
    }

    pub fn audio_sink(&self) -> &A {
        &self.audio
    }

    pub fn audio_sink_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn video_sink(&self) -> &V {
        &self.video
    }

    pub fn video_sink_mut(&mut self) -> &mut V {
        &mut self.video
    }

    pub fn into_sinks(self) -> (A, V) {
        (self.audio, self.video)
    }

    /// Runs the state machine until it cannot advance with the buffered
    /// bytes. Returns whether anything happened.
    fn drive(&mut self) -> Result<bool, DemuxError> {
        let mut progressed = false;
        self.stalled = false;

        loop {
            match self.step() {
                Ok(()) => progressed = true,
                Err(DemuxError::InsufficientData) => return Ok(progressed),
                Err(e @ DemuxError::SinkStalled { .. }) => {
                    trace!("{e}");
                    self.stalled = true;
                    return Ok(progressed);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fail(&mut self, err: DemuxError) -> WriteOutcome {
        error!("{err} (offset {})", self.position);
        self.active = false;
        self.buffer.clear();
        WriteOutcome::FatalError
    }

    /// Performs one transition. Every `Ok` consumes input, forwards payload
    /// or changes state.
    fn step(&mut self) -> Result<(), DemuxError> {
        match self.state {
            ParseState::ParseHeader => self.parse_header(),
            ParseState::ParseHdrl => self.parse_hdrl(),
            ParseState::ParseAvih => self.parse_avih(),
            ParseState::ParseStrl => self.parse_strl(),
            ParseState::ParseStrf => self.parse_strf(),
            ParseState::AfterStrf => self.after_strf(),
            ParseState::ParseMovi => self.parse_movi(),
            ParseState::SubChunk => self.sub_chunk(),
            ParseState::SubChunkContinue => self.sub_chunk_continue(),
            ParseState::ParseRec => self.parse_rec(),
            ParseState::SkipStructure => self.skip_bytes(),
            ParseState::ParseIgnore => self.ignore(),
        }
    }

    fn parse_header(&mut self) -> Result<(), DemuxError> {
        let data = self.buffer.as_slice();
        let n = data.len().min(4);
        if data[..n] != FourCC::RIFF.as_bytes()[..n] {
            let mut found = [0u8; 4];
            found[..n].copy_from_slice(&data[..n]);
            return Err(DemuxError::InvalidSignature(FourCC(found)));
        }

        let riff = self.peek(ParseKind::List)?;
        if riff.fourcc != FourCC::AVI {
            return Err(DemuxError::NotAvi(riff.fourcc));
        }

        self.scopes.push(riff, self.position);
        self.consume(riff.header_len());
        self.transition(ParseState::ParseHdrl);
        Ok(())
    }

    fn parse_hdrl(&mut self) -> Result<(), DemuxError> {
        let hdrl = self.expect_list(FourCC::HDRL)?;

        self.scopes.push(hdrl, self.position);
        self.consume(hdrl.header_len());
        self.transition(ParseState::ParseAvih);
        Ok(())
    }

    fn parse_avih(&mut self) -> Result<(), DemuxError> {
        let avih = self.expect_chunk(FourCC::AVIH)?;
        let payload = self.contiguous(&avih, 0)?;
        let header = MainHeader::read(payload).map_err(|source| DemuxError::InvalidHeader {
            chunk: FourCC::AVIH,
            source,
        })?;

        self.headers.main_header = Some(header);
        self.consume(avih.total_len() as usize);
        self.transition(ParseState::ParseStrl);
        Ok(())
    }

    fn parse_strl(&mut self) -> Result<(), DemuxError> {
        let strl = self.expect_list(FourCC::STRL)?;

        let strh = Structure::recognize(
            &self.buffer.as_slice()[LIST_HEADER_SIZE..],
            self.position + LIST_HEADER_SIZE as u64,
            ParseKind::Chunk,
        )
        .ok_or(DemuxError::InsufficientData)?;
        if strh.fourcc != FourCC::STRH {
            return Err(DemuxError::UnexpectedStructure {
                expected: FourCC::STRH,
                found: strh.fourcc,
            });
        }

        let payload = self.contiguous(&strh, LIST_HEADER_SIZE)?;
        let header = StreamHeader::read(payload).map_err(|source| DemuxError::InvalidHeader {
            chunk: FourCC::STRH,
            source,
        })?;

        let kind = header.kind();
        let slot = match kind {
            StreamKind::Audio => Some(&mut self.headers.stream_header_audio),
            StreamKind::Video => Some(&mut self.headers.stream_header_video),
            StreamKind::Other(fcc) => {
                debug!("Ignoring stream header of type '{fcc}'");
                None
            }
        };
        if let Some(slot) = slot {
            let duplicate = slot.is_some();
            *slot = Some(header);
            if duplicate {
                log_or_err!(self, log::Level::Warn, DemuxError::DuplicateStream(kind));
            }
        }

        self.current_stream = Some(kind);
        self.scopes.push(strl, self.position);
        self.consume(LIST_HEADER_SIZE + strh.total_len() as usize);
        self.transition(ParseState::ParseStrf);
        Ok(())
    }

    fn parse_strf(&mut self) -> Result<(), DemuxError> {
        let strf = self.expect_chunk(FourCC::STRF)?;
        let payload = self.contiguous(&strf, 0)?;
        let invalid = |source: anyhow::Error| DemuxError::InvalidHeader {
            chunk: FourCC::STRF,
            source,
        };

        let kind = self
            .current_stream
            .unwrap_or(StreamKind::Other(FourCC::default()));
        match kind {
            StreamKind::Audio => {
                let format = AudioFormat::read(payload).map_err(invalid)?;
                self.headers.audio_format = Some(format);
            }
            StreamKind::Video => {
                let format = VideoFormat::read(payload).map_err(invalid)?;
                self.headers.video_format = Some(format);
            }
            StreamKind::Other(fcc) => debug!("No format decoder for stream type '{fcc}'"),
        }

        self.headers.streams.push(kind);
        self.consume(strf.total_len() as usize);
        self.transition(ParseState::AfterStrf);
        Ok(())
    }

    fn after_strf(&mut self) -> Result<(), DemuxError> {
        match self.buffer.find(FourCC::LIST.as_bytes()) {
            Some(0) => {
                let list = self.peek(ParseKind::List)?;
                match list.fourcc {
                    FourCC::STRL => self.transition(ParseState::ParseStrl),
                    FourCC::MOVI => self.transition(ParseState::ParseMovi),
                    _ => {
                        debug!("Skipping {list}");
                        self.skip_structure(&list, ParseState::AfterStrf);
                    }
                }
            }
            Some(offset) => {
                trace!("Discarding {offset} bytes before LIST");
                self.stats.skipped_bytes += offset as u64;
                self.consume(offset);
            }
            None => {
                // A tag split across writes keeps its first 3 bytes.
                let discard = self.buffer.available().saturating_sub(3);
                if discard == 0 {
                    return Err(DemuxError::InsufficientData);
                }
                trace!("Discarding {discard} bytes while scanning for LIST");
                self.stats.skipped_bytes += discard as u64;
                self.consume(discard);
            }
        }
        Ok(())
    }

    fn parse_movi(&mut self) -> Result<(), DemuxError> {
        let movi = self.expect_list(FourCC::MOVI)?;

        self.scopes.push(movi, self.position);
        self.movi_end = self
            .scopes
            .top()
            .map_or(movi.end_offset, |scope| scope.end_offset);
        self.consume(movi.header_len());
        self.metadata_ready = true;

        info!(
            "Media data at {} ({} bytes), streams: {}",
            self.position,
            self.movi_end.saturating_sub(self.position),
            self.headers
                .streams
                .iter()
                .map(|kind| kind.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        if let Some(callback) = self.validation.as_mut() {
            if !callback(&self.headers) {
                return Err(DemuxError::Rejected);
            }
        }

        self.transition(ParseState::SubChunk);
        Ok(())
    }

    fn sub_chunk(&mut self) -> Result<(), DemuxError> {
        self.scopes.cleanup(self.position);
        if self.position >= self.movi_end {
            self.transition(ParseState::ParseIgnore);
            return Ok(());
        }

        let data = self.peek(ParseKind::StreamData)?;

        if data.id == FourCC::LIST {
            let list = self.peek(ParseKind::List)?;
            if list.fourcc == FourCC::REC {
                self.transition(ParseState::ParseRec);
            } else {
                debug!("Skipping {list} inside movi");
                self.skip_structure(&list, ParseState::SubChunk);
            }
            return Ok(());
        }

        if data.fourcc == FourCC::IDX1 {
            self.transition(ParseState::ParseIgnore);
            return Ok(());
        }

        if !data.is_valid() {
            if data.stream_index().is_some() {
                log_or_err!(
                    self,
                    log::Level::Warn,
                    DemuxError::UnknownStreamData {
                        fourcc: data.fourcc,
                        size: data.size,
                        offset: data.start,
                    }
                );
            } else {
                debug!("Skipping {data}");
            }
            self.skip_structure(&data, ParseState::SubChunk);
            return Ok(());
        }

        self.consume(data.header_len());
        if data.is_video() {
            self.video.begin_frame(data.size as usize);
            self.frame_open = true;
            self.stats.video_frames += 1;
            self.stats.video_bytes += data.size as u64;
        } else {
            self.stats.audio_chunks += 1;
            self.stats.audio_bytes += data.size as u64;
        }
        trace!("{data}");

        self.current_data = Some(data);
        self.transition(ParseState::SubChunkContinue);
        Ok(())
    }

    fn sub_chunk_continue(&mut self) -> Result<(), DemuxError> {
        let Some(mut data) = self.current_data else {
            self.transition(ParseState::SubChunk);
            return Ok(());
        };

        if data.open > 0 {
            let n = (data.open as usize).min(self.buffer.available());
            if n == 0 {
                return Err(DemuxError::InsufficientData);
            }

            let payload = &self.buffer.as_slice()[..n];
            let written = if data.is_video() {
                self.video.write(payload)
            } else if self.audio_muted {
                n
            } else {
                self.audio.write(payload)
            };
            let written = written.min(n);

            if written == 0 {
                return Err(DemuxError::SinkStalled {
                    pending: data.open as usize,
                });
            }

            trace!("'{}': forwarded {written} of {} bytes", data.fourcc, data.open);
            data.open -= written as u64;
            self.current_data = Some(data);
            self.consume(written);
            return Ok(());
        }

        if self.frame_open {
            self.video.end_frame();
            self.frame_open = false;
        }

        if self.position < data.end_offset {
            if self.buffer.is_empty() {
                return Err(DemuxError::InsufficientData);
            }
            let pad = (data.end_offset - self.position) as usize;
            self.consume(pad.min(self.buffer.available()));
            return Ok(());
        }

        self.current_data = None;
        self.transition(ParseState::SubChunk);
        Ok(())
    }

    fn parse_rec(&mut self) -> Result<(), DemuxError> {
        let rec = self.expect_list(FourCC::REC)?;

        self.scopes.push(rec, self.position);
        self.consume(rec.header_len());
        self.transition(ParseState::SubChunk);
        Ok(())
    }

    fn skip_bytes(&mut self) -> Result<(), DemuxError> {
        if self.skip > 0 {
            let n = (self.skip as usize).min(self.buffer.available());
            if n == 0 {
                return Err(DemuxError::InsufficientData);
            }
            self.skip -= n as u64;
            self.stats.skipped_bytes += n as u64;
            self.consume(n);
        }

        if self.skip == 0 {
            self.transition(self.skip_next);
        }
        Ok(())
    }

    fn ignore(&mut self) -> Result<(), DemuxError> {
        let n = self.buffer.available();
        if n == 0 {
            return Err(DemuxError::InsufficientData);
        }
        self.stats.ignored_bytes += n as u64;
        self.consume(n);
        Ok(())
    }

    /// Recognizes a structure of `kind` at the front of the buffer.
    fn peek(&self, kind: ParseKind) -> Result<Structure, DemuxError> {
        Structure::recognize(self.buffer.as_slice(), self.position, kind)
            .ok_or(DemuxError::InsufficientData)
    }

    fn expect_list(&self, list_type: FourCC) -> Result<Structure, DemuxError> {
        let list = self.peek(ParseKind::List)?;
        if !list.is_list(list_type) {
            return Err(DemuxError::UnexpectedStructure {
                expected: list_type,
                found: if list.id == FourCC::LIST {
                    list.fourcc
                } else {
                    list.id
                },
            });
        }
        Ok(list)
    }

    fn expect_chunk(&self, id: FourCC) -> Result<Structure, DemuxError> {
        let chunk = self.peek(ParseKind::Chunk)?;
        if chunk.fourcc != id {
            return Err(DemuxError::UnexpectedStructure {
                expected: id,
                found: chunk.fourcc,
            });
        }
        Ok(chunk)
    }

    /// Payload of `chunk`, whose header sits `offset` bytes into the buffer.
    ///
    /// Fails with `BufferTooSmall` when the chunk can never be buffered
    /// whole, and with `InsufficientData` while it is still arriving.
    fn contiguous(&self, chunk: &Structure, offset: usize) -> Result<&[u8], DemuxError> {
        let required = offset + chunk.total_len() as usize;
        if required > self.buffer.capacity() {
            return Err(DemuxError::BufferTooSmall {
                chunk: chunk.fourcc,
                required,
                capacity: self.buffer.capacity(),
            });
        }

        chunk
            .payload(&self.buffer.as_slice()[offset..])
            .filter(|_| self.buffer.available() >= required)
            .ok_or(DemuxError::InsufficientData)
    }

    /// Discards `structure` whole, clamped to the enclosing scope.
    fn skip_structure(&mut self, structure: &Structure, next: ParseState) {
        self.scopes.cleanup(self.position);
        let mut len = structure.total_len();
        if let Some(scope) = self.scopes.top() {
            let remaining = scope.end_offset.saturating_sub(self.position);
            if len > remaining {
                warn!(
                    "{} overruns enclosing '{}', skipping {remaining} bytes",
                    structure, scope.fourcc
                );
                len = remaining;
            }
        }

        self.skip = len;
        self.skip_next = next;
        self.transition(ParseState::SkipStructure);
    }

    fn consume(&mut self, n: usize) {
        self.buffer.consume(n);
        self.position += n as u64;
    }

    fn transition(&mut self, next: ParseState) {
        debug!("{:?} -> {next:?} at {}", self.state, self.position);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fixture::*;
    use crate::structs::audio_format::audio_format_bytes;
    use crate::structs::stream_header::stream_header_bytes;
    use crate::structs::video_format::video_format_bytes;

    type TestDemuxer = Demuxer<Vec<u8>, FrameRecorder>;

    fn sample_file() -> Vec<u8> {
        riff_avi(&[
            list(
                b"hdrl",
                &[
                    avih(2, 320, 240),
                    audio_strl(2, 44100, 16),
                    video_strl(320, 240),
                ],
            ),
            chunk(b"JUNK", &[0; 10]),
            list(b"INFO", &[chunk(b"ISFT", b"avitool\0")]),
            list(
                b"movi",
                &[
                    chunk(b"01dc", &payload(1, 5)),
                    chunk(b"00wb", &payload(2, 7)),
                    list(
                        b"rec ",
                        &[chunk(b"01dc", &payload(3, 0)), chunk(b"00wb", &payload(4, 12))],
                    ),
                    chunk(b"JUNK", &[0; 3]),
                    chunk(b"01dc", &payload(5, 11)),
                ],
            ),
            chunk(b"idx1", &[0; 32]),
        ])
    }

    fn expected_audio() -> Vec<u8> {
        [payload(2, 7), payload(4, 12)].concat()
    }

    fn expected_frames() -> Vec<(usize, Vec<u8>)> {
        vec![(5, payload(1, 5)), (0, Vec::new()), (11, payload(5, 11))]
    }

    fn feed_in_pieces(demuxer: &mut TestDemuxer, data: &[u8], piece: usize) {
        for part in data.chunks(piece) {
            let outcome = demuxer.write(part);
            assert_eq!(outcome.accepted(part.len()), part.len());
        }
    }

    #[test]
    fn headers_match_file() {
        let mut demuxer = TestDemuxer::default();

        demuxer.write(&sample_file());

        let main = demuxer.main_header().unwrap();
        assert_eq!(main.streams, 2);
        assert_eq!(main.width, 320);
        assert_eq!(main.height, 240);

        let audio = demuxer.audio_format().unwrap();
        assert_eq!(audio.sample_rate, 44100);
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.bits_per_sample, 16);

        let video = demuxer.video_format().unwrap();
        assert_eq!(video.width, 320);
        assert_eq!(video.height, 240);
        assert_eq!(video.compression, FourCC(*b"MJPG"));

        assert_eq!(demuxer.stream_header_audio().unwrap().kind(), StreamKind::Audio);
        assert_eq!(demuxer.stream_header_video().unwrap().fcc_handler, FourCC(*b"MJPG"));
        assert_eq!(
            demuxer.headers().streams,
            vec![StreamKind::Audio, StreamKind::Video]
        );
        assert!(demuxer.is_metadata_ready());
    }

    #[test]
    fn whole_file_in_one_write() {
        let file = sample_file();
        let mut demuxer = TestDemuxer::default();

        let outcome = demuxer.write(&file);

        assert_eq!(outcome, WriteOutcome::Consumed(file.len()));
        assert!(demuxer.is_finished());
        assert!(demuxer.is_active());
        assert_eq!(demuxer.position(), file.len() as u64);
        assert_eq!(demuxer.audio_sink(), &expected_audio());
        assert_eq!(demuxer.video_sink().frames, expected_frames());

        let stats = demuxer.stats();
        assert_eq!(stats.audio_chunks, 2);
        assert_eq!(stats.audio_bytes, 19);
        assert_eq!(stats.video_frames, 3);
        assert_eq!(stats.video_bytes, 16);
        assert_eq!(stats.ignored_bytes, 40);
    }

    #[test]
    fn every_split_point_gives_same_output() {
        let file = sample_file();
        let mut whole = TestDemuxer::default();
        whole.write(&file);

        for split in 0..=file.len() {
            let mut demuxer = TestDemuxer::default();
            demuxer.write(&file[..split]);
            demuxer.write(&file[split..]);

            assert!(demuxer.is_active(), "split at {split}");
            assert!(demuxer.is_finished(), "split at {split}");
            assert_eq!(demuxer.audio_sink(), &expected_audio(), "split at {split}");
            assert_eq!(
                demuxer.video_sink().frames,
                expected_frames(),
                "split at {split}"
            );
            assert_eq!(demuxer.headers(), whole.headers(), "split at {split}");
            assert_eq!(demuxer.stats(), whole.stats(), "split at {split}");
            assert_eq!(demuxer.position(), whole.position(), "split at {split}");
        }
        assert_eq!(whole.audio_format().unwrap().sample_rate, 44100);
    }

    #[test]
    fn byte_at_a_time_matches_single_write() {
        let file = sample_file();
        let mut whole = TestDemuxer::default();
        whole.write(&file);

        let mut bytewise = TestDemuxer::default();
        feed_in_pieces(&mut bytewise, &file, 1);

        assert_eq!(bytewise.headers(), whole.headers());
        assert_eq!(bytewise.audio_sink(), whole.audio_sink());
        assert_eq!(bytewise.video_sink(), whole.video_sink());
        assert_eq!(bytewise.stats(), whole.stats());
        assert!(!bytewise.video_sink().open);
    }

    #[test]
    fn waits_for_more_data_mid_file() {
        let file = sample_file();
        let mut demuxer = TestDemuxer::default();

        assert_eq!(demuxer.write(&file[..20]), WriteOutcome::NeedMoreData);
        assert_eq!(demuxer.write(&[]), WriteOutcome::NeedMoreData);
        assert!(demuxer.main_header().is_none());
        assert!(!demuxer.is_metadata_ready());
    }

    #[test]
    fn odd_strf_is_realigned() {
        let mut audio_strf = audio_format_bytes(1, 22050, 8);
        let len = audio_strf.len();
        audio_strf[len - 2..].copy_from_slice(&1u16.to_le_bytes());
        audio_strf.push(0xAB);
        assert_eq!(audio_strf.len() % 2, 1);

        let mut video_strf = video_format_bytes(64, 48, 8, b"\0\0\0\0");
        video_strf.extend_from_slice(&[1, 2, 3]);

        let file = riff_avi(&[
            list(
                b"hdrl",
                &[
                    avih(2, 64, 48),
                    list(
                        b"strl",
                        &[
                            chunk(b"strh", &stream_header_bytes(b"vids", b"\0\0\0\0", 1, 25, 1)),
                            chunk(b"strf", &video_strf),
                        ],
                    ),
                    list(
                        b"strl",
                        &[
                            chunk(b"strh", &stream_header_bytes(b"auds", b"\0\0\0\0", 1, 22050, 0)),
                            chunk(b"strf", &audio_strf),
                        ],
                    ),
                ],
            ),
            list(b"movi", &[chunk(b"01wb", &payload(7, 9))]),
        ]);

        let mut demuxer = TestDemuxer::default();
        feed_in_pieces(&mut demuxer, &file, 7);

        assert_eq!(demuxer.audio_format().unwrap().extra_data, vec![0xAB]);
        assert_eq!(demuxer.video_format().unwrap().extra_data, vec![1, 2, 3]);
        assert!(demuxer.video_format().unwrap().is_uncompressed());
        assert_eq!(demuxer.audio_sink(), &payload(7, 9));
        assert!(demuxer.is_finished());
    }

    #[test]
    fn video_frames_are_bracketed() {
        let sizes = [5usize, 0, 7, 10];
        let movi: Vec<Vec<u8>> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| chunk(b"00dc", &payload(i as u8, *size)))
            .collect();
        let file = riff_avi(&[
            list(b"hdrl", &[avih(1, 320, 240), video_strl(320, 240)]),
            list(b"movi", &movi),
        ]);

        let mut demuxer = TestDemuxer::default();
        feed_in_pieces(&mut demuxer, &file, 3);

        let recorder = demuxer.video_sink();
        assert!(!recorder.open);
        assert_eq!(recorder.frames.len(), sizes.len());
        for (i, (size, bytes)) in recorder.frames.iter().enumerate() {
            assert_eq!(*size, sizes[i]);
            assert_eq!(bytes, &payload(i as u8, sizes[i]));
        }
        assert!(demuxer.audio_sink().is_empty());
    }

    #[test]
    fn rejects_non_riff_input() {
        let mut demuxer = TestDemuxer::default();

        assert_eq!(demuxer.write(b"RIFX\0\0\0\0AVI "), WriteOutcome::FatalError);
        assert!(!demuxer.is_active());
        assert_eq!(demuxer.buffered(), 0);
        assert!(demuxer.audio_sink().is_empty());
        assert!(demuxer.video_sink().frames.is_empty());

        // stays inactive
        assert_eq!(demuxer.write(&sample_file()), WriteOutcome::FatalError);
    }

    #[test]
    fn rejects_bad_signature_before_full_header() {
        let mut demuxer = TestDemuxer::default();
        assert_eq!(demuxer.write(b"XX"), WriteOutcome::FatalError);

        let mut demuxer = TestDemuxer::default();
        assert_eq!(demuxer.write(b"RI"), WriteOutcome::NeedMoreData);
        assert!(demuxer.is_active());
    }

    #[test]
    fn rejects_other_riff_forms() {
        let mut demuxer = TestDemuxer::default();

        assert_eq!(
            demuxer.write(b"RIFF\x24\x00\x00\x00WAVEfmt "),
            WriteOutcome::FatalError
        );
        assert!(!demuxer.is_active());
    }

    #[test]
    fn rejects_out_of_order_headers() {
        let file = riff_avi(&[list(b"hdrl", &[audio_strl(2, 44100, 16)])]);
        let mut demuxer = TestDemuxer::default();

        assert_eq!(demuxer.write(&file), WriteOutcome::FatalError);
        assert!(demuxer.main_header().is_none());
    }

    fn dual_stream_file(audio_first: bool) -> Vec<u8> {
        let (first, second) = if audio_first {
            (audio_strl(1, 8000, 8), video_strl(160, 120))
        } else {
            (video_strl(160, 120), audio_strl(1, 8000, 8))
        };
        riff_avi(&[
            list(b"hdrl", &[avih(2, 160, 120), first, second]),
            list(
                b"movi",
                &[chunk(b"00wb", &payload(1, 4)), chunk(b"01dc", &payload(2, 6))],
            ),
        ])
    }

    #[test]
    fn dual_stream_in_both_orders() {
        for audio_first in [true, false] {
            let mut demuxer = TestDemuxer::default();
            demuxer.write(&dual_stream_file(audio_first));

            assert!(demuxer.stream_header_audio().is_some());
            assert!(demuxer.stream_header_video().is_some());
            assert_eq!(demuxer.audio_format().unwrap().sample_rate, 8000);
            assert_eq!(demuxer.video_format().unwrap().width, 160);
            assert_eq!(demuxer.audio_sink(), &payload(1, 4));
            assert_eq!(demuxer.video_sink().frames, vec![(6, payload(2, 6))]);

            let expected = if audio_first {
                vec![StreamKind::Audio, StreamKind::Video]
            } else {
                vec![StreamKind::Video, StreamKind::Audio]
            };
            assert_eq!(demuxer.headers().streams, expected);
        }
    }

    #[test]
    fn duplicate_stream_replaces_first() {
        let file = riff_avi(&[
            list(
                b"hdrl",
                &[avih(2, 0, 0), audio_strl(1, 8000, 8), audio_strl(2, 48000, 16)],
            ),
            list(b"movi", &[]),
        ]);

        let mut demuxer = TestDemuxer::default();
        demuxer.write(&file);
        assert!(demuxer.is_active());
        assert_eq!(demuxer.audio_format().unwrap().sample_rate, 48000);

        let mut strict = TestDemuxer::default();
        strict.set_fail_level(log::Level::Warn);
        assert_eq!(strict.write(&file), WriteOutcome::FatalError);
    }

    fn file_with_text_stream() -> Vec<u8> {
        riff_avi(&[
            list(b"hdrl", &[avih(1, 0, 0), audio_strl(1, 8000, 8)]),
            list(
                b"movi",
                &[
                    chunk(b"02tx", b"subtitle"),
                    chunk(b"00wb", &payload(9, 3)),
                ],
            ),
        ])
    }

    #[test]
    fn unknown_stream_data_is_skipped() {
        let mut demuxer = TestDemuxer::default();
        demuxer.write(&file_with_text_stream());

        assert!(demuxer.is_active());
        assert_eq!(demuxer.audio_sink(), &payload(9, 3));
        assert_eq!(demuxer.stats().skipped_bytes, 16);
    }

    #[test]
    fn unknown_stream_data_is_fatal_when_strict() {
        let mut demuxer = TestDemuxer::default();
        demuxer.set_fail_level(log::Level::Warn);

        assert_eq!(
            demuxer.write(&file_with_text_stream()),
            WriteOutcome::FatalError
        );
        assert!(demuxer.audio_sink().is_empty());
    }

    #[test]
    fn validation_callback_can_reject() {
        let mut demuxer = TestDemuxer::default();
        demuxer.set_validation_callback(|headers| {
            headers
                .audio_format
                .as_ref()
                .is_some_and(|format| format.sample_rate == 48000)
        });

        assert_eq!(demuxer.write(&sample_file()), WriteOutcome::FatalError);
        assert!(demuxer.is_metadata_ready());
        assert!(demuxer.audio_sink().is_empty());
        assert!(demuxer.video_sink().frames.is_empty());
    }

    #[test]
    fn validation_callback_runs_once() {
        use std::cell::Cell;
        use std::rc::Rc;

        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let mut demuxer = TestDemuxer::default();
        demuxer.set_validation_callback(move |_| {
            seen.set(seen.get() + 1);
            true
        });

        feed_in_pieces(&mut demuxer, &sample_file(), 5);
        assert_eq!(calls.get(), 1);
        assert_eq!(demuxer.audio_sink(), &expected_audio());
    }

    #[test]
    fn muted_audio_is_not_forwarded() {
        let mut demuxer = TestDemuxer::default();
        demuxer.set_audio_muted(true);

        demuxer.write(&sample_file());

        assert!(demuxer.audio_sink().is_empty());
        assert_eq!(demuxer.stats().audio_bytes, 19);
        assert_eq!(demuxer.video_sink().frames, expected_frames());
    }

    /// Takes at most `limit` bytes per call.
    #[derive(Default)]
    struct Trickle {
        data: Vec<u8>,
        limit: usize,
    }

    impl AudioSink for Trickle {
        fn write(&mut self, data: &[u8]) -> usize {
            let n = data.len().min(self.limit);
            self.data.extend_from_slice(&data[..n]);
            n
        }
    }

    fn large_audio_file(len: usize) -> Vec<u8> {
        riff_avi(&[
            list(b"hdrl", &[avih(1, 0, 0), audio_strl(2, 44100, 16)]),
            list(b"movi", &[chunk(b"00wb", &payload(3, len))]),
        ])
    }

    #[test]
    fn small_capacity_takes_large_write() {
        let file = large_audio_file(1001);
        let mut demuxer = Demuxer::with_capacity(
            128,
            Trickle {
                limit: 3,
                ..Default::default()
            },
            NullSink,
        );

        assert_eq!(demuxer.write(&file), WriteOutcome::Consumed(file.len()));
        assert!(demuxer.is_finished());
        assert_eq!(demuxer.audio_sink().data, payload(3, 1001));
    }

    #[test]
    fn stalled_sink_applies_backpressure() {
        let file = large_audio_file(1000);
        let mut demuxer = Demuxer::with_capacity(
            128,
            Trickle {
                limit: 0,
                ..Default::default()
            },
            NullSink,
        );

        let outcome = demuxer.write(&file);
        let accepted = outcome.accepted(file.len());
        assert!(matches!(outcome, WriteOutcome::Consumed(_)));
        assert!(accepted < file.len());
        assert_eq!(demuxer.state(), ParseState::SubChunkContinue);

        demuxer.audio_sink_mut().limit = usize::MAX;
        let mut offset = accepted;
        while offset < file.len() {
            offset += demuxer.write(&file[offset..]).accepted(file.len() - offset);
        }
        assert!(demuxer.is_finished());

        let (audio, _) = demuxer.into_sinks();
        assert_eq!(audio.data, payload(3, 1000));
    }

    #[test]
    fn header_larger_than_capacity_is_fatal() {
        let mut demuxer = Demuxer::with_capacity(32, Vec::new(), NullSink);

        assert_eq!(demuxer.write(&sample_file()), WriteOutcome::FatalError);
        assert!(!demuxer.is_active());
    }

    #[test]
    fn reset_clears_residual_bytes() {
        let file = sample_file();
        let mut demuxer = TestDemuxer::default();

        demuxer.write(&file[..file.len() / 2]);
        demuxer.write(b"garbage");
        demuxer.reset();

        assert_eq!(demuxer.state(), ParseState::ParseHeader);
        assert_eq!(demuxer.position(), 0);
        assert_eq!(demuxer.buffered(), 0);
        assert_eq!(demuxer.scope_depth(), 0);
        assert!(demuxer.main_header().is_none());
        assert!(!demuxer.video_sink().open);

        demuxer.audio_sink_mut().clear();
        demuxer.video_sink_mut().frames.clear();
        demuxer.write(&file);

        assert!(demuxer.is_finished());
        assert_eq!(demuxer.audio_sink(), &expected_audio());
        assert_eq!(demuxer.video_sink().frames, expected_frames());
    }

    #[test]
    fn reset_reactivates_after_fatal_error() {
        let mut demuxer = TestDemuxer::default();
        demuxer.write(b"NOPE");
        assert!(!demuxer.is_active());

        demuxer.reset();
        demuxer.write(&sample_file());
        assert!(demuxer.is_active());
        assert!(demuxer.is_finished());
    }

    #[test]
    fn trailing_data_is_ignored() {
        let mut file = sample_file();
        let movi_only = file.len();
        file.extend_from_slice(b"RIFF\x04\x00\x00\x00AVIX");

        let mut demuxer = TestDemuxer::default();
        demuxer.write(&file);

        assert!(demuxer.is_finished());
        assert_eq!(demuxer.stats().ignored_bytes, 40 + (file.len() - movi_only) as u64);
        assert_eq!(demuxer.audio_sink(), &expected_audio());
    }
}
