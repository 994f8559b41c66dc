#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! An AVI file is a RIFF form of type `AVI ` made of nested structures:
//!
//! - **LIST**: `"LIST"`, a 32-bit little-endian size and a list type, followed
//!   by nested structures
//! - **CHUNK**: a four-character tag and a size, followed by the payload
//!
//! Every size excludes the 8-byte header and is padded to an even number of
//! bytes on disk.
//!
//! ### File Organization
//!
//! ```text
//! RIFF 'AVI '
//!   LIST 'hdrl'
//!     avih                  main header
//!     LIST 'strl'           one per stream
//!       strh                stream header
//!       strf                stream format
//!   LIST 'movi'
//!     ##wb / ##db / ##dc    stream data, optionally grouped in LIST 'rec '
//!   idx1                    index, ignored
//! ```
//!
//! ### Streaming Model
//!
//! Input arrives in pieces of any size. Only header chunks are ever buffered
//! whole, so the accumulator capacity bounds the largest header, never a
//! video frame. Payload is forwarded as soon as it is buffered.
//!
//! ## Quick Start
//!
//! 1. Create a [`process::demux::Demuxer`] with an audio and a video sink
//! 2. Push bytes with [`process::demux::Demuxer::write`]
//! 3. Read headers once [`process::demux::Demuxer::is_metadata_ready`] is true
//!
//! ```rust,no_run
//! use avi::process::demux::{Demuxer, WriteOutcome};
//! use avi::process::sink::WriteSink;
//! use std::io::Read;
//!
//! let audio = WriteSink::new(std::fs::File::create("audio.raw")?);
//! let video = WriteSink::new(std::fs::File::create("video.raw")?);
//! let mut demuxer = Demuxer::new(audio, video);
//!
//! let mut file = std::fs::File::open("input.avi")?;
//! let mut buf = [0u8; 16 * 1024];
//! loop {
//!     let n = file.read(&mut buf)?;
//!     if n == 0 {
//!         break;
//!     }
//!     if demuxer.write(&buf[..n]) == WriteOutcome::FatalError {
//!         break;
//!     }
//! }
//!
//! if let Some(format) = demuxer.audio_format() {
//!     println!("{} Hz, {} channels", format.sample_rate, format.channels);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Processing functionality for AVI files.
///
/// 1. **Demultiplexing** ([`process::demux`]): Walks the RIFF structure
///    incrementally and retains headers.
///
/// 2. **Sinks** ([`process::sink`]): Receive audio payload and bracketed video
///    frames.
pub mod process;

/// Data structures representing AVI format components.
///
/// - **FourCC** ([`structs::fourcc`]): Four-character codes
/// - **Structures** ([`structs::chunk`]): LIST, CHUNK and stream-data descriptors
/// - **Scopes** ([`structs::scope`]): Open container tracking
/// - **Main Header** ([`structs::main_header`]): `avih`
/// - **Stream Header** ([`structs::stream_header`]): `strh`
/// - **Audio Format** ([`structs::audio_format`]): `strf` of audio streams
/// - **Video Format** ([`structs::video_format`]): `strf` of video streams
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Accumulator** ([`utils::accumulator`]): Fixed-capacity input staging
/// - **Byte Reader** ([`utils::byte_reader`]): Little-endian field reading
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
