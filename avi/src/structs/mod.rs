//! Data structures representing AVI format components.
//!
//! Contains the RIFF structure descriptors and scope tracking used while
//! walking the file, and the header records decoded from `avih`, `strh` and
//! `strf` chunks.

pub mod audio_format;
pub mod chunk;
pub mod fourcc;
pub mod main_header;
pub mod scope;
pub mod stream_header;
pub mod video_format;
