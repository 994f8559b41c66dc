use crate::structs::fourcc::FourCC;
use crate::structs::stream_header::StreamKind;

#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum DemuxError {
    #[error("Insufficient buffer data for the current structure")]
    InsufficientData,

    #[error("Missing RIFF signature at stream start. Read {0}")]
    InvalidSignature(FourCC),

    #[error("RIFF form type is not AVI. Read {0}")]
    NotAvi(FourCC),

    #[error("Unexpected structure: expected {expected}, found {found}")]
    UnexpectedStructure { expected: FourCC, found: FourCC },

    #[error("{chunk} needs {required} contiguous bytes but the buffer holds only {capacity}")]
    BufferTooSmall {
        chunk: FourCC,
        required: usize,
        capacity: usize,
    },

    #[error("Failed to decode {chunk} payload: {source}")]
    InvalidHeader {
        chunk: FourCC,
        #[source]
        source: anyhow::Error,
    },

    #[error("Unknown stream data {fourcc} ({size} bytes) at offset {offset}")]
    UnknownStreamData {
        fourcc: FourCC,
        size: u32,
        offset: u64,
    },

    #[error("A second {0} stream overwrites the first one")]
    DuplicateStream(StreamKind),

    #[error("Sink accepted no bytes, {pending} bytes pending")]
    SinkStalled { pending: usize },

    #[error("Stream rejected by validation callback")]
    Rejected,

    #[error("Demuxer is inactive")]
    Inactive,
}

#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    #[error("{chunk} payload truncated: need {needed} bytes, got {got}")]
    Truncated {
        chunk: FourCC,
        needed: usize,
        got: usize,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ScopeError {
    #[error("{child} ends at {child_end}, beyond enclosing {parent} ending at {parent_end}")]
    ChildOutlivesParent {
        child: FourCC,
        child_end: u64,
        parent: FourCC,
        parent_end: u64,
    },
}
