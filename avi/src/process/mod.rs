/// Incremental demultiplexing of AVI files.
///
/// Provides the [`Demuxer`](demux::Demuxer) state machine that consumes a file
/// in arbitrary pieces, retains its headers in
/// [`AviHeaders`](demux::AviHeaders) and forwards elementary stream payload.
pub mod demux;

/// Destinations for demultiplexed payload.
///
/// Provides the [`AudioSink`](sink::AudioSink) and
/// [`VideoSink`](sink::VideoSink) traits together with a discarding
/// [`NullSink`](sink::NullSink) and an [`io::Write`](std::io::Write) adapter.
pub mod sink;

#[cfg(test)]
pub(crate) mod fixture;
