mod demux_impl;
pub mod output;
pub mod progress;

use anyhow::{Result, bail};
use avi::process::demux::Demuxer;
use avi::process::sink::{AudioSink, VideoSink};

// Re-export the main demux function
pub use demux_impl::cmd_demux;

/// Writes `data` to `demuxer` until every byte is taken.
///
/// Fails when the demuxer hits a fatal error or a sink stops accepting data.
pub fn feed<A: AudioSink, V: VideoSink>(demuxer: &mut Demuxer<A, V>, data: &[u8]) -> Result<()> {
    let mut offset = 0;
    while offset < data.len() {
        let outcome = demuxer.write(&data[offset..]);
        if outcome.is_fatal() {
            bail!("Demuxing failed near offset {}", demuxer.position());
        }

        let accepted = outcome.accepted(data.len() - offset);
        if accepted == 0 {
            bail!(
                "Output stopped accepting data at offset {}",
                demuxer.position()
            );
        }
        offset += accepted;
    }

    Ok(())
}
