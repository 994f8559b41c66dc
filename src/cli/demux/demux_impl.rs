use anyhow::{Context, Result, bail, ensure};
use indicatif::MultiProgress;

use super::feed;
use super::output::{AudioOutput, VideoOutput};
use super::progress::{create_progress_bar, frames_message};
use crate::cli::command::{Cli, DemuxArgs};
use crate::input::InputReader;
use crate::timestamp::time_str;
use avi::process::demux::{AviHeaders, Demuxer};

pub fn cmd_demux(args: &DemuxArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    if args.audio.is_none() && args.video.is_none() {
        bail!("Nothing to extract, pass --audio and/or --video");
    }
    ensure!(args.chunk_size > 0, "--chunk-size must be greater than 0");
    if args.wav && args.audio.is_none() {
        log::warn!("--wav has no effect without --audio");
    }
    if args.split_frames && args.video.is_none() {
        log::warn!("--split-frames has no effect without --video");
    }

    let mut input_reader = InputReader::new(&args.input)?;
    if input_reader.is_pipe() {
        log::info!("Reading AVI data from stdin");
    } else {
        log::info!("Demuxing AVI file: {}", args.input.display());
    }

    let audio = AudioOutput::create(args.audio.as_deref(), args.wav)?;
    let video = VideoOutput::create(args.video.as_deref(), args.split_frames)?;
    let mute = audio.is_discard();

    let mut demuxer = Demuxer::with_capacity(args.buffer_size, audio, video);
    demuxer.set_fail_level(cli.fail_level());
    demuxer.set_audio_muted(mute);

    let want_audio = args.audio.is_some();
    let want_video = args.video.is_some();
    let strict = cli.strict;
    let wav = want_audio && args.wav;
    demuxer.set_validation_callback(move |headers| {
        check_streams(headers, want_audio, want_video, strict) && check_wav(headers, wav)
    });

    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, input_reader.size())?),
        None => None,
    };

    input_reader.process_chunks(args.chunk_size, |chunk| {
        if let Err(e) = feed(&mut demuxer, chunk) {
            if let Some(io) = demuxer.audio_sink().error() {
                bail!("Failed to write audio: {io}");
            }
            if let Some(io) = demuxer.video_sink().error() {
                bail!("Failed to write video: {io}");
            }
            return Err(e);
        }

        if let Some(ref pb) = pb {
            pb.inc(chunk.len() as u64);
            if demuxer.is_metadata_ready() {
                let stats = demuxer.stats();
                pb.set_message(frames_message(stats.video_frames, stats.audio_bytes));
            }
        }

        // Nothing after the media data is of interest
        Ok(!demuxer.is_finished())
    })?;

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    if !demuxer.is_metadata_ready() {
        bail!("No media data found, the input ended inside the AVI headers");
    }
    if !demuxer.is_finished() {
        if cli.strict {
            bail!("Input ended before the end of the media data");
        }
        log::warn!("Input ended before the end of the media data");
    }

    let audio_format = demuxer.audio_format().cloned();
    let stats = *demuxer.stats();
    let (audio, video) = demuxer.into_sinks();

    let audio_written = audio
        .finish(audio_format.as_ref())
        .context("Failed to finish audio output")?;
    let video_written = video.finish().context("Failed to finish video output")?;

    if want_audio {
        let duration = audio_format
            .as_ref()
            .filter(|f| f.avg_bytes_per_sec > 0)
            .map(|f| time_str(audio_written as f64 / f.avg_bytes_per_sec as f64));
        log::info!(
            "Audio: {} chunks, {audio_written} bytes{}",
            stats.audio_chunks,
            duration.map(|d| format!(", {d}")).unwrap_or_default()
        );
    }
    if want_video {
        log::info!("Video: {} frames, {video_written} bytes", stats.video_frames);
    }
    if stats.skipped_bytes > 0 {
        log::debug!("Skipped {} bytes of unrelated data", stats.skipped_bytes);
    }

    Ok(())
}

/// Decides whether demuxing should go ahead once the headers are known.
fn check_streams(headers: &AviHeaders, want_audio: bool, want_video: bool, strict: bool) -> bool {
    let mut ok = true;

    if want_audio && headers.audio_format.is_none() {
        log::warn!("No audio stream found, the audio output stays empty");
        ok = !strict;
    }
    if want_video && headers.video_format.is_none() {
        log::warn!("No video stream found, the video output stays empty");
        ok = ok && !strict;
    }

    if let Some(format) = &headers.audio_format {
        log::info!(
            "Audio stream: {}, {} ch, {} Hz, {} bits",
            format.format_tag,
            format.channels,
            format.sample_rate,
            format.bits_per_sample
        );
    }
    if let Some(format) = &headers.video_format {
        let codec = headers
            .stream_header_video
            .as_ref()
            .map(|h| h.fcc_handler)
            .filter(|fcc| fcc.0 != [0; 4])
            .unwrap_or(format.compression);
        log::info!(
            "Video stream: '{codec}', {}x{}, {} bits",
            format.width,
            format.height,
            format.bit_count
        );
    }

    ok
}

/// WAV output needs a PCM stream, the 16-byte `fmt ` body has no room for
/// codec data.
fn check_wav(headers: &AviHeaders, wav: bool) -> bool {
    if !wav {
        return true;
    }

    match &headers.audio_format {
        Some(format) if !format.is_pcm() => {
            log::error!(
                "--wav needs PCM audio, the stream is {}; demux without --wav instead",
                format.format_tag
            );
            false
        }
        Some(_) => true,
        None => {
            log::error!("--wav needs an audio stream, none was found");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avi::structs::audio_format::{AudioFormat, AudioFormatTag};

    #[test]
    fn missing_streams_are_rejected_only_when_strict() {
        let headers = AviHeaders {
            audio_format: Some(AudioFormat::default()),
            ..Default::default()
        };

        assert!(check_streams(&headers, true, false, true));
        assert!(check_streams(&headers, true, true, false));
        assert!(!check_streams(&headers, true, true, true));
        assert!(!check_streams(&AviHeaders::default(), true, false, true));
    }

    #[test]
    fn wav_needs_pcm_audio() {
        let pcm = AviHeaders {
            audio_format: Some(AudioFormat::default()),
            ..Default::default()
        };
        let mp3 = AviHeaders {
            audio_format: Some(AudioFormat {
                format_tag: AudioFormatTag::Mp3,
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(check_wav(&pcm, true));
        assert!(!check_wav(&mp3, true));
        assert!(!check_wav(&AviHeaders::default(), true));
        assert!(check_wav(&mp3, false));
    }
}
