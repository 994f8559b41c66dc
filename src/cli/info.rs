use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use super::command::{Cli, InfoArgs, InfoFormat};
use super::demux::feed;
use crate::input::InputReader;
use crate::timestamp::{frames_to_time_str, time_str};
use avi::process::demux::{DemuxStats, Demuxer};
use avi::process::sink::NullSink;
use avi::structs::audio_format::AudioFormat;
use avi::structs::main_header::MainHeader;
use avi::structs::stream_header::StreamHeader;
use avi::structs::video_format::VideoFormat;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing AVI file: {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;
    let mut demuxer: Demuxer = Demuxer::with_capacity(args.buffer_size, NullSink, NullSink);
    demuxer.set_fail_level(cli.fail_level());
    demuxer.set_audio_muted(true);

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            pb.set_message("Reading headers...");
            Some(pb)
        }
        None => None,
    };

    let mut total_bytes = 0u64;
    input_reader.process_chunks(64 * 1024, |chunk| {
        total_bytes += chunk.len() as u64;
        feed(&mut demuxer, chunk)?;

        if let Some(ref pb) = pb {
            pb.set_message(format!(
                "Scanning media data...    {} frames",
                demuxer.stats().video_frames
            ));
        }
        Ok(true)
    })?;

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    if !demuxer.is_metadata_ready() {
        anyhow::bail!("No media data found, the file ended inside the AVI headers");
    }
    if !demuxer.is_finished() {
        log::warn!("File ended before the end of the media data");
    }

    let report = InfoReport::new(&args.input.display().to_string(), total_bytes, &demuxer);
    match args.format {
        InfoFormat::Plain => report.print(),
        InfoFormat::Yaml => print!(
            "{}",
            serde_yaml_ng::to_string(&report).context("Failed to serialize report")?
        ),
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct InfoReport {
    input: String,
    size: u64,
    complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    container: Option<ContainerInfo>,
    streams: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<AudioInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<VideoInfo>,
    payload: PayloadInfo,
}

#[derive(Debug, Serialize)]
struct ContainerInfo {
    width: u32,
    height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_rate: Option<f64>,
    total_frames: u32,
    duration: String,
    streams: u32,
    has_index: bool,
    interleaved: bool,
    flags: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct AudioInfo {
    codec: String,
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    block_align: u16,
    bitrate_kbps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
}

#[derive(Debug, Serialize)]
struct VideoInfo {
    codec: String,
    width: i32,
    height: i32,
    bit_count: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
}

#[derive(Debug, Serialize)]
struct PayloadInfo {
    audio_chunks: u64,
    audio_bytes: u64,
    video_frames: u64,
    video_bytes: u64,
    skipped_bytes: u64,
    trailing_bytes: u64,
}

impl InfoReport {
    fn new(input: &str, size: u64, demuxer: &Demuxer) -> Self {
        Self {
            input: input.to_string(),
            size,
            complete: demuxer.is_finished(),
            container: demuxer.main_header().map(ContainerInfo::from),
            streams: demuxer
                .headers()
                .streams
                .iter()
                .map(|kind| kind.to_string())
                .collect(),
            audio: demuxer
                .audio_format()
                .map(|format| AudioInfo::new(format, demuxer.stream_header_audio())),
            video: demuxer
                .video_format()
                .map(|format| VideoInfo::new(format, demuxer.stream_header_video())),
            payload: PayloadInfo::from(demuxer.stats()),
        }
    }

    fn print(&self) {
        println!();
        println!("AVI File Information");
        println!("====================");
        println!();
        println!("  Input                     {}", self.input);
        let size_mb = self.size as f64 / 1_000_000.0;
        println!("  Size                      {size_mb:.2} MB ({} bytes)", self.size);
        println!("  Streams                   {}", self.streams.join(", "));
        println!();

        if let Some(container) = &self.container {
            println!("Container");
            println!(
                "  Frame size                {}x{}",
                container.width, container.height
            );
            if let Some(rate) = container.frame_rate {
                println!("  Frame rate                {rate:.3} fps");
            }
            println!("  Total frames              {}", container.total_frames);
            println!("  Duration                  {}", container.duration);
            println!("  Declared streams          {}", container.streams);
            println!("  Index                     {}", container.has_index);
            println!("  Interleaved               {}", container.interleaved);
            if !container.flags.is_empty() {
                println!("  Flags                     {}", container.flags.join(", "));
            }
            println!();
        }

        if let Some(audio) = &self.audio {
            println!("Audio Stream");
            println!(
                "  Codec                     {} ({:#06X})",
                audio.codec, audio.format_tag
            );
            println!("  Channels                  {}", audio.channels);
            println!("  Sampling rate             {} Hz", audio.sample_rate);
            if audio.bits_per_sample > 0 {
                println!("  Bit depth                 {} bits", audio.bits_per_sample);
            }
            println!("  Block align               {} bytes", audio.block_align);
            println!("  Data rate                 {:.1} kbps", audio.bitrate_kbps);
            if let Some(duration) = &audio.duration {
                println!("  Duration                  {duration}");
            }
            println!();
        }

        if let Some(video) = &self.video {
            println!("Video Stream");
            println!("  Codec                     {}", video.codec);
            println!("  Frame size                {}x{}", video.width, video.height);
            println!("  Bit depth                 {} bits", video.bit_count);
            if let Some(rate) = video.frame_rate {
                println!("  Frame rate                {rate:.3} fps");
            }
            if let Some(frames) = video.frames {
                println!("  Frames                    {frames}");
            }
            if let Some(duration) = &video.duration {
                println!("  Duration                  {duration}");
            }
            println!();
        }

        println!("Payload Summary");
        println!("  Audio chunks              {}", self.payload.audio_chunks);
        println!("  Audio bytes               {}", self.payload.audio_bytes);
        println!("  Video frames              {}", self.payload.video_frames);
        println!("  Video bytes               {}", self.payload.video_bytes);
        println!("  Skipped bytes             {}", self.payload.skipped_bytes);
        println!("  Trailing bytes            {}", self.payload.trailing_bytes);
        if !self.complete {
            println!("  Media data                truncated");
        }
        println!();
    }
}

impl From<&MainHeader> for ContainerInfo {
    fn from(header: &MainHeader) -> Self {
        Self {
            width: header.width,
            height: header.height,
            frame_rate: header.frame_rate(),
            total_frames: header.total_frames,
            duration: time_str(header.duration_seconds()),
            streams: header.streams,
            has_index: header.has_index(),
            interleaved: header.is_interleaved(),
            flags: header.flag_names(),
        }
    }
}

impl AudioInfo {
    fn new(format: &AudioFormat, header: Option<&StreamHeader>) -> Self {
        Self {
            codec: format.format_tag.to_string(),
            format_tag: format.format_tag.into(),
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bits_per_sample,
            block_align: format.block_align,
            bitrate_kbps: format.avg_bytes_per_sec as f64 * 8.0 / 1000.0,
            duration: header
                .filter(|h| h.length > 0)
                .map(|h| time_str(h.duration_seconds())),
        }
    }
}

impl VideoInfo {
    fn new(format: &VideoFormat, header: Option<&StreamHeader>) -> Self {
        let codec = match header {
            Some(h) if h.fcc_handler.0 != [0; 4] => h.fcc_handler.to_string(),
            _ if format.is_uncompressed() => "RGB".to_string(),
            _ => format.compression.to_string(),
        };
        let frame_rate = header.map(|h| h.rate_per_second()).filter(|r| *r > 0.0);

        Self {
            codec,
            width: format.width,
            height: format.height,
            bit_count: format.bit_count,
            frame_rate,
            frames: header.map(|h| h.length),
            duration: header
                .zip(frame_rate)
                .map(|(h, rate)| frames_to_time_str(h.length as u64, rate)),
        }
    }
}

impl From<&DemuxStats> for PayloadInfo {
    fn from(stats: &DemuxStats) -> Self {
        Self {
            audio_chunks: stats.audio_chunks,
            audio_bytes: stats.audio_bytes,
            video_frames: stats.video_frames,
            video_bytes: stats.video_bytes,
            skipped_bytes: stats.skipped_bytes,
            trailing_bytes: stats.ignored_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_demuxer() -> Demuxer {
        let mut audio_fmt = Vec::new();
        for v in [1u16, 2] {
            audio_fmt.extend_from_slice(&v.to_le_bytes());
        }
        audio_fmt.extend_from_slice(&44100u32.to_le_bytes());
        audio_fmt.extend_from_slice(&176_400u32.to_le_bytes());
        audio_fmt.extend_from_slice(&4u16.to_le_bytes());
        audio_fmt.extend_from_slice(&16u16.to_le_bytes());

        let mut strh = b"auds\0\0\0\0".to_vec();
        strh.extend_from_slice(&[0; 12]);
        strh.extend_from_slice(&1u32.to_le_bytes());
        strh.extend_from_slice(&44100u32.to_le_bytes());
        strh.extend_from_slice(&0u32.to_le_bytes());
        strh.extend_from_slice(&88200u32.to_le_bytes());
        strh.extend_from_slice(&[0; 12]);

        let mut avih = Vec::new();
        for v in [40_000u32, 0, 0, 0x10, 50, 0, 1, 0, 320, 240, 0, 0, 0, 0] {
            avih.extend_from_slice(&v.to_le_bytes());
        }

        let chunk = |id: &[u8; 4], payload: &[u8]| {
            let mut data = id.to_vec();
            data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            data.extend_from_slice(payload);
            data
        };
        let list = |kind: &[u8; 4], body: Vec<u8>| {
            let mut data = b"LIST".to_vec();
            data.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
            data.extend_from_slice(kind);
            data.extend_from_slice(&body);
            data
        };

        let strl = list(b"strl", [chunk(b"strh", &strh), chunk(b"strf", &audio_fmt)].concat());
        let hdrl = list(b"hdrl", [chunk(b"avih", &avih), strl].concat());
        let movi = list(b"movi", chunk(b"00wb", &[0; 16]));
        let body = [b"AVI ".to_vec(), hdrl, movi].concat();
        let file = [
            b"RIFF".to_vec(),
            (body.len() as u32).to_le_bytes().to_vec(),
            body,
        ]
        .concat();

        let mut demuxer = Demuxer::default();
        feed(&mut demuxer, &file).unwrap();
        demuxer
    }

    #[test]
    fn report_from_demuxer() {
        let demuxer = sample_demuxer();
        let report = InfoReport::new("test.avi", 1234, &demuxer);

        assert!(report.complete);
        assert_eq!(report.streams, vec!["audio".to_string()]);

        let container = report.container.as_ref().unwrap();
        assert_eq!(container.frame_rate, Some(25.0));
        assert_eq!(container.duration, "00:00:02.000");
        assert_eq!(container.flags, vec!["HASINDEX"]);

        let audio = report.audio.as_ref().unwrap();
        assert_eq!(audio.codec, "PCM");
        assert_eq!(audio.sample_rate, 44100);
        assert_eq!(audio.duration.as_deref(), Some("00:00:02.000"));
        assert!(report.video.is_none());

        assert_eq!(report.payload.audio_chunks, 1);
        assert_eq!(report.payload.audio_bytes, 16);
    }

    #[test]
    fn report_serializes_to_yaml() -> Result<()> {
        let demuxer = sample_demuxer();
        let yaml = serde_yaml_ng::to_string(&InfoReport::new("test.avi", 1234, &demuxer))?;

        assert!(yaml.contains("sample_rate: 44100"));
        assert!(yaml.contains("audio_bytes: 16"));
        assert!(yaml.contains("- HASINDEX"));
        assert!(!yaml.contains("video:"));
        Ok(())
    }
}
