use std::path::PathBuf;

use avi::process::demux::DEFAULT_CAPACITY;
use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\navi ",
    env!("AVI_VERSION"),
    "\ngit ",
    env!("VERGEN_GIT_DESCRIBE"),
    "\nbuilt ",
    env!("BUILD_TIMESTAMP"),
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting and demultiplexing AVI files",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings as fatal errors (fail on first warning).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level at which the demuxer gives up.
    pub fn fail_level(&self) -> log::Level {
        if self.strict {
            log::Level::Warn
        } else {
            log::Level::Error
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract the audio and video elementary streams.
    Demux(DemuxArgs),

    /// Print container and stream information
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct DemuxArgs {
    /// Input AVI file (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file for the audio stream.
    #[arg(long, value_name = "PATH")]
    pub audio: Option<PathBuf>,

    /// Output file for the video stream. With --split-frames, the base name
    /// of the numbered frame files.
    #[arg(long, value_name = "PATH")]
    pub video: Option<PathBuf>,

    /// Wrap the audio stream in a RIFF WAVE header.
    #[arg(long)]
    pub wav: bool,

    /// Write every video frame to its own file.
    #[arg(long)]
    pub split_frames: bool,

    /// Demuxer buffer size in bytes. Bounds the largest header chunk.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CAPACITY)]
    pub buffer_size: usize,

    /// Read size in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = 64 * 1024)]
    pub chunk_size: usize,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input AVI file (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = InfoFormat::Plain)]
    pub format: InfoFormat,

    /// Demuxer buffer size in bytes. Bounds the largest header chunk.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CAPACITY)]
    pub buffer_size: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum InfoFormat {
    /// Aligned human-readable report.
    Plain,
    /// YAML document.
    Yaml,
}
