#![allow(dead_code)]

use anyhow::Result;
use clap::Parser as ClapParser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use cli::command::{Cli, Commands, LogFormat};
use cli::demux::cmd_demux;
use cli::info::cmd_info;

mod byteorder;
mod cli;
mod input;
pub(crate) mod timestamp;
mod wav;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let base_level = cli.loglevel.to_level_filter();

    let multi = MultiProgress::new();

    let mut env_builder = env_logger::Builder::from_default_env();
    env_builder.filter_level(base_level);
    match cli.log_format {
        LogFormat::Plain => {
            env_builder.format_timestamp_secs();
        }
        LogFormat::Json => {
            env_builder.format(|buf, record| {
                use std::io::Write;
                let ts = buf.timestamp().to_string();
                writeln!(buf, "{}", json_record(record, &ts))
            });
        }
    }

    let pb = if cli.progress {
        let logger = env_builder.build();
        let level = logger.filter();
        LogWrapper::new(multi.clone(), logger).try_init()?;
        log::set_max_level(level);
        Some(&multi)
    } else {
        env_builder.try_init()?;
        None
    };

    match cli.command {
        Commands::Demux(ref args) => cmd_demux(args, &cli, pb)?,
        Commands::Info(ref args) => cmd_info(args, &cli, pb)?,
    }

    Ok(())
}

/// One log record as a single-line JSON object.
fn json_record(record: &log::Record, ts: &str) -> serde_json::Value {
    serde_json::json!({
        "ts": ts,
        "lvl": record.level().to_string(),
        "target": record.target(),
        "msg": record.args().to_string(),
    })
}

#[test]
fn json_record_escapes_message() {
    let line = json_record(
        &log::Record::builder()
            .args(format_args!("frame \"{}\"\n\\done", 3))
            .level(log::Level::Warn)
            .target("avi::process::demux")
            .build(),
        "2024-01-01T00:00:00Z",
    )
    .to_string();
    assert!(!line.contains('\n'));

    let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["lvl"], "WARN");
    assert_eq!(parsed["target"], "avi::process::demux");
    assert_eq!(parsed["msg"], "frame \"3\"\n\\done");
}
