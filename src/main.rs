// SPDX-License-Identifier: GPL-3.0
//! hidraw-monitor: inspect and poke a hidraw node
//!
//! Usage:
//!   hidraw-monitor info /dev/hidraw3
//!   hidraw-monitor listen /dev/hidraw3
//!   hidraw-monitor get-feature /dev/hidraw3 0x11 20
//!   hidraw-monitor set-feature /dev/hidraw3 0x11 ff 00 0a
//!   hidraw-monitor write /dev/hidraw3 10 ff 00 0a

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hidraw_core::{HidrawConfig, HidrawDevice};
use tracing::{debug, info};

/// Raw HID device monitor
#[derive(Parser)]
#[command(name = "hidraw-monitor", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML file with hidraw settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show bus and vendor/product IDs
    Info { node: PathBuf },
    /// Print input reports until Ctrl-C
    Listen { node: PathBuf },
    /// Read a feature report while the listener is running
    GetFeature {
        node: PathBuf,
        #[arg(value_parser = parse_byte)]
        report_id: u8,
        /// Report length including the report ID byte
        len: usize,
    },
    /// Send a feature report; the first byte is replaced by the report ID
    SetFeature {
        node: PathBuf,
        #[arg(value_parser = parse_byte)]
        report_id: u8,
        /// Payload bytes after the report ID, in hex
        #[arg(value_parser = parse_byte, required = true)]
        data: Vec<u8>,
    },
    /// Write an output report
    Write {
        node: PathBuf,
        /// Report bytes in hex, report ID first
        #[arg(value_parser = parse_byte, required = true)]
        data: Vec<u8>,
    },
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid hex byte '{s}': {e}"))
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn open(node: &Path, config: &HidrawConfig) -> Result<HidrawDevice> {
    HidrawDevice::open(node, config.clone())
        .with_context(|| format!("Failed to open {}", node.display()))
}

fn do_listen(node: &Path, config: &HidrawConfig) -> Result<()> {
    let mut dev = open(node, config)?;
    dev.set_event_handler(|report: &[u8]| {
        println!("{:4} | {}", report.len(), hex(report));
    });
    dev.start_events()?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = Arc::clone(&stop);
    ctrlc::set_handler(move || stop_clone.store(true, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    info!("Listening on {} (Ctrl-C to stop)", node.display());
    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    dev.close();
    info!("Listener stopped");
    Ok(())
}

fn do_get_feature(node: &Path, config: &HidrawConfig, report_id: u8, len: usize) -> Result<()> {
    let mut dev = open(node, config)?;
    dev.set_event_handler(|report: &[u8]| debug!("input: {}", hex(report)));
    dev.start_events()?;

    let mut buf = vec![0u8; len];
    let got = dev
        .get_feature_report(report_id, &mut buf)
        .with_context(|| format!("GET_FEATURE 0x{report_id:02x} failed"))?;
    println!("{}", hex(&buf[..got]));

    dev.close();
    Ok(())
}

fn do_set_feature(node: &Path, config: &HidrawConfig, report_id: u8, data: &[u8]) -> Result<()> {
    let dev = open(node, config)?;

    let mut buf = Vec::with_capacity(data.len() + 1);
    buf.push(report_id);
    buf.extend_from_slice(data);
    let sent = dev
        .set_feature_report(report_id, &mut buf)
        .with_context(|| format!("SET_FEATURE 0x{report_id:02x} failed"))?;
    info!("Sent {} byte feature report", sent);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => HidrawConfig::load(path)?,
        None => HidrawConfig::default(),
    };

    match &cli.command {
        Commands::Info { node } => {
            let dev = open(node, &config)?;
            println!("{}: {}", node.display(), dev.info()?);
        }
        Commands::Listen { node } => do_listen(node, &config)?,
        Commands::GetFeature {
            node,
            report_id,
            len,
        } => do_get_feature(node, &config, *report_id, *len)?,
        Commands::SetFeature {
            node,
            report_id,
            data,
        } => do_set_feature(node, &config, *report_id, data)?,
        Commands::Write { node, data } => {
            let dev = open(node, &config)?;
            dev.write_output_report(data)
                .context("Output report write failed")?;
            info!("Wrote {} byte output report", data.len());
        }
    }

    Ok(())
}
