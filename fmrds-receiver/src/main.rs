//! # fmrds-receiver
//!
//! Software-defined FM radio receiver CLI: tunes a baseband I/Q stream,
//! decodes stereo audio and the RDS datagram state, and reports SNR.
//!
//! **Architecture:** a fixed ~20-filter DSP graph (`receiver::FmReceiver`)
//! fed chunks of complex baseband and producing 48 kHz stereo audio plus a
//! shared `RdsState`; the generic `pipeline` scheduler exists for
//! dynamically-wired graphs but this fixed graph is driven directly (see
//! `receiver` module docs).
//!
//! Device tuner acquisition and real-time audio playback are external
//! collaborators (§1/§6 of the design spec) -- only their trait boundary
//! (`io::IqSource`, `io::AudioSink`) lives in this crate; subcommands that
//! need a live device report a clear error rather than fabricating a
//! hardware backend.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fmrds_receiver::config::Config;
use fmrds_receiver::io::{CountingAudioSink, FileIqSource, IqSource};
use fmrds_receiver::receiver::FmReceiver;
use fmrds_receiver::rds::state::RdsState;

const IQ_CHUNK_SAMPLES: usize = 65_536;

#[derive(Parser, Debug)]
#[command(name = "fmrds-receiver")]
#[command(about = "Software-defined FM/RDS receiver")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "fmrds-receiver.toml")]
    config: PathBuf,

    /// SDR device path (overrides config file)
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Tuner gain in dB (overrides config file)
    #[arg(short, long)]
    gain: Option<f32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the live pipeline tuned to `frequency_hz`, printing SNR/RDS
    /// state on demand.
    Live { frequency_hz: u32 },
    /// Sweeps 87.5-108 MHz and prints found stations and SNR.
    Scan,
    /// Captures I/Q at `frequency_hz` for `seconds` to a raw capture file
    /// (§6 naming convention: `f32x1@<rate>.bin`, overridable with `--out`).
    Dump {
        frequency_hz: u32,
        seconds: f64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Plays back a captured I/Q file through live decoding.
    Load { file_path: PathBuf },
    /// Iterates the built-in regression signal set and prints RDS stats.
    Test,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fmrds_receiver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();
    let config = Config::load(&args.config, args.device, args.gain)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    info!(device = %config.device.display(), sampling_rate = config.sampling_rate, "configuration loaded");

    let result = match args.command {
        Command::Live { frequency_hz } => run_live(&config, frequency_hz),
        Command::Scan => run_scan(&config),
        Command::Dump { frequency_hz, seconds, out } => run_dump(&config, frequency_hz, seconds, &out),
        Command::Load { file_path } => run_load(&file_path),
        Command::Test => run_test(),
    };

    if let Err(err) = &result {
        error!("{err:#}");
    }
    result
}

/// No real SDR backend is compiled into this crate (§1: tuner acquisition
/// is an external collaborator, specified only at the `io::IqSource`
/// trait boundary). Live/scan/dump all need one; report that plainly
/// instead of pretending to drive hardware that isn't there.
fn no_device_backend(command: &str, device: &std::path::Path) -> Result<()> {
    bail!(
        "`{command}` requires a live tuner backend for {}; none is compiled into this build \
         (see io::IqSource). Use `load <file>` against a captured I/Q file instead.",
        device.display()
    )
}

fn run_live(config: &Config, frequency_hz: u32) -> Result<()> {
    info!(frequency_hz, "live");
    no_device_backend("live", &config.device)
}

fn run_scan(config: &Config) -> Result<()> {
    info!("scan 87.5-108 MHz");
    no_device_backend("scan", &config.device)
}

fn run_dump(config: &Config, frequency_hz: u32, seconds: f64, out: &Option<PathBuf>) -> Result<()> {
    let out = out
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("capture_{frequency_hz}hz_f32x1@{}.bin", config.sampling_rate)));
    info!(frequency_hz, seconds, out = %out.display(), "dump");
    no_device_backend("dump", &config.device)
}

/// Plays back a captured I/Q file through the full receiver graph,
/// printing the final audio sample count, RDS decoding stats, and SNR
/// snapshot (§6 `load`).
fn run_load(file_path: &PathBuf) -> Result<()> {
    let mut source = FileIqSource::open(file_path)
        .with_context(|| format!("opening capture file {}", file_path.display()))?;
    let mut receiver = FmReceiver::new();
    let mut sink = CountingAudioSink::default();

    let mut chunk = vec![num_complex::Complex32::new(0.0, 0.0); IQ_CHUNK_SAMPLES];
    loop {
        let n = source.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        let output = receiver.process(&chunk[..n]);
        fmrds_receiver::io::AudioSink::write(&mut sink, &output.left, &output.right)?;
    }

    println!("audio frames produced: {}", sink.frames_written());
    print_rds_summary(&receiver);
    Ok(())
}

/// Synthesizes a small regression signal set and decodes each through the
/// full graph, printing RDS stats. Exit code reflects pipeline stall or
/// decode error (§6 `test`). No broadcast captures are bundled in this
/// crate, so the "built-in sample set" is a synthetic pilot-bearing
/// carrier rather than a recorded station -- it exercises the same code
/// path without requiring fixture binaries that don't exist in this repo.
fn run_test() -> Result<()> {
    let mut failures = 0usize;

    for (name, seconds) in [("synthetic_pilot_1s", 1.0), ("synthetic_pilot_3s", 3.0)] {
        let sample_count = (seconds * fmrds_receiver::constants::INPUT_SAMPLING_RATE as f64) as usize;
        let iq = synthetic_iq(sample_count);

        let mut receiver = FmReceiver::new();
        let output = receiver.process(&iq);
        let stats = receiver.rds_decoding_stats();

        println!(
            "{name}: audio_frames={} rds_blocks(valid={}, corrected={}, failed={})",
            output.left.len(),
            stats.valid_blocks,
            stats.corrected_blocks,
            stats.failed_blocks
        );

        if output.left.is_empty() {
            warn!("{name}: pipeline produced no audio output");
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} regression signal(s) failed to produce output");
    }
    Ok(())
}

fn synthetic_iq(n: usize) -> Vec<num_complex::Complex32> {
    use num_complex::Complex32;
    (0..n)
        .map(|i| {
            let t = i as f32 / fmrds_receiver::constants::INPUT_SAMPLING_RATE as f32;
            let phase = 2.0 * std::f32::consts::PI * 50_000.0 * t;
            Complex32::new(phase.cos(), phase.sin())
        })
        .collect()
}

fn assemble_text(segments: &[fmrds_receiver::rds::state::RdsValue<char>]) -> String {
    segments.iter().map(|v| v.value().copied().unwrap_or(' ')).collect()
}

fn print_rds_summary(receiver: &FmReceiver) {
    let shared = receiver.rds_state();
    let snr = receiver.snr_snapshot();
    let Ok(state) = shared.lock() else {
        warn!("RDS state lock poisoned, skipping summary");
        return;
    };
    let state: &RdsState = &state;

    println!(
        "PI={:?} PTY={:?} PS={:?} RT={:?}",
        state.programme_identification.value(),
        state.programme_type.value(),
        assemble_text(&state.programme_service_name),
        assemble_text(&state.radio_text),
    );
    println!(
        "SNR (dB): pilot={:.1} mono={:.1} stereo={:.1} rds={:.1}",
        snr.pilot_db, snr.mono_db, snr.stereo_db, snr.rds_db
    );
}
