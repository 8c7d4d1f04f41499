//! `quadscan` – multi-LiDAR point stream
//!
//! This binary wires the stack together.  It:
//!
//! 1. Loads the configuration (first argument, `$QUADSCAN_CONFIG`, or
//!    `~/.quadscan/config.toml`, created with defaults when absent).
//! 2. Opens one channel per configured device: a serial port, a capture
//!    replay, or a simulated sweep.
//! 3. Runs the round-robin control loop, streaming accepted points to the
//!    host serial port or to stdout.
//! 4. Intercepts **Ctrl-C** to stop after the current cycle and flush.
//!
//! Logs and the banner go to stderr; stdout carries only the point stream.

mod config;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use quadscan_hal::replay::{DEFAULT_REPLAY_CHUNK, ReplayChannel};
use quadscan_hal::serial::{SerialPortChannel, open_port};
use quadscan_hal::sim::{SimChannel, SimLidar};
use quadscan_hal::{LineSink, PointSink, SerialChannel};
use quadscan_kernel::SensorScheduler;
use quadscan_types::ScanError;

use config::Config;

/// Packets per second produced by each simulated unit (10 Hz sweep).
const SIM_PACKET_RATE: f64 = 375.0;
const SIM_RANGE_MM: u16 = 1200;
const SIM_INTENSITY: u8 = 200;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the level (default "info").  Set
    // QUADSCAN_LOG_FORMAT=json for newline-delimited JSON logs.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("QUADSCAN_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        let notice = "⚠  Ctrl-C received – stopping after this cycle …";
        eprintln!("{}", notice.yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop with a signal instead");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let (path, is_default) = config::resolve_path(std::env::args().nth(1));
    let cfg = match config::load_or_init(&path, is_default) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            std::process::exit(2);
        }
    };
    eprintln!("  Config loaded from {}", path.display().to_string().bold());
    eprintln!(
        "  {} device(s), output {} as {}\n",
        cfg.devices.len(),
        cfg.output_port.as_deref().unwrap_or("stdout").bold(),
        cfg.output_format.to_string().bold()
    );

    // ── Control loop ──────────────────────────────────────────────────────
    if let Err(e) = run(&cfg, &shutdown) {
        error!(error = %e, "pipeline stopped");
        eprintln!("{}: {}", "Fatal".red().bold(), e);
        std::process::exit(1);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Simulated units and the handles used to feed them.
struct SimFeed {
    units: Vec<(SimChannel, SimLidar)>,
    started: Instant,
    produced: u64,
}

impl SimFeed {
    /// Inject every packet that is due according to the wall clock.
    fn pump(&mut self) {
        let due = (self.started.elapsed().as_secs_f64() * SIM_PACKET_RATE) as u64;
        while self.produced < due {
            for (channel, lidar) in &mut self.units {
                channel.inject(&lidar.next_frame());
            }
            self.produced += 1;
        }
    }
}

fn build_scheduler(cfg: &Config) -> Result<(SensorScheduler, Option<SimFeed>), ScanError> {
    let mut scheduler = SensorScheduler::new(cfg.scheduler_settings());
    let mut sims = Vec::new();

    for device in &cfg.devices {
        let channel: Box<dyn SerialChannel> = if cfg.simulate {
            let channel = SimChannel::new(format!("sim{}", device.id));
            sims.push((channel.clone(), SimLidar::new(SIM_RANGE_MM, SIM_INTENSITY)));
            Box::new(channel)
        } else if device.replay {
            Box::new(ReplayChannel::open(&device.port, DEFAULT_REPLAY_CHUNK)?)
        } else {
            Box::new(SerialPortChannel::open(&device.port, device.baud)?)
        };
        scheduler.add_sensor(device.calibration(), channel)?;
    }

    let feed = cfg.simulate.then(|| SimFeed {
        units: sims,
        started: Instant::now(),
        produced: 0,
    });
    Ok((scheduler, feed))
}

fn open_sink(cfg: &Config) -> Result<Box<dyn PointSink>, ScanError> {
    match &cfg.output_port {
        Some(port) => {
            let link = open_port(port, cfg.output_baud)?;
            Ok(Box::new(LineSink::new(link, cfg.output_format)))
        }
        None => Ok(Box::new(LineSink::new(
            std::io::stdout().lock(),
            cfg.output_format,
        ))),
    }
}

fn run(cfg: &Config, shutdown: &AtomicBool) -> Result<(), ScanError> {
    let (mut scheduler, mut feed) = build_scheduler(cfg)?;
    let mut sink = open_sink(cfg)?;
    let idle = Duration::from_micros(cfg.idle_sleep_us);

    info!(
        devices = scheduler.sensors().len(),
        simulate = cfg.simulate,
        "control loop started"
    );
    let started = Instant::now();
    let mut emitted = 0u64;

    while !shutdown.load(Ordering::SeqCst) {
        if let Some(feed) = feed.as_mut() {
            feed.pump();
        }
        let report = scheduler.run_cycle(sink.as_mut())?;
        emitted += report.points_emitted as u64;

        if report.packets == 0 {
            if scheduler.all_exhausted() {
                info!("all captures replayed");
                break;
            }
            std::thread::sleep(idle);
        }
    }
    sink.flush()?;

    info!(
        cycles = scheduler.cycles(),
        points = emitted,
        elapsed_s = started.elapsed().as_secs_f64(),
        "control loop stopped"
    );
    for sensor in scheduler.sensors() {
        let stats = sensor.stats();
        let decoder = sensor.decoder_stats();
        info!(
            device = sensor.calibration().id,
            packets = stats.packets,
            points = stats.points_emitted,
            rejected = stats.points_rejected,
            checksum_errors = decoder.checksum_errors,
            stalls = decoder.stalls,
            skipped_bytes = decoder.skipped_bytes,
            read_faults = stats.read_faults,
            "sensor summary"
        );
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

const BANNER: [&str; 4] = [
    r#"   ____                  _______                 "#,
    r#"  / __ \__ _____ ____/ / ___/__________ _____  "#,
    r#" / /_/ / // / _ `/ _  /\__ \/ ___/ __ `/ __ \ "#,
    r#" \___\_\_,_/\_,_/\_,_/___/ /\___/\_,_/_/ /_/ "#,
];

fn print_banner() {
    eprintln!();
    for line in BANNER {
        eprintln!("{}", line.bold().cyan());
    }
    eprintln!();
    eprintln!(
        "  {} {}",
        "QuadScan".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    eprintln!("  Multi-LiDAR point stream");
    eprintln!();
}
