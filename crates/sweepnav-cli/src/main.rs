//! `sweepnav-cli` – the `sweepnav` binary.
//!
//! ```text
//! sweepnav [run]              drive the avoidance loop until Ctrl-C
//! sweepnav status             print one FRONT:x|LEFT:x|RIGHT:x line
//! sweepnav init               write the default config file
//! sweepnav record <FILE> [N]  append N sweeps (default 10) to a replay file
//! ```
//!
//! `run` loads `~/.sweepnav/config.toml` (or `$SWEEPNAV_CONFIG`), builds the
//! configured sensor and transport, and cycles until Ctrl-C.  On shutdown a
//! final `S` is sent so the motor controller is not left driving.

mod config;

use colored::Colorize;
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use sweepnav_hal::replay::{ReplaySweepProvider, write_sweep_line};
use sweepnav_hal::rplidar;
use sweepnav_hal::serial::SerialDispatcher;
use sweepnav_hal::sim::{LogDispatcher, SimSweepProvider, scenarios};
use sweepnav_hal::{CommandDispatcher, SweepProvider};
use sweepnav_runtime::{ControlLoop, Pipeline, init_tracing};

use config::{Config, SensorKind, TransportKind};

const DEFAULT_RECORD_SWEEPS: usize = 10;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None | Some("run") => run(),
        Some("status") => status(),
        Some("init") => init(),
        Some("record") => record(&args[1..]),
        Some("help" | "-h" | "--help") => {
            print_usage();
            Ok(())
        }
        Some(other) => Err(format!("unknown command '{other}'")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn run() -> Result<(), String> {
    let guard = init_tracing("sweepnav");
    print_banner();
    if guard.is_exporting() {
        info!("exporting cycle spans over OTLP");
    }

    let cfg = load_config()?;
    println!(
        "  Config   {}",
        config::config_path().display().to_string().dimmed()
    );
    println!(
        "  Sensor   {}    Transport {}    Interval {} ms\n",
        cfg.sensor.kind.to_string().bold(),
        cfg.transport.kind.to_string().bold(),
        cfg.control.interval_ms
    );

    let sensor = build_sensor(&cfg)?;
    let dispatcher = build_dispatcher(&cfg)?;
    let mut control = ControlLoop::new(cfg.to_loop_config(), sensor, dispatcher);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the loop can only be killed");
    }

    control.run_while(|| !shutdown.load(Ordering::SeqCst));

    match control.halt() {
        Ok(()) => println!("{}", "  ✓ Stop sent to motor controller.".green()),
        Err(e) => warn!(error = %e, "final stop could not be delivered"),
    }
    Ok(())
}

/// One acquisition, one evaluation, one status line on stdout.  Nothing is
/// dispatched.
fn status() -> Result<(), String> {
    let cfg = load_config()?;
    let mut sensor = build_sensor(&cfg)?;
    let readings = sensor.acquire_sweep().map_err(|e| e.to_string())?;
    let assessment = Pipeline::new(cfg.zones, cfg.thresholds).assess(&readings);
    println!("{}", assessment.flags);
    Ok(())
}

fn init() -> Result<(), String> {
    let path = config::config_path();
    if path.exists() {
        return Err(format!("{} already exists", path.display()));
    }
    config::save(&Config::default())?;
    println!(
        "  {} Config saved to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

/// Append sweeps from the configured sensor to a JSON-lines replay file.
fn record(args: &[String]) -> Result<(), String> {
    let _guard = init_tracing("sweepnav");
    let Some(path) = args.first() else {
        return Err("usage: sweepnav record <FILE> [SWEEPS]".to_string());
    };
    let count = match args.get(1) {
        Some(n) => n
            .parse::<usize>()
            .map_err(|e| format!("invalid sweep count '{n}': {e}"))?,
        None => DEFAULT_RECORD_SWEEPS,
    };

    let cfg = load_config()?;
    let mut sensor = build_sensor(&cfg)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open {path}: {e}"))?;
    let mut out = BufWriter::new(file);

    let mut written = 0;
    while written < count {
        match sensor.acquire_sweep() {
            Ok(sweep) => {
                write_sweep_line(&mut out, &sweep)
                    .map_err(|e| format!("Failed to write {path}: {e}"))?;
                written += 1;
            }
            Err(e) => return Err(format!("recording stopped after {written} sweep(s): {e}")),
        }
    }
    info!(path = %path, sweeps = written, "recording complete");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> Result<Config, String> {
    let cfg = config::load()?;
    cfg.validate()?;
    Ok(cfg)
}

fn build_sensor(cfg: &Config) -> Result<Box<dyn SweepProvider>, String> {
    match cfg.sensor.kind {
        SensorKind::Sim => {
            let sweep = scenarios::by_name(&cfg.sensor.sim_scenario)
                .ok_or_else(|| format!("unknown sim scenario '{}'", cfg.sensor.sim_scenario))?;
            Ok(Box::new(SimSweepProvider::repeating(sweep)))
        }
        SensorKind::Replay => {
            let path = cfg
                .sensor
                .replay_path
                .as_ref()
                .ok_or("sensor.replay_path is not set")?;
            let replay =
                ReplaySweepProvider::open(path, cfg.sensor.replay_loop).map_err(|e| e.to_string())?;
            Ok(Box::new(replay))
        }
        SensorKind::Rplidar => {
            let lidar = rplidar::open_serial(&cfg.sensor.rplidar_device, cfg.sensor.rplidar_baud)
                .map_err(|e| e.to_string())?;
            Ok(Box::new(lidar))
        }
    }
}

fn build_dispatcher(cfg: &Config) -> Result<Box<dyn CommandDispatcher>, String> {
    let t = &cfg.transport;
    match t.kind {
        TransportKind::Log => Ok(Box::new(LogDispatcher)),
        TransportKind::Serial => SerialDispatcher::open(&t.serial_device, t.serial_baud)
            .map(|d| Box::new(d) as Box<dyn CommandDispatcher>)
            .map_err(|e| e.to_string()),
        #[cfg(target_os = "linux")]
        TransportKind::I2c => sweepnav_hal::i2c::I2cDispatcher::open(&t.i2c_device, t.i2c_address)
            .map(|d| Box::new(d) as Box<dyn CommandDispatcher>)
            .map_err(|e| e.to_string()),
        #[cfg(not(target_os = "linux"))]
        TransportKind::I2c => Err("the i2c transport is only available on Linux".to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "sweepnav".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Reactive LiDAR obstacle avoidance");
    println!();
}

fn print_usage() {
    println!("Usage: sweepnav [run | status | init | record <FILE> [SWEEPS]]");
}
