//! `temi-bridge` – runs the device-control bridge as a standalone process.
//!
//! 1. Loads `~/.temi-bridge/config.toml`, writing defaults on first run.
//! 2. Attaches a [`TemiBridge`] to a simulated robot.
//! 3. Serves the WebSocket transport until **Ctrl-C**, then tears the
//!    bridge down so no native listener outlives the process.

mod config;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use temi_hal::robot::RobotSdk;
use temi_hal::sim::SimRobot;
use temi_middleware::{BridgeConfig, TemiBridge, WsTransport};
use temi_types::{ActivityRef, BatteryData};
use tokio::sync::watch;
use tracing::{error, info, warn};

fn main() {
    let _guard = telemetry::init_tracing("temi-bridge");

    print_banner();

    let cfg = match config::load_or_init() {
        Ok(cfg) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting the bridge down …".yellow().bold());
        let _ = shutdown_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the bridge will not tear down cleanly");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the Tokio runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cfg, shutdown_rx)) {
        println!("{}: {}", "Bridge error".red(), e);
        std::process::exit(1);
    }
}

async fn run(cfg: config::Config, mut shutdown: watch::Receiver<bool>) -> Result<(), String> {
    let addr = cfg.socket_addr()?;

    let robot = Arc::new(SimRobot::demo());
    let bridge = Arc::new(TemiBridge::attach(
        robot.clone(),
        robot.clone(),
        BridgeConfig {
            stream_capacity: cfg.stream_capacity,
        },
    ));
    bridge.attach_activity(ActivityRef::new("com.robotemi.bridge", "BridgeActivity"));

    let battery = (cfg.simulated_battery_interval_secs > 0).then(|| {
        let period = Duration::from_secs(cfg.simulated_battery_interval_secs);
        tokio::spawn(simulate_battery(robot.clone(), period))
    });

    println!(
        "  {} serving robot {} on {}\n",
        "✓".green().bold(),
        robot.serial_number().bold(),
        format!("ws://{addr}").cyan()
    );

    let result = tokio::select! {
        served = WsTransport::new(bridge.clone()).run(addr) => served.map_err(|e| e.to_string()),
        _ = shutdown.changed() => Ok(()),
    };

    if let Some(task) = battery {
        task.abort();
    }
    let cancelled = bridge.teardown();
    bridge.detach_activity();
    info!(cancelled, "bridge stopped");
    println!("{}", "  ✓ Bridge torn down.".green());
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulated battery
// ─────────────────────────────────────────────────────────────────────────────

async fn simulate_battery(robot: Arc<SimRobot>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let current = robot.battery_data().unwrap_or(BatteryData::new(100, false));
        robot.set_battery(next_battery(current));
    }
}

/// Drain by 1% until 15%, then charge by 5% back to full.
fn next_battery(current: BatteryData) -> BatteryData {
    match (current.is_charging, current.percentage) {
        (true, p) if p >= 100 => BatteryData::new(100, false),
        (true, p) => BatteryData::new((p + 5).min(100), true),
        (false, p) if p <= 15 => BatteryData::new(p, true),
        (false, p) => BatteryData::new(p - 1, false),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"  _____              _   ___      _    _"#.bold().cyan());
    println!("{}", r#" |_   _|__ _ __  (_) | _ )_ _(_)__| |__ _ ___"#.bold().cyan());
    println!("{}", r#"   | |/ -_) '  \ | | | _ \ '_| / _` / _` / -_)"#.bold().cyan());
    println!("{}", r#"   |_|\___|_|_|_||_| |___/_| |_\__,_\__, \___|"#.bold().cyan());
    println!("{}", r#"                                    |___/"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "temi-bridge".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Robot command and event bridge");
    println!();
}
