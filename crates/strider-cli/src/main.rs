//! `strider-cli` – entry point of the locomotion core.
//!
//! The `strider` binary:
//!
//! 1. Installs structured logging (`RUST_LOG`, `STRIDER_LOG_FORMAT=json`,
//!    optional OTLP export).
//! 2. Loads `~/.strider/config.toml` (or `$STRIDER_CONFIG`), falling back to
//!    defaults when the file is absent or broken.
//! 3. Wires a [`Player`] onto the simulated servo bus and brings it up.
//! 4. Runs until **Ctrl-C** or a button-hold shutdown request, then stops the
//!    engines before releasing the bus.
//!
//! Sub-commands:
//!
//! - `strider get <key>` – print one config value, e.g. `gait.control_hz`.
//! - `strider write-config` – write the effective config to the config path.

mod config;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use colored::Colorize;
use tracing::{info, warn};

use strider_hal::SimServoBus;
use strider_middleware::SensorHub;
use strider_runtime::{Player, init_tracing};

use config::Config;

fn main() {
    let _telemetry = init_tracing("strider");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = load_config();

    match args.first().map(String::as_str) {
        None | Some("run") => run(cfg),
        Some("get") => match args.get(1) {
            Some(key) => match cfg.lookup(key) {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("{}: {}", "Unknown key".red(), key);
                    std::process::exit(1);
                }
            },
            None => {
                eprintln!("usage: strider get <key>");
                std::process::exit(2);
            }
        },
        Some("write-config") => {
            let path = config::config_path();
            match config::save_to(&cfg, &path) {
                Ok(()) => println!("  Config written to {}", path.display().to_string().bold()),
                Err(e) => {
                    eprintln!("{}: {}", "Error saving config".red(), e);
                    std::process::exit(1);
                }
            }
        }
        Some(other) => {
            eprintln!("{}: {}", "Unknown command".red(), other);
            eprintln!("usage: strider [run | get <key> | write-config]");
            std::process::exit(2);
        }
    }
}

fn load_config() -> Config {
    let path = config::config_path();
    match config::load_from(&path) {
        Ok(Some(cfg)) => {
            info!(path = %path.display(), "config loaded");
            cfg
        }
        Ok(None) => {
            info!(path = %path.display(), "no config file, using defaults");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            warn!(error = %e, "config unusable, using defaults");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────────────────

fn run(cfg: Config) {
    print_banner();

    let cfg = cfg.into_runtime();
    println!(
        "  Player {} on simulated bus {}",
        cfg.world.player_id.to_string().bold(),
        cfg.motor.device.dimmed()
    );

    let hub = Arc::new(SensorHub::new());
    let bus = SimServoBus::new(cfg.motor.device.clone());
    let player = match Player::new(cfg, hub, Box::new(bus)) {
        Ok(player) => player,
        Err(e) => {
            eprintln!("{}: {}", "Invalid configuration".red(), e);
            std::process::exit(1);
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let player_ctrlc = Arc::clone(&player);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the robot …".yellow().bold());
        player_ctrlc.stop();
        println!("{}", "  ✓ Engines stopped, servo bus released.".green());
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    if let Err(e) = player.init() {
        eprintln!("{}: {}", "Start-up failed".red(), e);
        std::process::exit(1);
    }
    if player.is_alive() {
        println!("  {} Press Ctrl-C to stop.\n", "Running.".green().bold());
    }

    while player.is_alive() && !player.shutdown_requested() {
        thread::sleep(Duration::from_millis(100));
    }
    if player.shutdown_requested() {
        info!("shutdown requested from the buttons");
    }
    player.stop();

    println!(
        "  {} after {} think ticks.",
        "Stopped".bold(),
        player.tick_count()
    );
}

fn print_banner() {
    println!();
    println!("{}", r#"       __       _     __         "#.bold().cyan());
    println!("{}", r#"  ___ / /______(_)__/ /__ ____  "#.bold().cyan());
    println!("{}", r#" (_-</ __/ __/ / _  / -_) __/  "#.bold().cyan());
    println!("{}", r#"/___/\__/_/ /_/\_,_/\__/_/     "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Strider".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Humanoid locomotion and behavior core");
    println!();
}
