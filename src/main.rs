//! robot-link daemon
//!
//! - **UDP (port 8000)**: robot-net datagrams to and from the fleet
//! - **TCP (port 5555)**: operator consoles (intents in, robot events out)

use robot_link::bridge::{BridgeServer, EventQueue};
use robot_link::{Error, Gateway, GatewayConfig, Result};
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Default configuration file
const DEFAULT_CONFIG: &str = "robot-link.toml";

/// Parse config path from command line arguments.
///
/// Supports:
/// - `robot-link <path>` (positional)
/// - `robot-link --config <path>` (flag-based)
/// - `robot-link -c <path>` (short flag)
///
/// Defaults to `robot-link.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    DEFAULT_CONFIG.to_string()
}

/// Load the config file, falling back to defaults only for the implicit path
fn load_config(path: &str) -> Result<GatewayConfig> {
    if Path::new(path).exists() {
        GatewayConfig::load(path)
    } else if path == DEFAULT_CONFIG {
        Ok(GatewayConfig::default())
    } else {
        Err(Error::Config(format!("Config file {} not found", path)))
    }
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = load_config(&config_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("robot-link v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);
    log::info!(
        "Protocol {} on {}, frame size {} bytes",
        config.network.protocol_id,
        config.network.bind_address,
        config.network.frame_size
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let events = EventQueue::new(config.bridge.queue_capacity);
    let gateway = Arc::new(Gateway::start(&config, Arc::new(events.clone()))?);
    let mut bridge = BridgeServer::start(&config.bridge, Arc::clone(&gateway), events)?;

    log::info!("robot-link running. Press Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        if !gateway.is_running() {
            log::error!("Receive thread exited unexpectedly");
            break;
        }
        thread::sleep(Duration::from_millis(200));
    }

    log::info!("Shutting down...");
    bridge.stop();
    gateway.shutdown();

    log::info!("robot-link stopped");
    Ok(())
}
