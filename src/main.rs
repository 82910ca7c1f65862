use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use diffbot_runtime::config::{BT_BAUDRATE, BT_PORT, WATCHDOG_CYCLES};
use diffbot_runtime::runtime::{self, RuntimeOptions};

/// Closed-loop motion runtime for the two-wheel keypad robot
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Robot config, JSON or packed 16-byte `.bin`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port of the Bluetooth module; bare flag uses the default port
    #[arg(long, num_args = 0..=1, default_missing_value = BT_PORT)]
    bluetooth: Option<String>,

    #[arg(long, default_value_t = BT_BAUDRATE)]
    baud: u32,

    /// Control cycles before an unfinished command is stopped
    #[arg(long, default_value_t = WATCHDOG_CYCLES)]
    watchdog_cycles: u32,

    /// Run without the Zenoh session (Bluetooth input only)
    #[arg(long)]
    no_zenoh: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();
    let options = RuntimeOptions {
        config_path: args.config,
        bluetooth_port: args.bluetooth,
        baudrate: args.baud,
        watchdog_cycles: args.watchdog_cycles,
        zenoh: !args.no_zenoh,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
