//! Bench utility: primes the ESCs, waits for the vehicle to settle, then
//! averages sensor readings into a calibration file.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use flyer_logic::config::FlightConfig;
use flyer_logic::FlightControl;

#[derive(Parser)]
#[command(about = "Bench utility: primes motors then calibrates sensors")]
struct Args {
    #[arg(long, default_value = "flyer.toml")]
    config: PathBuf,

    #[arg(long, default_value_t = 5000)]
    duration_ms: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = FlightConfig::read_from_file(&args.config).unwrap_or_else(|e| {
        warn!("falling back to default configuration: {e}");
        FlightConfig::default()
    });

    if let Err(e) = run(&config, args.duration_ms) {
        error!("calibration failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: &FlightConfig, duration_ms: u64) -> flyer_logic::Result<()> {
    let control = FlightControl::new(config)?;

    info!("priming ESCs, keep the vehicle still and level");
    thread::sleep(Duration::from_secs(3));

    info!("sampling sensors for {duration_ms} ms");
    control.calibrate(duration_ms)?;
    info!("calibration written to {}", config.calibration_path);

    control.stop();
    Ok(())
}
