//! Connects to the ground station, then runs the fly loop: parse inbound
//! packets, update setpoints and gains, send telemetry back.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use flyer_logic::config::FlightConfig;
use flyer_logic::geometry::Vector3;
use flyer_logic::radio::{Diagnostic, Packet, RadioLink, RadioTransport};
use flyer_logic::FlightControl;

#[derive(Parser)]
#[command(about = "Flight controller main loop")]
struct Args {
    #[arg(long, default_value = "flyer.toml")]
    config: PathBuf,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = FlightConfig::read_from_file(&args.config).unwrap_or_else(|e| {
        warn!("falling back to default configuration: {e}");
        FlightConfig::default()
    });

    if let Err(e) = run(&config) {
        error!("fatal error: {e}");
        std::process::exit(1);
    }
}

fn run(config: &FlightConfig) -> flyer_logic::Result<()> {
    let transport = RadioTransport::open(&config.serial_port_path, config.baud_rate, config.parity)?;
    let mut link = RadioLink::new(transport);

    info!("waiting for ground station handshake");
    link.connect()?;
    info!("handshake complete");

    let mut control = FlightControl::new(config)?;
    control.start_timer();

    loop {
        match link.receive()? {
            Some(Packet::Motion(m)) => {
                if m.rot != 0 {
                    info!("quit command received");
                    break;
                }
                control.move_to(Vector3::new(m.x as f32 / 127.0, m.y as f32 / 127.0, m.z as f32 / 127.0));
            }
            Some(Packet::Diagnostic(d)) => {
                // battery is repurposed as a channel selector on uplink:
                // 0 selects the angle ring, 1 the rate ring.
                if d.battery == 0 {
                    control.set_pid_angle(d.a, d.b, d.c);
                } else {
                    control.set_pid_rate(d.a, d.b, d.c);
                }
            }
            None => {}
        }

        let telemetry = Packet::Diagnostic(Diagnostic::new(0, control.get_roll(), control.get_pitch(), control.get_yaw()));
        link.send(&telemetry)?;

        thread::sleep(Duration::from_millis(10));
    }

    control.stop_timer();
    Ok(())
}
