use std::{env, time::Duration};

use inquire::Select;
use psl_wake::{
    Wake, WakeConfig,
    psl::{self, Psl},
    serial::SerialTransport,
    transport::StdClock,
};

// Configuration constants - adjust these for your setup
// PSL devices enumerate with this in their port name.
const PORT_NAME_FILTER: &str = "PSL-";
const SERIAL_TIMEOUT_MS: u64 = 5000;

fn main() {
    env_logger::init();

    // Get serial port from command line arg, the first PSL port, or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        if let Some(port) = SerialTransport::find_port(PORT_NAME_FILTER).expect("Failed to enumerate serial ports") {
            return port;
        }

        let port_names = SerialTransport::list_ports("", true).expect("Failed to enumerate serial ports");
        if port_names.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        Select::new("No PSL port found, select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    let mut transport = SerialTransport::new();
    transport
        .open(&port_name, psl::BAUD_RATE, Duration::from_millis(SERIAL_TIMEOUT_MS))
        .expect("Failed to open serial port");

    let wake: Wake<_, _> = Wake::new(transport, StdClock::new(), WakeConfig::default());
    let mut psu = Psl::new(wake);

    match psu.update() {
        Ok(state) => {
            println!("Info: {}", state.info);
            println!("Firmware version: {}", state.version);
            println!("{:#?}", state.status);
            println!(
                "Output: {:.3}V {:.3}A",
                state.measurement.voltage_mv as f32 / 1000.0,
                state.measurement.current_ma as f32 / 1000.0
            );
        }
        Err(err) if err.is_timeout() => {
            eprintln!("Device did not answer in time");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    }
}
