use std::process;

use krill::{logging, signals, Config, Shell};
use tracing::{info, warn};

fn main() {
    let config = Config::new();
    if !logging::init(config.log_file()) {
        eprintln!("krill: logging disabled");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    if let Err(e) = signals::install() {
        warn!(error = %e, "signal forwarding unavailable");
        eprintln!("krill: {}", e);
    }

    let mut shell = Shell::new(config);
    if let Err(e) = shell.run() {
        eprintln!("krill: {}", e);
        process::exit(1);
    }
}
