use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info};

use tether_config::Config;
use tetherd::{Engine, Server, telemetry};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(load_error) => {
            // Validation failed before telemetry exists; report through a
            // default-configured subscriber when one can be installed.
            if telemetry::initialise(&Config::default()).is_ok() {
                error!(error = %load_error, "invalid configuration");
            }
            return ExitCode::FAILURE;
        }
    };
    if telemetry::initialise(&config).is_err() {
        return ExitCode::FAILURE;
    }

    let server = match Server::start(&config, Arc::new(Engine::bundled())) {
        Ok(server) => server,
        Err(start_error) => {
            error!(error = %start_error, "failed to start server");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %server.local_addr(), "tether daemon listening");

    if let Err(signal_error) = wait_for_shutdown_signal() {
        error!(error = %signal_error, "failed to install signal handlers");
    }

    server.shutdown();
    match server.join() {
        Ok(()) => ExitCode::SUCCESS,
        Err(join_error) => {
            error!(error = %join_error, "server did not stop cleanly");
            ExitCode::FAILURE
        }
    }
}

fn wait_for_shutdown_signal() -> io::Result<()> {
    let mut signals = Signals::new([SIGTERM, SIGINT])?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "shutdown signal received");
    }
    Ok(())
}
