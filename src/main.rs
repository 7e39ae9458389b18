//! # Joydrive
//!
//! Watch a game controller's live state and forward button presses to a
//! robot over Bluetooth.

use anyhow::Result;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use joydrive::config::{Config, LoggingConfig, DEFAULT_CONFIG_PATH};
use joydrive::control::ControlLoop;
use joydrive::display::terminal::TerminalSurface;
use joydrive::input::evdev_backend::EvdevInput;
use joydrive::input::termination::spawn_termination_watcher;
use joydrive::input::{ControllerDevice, InputSubsystem};
use joydrive::transport::link::RfcommTty;
use joydrive::transport::{CommandTransport, RemoteAddress};

/// File name prefix of the daily log files
const LOG_FILE_PREFIX: &str = "joydrive.log";

/// Main entry point for Joydrive
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load `config/default.toml` (defaults if absent)
///    - Set up file logging; the terminal is reserved for diagnostics
///    - Report the first attached controller
///    - Connect the RFCOMM link to the robot (fatal on failure)
///
/// 2. **Main Loop**
///    - Render every controller's axes, buttons and hats at 20Hz
///    - Send the command token once per button press
///
/// 3. **Shutdown**
///    - Ctrl+C, SIGTERM or closing the terminal stops the loop
///    - Close the link and restore the terminal
///
/// # Errors
///
/// Returns error if:
/// - The configuration file exists but is invalid
/// - The link cannot be connected
/// - A controller disappears mid-frame or a command write fails
///
/// None of these are retried.
///
/// # Examples
///
/// ```bash
/// sudo rfcomm bind 0 3C:71:BF:A6:E3:5E 1
/// cargo run --release
/// ```
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load_or_default(DEFAULT_CONFIG_PATH)?;
    let _log_guard = init_logging(&config.logging)?;

    info!("Joydrive v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut input = EvdevInput::new();
    report_first_controller(&mut input)?;

    let connector = RfcommTty::new(config.link.tty_path.as_str(), config.link.baud_rate);
    let mut transport = CommandTransport::new(connector, RemoteAddress::robot());
    transport.connect().await?;

    info!("Joystick Drive Program");
    info!("Press Ctrl+C to quit");

    let _watcher = spawn_termination_watcher(input.event_sender())?;
    let surface = TerminalSurface::open(&config.display.title)?;

    let mut control = ControlLoop::new(input, surface, transport)?;
    control.run().await?;
    drop(control);

    info!("Joydrive stopped");
    Ok(())
}

fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Send tracing output to a daily log file
fn init_logging(logging: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.log_dir)?;
    let appender = tracing_appender::rolling::daily(&logging.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&logging.level))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

/// Log which controller is attached at startup
fn report_first_controller(input: &mut EvdevInput) -> Result<()> {
    let handles = input.enumerate()?;
    match handles.first() {
        Some(handle) => {
            let controller = input.activate(handle)?;
            info!(
                "Controller connected: {} ({} of {} attached)",
                controller.name(),
                handle.node,
                handles.len()
            );
        }
        None => warn!("No controller attached; waiting for one to appear"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_prefix() {
        assert_eq!(LOG_FILE_PREFIX, "joydrive.log");
    }

    #[test]
    fn test_log_filter_accepts_configured_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let _ = log_filter(level);
        }
    }
}
