//! Idasen Desk
//!
//! Command line front end for the desk controller.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use idasen_desk_controller::domain::settings::{Settings, SettingsService};
use idasen_desk_controller::infrastructure::logging;
use idasen_desk_controller::infrastructure::notifier::ChannelNotifier;
use idasen_desk_controller::{BleTransport, DeskEvent, DeskService};

/// Bluetooth standing desk controller
#[derive(Parser, Debug)]
#[command(name = "idasen-desk")]
#[command(about = "Control a Bluetooth standing desk", long_about = None)]
struct Args {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the connection status
    Status,
    /// Print the current height
    Height,
    /// Move to a height in millimeters
    Move { mm: f64 },
    /// Move up one centimeter
    Up,
    /// Move down one centimeter
    Down,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => SettingsService::load_from(path),
        None => SettingsService::new()?,
    };

    let _logging_guard = logging::init_logger(&settings.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting Idasen Desk Controller v{}", env!("CARGO_PKG_VERSION"));
    debug!("Settings file: {}", settings.path().display());

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?
        .block_on(run(args.command, settings.get().clone()))
}

#[cfg(windows)]
async fn run(command: Command, settings: Settings) -> Result<()> {
    use idasen_desk_controller::infrastructure::bluetooth::winrt::WinRtTransport;

    execute(Arc::new(WinRtTransport::new()), command, &settings).await
}

#[cfg(not(windows))]
async fn run(_command: Command, _settings: Settings) -> Result<()> {
    anyhow::bail!("no Bluetooth LE transport is available on this platform")
}

#[cfg_attr(not(windows), allow(dead_code))]
async fn execute<T: BleTransport>(
    transport: Arc<T>,
    command: Command,
    settings: &Settings,
) -> Result<()> {
    let (notifier, mut events) = ChannelNotifier::channel();
    let service = DeskService::new(transport, Arc::new(notifier), &settings.desk)?;

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                DeskEvent::Height(mm) => println!("height: {:.1} cm", mm / 10.0),
                DeskEvent::Connection(status) => println!("status: {}", status),
                // Already written by the tracing subscriber
                DeskEvent::Log(_) => {}
            }
        }
    });

    service.startup().await?;

    let outcome = match command {
        Command::Status => {
            println!("{}", service.check_connection());
            Ok(())
        }
        Command::Height => service
            .get_height()
            .await
            .map(|mm| println!("{:.1} cm", mm / 10.0)),
        Command::Move { mm } => service.move_to_height(mm).await,
        Command::Up => service.move_by_step(true).await,
        Command::Down => service.move_by_step(false).await,
    };

    // Closing the event channel lets the printer drain and finish
    drop(service);
    printer.await.context("event printer panicked")?;

    outcome.map_err(Into::into)
}
