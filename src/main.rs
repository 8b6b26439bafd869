//! Electra Surface - Rust implementation
//!
//! Drives an Electra.One controller as a control surface: SysEx handshake,
//! mode paging, and multi-knob touch-chord commands.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use electra_surface::config::{AppConfig, BindingWatcher, CommandRegistry};
use electra_surface::electra::ElectraDriver;
use electra_surface::modes::{ModeId, PlainMode, SimpleModeManager};
use electra_surface::protocol::ProtocolError;
use electra_surface::sniffer;
use electra_surface::surface::ElectraSurface;
use electra_surface::touch::{ButtonEvent, TouchCommand, TouchMatcher};

/// Electra Surface - Electra.One control surface engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Run in sniffer mode
    #[arg(long)]
    sniffer: bool,

    /// Port name pattern for sniffer mode (empty = all ports)
    #[arg(long, default_value = "")]
    sniffer_port: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting Electra Surface...");

    if args.list_ports {
        sniffer::list_ports_formatted();
        return Ok(());
    }

    if args.sniffer {
        sniffer::run_cli_sniffer(&args.sniffer_port).await?;
        return Ok(());
    }

    info!("Configuration file: {}", args.config);
    let config = AppConfig::load(&args.config).await?;

    run_app(&args.config, config).await?;

    info!("Electra Surface shutdown complete");
    Ok(())
}

/// A touch-chord command that drops a marker line into the host log.
struct LogMarkerCommand;

impl TouchCommand for LogMarkerCommand {
    fn name(&self) -> &str {
        "log_marker"
    }
    fn execute(&self, event: ButtonEvent) {
        if event == ButtonEvent::Down {
            info!("==== marker ====");
        }
    }
}

/// A touch-chord command that jumps back to the volume page.
struct HomePageCommand {
    surface: Arc<ElectraSurface>,
}

impl TouchCommand for HomePageCommand {
    fn name(&self) -> &str {
        "home_page"
    }
    fn execute(&self, event: ButtonEvent) {
        if event == ButtonEvent::Down {
            if let Err(e) = self.surface.select_mode(ModeId::Volume) {
                warn!("home_page command failed: {e:#}");
            }
        }
    }
}

fn built_in_commands(surface: &Arc<ElectraSurface>) -> CommandRegistry {
    let mut commands = CommandRegistry::new();
    commands.insert("log_marker".into(), Arc::new(LogMarkerCommand));
    commands.insert(
        "home_page".into(),
        Arc::new(HomePageCommand {
            surface: Arc::clone(surface),
        }),
    );
    commands
}

async fn run_app(config_path: &str, config: AppConfig) -> Result<()> {
    // Connect to the hardware
    let mut driver = ElectraDriver::new(&config.midi.input_port, &config.midi.output_port);
    driver.connect()?;

    let mut event_rx = driver
        .take_event_receiver()
        .ok_or_else(|| anyhow::anyhow!("Failed to get Electra event receiver"))?;

    // Assemble the surface: modes, touch matcher, dispatcher
    let modes = Arc::new(SimpleModeManager::new(PlainMode::all(), ModeId::Dummy));
    let touch = Arc::new(TouchMatcher::new());
    let surface = Arc::new(ElectraSurface::new(
        driver.output()?,
        modes,
        touch.clone(),
        config.device_logging,
    ));

    let commands = Arc::new(built_in_commands(&surface));
    touch.rebuild_bindings(&config.slot_bindings(|name| commands.get(name).cloned()));

    // Config edits re-resolve the touch bindings while the surface runs
    let mut binding_watcher = BindingWatcher::new(config_path, Arc::clone(&commands))?;

    // The device-info response drives the rest of the handshake
    surface.start_handshake()?;
    info!("Handshake started, waiting for device...");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Hardware fragments -> framing -> dispatch
            Some(event) = event_rx.recv() => {
                match surface.handle_fragment(&event.raw_data) {
                    Ok(()) => {}
                    Err(e @ ProtocolError::HomePresetMissing(_)) => {
                        // No addressable UI without the home preset
                        return Err(e.into());
                    }
                    Err(e) => {
                        // Recoverable: report and keep processing
                        error!("Protocol error: {e:#}");
                    }
                }
            }

            // Config reload: install the freshly resolved binding table
            Some(bindings) = binding_watcher.next_bindings() => {
                info!("Configuration changed, installing new touch bindings");
                touch.rebuild_bindings(&bindings);
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    driver.disconnect();
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
