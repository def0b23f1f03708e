//! Nookly Guard CLI
//!
//! Drives the protection layer against simulated OS ports.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use nookly_guard::{
    channels::{spawn_reconcile, Catalog, ProvisionReport},
    config::Config,
    platform::{SimulatedCapture, SimulatedNotificationManager, SimulatedWindow},
    transparency::{create_shared_log_with_persistence, SharedProtectionLog},
    CaptureProtectionCoordinator, ClassifiedEvent, LifecycleSignal, OverlayController,
    PROTECTION_DECLARATION, VERSION,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

type Coordinator = CaptureProtectionCoordinator<SimulatedCapture, SimulatedWindow>;

#[derive(Parser)]
#[command(name = "nookly-guard")]
#[command(author = "Nookly")]
#[command(version = VERSION)]
#[command(about = "Capture protection and notification channel provisioning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the notification channel catalog
    Channels {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Provision notification channels, as on a cold start
    Provision {
        /// Catalog JSON file (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Simulated notification manager state file
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Run capture protection against a scripted sequence of OS signals
    Simulate {
        /// Comma-separated steps: screenshot, record-on, record-off, resume, active, fail-attach
        #[arg(long, value_delimiter = ',')]
        script: Vec<String>,
    },

    /// Run capture protection, reading steps from stdin until Ctrl+C
    Watch,

    /// Show protection statistics
    Status,

    /// Display protection declaration
    Declaration,

    /// Show configuration
    Config,
}

/// One simulated OS or host event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Screenshot,
    RecordOn,
    RecordOff,
    Resume,
    Active,
    FailAttach,
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "screenshot" => Ok(Step::Screenshot),
            "record-on" => Ok(Step::RecordOn),
            "record-off" => Ok(Step::RecordOff),
            "resume" => Ok(Step::Resume),
            "active" => Ok(Step::Active),
            "fail-attach" => Ok(Step::FailAttach),
            other => bail!("unknown step '{other}'"),
        }
    }
}

/// The simulated OS plus the coordinator running on top of it.
struct Session {
    capture: SimulatedCapture,
    window: SimulatedWindow,
    coordinator: Coordinator,
    events: Receiver<ClassifiedEvent>,
    log: SharedProtectionLog,
}

impl Session {
    fn start(config: &Config) -> Self {
        let capture = SimulatedCapture::new();
        let window = SimulatedWindow::new();
        let log = create_shared_log_with_persistence(config.ledger_path());
        let (sender, events) = unbounded();

        let overlay = OverlayController::new(window.clone(), config.overlay.surface_spec());
        let mut coordinator = CaptureProtectionCoordinator::new(capture.clone(), overlay, sender)
            .with_log(log.clone());
        if !config.overlay.enabled {
            coordinator = coordinator.without_overlay();
        }
        coordinator.start();

        Self {
            capture,
            window,
            coordinator,
            events,
            log,
        }
    }

    fn apply(&mut self, step: Step) {
        match step {
            Step::Screenshot => self.capture.take_screenshot(),
            Step::RecordOn => self.capture.set_captured(true),
            Step::RecordOff => self.capture.set_captured(false),
            Step::Resume => self.coordinator.dispatch(LifecycleSignal::ForegroundResume),
            Step::Active => self.coordinator.dispatch(LifecycleSignal::BecameActive),
            Step::FailAttach => self.window.fail_next_attaches(1),
        }
        self.coordinator.pump();

        for event in self.events.try_iter() {
            println!(
                "[{}] {}",
                event.timestamp().format("%H:%M:%S%.3f"),
                event.message()
            );
        }
    }

    fn finish(mut self) {
        self.coordinator.shutdown();

        if let Err(e) = self.log.save() {
            eprintln!("Warning: Could not save protection ledger: {e}");
        }

        println!();
        println!("{}", self.log.summary());
    }

    fn print_state(&self) {
        println!(
            "  Overlay: {:?} | Recording: {} | Detecting: {}",
            self.coordinator.overlay_state(),
            self.coordinator.is_recording(),
            self.coordinator.is_detecting()
        );
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    init_tracing(&config);

    match cli.command {
        Commands::Channels { json } => cmd_channels(json),
        Commands::Provision { catalog, state } => cmd_provision(&config, catalog, state),
        Commands::Simulate { script } => cmd_simulate(&config, &script),
        Commands::Watch => cmd_watch(&config),
        Commands::Status => {
            cmd_status(&config);
            Ok(())
        }
        Commands::Declaration => {
            cmd_declaration();
            Ok(())
        }
        Commands::Config => cmd_config(&config),
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_channels(json: bool) -> anyhow::Result<()> {
    let catalog = Catalog::standard();

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    println!("Notification Channels (catalog v{})", catalog.version());
    println!("=====================================");
    for group in catalog.groups() {
        println!();
        println!("{} [{}]", group.display_name, group.id);
        for channel in catalog
            .definitions()
            .iter()
            .filter(|c| c.group_id.as_deref() == Some(group.id.as_str()))
        {
            println!(
                "  {:<22} {:<24} urgency: {:?}",
                channel.id, channel.display_name, channel.urgency
            );
        }
    }

    let ungrouped: Vec<_> = catalog
        .definitions()
        .iter()
        .filter(|c| c.group_id.is_none())
        .collect();
    if !ungrouped.is_empty() {
        println!();
        println!("Ungrouped");
        for channel in ungrouped {
            println!(
                "  {:<22} {:<24} urgency: {:?}",
                channel.id, channel.display_name, channel.urgency
            );
        }
    }

    Ok(())
}

fn cmd_provision(
    config: &Config,
    catalog_path: Option<PathBuf>,
    state_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let catalog = match catalog_path {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading catalog {path:?}"))?;
            Catalog::from_json(&json).with_context(|| format!("parsing catalog {path:?}"))?
        }
        None => Catalog::standard(),
    };

    let state_path = state_path.unwrap_or_else(|| config.notification_state_path());
    let manager = SimulatedNotificationManager::load(&state_path)
        .with_context(|| format!("loading notification state {state_path:?}"))?;

    println!("Provisioning catalog v{}...", catalog.version());
    let started = Utc::now();
    let handle = spawn_reconcile(manager, catalog);
    let (manager, result) = handle.wait()?;
    let report = result?;

    print_report(&report);
    println!(
        "Finished in {}ms",
        (Utc::now() - started).num_milliseconds()
    );

    manager
        .save(&state_path)
        .with_context(|| format!("saving notification state {state_path:?}"))?;

    let log = create_shared_log_with_persistence(config.ledger_path());
    log.record_provisioning(&report);
    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save protection ledger: {e}");
    }

    Ok(())
}

fn print_report(report: &ProvisionReport) {
    if !report.supported {
        println!("Notification channels unsupported on this OS; nothing provisioned.");
        return;
    }

    println!("  Groups: {}", report.groups.join(", "));
    println!("  Channels: {}", report.channels.join(", "));
    for failure in &report.failures {
        println!(
            "  Failed {:?} '{}': {}",
            failure.target, failure.id, failure.reason
        );
    }
    if !report.stale.is_empty() {
        println!("  No longer declared: {}", report.stale.join(", "));
    }
}

fn cmd_simulate(config: &Config, script: &[String]) -> anyhow::Result<()> {
    let steps = script
        .iter()
        .map(|s| s.parse::<Step>())
        .collect::<anyhow::Result<Vec<_>>>()?;

    println!("Nookly Guard v{VERSION}");
    let mut session = Session::start(config);
    session.print_state();

    for step in steps {
        println!("> {step:?}");
        session.apply(step);
        session.print_state();
    }

    session.finish();
    Ok(())
}

fn cmd_watch(config: &Config) -> anyhow::Result<()> {
    println!("Nookly Guard v{VERSION}");
    println!("Type one step per line:");
    println!("  screenshot, record-on, record-off, resume, active, fail-attach");
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let (sender, steps) = unbounded::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });

    let mut session = Session::start(config);
    session.print_state();

    while running.load(Ordering::SeqCst) {
        match steps.recv_timeout(Duration::from_millis(100)) {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => match line.parse::<Step>() {
                Ok(step) => {
                    session.apply(step);
                    session.print_state();
                }
                Err(e) => eprintln!("{e}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    println!();
    println!("Stopping protection...");
    session.finish();
    Ok(())
}

fn cmd_status(config: &Config) {
    println!("Nookly Guard Status");
    println!("===================");
    println!();

    println!("Configuration:");
    println!(
        "  Secure overlay: {}",
        if config.overlay.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Overlay opacity: {}", config.overlay.opacity);
    println!(
        "  Window capture prevention: {}",
        if config.overlay.prevent_capture {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();

    let state_path = config.notification_state_path();
    match SimulatedNotificationManager::load(&state_path) {
        Ok(manager) if !manager.state().channels.is_empty() => {
            println!("Provisioned channels:");
            for (id, channel) in &manager.state().channels {
                println!("  {:<22} urgency: {:?}", id, channel.urgency);
            }
        }
        Ok(_) => println!("No channels provisioned yet. Run 'nookly-guard provision'."),
        Err(e) => eprintln!("Warning: Could not read notification state: {e}"),
    }
    println!();

    let ledger_path = config.ledger_path();
    if ledger_path.exists() {
        let stats = create_shared_log_with_persistence(ledger_path).stats();
        println!("Cumulative Statistics:");
        println!("  Screenshots detected: {}", stats.screenshots_detected);
        println!("  Recordings started: {}", stats.recordings_started);
        println!("  Recordings stopped: {}", stats.recordings_stopped);
        println!("  Overlay arms: {}", stats.overlay_armed);
        println!("  Overlay failures: {}", stats.overlay_failures);
        println!("  Channels provisioned: {}", stats.channels_provisioned);
        println!("  Channel failures: {}", stats.channel_failures);
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_declaration() {
    println!("{PROTECTION_DECLARATION}");
}

fn cmd_config(config: &Config) -> anyhow::Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
