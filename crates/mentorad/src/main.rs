//! mentorad - The mentora lifecycle service
//!
//! This is the main entry point for the mentorad service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization and instructor seeding
//! - Lifecycle engine
//! - Periodic missed-session sweep
//! - Core event relay to structured logs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mentora_api::Actor;
use mentora_config::load_config;
use mentora_core::{CoreEvent, LifecycleEngine};
use mentora_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use mentora_util::{default_config_path, InstructorId, StaffId, DATABASE_FILENAME};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// mentorad - Booking lifecycle service for live instruction
#[derive(Parser, Debug)]
#[command(name = "mentorad")]
#[command(about = "Booking lifecycle service for live instruction", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/mentora/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set MENTORA_DATA_DIR env var)
    #[arg(short, long, env = "MENTORA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Staff identity recorded for one-shot commands
    #[arg(long, env = "MENTORA_OPERATOR", default_value = "mentorad")]
    operator: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Run the service until SIGTERM/SIGINT (default)
    Serve,

    /// Mark overdue sessions missed once, then exit
    Sweep,

    /// Print settlement statements as JSON
    Settlement {
        /// Only this instructor
        #[arg(long)]
        instructor: Option<String>,
    },
}

/// Main service state
struct Service {
    engine: Arc<LifecycleEngine>,
    store: Arc<dyn Store>,
    sweep_interval: Duration,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        // Load configuration
        let settings = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            packages = settings.catalog.packages.len(),
            services = settings.catalog.services.len(),
            instructors = settings.instructors.len(),
            "Configuration loaded"
        );

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        // Initialize store
        let db_path = data_dir.join(DATABASE_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        let sweep_interval = settings.service.sweep_interval;
        let engine = LifecycleEngine::new(settings, store.clone());

        let seeded = engine
            .seed_instructors()
            .context("Failed to seed instructors")?;
        if seeded > 0 {
            info!(seeded, "Instructors seeded");
        }

        Ok(Self {
            engine: Arc::new(engine),
            store,
            sweep_interval,
        })
    }

    async fn run(self) -> Result<()> {
        let mut events = self
            .engine
            .subscribe()
            .context("Core event stream already taken")?;

        self.store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        let mut sweep_timer = tokio::time::interval(self.sweep_interval);

        info!(
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "Service running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // Persist Missed for sessions whose window closed
                _ = sweep_timer.tick() => {
                    sweep(&self.engine);
                }

                Some(event) = events.recv() => {
                    relay_event(&event);
                }
            }
        }

        info!("Shutting down mentorad");
        drain_events(&mut events);

        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }

    fn sweep_once(&self) -> Result<usize> {
        let missed = self.engine.reconcile(mentora_util::now())?;
        if let Some(mut events) = self.engine.subscribe() {
            drain_events(&mut events);
        }
        Ok(missed.len())
    }

    fn settlement(&self, operator: &str, instructor: Option<&str>) -> Result<String> {
        let actor = Actor::Staff(StaffId::new(operator));
        let json = match instructor {
            Some(id) => {
                let statement = self.engine.settlement_for(&actor, &InstructorId::new(id))?;
                serde_json::to_string_pretty(&statement)?
            }
            None => {
                let report = self.engine.settlement_report(&actor, mentora_util::now())?;
                serde_json::to_string_pretty(&report)?
            }
        };
        Ok(json)
    }
}

fn sweep(engine: &LifecycleEngine) {
    match engine.reconcile(mentora_util::now()) {
        Ok(missed) if !missed.is_empty() => {
            info!(count = missed.len(), "Sweep marked sessions missed");
        }
        Ok(_) => debug!("Sweep found nothing overdue"),
        Err(e) => error!(code = e.code(), error = %e, "Sweep failed"),
    }
}

/// Forward a core event to the log for the notification layer
fn relay_event(event: &CoreEvent) {
    match serde_json::to_string(event) {
        Ok(payload) => info!(target: "mentorad::events", %payload, "Core event"),
        Err(e) => warn!(error = %e, event = ?event, "Failed to serialize core event"),
    }
}

fn drain_events(events: &mut mpsc::UnboundedReceiver<CoreEvent>) {
    while let Ok(event) = events.try_recv() {
        relay_event(&event);
    }
}

fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!(version = env!("CARGO_PKG_VERSION"), "mentorad starting");
    if mentora_util::is_mock_time_active() {
        warn!(
            now = %mentora_util::now(),
            "Mock time is active; sweeps and reports use the shifted clock"
        );
    }

    let service = Service::new(&args)?;

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => service.run().await,
        Command::Sweep => {
            let missed = service.sweep_once()?;
            println!("{} session(s) marked missed", missed);
            Ok(())
        }
        Command::Settlement { instructor } => {
            let json = service.settlement(&args.operator, instructor.as_deref())?;
            println!("{}", json);
            Ok(())
        }
    }
}
