use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dbstash::config::{self, EngineKind, Schedule, Settings, SettingsArgs};
use dbstash::engines::Engine;
use dbstash::managers::{health, logging};
use dbstash::utils::tools;
use dbstash::{BackupManager, HealthSink, HealthTracker, Scheduler};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "dbstash")]
#[command(about = "Scheduled database dumps shipped to any rclone remote", long_about = None)]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings when no engine subcommand is given (engine from ENGINE)
    #[command(flatten)]
    args: SettingsArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up PostgreSQL with pg_dump (pg_dumpall for all databases)
    Pg(SettingsArgs),
    /// Back up MongoDB with mongodump
    Mongo(SettingsArgs),
    /// Back up MySQL with mysqldump
    Mysql(SettingsArgs),
    /// Back up MariaDB with mysqldump
    Mariadb(SettingsArgs),
    /// Back up Redis with redis-cli --rdb
    Redis(SettingsArgs),
}

impl Cli {
    fn into_parts(self) -> (Option<EngineKind>, SettingsArgs) {
        match self.command {
            None => (None, self.args),
            Some(Commands::Pg(args)) => (Some(EngineKind::Pg), args),
            Some(Commands::Mongo(args)) => (Some(EngineKind::Mongo), args),
            Some(Commands::Mysql(args)) => (Some(EngineKind::Mysql), args),
            Some(Commands::Mariadb(args)) => (Some(EngineKind::Mariadb), args),
            Some(Commands::Redis(args)) => (Some(EngineKind::Redis), args),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let (engine_kind, args) = Cli::parse().into_parts();

    let settings = config::load_settings(args, engine_kind).context("Invalid configuration")?;
    let _log_guard = logging::init_logging(&settings.logging)?;

    let settings = Arc::new(settings);
    let engine = Engine::from_kind(settings.engine);

    for warning in tools::advisories(&settings, &engine) {
        warn!("{}", warning);
    }
    for program in tools::missing_tools(&settings, &engine) {
        warn!("{} not found on PATH; backups will fail until it is installed", program);
    }

    if settings.dry_run {
        print_dry_run(&settings, &engine);
        return Ok(ExitCode::SUCCESS);
    }

    let token = CancellationToken::new();
    let manager = Arc::new(BackupManager::new(Arc::clone(&settings), engine));

    match &settings.schedule {
        Schedule::Once => run_once(&manager, token).await,
        Schedule::Cron(expression) => {
            run_scheduled(manager, &settings, &engine, expression, token).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Single backup, exit status from its outcome
async fn run_once(manager: &BackupManager, token: CancellationToken) -> Result<ExitCode> {
    info!("Running single backup");

    let signal_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown requested, cancelling backup");
        signal_token.cancel();
    });

    match manager.run_once(&token, None).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("Backup failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_scheduled(
    manager: Arc<BackupManager>,
    settings: &Settings,
    engine: &Engine,
    expression: &str,
    token: CancellationToken,
) -> Result<()> {
    let tracker = Arc::new(HealthTracker::new(engine.name()));
    let health_shutdown = CancellationToken::new();
    let server = health::serve(&settings.health_addr, Arc::clone(&tracker), health_shutdown.clone()).await?;

    let sink: Arc<dyn HealthSink> = tracker;
    let scheduler = Scheduler::new(manager, Some(sink), token.clone());
    scheduler.start(expression)?;

    info!(
        "dbstash started: {} backups of {} to {}",
        engine,
        settings.db_name_or_default(),
        settings.rclone.remote
    );

    if settings.on_start {
        info!("Running initial backup");
        scheduler.fire();
    }

    shutdown_signal().await;
    info!("Shutting down");

    if !scheduler.stop(SHUTDOWN_TIMEOUT).await {
        // Child processes still running are killed as the run futures drop
        token.cancel();
    }

    health_shutdown.cancel();
    if let Err(e) = server.await {
        warn!("Health server task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Log the resolved configuration and dump command without running anything
fn print_dry_run(settings: &Settings, engine: &Engine) {
    info!("Dry run: no backup will be performed");
    info!("Engine: {} ({})", engine, engine.tool(settings));
    info!("Database: {}", settings.db_name_or_default());
    if let Some(uri) = &settings.connection.uri {
        info!("URI: {}", config::mask_uri(uri));
    } else {
        info!(
            "Host: {}:{}",
            settings.connection.host.as_deref().unwrap_or(""),
            settings.connection.port.as_deref().unwrap_or("default")
        );
        if let Some(user) = &settings.connection.user {
            info!("User: {}", user);
        }
        if settings.connection.password.is_some() {
            info!("Password: ****");
        }
    }
    info!("Mode: {} (compress: {})", settings.mode, settings.compress);
    info!("Remote: {}", settings.rclone.remote);
    info!("Schedule: {} ({})", settings.schedule, settings.timezone);
    info!(
        "Retention: max files {}, max days {}",
        settings.retention.max_files, settings.retention.max_days
    );
    if let Some(timeout) = settings.timeout {
        info!("Timeout: {}", humantime::format_duration(timeout));
    }

    let mode = tools::dump_mode_for(settings.mode);
    match engine.dump_command(settings, mode, &settings.temp_dir) {
        Ok(dump) => info!("Dump command: {}", dump.masked()),
        Err(e) => warn!("Dump command cannot be built: {}", e),
    }
}
