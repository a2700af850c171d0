// Crewspace Server - Main Entry Point
//
// This file contains only the application bootstrap logic, CLI commands,
// and initialization. All handlers, routes, and business logic are in separate modules.

pub use crewspace_server::*;

use anyhow::{Context, anyhow, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use crewspace_core::{config::AppConfig, db::Database, user::UserStore};
use crewspace_server::utils::db::is_unique_violation;
use dotenvy::{Error as DotenvError, dotenv, from_filename};
use logfire::config::SendToLogfire;
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_appender::non_blocking;
use tracing_subscriber::EnvFilter;

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

static TRACING_FALLBACK_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(author, version, about = "Crewspace server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Run database migrations
    Migrate,
    /// Create or update an administrator account
    CreateAdmin {
        /// Email for the administrator account
        email: String,
        /// Password for the administrator account
        password: String,
    },
    /// Create a workspace owned by an existing user
    CreateWorkspace(CreateWorkspaceArgs),
    /// Seed a demo workspace with a project and sample tasks
    SeedDemo(SeedDemoArgs),
}

#[derive(Args, Debug)]
struct CreateWorkspaceArgs {
    /// Owner user ID to associate with the workspace
    #[arg(
        long = "owner-id",
        value_name = "ID",
        required_unless_present = "owner_email"
    )]
    owner_id: Option<String>,
    /// Owner email (looked up before creation)
    #[arg(
        long = "owner-email",
        value_name = "EMAIL",
        required_unless_present = "owner_id"
    )]
    owner_email: Option<String>,
    /// Display name for the workspace
    #[arg(long, value_name = "NAME")]
    name: String,
    /// Optional workspace description
    #[arg(long, value_name = "TEXT")]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct SeedDemoArgs {
    /// Owner user ID for the seeded workspace
    #[arg(
        long = "owner-id",
        value_name = "ID",
        required_unless_present = "owner_email"
    )]
    owner_id: Option<String>,
    /// Owner email (looked up before seeding)
    #[arg(
        long = "owner-email",
        value_name = "EMAIL",
        required_unless_present = "owner_id"
    )]
    owner_email: Option<String>,
    /// Display name for the seeded workspace
    #[arg(long, value_name = "NAME", default_value = "Demo Workspace")]
    name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_status = load_env_file();
    let _observability_guard = init_observability();
    observability::log_sampling_summary();
    report_env_status(&env_status);

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(config).await,
        Command::Migrate => run_migrate(config).await,
        Command::CreateAdmin { email, password } => run_create_admin(config, email, password).await,
        Command::CreateWorkspace(args) => run_create_workspace(config, args).await,
        Command::SeedDemo(args) => run_seed_demo(config, args).await,
    }
}

async fn run_serve(config: AppConfig) -> anyhow::Result<()> {
    info!(
        bind_address = %config.bind_address,
        database_path = %config.database_path,
        database_max_connections = config.database_max_connections,
        "Starting server with database configuration"
    );
    let database = Database::connect(&config).await?;
    let state = build_state(&database);

    let rewritten = state
        .workspace_store
        .normalize_member_roles()
        .await
        .context("normalize workspace member roles")?;
    if rewritten > 0 {
        info!(rewritten, "normalized legacy member role tokens");
    }

    info!(
        compatibility = %state.metadata.compatibility,
        deployment_type = %state.metadata.deployment_type,
        flavor = %state.metadata.flavor,
        server_path = %state.server_path.as_deref().unwrap_or("/"),
        "Loaded server metadata"
    );

    let app = router::build_router(state);

    let listener = TcpListener::bind(config.bind_address)
        .await
        .context("failed to bind socket")?;
    let actual_addr = listener
        .local_addr()
        .context("failed to read local address")?;

    info!("listening on {actual_addr}");

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(?error, "server terminated with error");
    }

    Ok(())
}

async fn run_migrate(config: AppConfig) -> anyhow::Result<()> {
    let _database = Database::connect(&config).await?;
    info!("migrations completed");
    Ok(())
}

async fn run_create_admin(
    config: AppConfig,
    email: String,
    password: String,
) -> anyhow::Result<()> {
    if email.trim().is_empty() {
        bail!("email must not be empty");
    }

    if password.is_empty() {
        bail!("password must not be empty");
    }

    let database = Database::connect(&config).await?;
    let user_store = UserStore::new(&database);
    let password_hash = auth::generate_password_hash(&password)?;

    let admin = match user_store.create(&email, &password_hash, None).await {
        Ok(record) => {
            info!("created admin user {email}");
            record
        }
        Err(err) => {
            if is_unique_violation(&err) {
                if let Some(existing) = user_store.find_by_email(&email).await? {
                    user_store
                        .update_password(&existing.id, &password_hash)
                        .await?;
                    info!("updated password for admin user {email}");
                    existing
                } else {
                    return Err(err.into());
                }
            } else {
                return Err(err.into());
            }
        }
    };

    user_store.add_admin(&admin.id).await?;
    info!("ensured administrator privileges for {email}");

    Ok(())
}

async fn run_create_workspace(config: AppConfig, args: CreateWorkspaceArgs) -> anyhow::Result<()> {
    let CreateWorkspaceArgs {
        owner_id,
        owner_email,
        name,
        description,
    } = args;

    let trimmed_name = name.trim();
    if trimmed_name.is_empty() {
        bail!("workspace name must not be empty");
    }

    let database = Database::connect(&config).await?;
    let state = build_state(&database);
    let owner_id = resolve_owner_id(&state.user_store, owner_id, owner_email).await?;

    let workspace = state
        .workspace_service
        .create_workspace_with_defaults(&owner_id, Some(trimmed_name), description.as_deref())
        .await
        .map_err(|err| anyhow!("failed to create workspace: {err}"))?;

    info!(
        workspace_id = %workspace.id,
        owner_id = %workspace.owner_id,
        "created workspace"
    );
    println!(
        "Created workspace '{}' ({}) for owner {}",
        workspace.name, workspace.id, workspace.owner_id
    );

    Ok(())
}

async fn run_seed_demo(config: AppConfig, args: SeedDemoArgs) -> anyhow::Result<()> {
    let SeedDemoArgs {
        owner_id,
        owner_email,
        name,
    } = args;

    let database = Database::connect(&config).await?;
    let state = build_state(&database);
    let owner_id = resolve_owner_id(&state.user_store, owner_id, owner_email).await?;

    let workspace = state
        .workspace_service
        .create_workspace_with_defaults(&owner_id, Some(name.trim()), Some("Seeded demo data"))
        .await
        .map_err(|err| anyhow!("failed to create demo workspace: {err}"))?;

    let project = state
        .project_store
        .create(
            workspace.id.as_str(),
            &owner_id,
            "Getting Started",
            Some("A seeded project to explore with"),
            None,
        )
        .await?;

    let now = Utc::now().timestamp();
    let day = 24 * 60 * 60;
    let samples = [
        ("Invite your teammates", "TODO", "HIGH", None),
        ("Create your first project", "DONE", "MEDIUM", None),
        ("Plan the first sprint", "IN_PROGRESS", "MEDIUM", Some(now + 7 * day)),
        ("Review the onboarding notes", "IN_REVIEW", "LOW", Some(now + 3 * day)),
        ("Park ideas for later", "BACKLOG", "LOW", None),
    ];

    for (title, status, priority, due_date) in samples {
        state
            .task_store
            .create(
                workspace.id.as_str(),
                project.id.as_str(),
                &owner_id,
                title,
                None,
                Some(status),
                Some(priority),
                None,
                due_date,
            )
            .await?;
    }

    println!(
        "Seeded workspace '{}' ({}) with project '{}' and {} tasks",
        workspace.name,
        workspace.id,
        project.name,
        samples.len()
    );

    Ok(())
}

async fn resolve_owner_id(
    user_store: &UserStore,
    owner_id: Option<String>,
    owner_email: Option<String>,
) -> anyhow::Result<String> {
    if let Some(id) = owner_id {
        let normalized = id.trim().to_owned();
        if normalized.is_empty() {
            bail!("owner-id must not be empty");
        }

        user_store
            .find_by_id(&normalized)
            .await?
            .with_context(|| format!("no user found with id {normalized}"))?;

        return Ok(normalized);
    }

    if let Some(email) = owner_email {
        let normalized = email.trim().to_owned();
        if normalized.is_empty() {
            bail!("owner-email must not be empty");
        }

        let user = user_store
            .find_by_email(&normalized)
            .await?
            .with_context(|| format!("no user found with email {normalized}"))?;

        return Ok(user.id);
    }

    bail!("either --owner-id or --owner-email must be provided");
}

fn init_observability() -> Option<logfire::ShutdownGuard> {
    // Check if LOGFIRE_TOKEN is empty/missing, if so, directly use fallback
    if let Ok(token) = std::env::var("LOGFIRE_TOKEN") {
        if token.trim().is_empty() {
            observability::set_otel_layers_enabled(false);
            init_tracing_fallback();
            return None;
        }
    } else {
        observability::set_otel_layers_enabled(false);
        init_tracing_fallback();
        return None;
    }

    let mut builder = logfire::configure()
        .send_to_logfire(SendToLogfire::IfTokenPresent)
        .with_service_name("crewspace-server")
        .with_service_version(env!("CARGO_PKG_VERSION"));

    if let Ok(environment) =
        std::env::var("CREWSPACE_ENVIRONMENT").or_else(|_| std::env::var("CREWSPACE_ENV"))
    {
        builder = builder.with_environment(environment);
    }

    match builder.finish() {
        Ok(logfire) => {
            observability::set_otel_layers_enabled(true);
            Some(logfire.shutdown_guard())
        }
        Err(error) => {
            eprintln!(
                "failed to initialize logfire: {error:?}; falling back to tracing_subscriber"
            );
            init_tracing_fallback();
            tracing::error!(
                ?error,
                "failed to initialize logfire; using tracing_subscriber fallback"
            );
            observability::set_otel_layers_enabled(false);
            None
        }
    }
}

fn init_tracing_fallback() {
    // Fallback logger: emit compact JSON to a rolling file, not stdout.
    // Use RUST_LOG to control the level.
    use std::fs;
    observability::set_otel_layers_enabled(false);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Optional override: when CREWSPACE_LOG_TO_STDOUT is set (and not "0"),
    // send logs to stdout instead of a file. Useful for local debugging or
    // scripts that capture server logs via redirection.
    let log_to_stdout = std::env::var("CREWSPACE_LOG_TO_STDOUT")
        .map(|v| !v.trim().is_empty() && v.trim() != "0")
        .unwrap_or(false);

    if log_to_stdout {
        if tracing_subscriber::fmt()
            .with_env_filter(env_filter.clone())
            .with_ansi(false)
            .json()
            .with_writer(std::io::stdout)
            .try_init()
            .is_ok()
        {
            return;
        }
    }

    let log_dir = std::env::var("CREWSPACE_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    if let Err(err) = fs::create_dir_all(&log_dir) {
        eprintln!("failed to create log dir '{}': {err}", log_dir);
        std::process::exit(1);
    }
    let file_appender = tracing_appender::rolling::daily(&log_dir, "server.log");
    let (writer, guard) = non_blocking(file_appender);

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .json()
        .with_writer(writer)
        .try_init()
        .is_ok()
    {
        let _ = TRACING_FALLBACK_GUARD.set(guard);
    }
}

enum EnvLoadStatus {
    Loaded(PathBuf),
    NotFound,
    Failed(DotenvError),
}

fn load_env_file() -> EnvLoadStatus {
    if let Ok(env_file) = std::env::var("CREWSPACE_ENV_FILE") {
        let trimmed = env_file.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(trimmed);
            return match from_filename(&path) {
                Ok(_) => {
                    let display_path = make_relative(&path).unwrap_or_else(|| path.clone());
                    EnvLoadStatus::Loaded(display_path)
                }
                Err(err) => EnvLoadStatus::Failed(err),
            };
        }
    }

    match dotenv() {
        Ok(path) => {
            let display_path = make_relative(&path).unwrap_or_else(|| path.clone());
            EnvLoadStatus::Loaded(display_path)
        }
        Err(DotenvError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            EnvLoadStatus::NotFound
        }
        Err(err) => EnvLoadStatus::Failed(err),
    }
}

fn report_env_status(status: &EnvLoadStatus) {
    match status {
        EnvLoadStatus::Loaded(path) => {
            info!("Loaded environment variables from {}", path.display());
        }
        EnvLoadStatus::NotFound => {
            info!("No .env file found; using process environment only");
        }
        EnvLoadStatus::Failed(err) => {
            warn!("Failed to load .env file: {err:?}");
        }
    }
}

fn make_relative(path: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    path.strip_prefix(&cwd).map(|p| p.to_path_buf()).ok()
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut int = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = term.recv() => {},
            _ = int.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
