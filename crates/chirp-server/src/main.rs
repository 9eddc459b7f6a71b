//! Chirp server
//!
//! Serves the Chirp micro-blog over HTTP, backed by a SQLite database.
//!
//! Usage:
//! ```bash
//! # Defaults: http://127.0.0.1:8000, database at ~/.chirp/chirp.db
//! chirp-server
//!
//! # With a config file (YAML or TOML), env vars override it
//! CHIRP_PORT=9000 chirp-server --config chirp.yaml
//!
//! # Create an account without going through the signup page
//! chirp-server create-user --username alice --email alice@example.com --password 'a long passphrase'
//! ```

mod app;
mod config;

use clap::{Parser, Subcommand};
use config::ServerConfig;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use chirp_core::{Error as CoreError, SignupForm};
use chirp_web::WebServer;

/// Chirp - a small micro-blogging service
#[derive(Parser)]
#[command(name = "chirp-server")]
#[command(about = "Chirp micro-blog server", long_about = None)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CHIRP_GIT_SHA"), ")"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, value_name = "FILE", env = "CHIRP_CONFIG", global = true)]
    config: Option<String>,

    /// Host to bind to (overrides config and CHIRP_HOST)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to listen on (overrides config and CHIRP_PORT)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// SQLite database path (overrides config and CHIRP_DATABASE_PATH)
    #[arg(long, value_name = "PATH", global = true)]
    database: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default if no command specified)
    Serve,
    /// Create an account, applying the same rules as the signup page
    CreateUser {
        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "CHIRP_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        let path = shellexpand::tilde(config_path).to_string();
        ServerConfig::from_file(&path)?
    } else {
        ServerConfig::default()
    };

    // Environment overrides the file, CLI flags override both
    config.merge_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(database) = cli.database {
        config.database.path = database;
    }
    config.validate()?;

    init_tracing(&config)?;
    match &cli.config {
        Some(path) => info!("📁 Loaded configuration from: {}", path),
        None => info!("📁 Using default configuration"),
    }

    match cli.command {
        Some(Commands::CreateUser {
            username,
            email,
            password,
        }) => {
            create_user(
                &config,
                SignupForm {
                    username,
                    email,
                    password1: password.clone(),
                    password2: password,
                },
            )
            .await
        }
        Some(Commands::Serve) | None => serve(config).await,
    }
}

fn init_tracing(config: &ServerConfig) -> anyhow::Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::new(format!("{}", log_level));

    // sqlx logs every statement at debug; keep it quiet unless asked for
    if !config.logging.log_sql_queries {
        match "sqlx=warn".parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Warning: Failed to set sqlx log filter: {}", e),
        }
    }

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    info!("🚀 Starting Chirp");

    let store = app::open_store(&config).await?;
    let (state, health) = app::build_states(&config, store.clone())?;

    if config.session.secure_cookie {
        info!("🔒 Session cookies marked Secure");
    }

    WebServer::new(state, health)
        .serve(shutdown_signal())
        .await?;

    store.close().await;
    info!("Server stopped");
    Ok(())
}

async fn create_user(config: &ServerConfig, form: SignupForm) -> anyhow::Result<()> {
    let store = app::open_store(config).await?;
    let accounts = app::account_workflow(store.clone());

    let result = accounts.register(&form).await;
    store.close().await;

    match result {
        Ok(user) => {
            println!("Created user '{}' (id {})", user.username, user.id);
            Ok(())
        }
        Err(CoreError::Validation(errors)) => {
            for field in errors.fields() {
                for message in errors.get(field) {
                    eprintln!("{}: {}", field, message);
                }
            }
            anyhow::bail!("User not created")
        }
        Err(e) => Err(e.into()),
    }
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
