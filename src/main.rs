use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use storerate::cli::{AdminCommands, InitArgs, run_admin_init};
use storerate::config::ServerConfig;
use storerate::server::{AppState, create_router};
use storerate::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "storerate")]
#[command(about = "A store rating server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML configuration file. Flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.data_dir)?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    if !store.has_admin()? {
        warn!("No admin account exists. Run 'storerate admin init' to create one.");
    }

    let expired = store.delete_expired_sessions()?;
    if expired > 0 {
        info!("Removed {expired} expired sessions");
    }

    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(Arc::new(store), config));
    let app = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("storerate=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                name,
                email,
                password,
                address,
                non_interactive,
            } => {
                run_admin_init(InitArgs {
                    data_dir,
                    name,
                    email,
                    password,
                    address,
                    non_interactive,
                })?;
            }
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::load(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            config.validate()?;

            run_serve(config).await?;
        }
    }

    Ok(())
}
