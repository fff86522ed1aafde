//! Roomcast Server
//!
//! Run with: cargo run --bin roomcast -- serve --config config.toml
//!
//! Without `--config` the first of `<config_dir>/roomcast/config.toml`,
//! `/etc/roomcast/config.toml` and `./config.toml` is used, falling back to
//! built-in defaults. `ROOMCAST_*` environment variables override the file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use roomcast::api::{serve, AppState};
use roomcast::auth::{load_or_generate_secret, JwtAuthority};
use roomcast::config::{generate_default_config, Config, LoggingConfig};
use roomcast::store::{RoomId, SqliteStore, StoreError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "roomcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Room-scoped real-time chat relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server (default)
    Serve {
        /// Config file (default: search standard locations)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate default config file
    InitConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { config: None }) {
        Commands::Serve { config } => run_server(config).await,
        Commands::InitConfig { output } => {
            let template = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, template)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Wrote default config to {}", path.display());
                }
                None => print!("{}", template),
            }
            Ok(())
        }
    }
}

async fn run_server(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = config_path.or_else(Config::find_default_path);
    let config = match &config_path {
        Some(path) => Config::load_with_env(path)?,
        None => Config::from_env(),
    };

    init_tracing(&config.logging);

    tracing::info!("Starting Roomcast v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("No config file found, using defaults"),
    }

    // Store
    let db_path = config.store.db_path();
    tracing::info!("Database: {:?}", db_path);
    let store = Arc::new(SqliteStore::open(&db_path).context("opening database")?);
    ensure_default_rooms(&store, &config.store.default_rooms).await?;

    // Auth
    let secret = if config.auth.jwt_secret.is_empty() {
        let secret_path = Path::new(&config.store.data_dir).join("jwt_secret");
        tracing::info!("Using generated JWT secret at {:?}", secret_path);
        load_or_generate_secret(&secret_path).context("loading JWT secret")?
    } else {
        config.auth.jwt_secret.clone().into_bytes()
    };
    let ttl = chrono::Duration::hours(config.auth.token_ttl_hours);
    let auth = Arc::new(JwtAuthority::new(&secret, ttl));

    // Relay + API
    tracing::info!(
        max_connections = config.relay.max_connections,
        outbound_buffer = config.relay.outbound_buffer,
        idle_timeout_secs = config.relay.idle_timeout_secs,
        "Relay configured"
    );
    let state = AppState::new(store, auth, config.api.clone(), &config.relay);
    serve(state, &config.api).await?;

    tracing::info!("Roomcast stopped");
    Ok(())
}

/// Initialize tracing from the logging config; `RUST_LOG` wins when set
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("roomcast={},tower_http=info", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn ensure_default_rooms(store: &SqliteStore, rooms: &[String]) -> anyhow::Result<()> {
    for name in rooms {
        let room = RoomId::parse(name.as_str())
            .with_context(|| format!("invalid default room {:?}", name))?;
        match store.create_room(room).await {
            Ok(room) => tracing::info!(room = %room.name, "Created default room"),
            Err(StoreError::Conflict(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
