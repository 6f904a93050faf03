use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use taskgrid::cli::{run_debug_client, Cli, Commands};
use taskgrid::config::Config;
use taskgrid::registry::Registry;
use taskgrid::storage::RedisMailbox;
use taskgrid::store::GameStore;
use taskgrid::websocket::AppState;

#[tokio::main]
async fn main() {
    // Default to INFO level if RUST_LOG is not set
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Check if running as debug client
    if let Some(Commands::Debug {
        url,
        game,
        player,
        command,
    }) = cli.command
    {
        if let Err(e) = run_debug_client(url, game, player, command).await {
            error!("Debug client error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Otherwise, run as server
    let config = Config::from_env();
    info!("Starting taskgrid sync server on port {}", config.port);
    info!("Redis URL: {}", config.redis_url);
    info!("Mailbox TTL: {} seconds", config.mailbox_ttl_seconds);

    let mailbox = match RedisMailbox::new(&config.redis_url, config.mailbox_ttl_seconds).await {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to connect to Redis: {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState {
        store: Arc::new(GameStore::new()),
        mailbox: Arc::new(mailbox),
        registry: Registry::new(),
    };

    let app = taskgrid::app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!("taskgrid listening on {}", addr);

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
