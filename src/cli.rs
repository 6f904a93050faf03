use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::json;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error};

use crate::protocol;

#[derive(Parser, Debug)]
#[command(name = "taskgrid")]
#[command(about = "Task board sync server and debug client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Run as server (default behavior if no command specified)
    #[arg(long)]
    pub server: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to a running server as a player and poke it
    Debug {
        /// Server URL (e.g., ws://localhost:8080)
        #[arg(short, long, default_value = "ws://localhost:8080")]
        url: String,

        /// Game id to connect to
        #[arg(short, long)]
        game: i64,

        /// Player id to connect as
        #[arg(short, long)]
        player: i64,

        #[command(subcommand)]
        command: DebugCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum DebugCommands {
    /// Send a heartbeat and print the reply
    Heartbeat,

    /// Complete a task and print the resulting broadcast
    Complete {
        /// Task id to complete
        #[arg(short, long)]
        task: i64,

        /// Completion instant (ISO-8601); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Print frames as they arrive (queued backlog first)
    Watch,
}

pub async fn run_debug_client(
    url: String,
    game: i64,
    player: i64,
    command: DebugCommands,
) -> Result<()> {
    let ws_url = format!("{}/game_updates/{}/{}/", url, game, player);
    debug!("Connecting to {}", ws_url);

    let (ws_stream, _) = match timeout(Duration::from_secs(5), connect_async(&ws_url)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!("Failed to connect to {}: {}", ws_url, e);
            return Err(anyhow::anyhow!("Connection failed: {}", e));
        }
        Err(_) => {
            error!("Connection timeout after 5 seconds");
            return Err(anyhow::anyhow!(
                "Connection timeout - is the server running?"
            ));
        }
    };
    let (mut write, mut read) = ws_stream.split();

    // The server replays any queued updates first and acks last.
    // Print the backlog as it streams past.
    timeout(Duration::from_secs(5), async {
        while let Some(msg) = read.next().await {
            if let Message::Text(text) = msg? {
                if text.as_str() == protocol::connect_ack() {
                    debug!("Connected as player {} in game {}", player, game);
                    return Ok::<_, anyhow::Error>(());
                }
                println!("{}", text);
            }
        }
        Err(anyhow::anyhow!("connection closed before ack"))
    })
    .await
    .map_err(|_| anyhow::anyhow!("timed out waiting for connect ack"))??;

    match command {
        DebugCommands::Heartbeat => {
            write.send(Message::Text(protocol::HEARTBEAT.into())).await?;
            let reply = next_text(&mut read).await?;
            println!("{}", reply);
        }
        DebugCommands::Complete { task, at } => {
            let frame = json!({
                "id": task,
                "completed_by": {"id": player},
                "last_updated": at.unwrap_or_else(Utc::now),
            });
            write.send(Message::Text(frame.to_string().into())).await?;
            let reply = next_text(&mut read).await?;
            println!("{}", reply);
        }
        DebugCommands::Watch => {
            while let Some(msg) = read.next().await {
                match msg? {
                    Message::Text(text) => println!("{}", text),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

async fn next_text<S>(read: &mut S) -> Result<String>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    timeout(Duration::from_secs(5), async {
        while let Some(msg) = read.next().await {
            if let Message::Text(text) = msg? {
                return Ok(text.to_string());
            }
        }
        Err(anyhow::anyhow!("connection closed"))
    })
    .await
    .map_err(|_| anyhow::anyhow!("timed out waiting for reply"))?
}
