mod memory;
mod redis;

pub use memory::MemoryMailbox;
pub use redis::RedisMailbox;

use anyhow::Result;
use async_trait::async_trait;

/// Durable offline bookkeeping for a game: a roster of players
/// currently disconnected, and one FIFO mailbox per (game, player)
/// holding the update frames they missed. Every write refreshes the
/// store's expiry so abandoned games age out.
#[async_trait]
pub trait MailboxStore: Send + Sync {
    async fn roster_add(&self, game_id: i64, player_id: i64) -> Result<()>;
    async fn roster_remove(&self, game_id: i64, player_id: i64) -> Result<()>;
    async fn roster_members(&self, game_id: i64) -> Result<Vec<i64>>;

    async fn mailbox_append(&self, game_id: i64, player_id: i64, frame: &str) -> Result<()>;
    async fn mailbox_pop_front(&self, game_id: i64, player_id: i64) -> Result<Option<String>>;
    async fn mailbox_all(&self, game_id: i64, player_id: i64) -> Result<Vec<String>>;
}
