use anyhow::Result;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::MailboxStore;

/// Production mailbox/roster store on Redis.
///
/// Roster: `game:{id}:offline`, a set of player ids.
/// Mailbox: `game:{id}:mailbox:{player}`, a list of serialized
/// outbound frames. Both keys carry the configured TTL, refreshed on
/// every write.
#[derive(Clone)]
pub struct RedisMailbox {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisMailbox {
    pub async fn new(redis_url: &str, ttl_seconds: u64) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis, ttl_seconds })
    }
}

#[async_trait]
impl MailboxStore for RedisMailbox {
    async fn roster_add(&self, game_id: i64, player_id: i64) -> Result<()> {
        let mut conn = self.redis.clone();
        let key = roster_key(game_id);
        redis::pipe()
            .sadd(&key, player_id)
            .ignore()
            .expire(&key, self.ttl_seconds as i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn roster_remove(&self, game_id: i64, player_id: i64) -> Result<()> {
        let mut conn = self.redis.clone();
        conn.srem::<_, _, ()>(roster_key(game_id), player_id).await?;
        Ok(())
    }

    async fn roster_members(&self, game_id: i64) -> Result<Vec<i64>> {
        let mut conn = self.redis.clone();
        let members: Vec<i64> = conn.smembers(roster_key(game_id)).await?;
        Ok(members)
    }

    async fn mailbox_append(&self, game_id: i64, player_id: i64, frame: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let key = mailbox_key(game_id, player_id);
        redis::pipe()
            .rpush(&key, frame)
            .ignore()
            .expire(&key, self.ttl_seconds as i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn mailbox_pop_front(&self, game_id: i64, player_id: i64) -> Result<Option<String>> {
        let mut conn = self.redis.clone();
        let key = mailbox_key(game_id, player_id);
        let frame: Option<String> = conn.lpop(&key, None).await?;
        if frame.is_some() {
            // Consuming refreshes the expiry like any other write. A
            // list emptied by the pop is gone and EXPIRE is a no-op.
            conn.expire::<_, ()>(&key, self.ttl_seconds as i64).await?;
        }
        Ok(frame)
    }

    async fn mailbox_all(&self, game_id: i64, player_id: i64) -> Result<Vec<String>> {
        let mut conn = self.redis.clone();
        let frames: Vec<String> = conn.lrange(mailbox_key(game_id, player_id), 0, -1).await?;
        Ok(frames)
    }
}

fn roster_key(game_id: i64) -> String {
    format!("game:{}:offline", game_id)
}

fn mailbox_key(game_id: i64, player_id: i64) -> String {
    format!("game:{}:mailbox:{}", game_id, player_id)
}
