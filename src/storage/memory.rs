use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeSet, VecDeque};

use super::MailboxStore;

/// In-memory mailbox/roster store backing the test suite. Entries
/// never expire.
#[derive(Default)]
pub struct MemoryMailbox {
    rosters: DashMap<i64, BTreeSet<i64>>,
    queues: DashMap<(i64, i64), VecDeque<String>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MailboxStore for MemoryMailbox {
    async fn roster_add(&self, game_id: i64, player_id: i64) -> Result<()> {
        self.rosters.entry(game_id).or_default().insert(player_id);
        Ok(())
    }

    async fn roster_remove(&self, game_id: i64, player_id: i64) -> Result<()> {
        if let Some(mut roster) = self.rosters.get_mut(&game_id) {
            roster.remove(&player_id);
        }
        Ok(())
    }

    async fn roster_members(&self, game_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .rosters
            .get(&game_id)
            .map(|roster| roster.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn mailbox_append(&self, game_id: i64, player_id: i64, frame: &str) -> Result<()> {
        self.queues
            .entry((game_id, player_id))
            .or_default()
            .push_back(frame.to_string());
        Ok(())
    }

    async fn mailbox_pop_front(&self, game_id: i64, player_id: i64) -> Result<Option<String>> {
        Ok(self
            .queues
            .get_mut(&(game_id, player_id))
            .and_then(|mut queue| queue.pop_front()))
    }

    async fn mailbox_all(&self, game_id: i64, player_id: i64) -> Result<Vec<String>> {
        Ok(self
            .queues
            .get(&(game_id, player_id))
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mailbox_is_fifo() {
        let store = MemoryMailbox::new();
        store.mailbox_append(1, 2, "u1").await.unwrap();
        store.mailbox_append(1, 2, "u2").await.unwrap();
        store.mailbox_append(1, 2, "u3").await.unwrap();

        assert_eq!(store.mailbox_all(1, 2).await.unwrap(), vec!["u1", "u2", "u3"]);
        assert_eq!(store.mailbox_pop_front(1, 2).await.unwrap().as_deref(), Some("u1"));
        assert_eq!(store.mailbox_pop_front(1, 2).await.unwrap().as_deref(), Some("u2"));
        assert_eq!(store.mailbox_pop_front(1, 2).await.unwrap().as_deref(), Some("u3"));
        assert_eq!(store.mailbox_pop_front(1, 2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn mailboxes_are_isolated_per_player() {
        let store = MemoryMailbox::new();
        store.mailbox_append(1, 2, "for-two").await.unwrap();
        store.mailbox_append(1, 3, "for-three").await.unwrap();
        assert_eq!(
            store.mailbox_pop_front(1, 2).await.unwrap().as_deref(),
            Some("for-two")
        );
        assert_eq!(
            store.mailbox_pop_front(1, 3).await.unwrap().as_deref(),
            Some("for-three")
        );
    }

    #[tokio::test]
    async fn roster_membership_toggles_cleanly() {
        let store = MemoryMailbox::new();
        store.roster_add(1, 9).await.unwrap();
        store.roster_add(1, 9).await.unwrap();
        assert_eq!(store.roster_members(1).await.unwrap(), vec![9]);

        store.roster_remove(1, 9).await.unwrap();
        // Removing an absent member never errors.
        store.roster_remove(1, 9).await.unwrap();
        assert!(store.roster_members(1).await.unwrap().is_empty());
    }
}
