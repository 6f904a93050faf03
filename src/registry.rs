use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Session-keyed table of live connections.
///
/// Maps game_id -> (player_id -> outbound sender). Business logic only
/// ever calls register/deregister/broadcast; the table itself is
/// private. Broadcasts reach the membership at the instant of the
/// call; there is no history. Each connection's channel preserves the
/// order broadcasts were issued.
#[derive(Clone, Default)]
pub struct Registry {
    games: Arc<DashMap<i64, DashMap<i64, mpsc::UnboundedSender<String>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: registering an already-registered (game, player)
    /// replaces the previous sender rather than duplicating delivery.
    pub fn register(&self, game_id: i64, player_id: i64, tx: mpsc::UnboundedSender<String>) {
        self.games
            .entry(game_id)
            .or_default()
            .insert(player_id, tx);
    }

    /// Remove the (game, player) entry, but only if `tx` is still the
    /// registered sender: the close of a superseded socket must not
    /// tear down its replacement. Returns whether an entry was removed.
    pub fn deregister(
        &self,
        game_id: i64,
        player_id: i64,
        tx: &mpsc::UnboundedSender<String>,
    ) -> bool {
        let removed = self
            .games
            .get(&game_id)
            .map(|members| {
                members
                    .remove_if(&player_id, |_, current| current.same_channel(tx))
                    .is_some()
            })
            .unwrap_or(false);
        // remove_if holds the shard write lock while it checks, so a
        // concurrent register cannot land in a map being dropped.
        self.games.remove_if(&game_id, |_, members| members.is_empty());
        removed
    }

    /// True while `tx` is the registered sender for (game, player).
    pub fn is_current(
        &self,
        game_id: i64,
        player_id: i64,
        tx: &mpsc::UnboundedSender<String>,
    ) -> bool {
        self.games
            .get(&game_id)
            .and_then(|members| {
                members
                    .get(&player_id)
                    .map(|current| current.same_channel(tx))
            })
            .unwrap_or(false)
    }

    /// Deliver to every member registered at call time.
    pub fn broadcast(&self, game_id: i64, frame: &str) {
        if let Some(members) = self.games.get(&game_id) {
            for member in members.iter() {
                // A closed receiver means the connection is tearing
                // down; its own disconnect path deregisters it.
                let _ = member.value().send(frame.to_string());
            }
        }
    }

    /// Deliver to every registered member whose player id is not in
    /// `excluded`. Used to skip players whose copy went to a mailbox.
    pub fn broadcast_except(&self, game_id: i64, excluded: &HashSet<i64>, frame: &str) {
        if let Some(members) = self.games.get(&game_id) {
            for member in members.iter() {
                if !excluded.contains(member.key()) {
                    let _ = member.value().send(frame.to_string());
                }
            }
        }
    }

    #[cfg(test)]
    fn member_count(&self, game_id: i64) -> usize {
        self.games.get(&game_id).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let registry = Registry::new();
        let (tx_old, mut rx_old) = channel();
        let (tx_new, mut rx_new) = channel();
        registry.register(42, 7, tx_old);
        registry.register(42, 7, tx_new);
        assert_eq!(registry.member_count(42), 1);

        registry.broadcast(42, "hello");
        assert_eq!(rx_new.recv().await.unwrap(), "hello");
        // The replaced sender no longer receives anything.
        assert!(rx_old.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_reaches_call_time_members_in_order() {
        let registry = Registry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        registry.register(42, 7, tx_a);
        registry.broadcast(42, "one");
        registry.register(42, 9, tx_b);
        registry.broadcast(42, "two");

        assert_eq!(rx_a.recv().await.unwrap(), "one");
        assert_eq!(rx_a.recv().await.unwrap(), "two");
        // Late registrant sees no replay.
        assert_eq!(rx_b.recv().await.unwrap(), "two");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_except_skips_excluded_players() {
        let registry = Registry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        registry.register(42, 7, tx_a);
        registry.register(42, 9, tx_b);

        let excluded: HashSet<i64> = [9].into_iter().collect();
        registry.broadcast_except(42, &excluded, "update");
        assert_eq!(rx_a.recv().await.unwrap(), "update");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn deregister_drops_empty_games() {
        let registry = Registry::new();
        let (tx, _rx) = channel();
        registry.register(42, 7, tx.clone());
        assert!(registry.deregister(42, 7, &tx));
        assert!(!registry.deregister(42, 7, &tx));
        assert_eq!(registry.member_count(42), 0);
        assert!(registry.games.get(&42).is_none());
    }

    #[tokio::test]
    async fn stale_deregister_leaves_replacement_in_place() {
        let registry = Registry::new();
        let (tx_old, _rx_old) = channel();
        let (tx_new, mut rx_new) = channel();
        registry.register(42, 7, tx_old.clone());
        registry.register(42, 7, tx_new.clone());

        assert!(!registry.is_current(42, 7, &tx_old));
        assert!(registry.is_current(42, 7, &tx_new));

        // The superseded socket's teardown must not evict the live one.
        assert!(!registry.deregister(42, 7, &tx_old));
        assert_eq!(registry.member_count(42), 1);
        registry.broadcast(42, "still live");
        assert_eq!(rx_new.recv().await.unwrap(), "still live");
    }
}
