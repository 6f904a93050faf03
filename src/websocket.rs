use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::protocol::{self, ClientFrame, TaskBroadcast};
use crate::registry::Registry;
use crate::resolver::{self, Resolution};
use crate::storage::MailboxStore;
use crate::store::GameStore;

/// Shared state handed to every connection and HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<GameStore>,
    pub mailbox: Arc<dyn MailboxStore>,
    pub registry: Registry,
}

/// WebSocket upgrade handler for `/game_updates/:game_id/:player_id/`.
pub async fn game_updates_handler(
    ws: WebSocketUpgrade,
    Path((game_id, player_id)): Path<(i64, i64)>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, game_id, player_id, state))
}

/// Per-connection lifecycle: register, drain the mailbox, clear the
/// roster entry, ack, then process frames one at a time until the
/// transport closes. The disconnect bookkeeping at the bottom runs on
/// every exit path, abnormal ones included.
async fn handle_socket(socket: WebSocket, game_id: i64, player_id: i64, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Outbound channel; a forwarder task owns the sink so mailbox
    // drain, broadcasts and replies all share one ordered stream.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        debug!(game = game_id, player = player_id, "sender task ended");
    });

    state.registry.register(game_id, player_id, tx.clone());
    debug!(game = game_id, player = player_id, "websocket connected");

    // Catch up before accepting traffic: queued updates first, in FIFO
    // order, then drop the offline-roster entry (drain-then-clear), then
    // one more pass for anything enqueued in the removal window.
    if drain_mailbox(&state, game_id, player_id, &tx).await {
        if let Err(e) = state.mailbox.roster_remove(game_id, player_id).await {
            error!(
                game = game_id,
                player = player_id,
                "failed to clear offline roster entry: {e:#}"
            );
        }
        drain_mailbox(&state, game_id, player_id, &tx).await;
    }

    let _ = tx.send(protocol::connect_ack());

    while let Some(msg_result) = receiver.next().await {
        let msg = match msg_result {
            Ok(m) => m,
            Err(e) => {
                warn!(game = game_id, player = player_id, "websocket error: {e}");
                break;
            }
        };

        match msg {
            Message::Text(text) => handle_frame(&state, game_id, player_id, &text, &tx).await,
            Message::Close(_) => {
                debug!(game = game_id, player = player_id, "close frame received");
                break;
            }
            // Transport-level pings and stray binary frames carry no
            // protocol meaning here.
            _ => {}
        }
    }

    // Disconnect path: mark offline first so updates accepted from
    // here on land in the mailbox, then leave the live table. A
    // replacement socket may own this (game, player) by now; a
    // superseded one skips the bookkeeping so the live connection
    // keeps its registration and the player stays off the roster.
    if state.registry.is_current(game_id, player_id, &tx) {
        if let Err(e) = state.mailbox.roster_add(game_id, player_id).await {
            error!(
                game = game_id,
                player = player_id,
                "failed to add offline roster entry: {e:#}"
            );
        }
        state.registry.deregister(game_id, player_id, &tx);
        debug!(game = game_id, player = player_id, "websocket disconnected");
    } else {
        debug!(game = game_id, player = player_id, "superseded socket closed");
    }
}

/// Pop and deliver every queued update in FIFO order. Returns false if
/// the store failed mid-drain; the roster entry is then left in place
/// so the remaining entries survive for the next reconnect.
async fn drain_mailbox(
    state: &AppState,
    game_id: i64,
    player_id: i64,
    tx: &mpsc::UnboundedSender<String>,
) -> bool {
    loop {
        match state.mailbox.mailbox_pop_front(game_id, player_id).await {
            Ok(Some(frame)) => {
                let _ = tx.send(frame);
            }
            Ok(None) => return true,
            Err(e) => {
                error!(
                    game = game_id,
                    player = player_id,
                    "mailbox drain aborted: {e:#}"
                );
                return false;
            }
        }
    }
}

/// One inbound frame, fully processed before the next is read.
async fn handle_frame(
    state: &AppState,
    game_id: i64,
    player_id: i64,
    text: &str,
    tx: &mpsc::UnboundedSender<String>,
) {
    let frame = match ClientFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(game = game_id, player = player_id, "dropping frame: {e}");
            return;
        }
    };

    match frame {
        ClientFrame::Heartbeat => {
            let _ = tx.send(protocol::thump());
        }
        ClientFrame::TaskUpdate(update) => {
            let resolution = match resolver::resolve(
                &state.store,
                update.id,
                update.completed_by.id,
                update.last_updated,
            ) {
                Ok(resolution) => resolution,
                Err(e) => {
                    warn!(game = game_id, player = player_id, "update not applied: {e}");
                    return;
                }
            };

            let snapshot = match resolution {
                Resolution::Applied(snapshot) => snapshot,
                Resolution::Rejected => {
                    debug!(
                        game = game_id,
                        player = player_id,
                        task = update.id,
                        "stale completion rejected"
                    );
                    return;
                }
            };

            deliver_update(state, snapshot.game_id, &TaskBroadcast { task: snapshot }).await;
        }
    }
}

/// Fan an accepted update out: a mailbox copy for every player on the
/// offline roster (snapshot taken here), a live copy for everyone
/// else. A player that is mid-reconnect sits in both groups and gets
/// the mailbox copy only, so no one ever receives an update twice.
async fn deliver_update(state: &AppState, game_id: i64, broadcast: &TaskBroadcast) {
    let frame = match serde_json::to_string(broadcast) {
        Ok(frame) => frame,
        Err(e) => {
            error!(game = game_id, "failed to serialize update frame: {e}");
            return;
        }
    };

    let offline: HashSet<i64> = match state.mailbox.roster_members(game_id).await {
        Ok(members) => members.into_iter().collect(),
        Err(e) => {
            // Broadcasting live-only here would silently lose the
            // update for offline players; abort the whole delivery
            // and let the client resubmit.
            error!(game = game_id, "roster snapshot failed, delivery aborted: {e:#}");
            return;
        }
    };

    for absent in &offline {
        if let Err(e) = state.mailbox.mailbox_append(game_id, *absent, &frame).await {
            error!(
                game = game_id,
                player = absent,
                "failed to enqueue update for offline player: {e:#}"
            );
        }
    }

    state.registry.broadcast_except(game_id, &offline, &frame);
}
