use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::protocol::{CompleterInfo, TaskSnapshot};
use crate::store::GameStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("task {0} not found")]
    TaskNotFound(i64),
    #[error("player {0} not found")]
    PlayerNotFound(i64),
}

/// Outcome of applying a candidate completion against current state.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The update was applied; broadcast this snapshot.
    Applied(TaskSnapshot),
    /// A chronologically earlier completion already holds the task.
    Rejected,
}

/// Decide whether a candidate completion supersedes the stored state.
///
/// An incomplete task accepts any valid completion. A completed task
/// accepts only candidates whose timestamp is strictly earlier than
/// the recorded one: the chronologically first completion is
/// authoritative even when its message arrives out of network order.
pub fn resolve(
    store: &GameStore,
    task_id: i64,
    player_id: i64,
    candidate: DateTime<Utc>,
) -> Result<Resolution, ResolveError> {
    if store.task(task_id).is_none() {
        return Err(ResolveError::TaskNotFound(task_id));
    }
    let player = store
        .player(player_id)
        .ok_or(ResolveError::PlayerNotFound(player_id))?;

    let mut applied = false;
    let task = store
        .update_task(task_id, |task| {
            let superseded = match task.last_updated {
                Some(recorded) if task.completed => candidate < recorded,
                _ => true,
            };
            if superseded {
                task.completed = true;
                task.completed_by = Some(player.id);
                task.last_updated = Some(candidate);
                applied = true;
            }
        })
        .ok_or(ResolveError::TaskNotFound(task_id))?;

    if !applied {
        debug!(
            task = task_id,
            player = player_id,
            "completion rejected, earlier completion already recorded"
        );
        return Ok(Resolution::Rejected);
    }

    Ok(Resolution::Applied(TaskSnapshot {
        id: task.id,
        value: task.value,
        grid_row: task.grid_row,
        grid_column: task.grid_column,
        last_updated: candidate,
        completed: true,
        completed_by: CompleterInfo {
            id: player.id,
            name: player.name,
        },
        game_id: task.game_id,
    }))
}
