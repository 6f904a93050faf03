use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::store::{GameStore, Task};
use crate::websocket::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePlayerRequest {
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct PublishGameRequest {
    pub data: PublishGameData,
}

#[derive(Debug, Deserialize)]
pub struct PublishGameData {
    pub player_id: i64,
    pub title: String,
    /// Grid of cell values, row-major.
    pub values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct JoinGameRequest {
    pub data: JoinGameData,
}

#[derive(Debug, Deserialize)]
pub struct JoinGameData {
    pub code: String,
    pub player: JoinGamePlayer,
}

#[derive(Debug, Deserialize)]
pub struct JoinGamePlayer {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct PlayerJson {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TaskJson {
    pub id: i64,
    pub value: String,
    pub grid_row: u32,
    pub grid_column: u32,
    pub last_updated: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_by: Option<String>,
    pub game: i64,
}

#[derive(Debug, Serialize)]
pub struct GameJson {
    pub id: i64,
    pub title: String,
    pub code: String,
    pub players: Vec<PlayerJson>,
    /// Tasks grouped by grid row, rows sorted ascending.
    pub tasks: Vec<Vec<TaskJson>>,
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn create_player(
    State(state): State<AppState>,
    Json(req): Json<CreatePlayerRequest>,
) -> Response {
    let player = state.store.create_player(&req.data);
    success(json!({
        "player": PlayerJson { id: player.id, name: player.name },
    }))
}

pub async fn publish_game(
    State(state): State<AppState>,
    Json(req): Json<PublishGameRequest>,
) -> Response {
    let data = req.data;
    if state.store.player(data.player_id).is_none() {
        warn!(player = data.player_id, "publish_game for unknown player");
        return not_found("Player not found");
    }

    let game = state.store.create_game(&data.title);
    state.store.create_tasks(game.id, &data.values);
    state.store.add_player_to_game(game.id, data.player_id);

    match game_json(&state.store, game.id) {
        Some(game) => success(json!({ "game": game })),
        None => unexpected_error(),
    }
}

pub async fn join_game(
    State(state): State<AppState>,
    Json(req): Json<JoinGameRequest>,
) -> Response {
    let data = req.data;
    let Some(game) = state.store.game_by_code(&data.code) else {
        return not_found("Game not found or game has no players");
    };
    if state.store.player(data.player.id).is_none() {
        return not_found("Player not found");
    }
    state.store.add_player_to_game(game.id, data.player.id);

    match game_json(&state.store, game.id) {
        Some(game) => success(json!({ "game": game })),
        None => unexpected_error(),
    }
}

fn game_json(store: &GameStore, game_id: i64) -> Option<GameJson> {
    let game = store.game(game_id)?;
    let players = game
        .players
        .iter()
        .filter_map(|id| store.player(*id))
        .map(|p| PlayerJson {
            id: p.id,
            name: p.name,
        })
        .collect();
    Some(GameJson {
        id: game.id,
        title: game.title,
        code: game.code,
        players,
        tasks: group_by_row(store.tasks_of_game(game_id), store),
    })
}

/// Group a game's tasks into rows for the board response. Input is
/// already sorted by (row, column).
fn group_by_row(tasks: Vec<Task>, store: &GameStore) -> Vec<Vec<TaskJson>> {
    let mut rows: Vec<Vec<TaskJson>> = Vec::new();
    let mut current_row: Option<u32> = None;
    for task in tasks {
        let completed_by = task
            .completed_by
            .and_then(|id| store.player(id))
            .map(|p| p.name);
        let entry = TaskJson {
            id: task.id,
            value: task.value,
            grid_row: task.grid_row,
            grid_column: task.grid_column,
            last_updated: task.last_updated,
            completed: task.completed,
            completed_by,
            game: task.game_id,
        };
        if current_row != Some(task.grid_row) {
            rows.push(Vec::new());
            current_row = Some(task.grid_row);
        }
        rows.last_mut().expect("row pushed above").push(entry);
    }
    rows
}

fn success(mut body: serde_json::Value) -> Response {
    body["status"] = json!("success");
    (StatusCode::OK, Json(body)).into_response()
}

fn not_found(message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"status": "error", "message": message})),
    )
        .into_response()
}

fn unexpected_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"status": "error", "message": "Unexpected Error"})),
    )
        .into_response()
}
