use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, Rng};
use std::sync::atomic::{AtomicI64, Ordering};

const JOIN_CODE_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Game {
    pub id: i64,
    pub title: String,
    pub code: String,
    pub players: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: i64,
    pub value: String,
    pub grid_row: u32,
    pub grid_column: u32,
    pub completed: bool,
    pub completed_by: Option<i64>,
    pub last_updated: Option<DateTime<Utc>>,
    pub game_id: i64,
}

/// In-process authoritative store for games, players and tasks.
///
/// `update_task` is the only write path for task state and is atomic
/// per task: the mutator runs under that key's map guard, so two
/// updates of the same task never interleave their read and write.
#[derive(Default)]
pub struct GameStore {
    players: DashMap<i64, Player>,
    games: DashMap<i64, Game>,
    tasks: DashMap<i64, Task>,
    codes: DashMap<String, i64>,
    next_id: AtomicI64,
}

impl GameStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn create_player(&self, name: &str) -> Player {
        let player = Player {
            id: self.allocate_id(),
            name: name.to_string(),
        };
        self.players.insert(player.id, player.clone());
        player
    }

    pub fn player(&self, player_id: i64) -> Option<Player> {
        self.players.get(&player_id).map(|p| p.value().clone())
    }

    /// Create a game with a unique join code, retrying on collision.
    pub fn create_game(&self, title: &str) -> Game {
        let id = self.allocate_id();
        loop {
            let code = generate_join_code();
            match self.codes.entry(code.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
            let game = Game {
                id,
                title: title.to_string(),
                code,
                players: Vec::new(),
            };
            self.games.insert(id, game.clone());
            return game;
        }
    }

    pub fn game(&self, game_id: i64) -> Option<Game> {
        self.games.get(&game_id).map(|g| g.value().clone())
    }

    pub fn game_by_code(&self, code: &str) -> Option<Game> {
        let id = *self.codes.get(code)?;
        self.game(id)
    }

    pub fn add_player_to_game(&self, game_id: i64, player_id: i64) -> Option<Game> {
        let mut game = self.games.get_mut(&game_id)?;
        if !game.players.contains(&player_id) {
            game.players.push(player_id);
        }
        Some(game.value().clone())
    }

    /// Create one task per cell of the value grid, row-major.
    pub fn create_tasks(&self, game_id: i64, values: &[Vec<String>]) -> Vec<Task> {
        let mut created = Vec::new();
        for (row, columns) in values.iter().enumerate() {
            for (column, value) in columns.iter().enumerate() {
                let task = Task {
                    id: self.allocate_id(),
                    value: value.clone(),
                    grid_row: row as u32,
                    grid_column: column as u32,
                    completed: false,
                    completed_by: None,
                    last_updated: None,
                    game_id,
                };
                self.tasks.insert(task.id, task.clone());
                created.push(task);
            }
        }
        created
    }

    pub fn task(&self, task_id: i64) -> Option<Task> {
        self.tasks.get(&task_id).map(|t| t.value().clone())
    }

    /// Atomic read-modify-write of one task. Returns the post-update
    /// state, or None if the task does not exist.
    pub fn update_task<F>(&self, task_id: i64, mutator: F) -> Option<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut task = self.tasks.get_mut(&task_id)?;
        mutator(&mut task);
        Some(task.value().clone())
    }

    pub fn tasks_of_game(&self, game_id: i64) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.game_id == game_id)
            .map(|t| t.value().clone())
            .collect();
        tasks.sort_by_key(|t| (t.grid_row, t.grid_column));
        tasks
    }
}

fn generate_join_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(JOIN_CODE_LEN)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect()
}
