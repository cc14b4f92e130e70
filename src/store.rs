use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::game::{Game, GameSnapshot, SnapshotError};
use crate::puzzle::PuzzleCatalog;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("File error: {0}")]
    FileError(String),
    #[error("Invalid game data: {0}")]
    InvalidData(String),
    #[error("Game {game_id} references missing puzzle {puzzle_id}")]
    DanglingPuzzleReference { game_id: Uuid, puzzle_id: u32 },
    #[error("Duplicate game for puzzle {puzzle_id}; keeping game {kept}")]
    DuplicateGame { puzzle_id: u32, kept: Uuid },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// A persisted game that was skipped at load time. The load itself still
/// succeeds; these are reported so the caller can log them.
#[derive(Debug)]
pub struct LoadWarning {
    pub game_id: Uuid,
    pub error: StoreError,
}

/// Durable storage for games: one JSON file mapping game id to snapshot,
/// rewritten on every state-changing guess.
///
/// Games reference their puzzle by id only; rehydration resolves the id
/// against the current catalog.
#[derive(Debug)]
pub struct GameStore {
    path: PathBuf,
    snapshots: HashMap<Uuid, GameSnapshot>,
}

impl GameStore {
    /// Opens the store file, or starts empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let snapshots = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| StoreError::FileError(e.to_string()))?;
            serde_json::from_str(&content).map_err(|e| StoreError::InvalidData(e.to_string()))?
        } else {
            HashMap::new()
        };
        Ok(Self { path, snapshots })
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Rebuilds every stored game against the catalog.
    ///
    /// A game whose puzzle has disappeared, or whose snapshot no longer
    /// matches its puzzle, is excluded and reported as a warning instead of
    /// failing the whole load.
    pub fn load_all(&self, catalog: &PuzzleCatalog) -> (Vec<Game>, Vec<LoadWarning>) {
        let mut games = Vec::with_capacity(self.snapshots.len());
        let mut warnings = Vec::new();
        for snapshot in self.snapshots.values() {
            let game_id = snapshot.id;
            match self.rehydrate(snapshot.clone(), catalog) {
                Ok(game) => games.push(game),
                Err(error) => warnings.push(LoadWarning { game_id, error }),
            }
        }
        (games, warnings)
    }

    fn rehydrate(&self, snapshot: GameSnapshot, catalog: &PuzzleCatalog) -> Result<Game, StoreError> {
        let puzzle = catalog
            .get(snapshot.puzzle_id)
            .ok_or(StoreError::DanglingPuzzleReference {
                game_id: snapshot.id,
                puzzle_id: snapshot.puzzle_id,
            })?;
        Ok(Game::from_snapshot(snapshot, puzzle.clone())?)
    }

    /// Write-through save: the snapshot is durable once this returns.
    pub fn save(&mut self, game: &Game) -> Result<(), StoreError> {
        self.snapshots.insert(game.id(), game.snapshot());
        let json = serde_json::to_string_pretty(&self.snapshots)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| StoreError::FileError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::{Color, Group, Puzzle};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn puzzle(id: u32, day: u32, prefix: &str) -> Puzzle {
        let items = |suffixes: [&str; 4]| {
            suffixes
                .into_iter()
                .map(|s| format!("{prefix}{s}"))
                .collect()
        };
        Puzzle::new(
            id,
            NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            "ada",
            vec![
                Group::new(Color::Yellow, "First", items(["A", "B", "C", "D"])),
                Group::new(Color::Green, "Second", items(["E", "F", "G", "H"])),
                Group::new(Color::Blue, "Third", items(["I", "J", "K", "L"])),
                Group::new(Color::Purple, "Fourth", items(["M", "N", "O", "P"])),
            ],
        )
        .unwrap()
    }

    fn catalog() -> PuzzleCatalog {
        PuzzleCatalog::from_puzzles(vec![puzzle(0, 1, ""), puzzle(1, 2, "x")]).unwrap()
    }

    #[test]
    fn games_survive_reopening_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        let catalog = catalog();

        let mut store = GameStore::open(&path).unwrap();
        assert!(store.is_empty());

        let mut game = Game::new(catalog.get(0).unwrap().clone());
        game.guess(&["A", "B", "C", "D"]).unwrap();
        game.guess(&["E", "F", "G", "M"]).unwrap();
        store.save(&game).unwrap();

        let reopened = GameStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        let (games, warnings) = reopened.load_all(&catalog);
        assert!(warnings.is_empty());
        assert_eq!(games.len(), 1);

        let restored = &games[0];
        assert_eq!(restored.id(), game.id());
        assert_eq!(restored.shuffled_items(), game.shuffled_items());
        assert_eq!(restored.solved_colors(), &[Color::Yellow]);
        assert_eq!(restored.attempts_remaining(), 3);
        assert_eq!(restored.guess_report(), game.guess_report());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        let catalog = catalog();

        let mut store = GameStore::open(&path).unwrap();
        let mut game = Game::new(catalog.get(0).unwrap().clone());
        store.save(&game).unwrap();
        game.guess(&["A", "B", "C", "E"]).unwrap();
        store.save(&game).unwrap();

        let (games, _) = GameStore::open(&path).unwrap().load_all(&catalog);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].attempts_remaining(), 3);
    }

    #[test]
    fn dangling_puzzle_reference_excludes_only_that_game() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        let catalog = catalog();

        let mut store = GameStore::open(&path).unwrap();
        let kept = Game::new(catalog.get(0).unwrap().clone());
        let orphan = Game::new(Arc::new(puzzle(9, 3, "z")));
        store.save(&kept).unwrap();
        store.save(&orphan).unwrap();

        let (games, warnings) = GameStore::open(&path).unwrap().load_all(&catalog);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id(), kept.id());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].game_id, orphan.id());
        assert!(matches!(
            warnings[0].error,
            StoreError::DanglingPuzzleReference { puzzle_id: 9, .. }
        ));
    }

    #[test]
    fn corrupt_store_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(GameStore::open(&path), Err(StoreError::InvalidData(_))));
    }
}
