use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::puzzle::{Color, GROUP_COUNT, Group, ITEMS_PER_GROUP, Puzzle};

/// A game ends in failure after this many distinct incorrect guesses.
pub const MAX_INCORRECT_GUESSES: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("The puzzle is already solved")]
    AlreadySolved,
    #[error("No attempts remaining")]
    OutOfAttempts,
    #[error("A guess must contain exactly {ITEMS_PER_GROUP} distinct items, got {0}")]
    InvalidItemCount(usize),
    #[error("Item {0:?} is not an unsolved item of this puzzle")]
    InvalidItem(String),
}

/// Classification of one submitted guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuessOutcome {
    AlreadyGuessed,
    Incorrect,
    IncorrectOneAway,
    Correct,
}

impl GuessOutcome {
    /// Whether the guess was recorded, i.e. the game state changed and the
    /// caller must persist it.
    pub fn changes_state(self) -> bool {
        self != GuessOutcome::AlreadyGuessed
    }
}

/// A normalized guess: the chosen items as an order-independent set.
type GuessSet = BTreeSet<String>;

/// One player's session against one puzzle.
///
/// The presentation order of the grid is shuffled once at creation and never
/// again, so re-fetching the game always shows the same layout. All mutation
/// goes through [`Game::guess`], which either records the guess completely or
/// rejects it without touching any state.
#[derive(Debug, Clone)]
pub struct Game {
    id: Uuid,
    puzzle: Arc<Puzzle>,
    shuffled_items: Vec<String>,
    solved_colors: Vec<Color>,
    incorrect_guesses: HashSet<GuessSet>,
    correct_guesses: HashSet<GuessSet>,
    guess_report: Vec<Vec<Color>>,
}

impl Game {
    pub fn new(puzzle: Arc<Puzzle>) -> Self {
        Self::with_rng(puzzle, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(puzzle: Arc<Puzzle>, rng: &mut R) -> Self {
        let mut shuffled_items: Vec<String> = puzzle.items().map(String::from).collect();
        shuffled_items.shuffle(rng);
        Self {
            id: Uuid::new_v4(),
            puzzle,
            shuffled_items,
            solved_colors: Vec::new(),
            incorrect_guesses: HashSet::new(),
            correct_guesses: HashSet::new(),
            guess_report: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn puzzle(&self) -> &Arc<Puzzle> {
        &self.puzzle
    }

    /// The fixed presentation order of all sixteen items.
    pub fn shuffled_items(&self) -> &[String] {
        &self.shuffled_items
    }

    /// Colors of the solved groups, in the order they were solved.
    pub fn solved_colors(&self) -> &[Color] {
        &self.solved_colors
    }

    /// The solved groups in solve order, for the UI reveal sequence.
    pub fn solved_groups(&self) -> Vec<&Group> {
        self.solved_colors
            .iter()
            .map(|&color| self.puzzle.group(color))
            .collect()
    }

    /// The items still on the grid, in shuffle order.
    pub fn unsolved_items(&self) -> impl Iterator<Item = &str> {
        self.shuffled_items.iter().map(String::as_str).filter(|item| {
            // Every shuffled item comes from the puzzle pool.
            let color = self.puzzle.color_of(item);
            color.is_none_or(|color| !self.solved_colors.contains(&color))
        })
    }

    pub fn attempts_remaining(&self) -> usize {
        MAX_INCORRECT_GUESSES - self.incorrect_guesses.len()
    }

    pub fn solved(&self) -> bool {
        self.solved_colors.len() == GROUP_COUNT
    }

    pub fn failed(&self) -> bool {
        !self.solved() && self.attempts_remaining() == 0
    }

    /// Per-guess outcome history: for each recorded guess, the owning group
    /// color of every submitted item, in submission order.
    pub fn guess_report(&self) -> &[Vec<Color>] {
        &self.guess_report
    }

    /// The guess report rendered as colored-square lines, one per guess.
    pub fn report_lines(&self) -> Vec<String> {
        self.guess_report
            .iter()
            .map(|entry| entry.iter().map(|color| color.symbol()).collect())
            .collect()
    }

    /// Evaluates one submitted guess of four items.
    ///
    /// Item order does not matter: a guess is compared as a set against the
    /// full history, and resubmitting any previously recorded set returns
    /// [`GuessOutcome::AlreadyGuessed`] without consuming an attempt. A
    /// rejected guess (any `Err` return) records nothing.
    pub fn guess<S: AsRef<str>>(&mut self, items: &[S]) -> Result<GuessOutcome, GameError> {
        if self.solved() {
            return Err(GameError::AlreadySolved);
        }
        if self.attempts_remaining() == 0 {
            return Err(GameError::OutOfAttempts);
        }
        if items.len() != ITEMS_PER_GROUP {
            return Err(GameError::InvalidItemCount(items.len()));
        }
        let guess: GuessSet = items.iter().map(|item| item.as_ref().to_string()).collect();
        if guess.len() != ITEMS_PER_GROUP {
            // Duplicates collapsed during normalization.
            return Err(GameError::InvalidItemCount(guess.len()));
        }
        if self.incorrect_guesses.contains(&guess) || self.correct_guesses.contains(&guess) {
            return Ok(GuessOutcome::AlreadyGuessed);
        }

        let mut colors = Vec::with_capacity(ITEMS_PER_GROUP);
        for item in items {
            let item = item.as_ref();
            match self.puzzle.color_of(item) {
                Some(color) if !self.solved_colors.contains(&color) => colors.push(color),
                _ => return Err(GameError::InvalidItem(item.to_string())),
            }
        }

        let mut counts_by_color: HashMap<Color, usize> = HashMap::new();
        for &color in &colors {
            *counts_by_color.entry(color).or_insert(0) += 1;
        }
        let mut counts: Vec<usize> = counts_by_color.values().copied().collect();
        counts.sort_unstable();

        let outcome = if counts == [ITEMS_PER_GROUP] {
            self.correct_guesses.insert(guess);
            self.solved_colors.push(colors[0]);
            GuessOutcome::Correct
        } else if counts == [1, ITEMS_PER_GROUP - 1] {
            self.incorrect_guesses.insert(guess);
            GuessOutcome::IncorrectOneAway
        } else {
            self.incorrect_guesses.insert(guess);
            GuessOutcome::Incorrect
        };
        self.guess_report.push(colors);
        Ok(outcome)
    }

    /// The read model shipped to the caller on every state fetch and guess.
    pub fn view(&self) -> GameView {
        GameView {
            game_id: self.id,
            puzzle_id: self.puzzle.id(),
            items: self.unsolved_items().map(String::from).collect(),
            solved_groups: self.solved_groups().into_iter().cloned().collect(),
            attempts_remaining: self.attempts_remaining(),
            solved: self.solved(),
            failed: self.failed(),
            guess_report: self.guess_report.clone(),
        }
    }

    /// Flattens the game into its persistence form. The puzzle is referenced
    /// by id only, never embedded.
    pub fn snapshot(&self) -> GameSnapshot {
        let flatten = |guesses: &HashSet<GuessSet>| {
            let mut flat: Vec<Vec<String>> = guesses
                .iter()
                .map(|guess| guess.iter().cloned().collect())
                .collect();
            // Stable file output; the guesses themselves are unordered.
            flat.sort();
            flat
        };
        GameSnapshot {
            id: self.id,
            puzzle_id: self.puzzle.id(),
            shuffled_items: self.shuffled_items.clone(),
            solved_colors: self.solved_colors.clone(),
            incorrect_guesses: flatten(&self.incorrect_guesses),
            correct_guesses: flatten(&self.correct_guesses),
            guess_report: self.guess_report.clone(),
        }
    }

    /// Rebuilds a game from its snapshot against the puzzle the snapshot
    /// references. The caller resolves the puzzle id; this only checks that
    /// the resolved puzzle actually matches the recorded state.
    pub fn from_snapshot(snapshot: GameSnapshot, puzzle: Arc<Puzzle>) -> Result<Self, SnapshotError> {
        if snapshot.puzzle_id != puzzle.id() {
            return Err(SnapshotError::PuzzleMismatch {
                game_id: snapshot.id,
                expected: snapshot.puzzle_id,
                actual: puzzle.id(),
            });
        }
        let recorded: BTreeSet<&str> = snapshot.shuffled_items.iter().map(String::as_str).collect();
        let pool: BTreeSet<&str> = puzzle.items().collect();
        if recorded != pool || snapshot.shuffled_items.len() != pool.len() {
            return Err(SnapshotError::ItemPoolMismatch { game_id: snapshot.id });
        }
        Ok(Self {
            id: snapshot.id,
            puzzle,
            shuffled_items: snapshot.shuffled_items,
            solved_colors: snapshot.solved_colors,
            incorrect_guesses: snapshot
                .incorrect_guesses
                .into_iter()
                .map(|guess| guess.into_iter().collect())
                .collect(),
            correct_guesses: snapshot
                .correct_guesses
                .into_iter()
                .map(|guess| guess.into_iter().collect())
                .collect(),
            guess_report: snapshot.guess_report,
        })
    }
}

/// Caller-facing game state: everything the transport layer serializes back
/// to the player.
#[derive(Debug, Clone, Serialize)]
pub struct GameView {
    pub game_id: Uuid,
    pub puzzle_id: u32,
    /// Unsolved items in the fixed shuffle order.
    pub items: Vec<String>,
    /// Solved groups in solve order.
    pub solved_groups: Vec<Group>,
    pub attempts_remaining: usize,
    pub solved: bool,
    pub failed: bool,
    pub guess_report: Vec<Vec<Color>>,
}

/// Serializable form of a [`Game`]: primitives and a puzzle id reference
/// only, so persisted games survive restarts without embedding puzzle
/// content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub id: Uuid,
    pub puzzle_id: u32,
    pub shuffled_items: Vec<String>,
    pub solved_colors: Vec<Color>,
    pub incorrect_guesses: Vec<Vec<String>>,
    pub correct_guesses: Vec<Vec<String>>,
    pub guess_report: Vec<Vec<Color>>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Game {game_id} references puzzle {expected} but was rebuilt against puzzle {actual}")]
    PuzzleMismatch {
        game_id: Uuid,
        expected: u32,
        actual: u32,
    },
    #[error("Game {game_id}: recorded items do not match the puzzle's item pool")]
    ItemPoolMismatch { game_id: Uuid },
}
