use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of category groups in every puzzle, one per [`Color`].
pub const GROUP_COUNT: usize = 4;
/// Number of items in every group.
pub const ITEMS_PER_GROUP: usize = 4;

#[derive(Debug, Error)]
pub enum PuzzleError {
    #[error("File error: {0}")]
    FileError(String),
    #[error("Invalid puzzle definition: {0}")]
    InvalidDefinition(String),
    #[error("Puzzle {puzzle_id}: expected {GROUP_COUNT} groups, got {count}")]
    WrongGroupCount { puzzle_id: u32, count: usize },
    #[error("Puzzle {puzzle_id}: no {color} group")]
    MissingColor { puzzle_id: u32, color: Color },
    #[error("Puzzle {puzzle_id}: {color} group has {count} items, expected {ITEMS_PER_GROUP}")]
    WrongItemCount {
        puzzle_id: u32,
        color: Color,
        count: usize,
    },
    #[error("Puzzle {puzzle_id}: item {item:?} appears in more than one group")]
    DuplicateItem { puzzle_id: u32, item: String },
    #[error("Puzzles {first} and {second} share the date {date}")]
    DuplicateDate {
        first: u32,
        second: u32,
        date: NaiveDate,
    },
}

/// The four fixed category colors, from the conventionally easiest group to
/// the hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
    Yellow,
    Green,
    Blue,
    Purple,
}

impl Color {
    pub const ALL: [Color; GROUP_COUNT] = [Color::Yellow, Color::Green, Color::Blue, Color::Purple];

    pub fn name(self) -> &'static str {
        match self {
            Color::Yellow => "YELLOW",
            Color::Green => "GREEN",
            Color::Blue => "BLUE",
            Color::Purple => "PURPLE",
        }
    }

    /// The colored square used when rendering a guess report.
    pub fn symbol(self) -> char {
        match self {
            Color::Yellow => '🟨',
            Color::Green => '🟩',
            Color::Blue => '🟦',
            Color::Purple => '🟪',
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One category within a puzzle: a color, a human-readable label, and its
/// four items. Within a puzzle the color is the group's identity.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    color: Color,
    category: String,
    items: Vec<String>,
}

impl Group {
    pub fn new(color: Color, category: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            color,
            category: category.into(),
            items,
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }
}

/// An immutable daily challenge: four groups covering sixteen distinct items.
///
/// All invariants are checked once in [`Puzzle::new`]; guess evaluation can
/// assume that every item belongs to exactly one group.
#[derive(Debug, Clone)]
pub struct Puzzle {
    id: u32,
    date: NaiveDate,
    author: String,
    // Always in Color::ALL order.
    groups: Vec<Group>,
    item_colors: HashMap<String, Color>,
}

impl Puzzle {
    pub fn new(
        id: u32,
        date: NaiveDate,
        author: impl Into<String>,
        groups: Vec<Group>,
    ) -> Result<Self, PuzzleError> {
        if groups.len() != GROUP_COUNT {
            return Err(PuzzleError::WrongGroupCount {
                puzzle_id: id,
                count: groups.len(),
            });
        }
        let mut ordered = Vec::with_capacity(GROUP_COUNT);
        for color in Color::ALL {
            let group = groups
                .iter()
                .find(|group| group.color == color)
                .ok_or(PuzzleError::MissingColor { puzzle_id: id, color })?;
            if group.items.len() != ITEMS_PER_GROUP {
                return Err(PuzzleError::WrongItemCount {
                    puzzle_id: id,
                    color,
                    count: group.items.len(),
                });
            }
            ordered.push(group.clone());
        }

        let mut item_colors = HashMap::with_capacity(GROUP_COUNT * ITEMS_PER_GROUP);
        for group in &ordered {
            for item in &group.items {
                if item_colors.insert(item.clone(), group.color).is_some() {
                    return Err(PuzzleError::DuplicateItem {
                        puzzle_id: id,
                        item: item.clone(),
                    });
                }
            }
        }

        Ok(Self {
            id,
            date,
            author: author.into(),
            groups: ordered,
            item_colors,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// The groups in fixed [`Color::ALL`] order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, color: Color) -> &Group {
        // Puzzle::new stores one group per color in Color::ALL order.
        let index = Color::ALL.iter().position(|&c| c == color).unwrap_or_default();
        &self.groups[index]
    }

    /// The color of the group owning `item`, if the item is part of this
    /// puzzle at all.
    pub fn color_of(&self, item: &str) -> Option<Color> {
        self.item_colors.get(item).copied()
    }

    pub fn group_containing(&self, item: &str) -> Option<&Group> {
        self.color_of(item).map(|color| self.group(color))
    }

    /// The full item pool in canonical order: groups in color order, each
    /// group's items in definition order.
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|group| group.items.iter().map(String::as_str))
    }
}

/// On-disk shape of one puzzle, keyed by color name exactly as the puzzle
/// file stores it. Ids are assigned from array position at load time.
#[derive(Debug, Deserialize)]
struct RawPuzzle {
    date: NaiveDate,
    author: String,
    solution: BTreeMap<Color, RawGroup>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    category: String,
    items: Vec<String>,
}

/// The full, validated puzzle set, loaded once at startup.
///
/// Loading fails on the first invariant violation rather than serving a
/// corrupt puzzle.
#[derive(Debug, Clone)]
pub struct PuzzleCatalog {
    puzzles: Vec<Arc<Puzzle>>,
}

impl PuzzleCatalog {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, PuzzleError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PuzzleError::FileError(e.to_string()))?;
        let raw: Vec<RawPuzzle> = serde_json::from_str(&content)
            .map_err(|e| PuzzleError::InvalidDefinition(e.to_string()))?;

        let mut puzzles = Vec::with_capacity(raw.len());
        for (id, raw_puzzle) in raw.into_iter().enumerate() {
            let groups = raw_puzzle
                .solution
                .into_iter()
                .map(|(color, group)| Group::new(color, group.category, group.items))
                .collect();
            puzzles.push(Puzzle::new(
                id as u32,
                raw_puzzle.date,
                raw_puzzle.author,
                groups,
            )?);
        }
        Self::from_puzzles(puzzles)
    }

    pub fn from_puzzles(puzzles: Vec<Puzzle>) -> Result<Self, PuzzleError> {
        let mut by_date: HashMap<NaiveDate, u32> = HashMap::new();
        for puzzle in &puzzles {
            if let Some(&first) = by_date.get(&puzzle.date) {
                return Err(PuzzleError::DuplicateDate {
                    first,
                    second: puzzle.id,
                    date: puzzle.date,
                });
            }
            by_date.insert(puzzle.date, puzzle.id);
        }
        Ok(Self {
            puzzles: puzzles.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Arc<Puzzle>> {
        self.puzzles.iter().find(|puzzle| puzzle.id == id)
    }

    pub fn by_date(&self, date: NaiveDate) -> Option<&Arc<Puzzle>> {
        self.puzzles.iter().find(|puzzle| puzzle.date == date)
    }

    /// Puzzles whose date has arrived. Future-dated puzzles stay invisible
    /// until their day; this is the release gate, not a scheduler.
    pub fn available(&self, today: NaiveDate) -> impl Iterator<Item = &Arc<Puzzle>> {
        self.puzzles
            .iter()
            .filter(move |puzzle| puzzle.date <= today)
    }
}
