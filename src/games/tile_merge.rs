//! 4×4 sliding tile puzzle ("Number Maze"): equal tiles merge into their sum,
//! a new 2 or 4 appears after every move that changed the board.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{GameKind, GameReport};

pub const SIZE: usize = 4;
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 300;
/// Probability that a spawned tile is a 2 rather than a 4.
pub const SPAWN_TWO_PROBABILITY: f64 = 0.9;
/// Combo length that has to be exceeded before bonus points are paid.
pub const COMBO_THRESHOLD: u32 = 2;
pub const COMBO_BONUS: u32 = 10;
pub const EFFICIENCY_MIN_MOVES: u32 = 20;
pub const EFFICIENCY_POINTS_PER_MOVE: u32 = 10;

pub type Grid = [[u32; SIZE]; SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Grid coordinates of line `index`, ordered so that tiles slide toward
    /// the first coordinate.
    fn line(self, index: usize) -> [(usize, usize); SIZE] {
        std::array::from_fn(|k| match self {
            Direction::Left => (index, k),
            Direction::Right => (index, SIZE - 1 - k),
            Direction::Up => (k, index),
            Direction::Down => (SIZE - 1 - k, index),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMerge {
    pub line: [u32; SIZE],
    pub gained: u32,
    pub merges: u32,
}

/// Slides a line toward index 0. A tile produced by a merge does not merge
/// again in the same move, so `[2, 2, 2, 2]` becomes `[4, 4, 0, 0]`.
pub fn merge_line(line: [u32; SIZE]) -> LineMerge {
    let tiles: Vec<u32> = line.iter().copied().filter(|&v| v != 0).collect();
    let mut out = [0; SIZE];
    let mut gained = 0;
    let mut merges = 0;
    let mut write = 0;
    let mut i = 0;
    while i < tiles.len() {
        if i + 1 < tiles.len() && tiles[i] == tiles[i + 1] {
            let sum = tiles[i] * 2;
            out[write] = sum;
            gained += sum;
            merges += 1;
            i += 2;
        } else {
            out[write] = tiles[i];
            i += 1;
        }
        write += 1;
    }
    LineMerge {
        line: out,
        gained,
        merges,
    }
}

/// Full board with no pair of equal neighbours.
pub fn is_stuck(grid: &Grid) -> bool {
    for r in 0..SIZE {
        for c in 0..SIZE {
            let v = grid[r][c];
            if v == 0 {
                return false;
            }
            if r + 1 < SIZE && grid[r + 1][c] == v {
                return false;
            }
            if c + 1 < SIZE && grid[r][c + 1] == v {
                return false;
            }
        }
    }
    true
}

/// Drops a 2 (or sometimes a 4) into a random empty cell. Returns the cell
/// used, or `None` if the board is full.
pub fn spawn_tile<R: Rng + ?Sized>(grid: &mut Grid, rng: &mut R) -> Option<(usize, usize)> {
    let empty: Vec<(usize, usize)> = (0..SIZE)
        .flat_map(|r| (0..SIZE).map(move |c| (r, c)))
        .filter(|&(r, c)| grid[r][c] == 0)
        .collect();
    if empty.is_empty() {
        return None;
    }
    let (r, c) = empty[rng.gen_range(0..empty.len())];
    grid[r][c] = if rng.gen_bool(SPAWN_TWO_PROBABILITY) { 2 } else { 4 };
    Some((r, c))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PuzzleAchievement {
    Tile512,
    Tile1024,
    Tile2048,
    EfficientMerger,
    ComboStreak,
}

impl PuzzleAchievement {
    pub fn name(&self) -> &'static str {
        match self {
            PuzzleAchievement::Tile512 => "Tile 512",
            PuzzleAchievement::Tile1024 => "Tile 1024",
            PuzzleAchievement::Tile2048 => "Tile 2048",
            PuzzleAchievement::EfficientMerger => "Efficient Merger",
            PuzzleAchievement::ComboStreak => "Combo Streak",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    NoMovesLeft,
    TimeUp,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PuzzleState {
    Playing,
    GameOver(EndReason),
}

/// Result of one move request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveSummary {
    /// Whether any tile changed. Nothing else happens when this is `false`.
    pub moved: bool,
    pub gained: u32,
    pub merges: u32,
    pub combo_bonus: u32,
    pub unlocked: Vec<PuzzleAchievement>,
    /// Set on the move (or timer check) that ended the game.
    pub finished: Option<GameReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePuzzle {
    grid: Grid,
    score: u32,
    moves: u32,
    combo: u32,
    state: PuzzleState,
    started_at: DateTime<Utc>,
    time_limit_secs: u32,
    achievements: Vec<PuzzleAchievement>,
}

impl TilePuzzle {
    /// Empty board with two starting tiles.
    pub fn new<R: Rng + ?Sized>(started_at: DateTime<Utc>, time_limit_secs: u32, rng: &mut R) -> Self {
        let mut grid = [[0; SIZE]; SIZE];
        spawn_tile(&mut grid, rng);
        spawn_tile(&mut grid, rng);
        Self::from_grid(grid, started_at, time_limit_secs)
    }

    /// Starts from an arbitrary board without spawning anything.
    pub fn from_grid(grid: Grid, started_at: DateTime<Utc>, time_limit_secs: u32) -> Self {
        Self {
            grid,
            score: 0,
            moves: 0,
            combo: 0,
            state: PuzzleState::Playing,
            started_at,
            time_limit_secs,
            achievements: Vec::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn state(&self) -> PuzzleState {
        self.state
    }

    pub fn is_over(&self) -> bool {
        matches!(self.state, PuzzleState::GameOver(_))
    }

    pub fn achievements(&self) -> &[PuzzleAchievement] {
        &self.achievements
    }

    pub fn highest_tile(&self) -> u32 {
        self.grid.iter().flatten().copied().max().unwrap_or(0)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let left = self.started_at + Duration::seconds(i64::from(self.time_limit_secs)) - now;
        left.max(Duration::zero())
    }

    fn report(&self) -> GameReport {
        GameReport {
            kind: GameKind::TileMerge,
            score: self.score,
        }
    }

    fn finish(&mut self, reason: EndReason) -> GameReport {
        log::debug!(
            "Tile puzzle over ({:?}): score {}, {} moves",
            reason,
            self.score,
            self.moves
        );
        self.state = PuzzleState::GameOver(reason);
        self.report()
    }

    /// Ends the game if the countdown has run out. Returns the report only on
    /// the call that ended it.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Option<GameReport> {
        if self.is_over() || self.remaining(now) > Duration::zero() {
            return None;
        }
        Some(self.finish(EndReason::TimeUp))
    }

    /// Player walked away. The score so far still counts.
    pub fn abandon(&mut self) -> Option<GameReport> {
        if self.is_over() {
            return None;
        }
        Some(self.finish(EndReason::Abandoned))
    }

    pub fn apply_move<R: Rng + ?Sized>(
        &mut self,
        direction: Direction,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> MoveSummary {
        let mut summary = MoveSummary::default();
        if let Some(report) = self.expire(now) {
            summary.finished = Some(report);
            return summary;
        }
        if self.is_over() {
            return summary;
        }

        let mut next = self.grid;
        for index in 0..SIZE {
            let coords = direction.line(index);
            let line = coords.map(|(r, c)| self.grid[r][c]);
            let merged = merge_line(line);
            if merged.line != line {
                summary.moved = true;
            }
            summary.gained += merged.gained;
            summary.merges += merged.merges;
            for (k, (r, c)) in coords.into_iter().enumerate() {
                next[r][c] = merged.line[k];
            }
        }
        if !summary.moved {
            return MoveSummary::default();
        }

        self.grid = next;
        self.moves += 1;
        self.score += summary.gained;
        if summary.merges > 1 {
            self.combo += 1;
        } else {
            self.combo = 0;
        }
        if self.combo > COMBO_THRESHOLD {
            summary.combo_bonus = self.combo * COMBO_BONUS;
            self.score += summary.combo_bonus;
        }
        spawn_tile(&mut self.grid, rng);

        summary.unlocked = self.check_achievements();
        if is_stuck(&self.grid) {
            summary.finished = Some(self.finish(EndReason::NoMovesLeft));
        }
        summary
    }

    fn check_achievements(&mut self) -> Vec<PuzzleAchievement> {
        let highest = self.highest_tile();
        let candidates = [
            (PuzzleAchievement::Tile512, highest >= 512),
            (PuzzleAchievement::Tile1024, highest >= 1024),
            (PuzzleAchievement::Tile2048, highest >= 2048),
            (
                PuzzleAchievement::EfficientMerger,
                self.moves >= EFFICIENCY_MIN_MOVES
                    && self.score >= self.moves * EFFICIENCY_POINTS_PER_MOVE,
            ),
            (PuzzleAchievement::ComboStreak, self.combo > COMBO_THRESHOLD),
        ];

        let mut unlocked = Vec::new();
        for (achievement, reached) in candidates {
            if reached && !self.achievements.contains(&achievement) {
                self.achievements.push(achievement);
                unlocked.push(achievement);
            }
        }
        unlocked
    }
}

impl fmt::Display for TilePuzzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.grid {
            let cells: Vec<String> = row
                .iter()
                .map(|&v| match v {
                    0 => format!("{:>5}", "·"),
                    v => format!("{:>5}", v),
                })
                .collect();
            writeln!(f, "{}", cells.join(""))?;
        }
        Ok(())
    }
}
