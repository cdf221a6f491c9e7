pub mod arithmetic;
pub mod geometry;
pub mod memory;
pub mod pattern;
pub mod tile_merge;

use serde::{Deserialize, Serialize};

use crate::progress::{
    ActivityKind, Clock, NewActivity, ProgressManager, ProgressStore, StoreError, UserProgress,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameKind {
    TileMerge,
    PatternPuzzle,
    AlgebraAdventure,
    SpeedMath,
    GeometryQuest,
    MathMemory,
}

impl GameKind {
    pub fn title(&self) -> &'static str {
        match self {
            GameKind::TileMerge => "Number Maze",
            GameKind::PatternPuzzle => "Pattern Puzzle",
            GameKind::AlgebraAdventure => "Algebra Adventure",
            GameKind::SpeedMath => "Speed Math",
            GameKind::GeometryQuest => "Geometry Quest",
            GameKind::MathMemory => "Math Memory",
        }
    }
}

/// What a finished game hands back to whoever is running it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameReport {
    pub kind: GameKind,
    pub score: u32,
}

/// XP paid out for a final game score. Any nonzero score is worth at least 1.
pub fn xp_for_score(score: u32) -> u32 {
    match score {
        0 => 0,
        s => (s / 10).max(1),
    }
}

/// Turns a finished game into XP and an entry in the activity feed.
pub fn record_game<S, C>(
    manager: &ProgressManager<S, C>,
    report: &GameReport,
) -> Result<UserProgress, StoreError>
where
    S: ProgressStore,
    C: Clock,
{
    let xp = xp_for_score(report.score);
    log::info!(
        "{} finished with score {} ({} xp)",
        report.kind.title(),
        report.score,
        xp
    );
    if xp > 0 {
        manager.add_xp(xp)?;
    }
    manager.add_activity(
        NewActivity::new(ActivityKind::Game, report.kind.title())
            .with_score(report.score.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ManualClock, MemoryStore};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_xp_for_score() {
        assert_eq!(xp_for_score(0), 0);
        assert_eq!(xp_for_score(4), 1);
        assert_eq!(xp_for_score(1234), 123);
    }

    #[test]
    fn test_record_game_adds_xp_and_activity() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap());
        let manager = ProgressManager::with_clock(MemoryStore::new(), &clock);
        let report = GameReport {
            kind: GameKind::TileMerge,
            score: 1340,
        };
        let p = record_game(&manager, &report).unwrap();
        // 134 xp: one level (100), 34 carried over.
        assert_eq!((p.level, p.xp), (2, 34));
        let latest = &p.recent_activity[0];
        assert_eq!(latest.kind, ActivityKind::Game);
        assert_eq!(latest.title, "Number Maze");
        assert_eq!(latest.score.as_deref(), Some("1340"));
    }

    #[test]
    fn test_record_game_for_geometry_quest() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap());
        let manager = ProgressManager::with_clock(MemoryStore::new(), &clock);
        let report = GameReport {
            kind: GameKind::GeometryQuest,
            score: 150,
        };
        let p = record_game(&manager, &report).unwrap();
        assert_eq!(p.xp, 15);
        assert_eq!(p.recent_activity[0].title, "Geometry Quest");
    }
}
