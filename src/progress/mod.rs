//! Player progression: XP and levels, daily streaks, achievements, per-subject
//! completion and a weekly visit histogram.
//!
//! Every mutation on [`ProgressManager`] is a read-modify-write of a single
//! stored document. Whatever is stored last wins.

pub mod clock;
pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{JsonFileStore, MemoryStore, ProgressStore, StoreError};

use store::Decoded;

pub const RECENT_ACTIVITY_LIMIT: usize = 10;
pub const DEFAULT_TOTAL_XP: u32 = 100;
pub const PROBLEM_XP: u32 = 25;
pub const QUIZ_MASTER_THRESHOLD: u32 = 5;
pub const PROBLEM_SOLVER_THRESHOLD: u32 = 10;
pub const STREAK_ACHIEVEMENT_DAYS: u32 = 7;

/// Names in the fixed achievement catalog.
pub mod achievements {
    pub const FIRST_LOGIN: &str = "First Login";
    pub const QUIZ_MASTER: &str = "Quiz Master";
    pub const PROBLEM_SOLVER: &str = "Problem Solver";
    pub const SEVEN_DAY_STREAK: &str = "7 Day Streak";
    pub const VISUALIZER_PRO: &str = "Math Visualizer Pro";
    pub const VR_EXPLORER: &str = "VR Explorer";

    pub const CATALOG: [&str; 6] = [
        FIRST_LOGIN,
        QUIZ_MASTER,
        PROBLEM_SOLVER,
        SEVEN_DAY_STREAK,
        VISUALIZER_PRO,
        VR_EXPLORER,
    ];
}

/// `(subject, total lessons)` seeded into every fresh profile.
pub const SUBJECT_CATALOG: [(&str, u32); 4] = [
    ("algebra", 10),
    ("geometry", 8),
    ("calculus", 12),
    ("statistics", 6),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Quiz,
    Problem,
    Visualizer,
    Lesson,
    Game,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    pub date: DateTime<Utc>,
}

/// An activity before it has been stamped with a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub title: String,
    pub score: Option<String>,
}

impl NewActivity {
    pub fn new(kind: ActivityKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: impl Into<String>) -> Self {
        self.score = Some(score.into());
        self
    }

    fn stamp(self, date: DateTime<Utc>) -> Activity {
        Activity {
            kind: self.kind,
            title: self.title,
            score: self.score,
            date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub name: String,
    pub earned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProgress {
    pub completed: u32,
    pub total: u32,
    pub last_accessed: DateTime<Utc>,
}

const WEEKDAY_KEYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Visit counter per weekday, stored as `{"mon": n, ..., "sun": n}`.
///
/// Reading also accepts full day names and `null` counters, which is what
/// older snapshots contain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Option<u32>>",
    into = "BTreeMap<String, u32>"
)]
pub struct WeeklyStats {
    counts: [u32; 7],
}

impl WeeklyStats {
    pub fn get(&self, day: Weekday) -> u32 {
        self.counts[day.num_days_from_monday() as usize]
    }

    pub fn bump(&mut self, day: Weekday) {
        let slot = &mut self.counts[day.num_days_from_monday() as usize];
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// `(short name, count)` from Monday to Sunday.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        WEEKDAY_KEYS.iter().copied().zip(self.counts.iter().copied())
    }
}

impl From<BTreeMap<String, Option<u32>>> for WeeklyStats {
    fn from(map: BTreeMap<String, Option<u32>>) -> Self {
        let mut stats = WeeklyStats::default();
        for (key, count) in map {
            match key.parse::<Weekday>() {
                Ok(day) => {
                    let slot = &mut stats.counts[day.num_days_from_monday() as usize];
                    *slot = slot.saturating_add(count.unwrap_or(0));
                }
                Err(_) => log::debug!("Ignoring unknown weekday key {:?}", key),
            }
        }
        stats
    }
}

impl From<WeeklyStats> for BTreeMap<String, u32> {
    fn from(stats: WeeklyStats) -> Self {
        stats.iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub level: u32,
    pub xp: u32,
    /// XP needed to reach the next level.
    pub total_xp: u32,
    pub streak: u32,
    pub last_login_date: DateTime<Utc>,
    pub completed_lessons: u32,
    pub total_lessons: u32,
    pub quizzes_passed: u32,
    pub total_quizzes: u32,
    pub problems_solved: u32,
    pub total_problems: u32,
    /// Most recent first.
    pub recent_activity: Vec<Activity>,
    pub achievements: Vec<Achievement>,
    pub subject_progress: BTreeMap<String, SubjectProgress>,
    pub weekly_stats: WeeklyStats,
}

impl UserProgress {
    /// A fresh profile as of `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            level: 1,
            xp: 0,
            total_xp: DEFAULT_TOTAL_XP,
            streak: 1,
            last_login_date: now,
            completed_lessons: 0,
            total_lessons: 20,
            quizzes_passed: 0,
            total_quizzes: 10,
            problems_solved: 0,
            total_problems: 30,
            recent_activity: Vec::new(),
            achievements: achievements::CATALOG
                .iter()
                .map(|name| Achievement {
                    name: name.to_string(),
                    earned: false,
                    date: None,
                })
                .collect(),
            subject_progress: SUBJECT_CATALOG
                .iter()
                .map(|(name, total)| {
                    (
                        name.to_string(),
                        SubjectProgress {
                            completed: 0,
                            total: *total,
                            last_accessed: now,
                        },
                    )
                })
                .collect(),
            weekly_stats: WeeklyStats::default(),
        }
    }

    pub fn is_earned(&self, name: &str) -> bool {
        self.achievements
            .iter()
            .any(|a| a.name == name && a.earned)
    }

    /// Flips a catalog achievement to earned. Returns `false` if it was already
    /// earned or is not in the catalog.
    pub fn earn(&mut self, name: &str, now: DateTime<Utc>) -> bool {
        match self.achievements.iter_mut().find(|a| a.name == name) {
            Some(achievement) if !achievement.earned => {
                achievement.earned = true;
                achievement.date = Some(now);
                log::info!("Achievement unlocked: {}", name);
                true
            }
            _ => false,
        }
    }

    /// Adds XP and resolves every level-up it pays for. Returns the number of
    /// levels gained.
    pub fn grant_xp(&mut self, amount: u32) -> u32 {
        if self.total_xp == 0 {
            self.total_xp = DEFAULT_TOTAL_XP;
        }
        self.xp = self.xp.saturating_add(amount);

        let mut gained = 0;
        while self.xp >= self.total_xp {
            self.xp -= self.total_xp;
            self.level += 1;
            // floor(total * 1.5)
            self.total_xp = self.total_xp.saturating_mul(3) / 2;
            gained += 1;
        }
        if gained > 0 {
            log::info!(
                "Level up: now level {} ({}/{} xp)",
                self.level,
                self.xp,
                self.total_xp
            );
        }
        gained
    }

    pub fn push_activity(&mut self, activity: Activity) {
        self.recent_activity.insert(0, activity);
        self.recent_activity.truncate(RECENT_ACTIVITY_LIMIT);
    }

    /// Counts a visit at `now`: advances or breaks the streak depending on the
    /// calendar days (UTC) since the previous visit and bumps the weekday bucket.
    pub fn record_visit(&mut self, now: DateTime<Utc>) {
        let elapsed_days = (now.date_naive() - self.last_login_date.date_naive()).num_days();
        match elapsed_days {
            1 => {
                self.streak += 1;
                if self.streak >= STREAK_ACHIEVEMENT_DAYS {
                    self.earn(achievements::SEVEN_DAY_STREAK, now);
                }
            }
            d if d > 1 => {
                log::debug!("Streak of {} broken after {} days away", self.streak, d);
                self.streak = 0;
            }
            _ => {}
        }
        self.last_login_date = now;
        self.weekly_stats.bump(now.weekday());
    }

    /// True when no visit has been counted yet on the calendar day of `now`.
    pub fn is_first_visit_of_day(&self, now: DateTime<Utc>) -> bool {
        self.weekly_stats.total() == 0 || now.date_naive() > self.last_login_date.date_naive()
    }

    /// Repairs a decoded snapshot so the invariants hold again.
    fn normalize(&mut self, now: DateTime<Utc>) {
        if self.level == 0 {
            self.level = 1;
        }

        let mut reconciled = Vec::with_capacity(achievements::CATALOG.len());
        for name in achievements::CATALOG {
            let earned = self
                .achievements
                .iter()
                .find(|a| a.name == name && a.earned);
            reconciled.push(Achievement {
                name: name.to_string(),
                earned: earned.is_some(),
                date: earned.and_then(|a| a.date),
            });
        }
        self.achievements = reconciled;

        for (name, total) in SUBJECT_CATALOG {
            self.subject_progress
                .entry(name.to_string())
                .or_insert(SubjectProgress {
                    completed: 0,
                    total,
                    last_accessed: now,
                });
        }

        self.recent_activity.truncate(RECENT_ACTIVITY_LIMIT);
        self.grant_xp(0);
    }
}

/// Owns the stored progress document for one profile.
pub struct ProgressManager<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: ProgressStore> ProgressManager<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
        }
    }
}

impl<S: ProgressStore, C: Clock> ProgressManager<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the stored snapshot, or a fresh profile if there is none or it
    /// cannot be read. Never writes.
    pub fn load(&self) -> UserProgress {
        let now = self.clock.now();
        let raw = match self.store.read() {
            Ok(Some(raw)) => raw,
            Ok(None) => return UserProgress::new(now),
            Err(e) => {
                log::warn!("Could not read progress, starting fresh: {}", e);
                return UserProgress::new(now);
            }
        };

        match store::decode(&raw) {
            Decoded::Current(mut progress) => {
                progress.normalize(now);
                progress
            }
            Decoded::Legacy(mut progress) => {
                log::info!("Migrating unversioned progress snapshot");
                progress.normalize(now);
                progress
            }
            Decoded::Rejected(reason) => {
                log::warn!("Discarding stored progress ({}), starting fresh", reason);
                UserProgress::new(now)
            }
        }
    }

    /// Overwrites whatever is stored.
    pub fn save(&self, progress: &UserProgress) -> Result<(), StoreError> {
        self.store.write(&store::encode(progress)?)
    }

    fn update<F>(&self, apply: F) -> Result<UserProgress, StoreError>
    where
        F: FnOnce(&mut UserProgress, DateTime<Utc>),
    {
        let now = self.clock.now();
        let mut progress = self.load();
        apply(&mut progress, now);
        self.save(&progress)?;
        Ok(progress)
    }

    /// Grants "First Login" if it has not been earned yet. Meant to run once
    /// when a session starts.
    pub fn ensure_first_login_achievement(&self) -> Result<UserProgress, StoreError> {
        let progress = self.load();
        if progress.is_earned(achievements::FIRST_LOGIN) {
            return Ok(progress);
        }
        self.update(|p, now| {
            p.earn(achievements::FIRST_LOGIN, now);
        })
    }

    pub fn add_xp(&self, amount: u32) -> Result<UserProgress, StoreError> {
        self.update(|p, _| {
            p.grant_xp(amount);
        })
    }

    pub fn update_streak(&self) -> Result<UserProgress, StoreError> {
        self.update(|p, now| p.record_visit(now))
    }

    /// Runs `update_streak` for the first visit of each calendar day and does
    /// nothing for the rest. Returns `None` when the day was already counted.
    pub fn record_daily_visit(&self) -> Result<Option<UserProgress>, StoreError> {
        let now = self.clock.now();
        if !self.load().is_first_visit_of_day(now) {
            return Ok(None);
        }
        self.update_streak().map(Some)
    }

    pub fn add_activity(&self, activity: NewActivity) -> Result<UserProgress, StoreError> {
        self.update(|p, now| p.push_activity(activity.stamp(now)))
    }

    /// Unknown subjects are ignored.
    pub fn update_subject_progress(
        &self,
        subject: &str,
        completed: u32,
    ) -> Result<UserProgress, StoreError> {
        self.update(|p, now| match p.subject_progress.get_mut(subject) {
            Some(entry) => {
                entry.completed = completed;
                entry.last_accessed = now;
            }
            None => log::debug!("Ignoring progress for unknown subject {:?}", subject),
        })
    }

    /// Records a passed quiz together with the score label shown in the
    /// activity feed (e.g. `"4/5"`).
    pub fn update_quizzes_passed(&self, score: &str) -> Result<UserProgress, StoreError> {
        self.update(|p, now| {
            p.quizzes_passed += 1;
            p.push_activity(
                NewActivity::new(ActivityKind::Quiz, "Quiz Completed")
                    .with_score(score)
                    .stamp(now),
            );
            if p.quizzes_passed >= QUIZ_MASTER_THRESHOLD {
                p.earn(achievements::QUIZ_MASTER, now);
            }
        })
    }

    pub fn update_problems_solved(&self) -> Result<UserProgress, StoreError> {
        self.update(|p, now| {
            p.problems_solved += 1;
            p.grant_xp(PROBLEM_XP);
            p.push_activity(NewActivity::new(ActivityKind::Problem, "Problem Solved").stamp(now));
            if p.problems_solved >= PROBLEM_SOLVER_THRESHOLD {
                p.earn(achievements::PROBLEM_SOLVER, now);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        // A Monday.
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap()
    }

    fn manager(clock: &ManualClock) -> ProgressManager<MemoryStore, &ManualClock> {
        ProgressManager::with_clock(MemoryStore::new(), clock)
    }

    #[test]
    fn test_load_without_snapshot_is_default_and_does_not_write() {
        let clock = ManualClock::new(start());
        let manager = manager(&clock);
        let progress = manager.load();
        assert_eq!(progress, UserProgress::new(start()));
        assert!(!progress.is_earned(achievements::FIRST_LOGIN));
        assert!(manager.store().contents().is_none());
    }

    #[test]
    fn test_first_login_is_granted_once() {
        let clock = ManualClock::new(start());
        let manager = manager(&clock);
        let first = manager.ensure_first_login_achievement().unwrap();
        let date = first
            .achievements
            .iter()
            .find(|a| a.name == achievements::FIRST_LOGIN)
            .and_then(|a| a.date);
        assert_eq!(date, Some(start()));

        clock.advance(Duration::hours(3));
        let second = manager.ensure_first_login_achievement().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_add_xp_levels_up_and_rolls_over() {
        let clock = ManualClock::new(start());
        let manager = manager(&clock);
        let p = manager.add_xp(130).unwrap();
        assert_eq!((p.level, p.xp, p.total_xp), (2, 30, 150));
    }

    #[test]
    fn test_add_xp_handles_multi_level_jump() {
        let clock = ManualClock::new(start());
        let manager = manager(&clock);
        // 100 + 150 + 225 = 475
        let p = manager.add_xp(480).unwrap();
        assert_eq!((p.level, p.xp, p.total_xp), (4, 5, 337));
        assert_eq!(manager.load(), p);
    }

    #[test]
    fn test_update_streak_day_by_day() {
        let clock = ManualClock::new(start());
        let manager = manager(&clock);
        manager.save(&UserProgress::new(start())).unwrap();

        let same_day = manager.update_streak().unwrap();
        assert_eq!(same_day.streak, 1);

        for expected in 2..=7 {
            clock.advance(Duration::days(1));
            let p = manager.update_streak().unwrap();
            assert_eq!(p.streak, expected);
        }
        let p = manager.load();
        assert!(p.is_earned(achievements::SEVEN_DAY_STREAK));
        assert_eq!(p.weekly_stats.get(Weekday::Mon), 1);
        assert_eq!(p.weekly_stats.get(Weekday::Sun), 1);
        assert_eq!(p.weekly_stats.total(), 7);

        clock.advance(Duration::days(3));
        let p = manager.update_streak().unwrap();
        assert_eq!(p.streak, 0);
        assert!(p.is_earned(achievements::SEVEN_DAY_STREAK));
    }

    #[test]
    fn test_streak_counts_calendar_days() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 23, 0, 0).unwrap());
        let manager = manager(&clock);
        manager.save(&UserProgress::new(clock.now())).unwrap();

        // Nine hours later is already the next day.
        clock.advance(Duration::hours(9));
        assert_eq!(manager.update_streak().unwrap().streak, 2);

        // 08:00 Tuesday to 23:30 Wednesday is more than a day but still the next one.
        clock.advance(Duration::hours(39) + Duration::minutes(30));
        assert_eq!(manager.update_streak().unwrap().streak, 3);

        // Skipping Thursday breaks it even though barely a day passed.
        clock.set(Utc.with_ymd_and_hms(2024, 3, 8, 0, 15, 0).unwrap());
        assert_eq!(manager.update_streak().unwrap().streak, 0);
    }

    #[test]
    fn test_daily_visit_is_counted_once_per_day() {
        let clock = ManualClock::new(start());
        let manager = manager(&clock);

        let first = manager.record_daily_visit().unwrap().unwrap();
        assert_eq!((first.streak, first.weekly_stats.total()), (1, 1));

        clock.advance(Duration::hours(8));
        assert!(manager.record_daily_visit().unwrap().is_none());
        assert_eq!(manager.load().weekly_stats.get(Weekday::Mon), 1);

        // Playing from the menu every day keeps the streak going.
        for expected in 2..=4 {
            clock.advance(Duration::hours(22));
            let p = manager.record_daily_visit().unwrap().unwrap();
            assert_eq!(p.streak, expected);
            clock.advance(Duration::hours(2));
            assert!(manager.record_daily_visit().unwrap().is_none());
        }
        let p = manager.load();
        assert_eq!(p.streak, 4);
        assert_eq!(p.weekly_stats.total(), 4);
    }

    #[test]
    fn test_add_activity_keeps_ten_newest_first() {
        let clock = ManualClock::new(start());
        let manager = manager(&clock);
        for i in 0..12 {
            clock.advance(Duration::minutes(1));
            manager
                .add_activity(NewActivity::new(ActivityKind::Lesson, format!("Lesson {}", i)))
                .unwrap();
        }
        let p = manager.load();
        assert_eq!(p.recent_activity.len(), RECENT_ACTIVITY_LIMIT);
        assert_eq!(p.recent_activity[0].title, "Lesson 11");
        assert_eq!(p.recent_activity[9].title, "Lesson 2");
        assert_eq!(p.recent_activity[0].date, clock.now());
    }

    #[test]
    fn test_update_subject_progress_ignores_unknown_subject() {
        let clock = ManualClock::new(start());
        let manager = manager(&clock);
        clock.advance(Duration::days(2));
        let p = manager.update_subject_progress("geometry", 3).unwrap();
        let geometry = &p.subject_progress["geometry"];
        assert_eq!((geometry.completed, geometry.total), (3, 8));
        assert_eq!(geometry.last_accessed, clock.now());

        let before = manager.load();
        let after = manager.update_subject_progress("alchemy", 9).unwrap();
        assert_eq!(before, after);
        assert!(!after.subject_progress.contains_key("alchemy"));
    }

    #[test]
    fn test_quiz_master_needs_five_passes() {
        let clock = ManualClock::new(start());
        let manager = manager(&clock);
        for n in 1..QUIZ_MASTER_THRESHOLD {
            let p = manager.update_quizzes_passed("4/5").unwrap();
            assert_eq!(p.quizzes_passed, n);
            assert!(!p.is_earned(achievements::QUIZ_MASTER));
        }
        let p = manager.update_quizzes_passed("3/5").unwrap();
        assert!(p.is_earned(achievements::QUIZ_MASTER));
        assert_eq!(p.recent_activity[0].kind, ActivityKind::Quiz);
        assert_eq!(p.recent_activity[0].score.as_deref(), Some("3/5"));
    }

    #[test]
    fn test_problem_solver_grants_xp_and_threshold_achievement() {
        let clock = ManualClock::new(start());
        let manager = manager(&clock);
        let p = manager.update_problems_solved().unwrap();
        assert_eq!(p.xp, PROBLEM_XP);
        assert!(!p.is_earned(achievements::PROBLEM_SOLVER));
        assert_eq!(p.recent_activity[0].title, "Problem Solved");

        for _ in 1..PROBLEM_SOLVER_THRESHOLD {
            manager.update_problems_solved().unwrap();
        }
        let p = manager.load();
        assert_eq!(p.problems_solved, PROBLEM_SOLVER_THRESHOLD);
        assert!(p.is_earned(achievements::PROBLEM_SOLVER));
        // 250 xp: level 2 at 100, 150 left, needs 150 more for level 3.
        assert_eq!((p.level, p.xp, p.total_xp), (3, 0, 225));
    }

    #[test]
    fn test_corrupt_snapshot_falls_back_to_default() {
        let clock = ManualClock::new(start());
        let manager =
            ProgressManager::with_clock(MemoryStore::with_document("{\"level\": "), &clock);
        assert_eq!(manager.load(), UserProgress::new(start()));
    }

    #[test]
    fn test_legacy_snapshot_is_migrated() {
        let clock = ManualClock::new(start());
        let legacy = r#"{
            "level": 2, "xp": 20, "totalXp": 150, "streak": 3,
            "lastLoginDate": "2024-03-03T08:00:00.000Z",
            "completedLessons": 1, "totalLessons": 20,
            "quizzesPassed": 1, "totalQuizzes": 10,
            "problemsSolved": 2, "totalProblems": 30,
            "recentActivity": [
                {"type": "quiz", "title": "Quiz Completed", "score": "100%", "date": "2024-03-03T08:05:00.000Z"}
            ],
            "achievements": [
                {"name": "First Login", "earned": true, "date": "2024-03-01T10:00:00.000Z"},
                {"name": "Quiz Master", "earned": true, "date": "2024-03-03T08:05:00.000Z"},
                {"name": "Retired Badge", "earned": true}
            ],
            "subjectProgress": {
                "algebra": {"completed": 2, "total": 10, "lastAccessed": "2024-03-02T08:00:00.000Z"}
            },
            "weeklyStats": {"monday": 0, "sunday": 2, "sun": null, "mon": 1}
        }"#;
        let manager = ProgressManager::with_clock(MemoryStore::with_document(legacy), &clock);
        let p = manager.load();
        assert_eq!((p.level, p.xp, p.streak), (2, 20, 3));
        assert_eq!(p.achievements.len(), achievements::CATALOG.len());
        assert!(p.is_earned(achievements::QUIZ_MASTER));
        assert!(!p.achievements.iter().any(|a| a.name == "Retired Badge"));
        assert_eq!(p.subject_progress.len(), SUBJECT_CATALOG.len());
        assert_eq!(p.subject_progress["algebra"].completed, 2);
        assert_eq!(p.weekly_stats.get(Weekday::Sun), 2);
        assert_eq!(p.weekly_stats.get(Weekday::Mon), 1);

        manager.update_streak().unwrap();
        let stored = manager.store().contents().unwrap();
        assert!(stored.starts_with("{\"version\":1"));
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let clock = ManualClock::new(start());
        let manager = manager(&clock);
        manager.ensure_first_login_achievement().unwrap();
        manager.update_problems_solved().unwrap();
        manager.update_subject_progress("calculus", 4).unwrap();
        let p = manager.update_streak().unwrap();

        let json = serde_json::to_string(&p).unwrap();
        let back: UserProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(json.contains("\"weeklyStats\":{"));
        assert!(json.contains("\"type\":\"problem\""));
    }
}
