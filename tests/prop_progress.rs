use chrono::{Duration, TimeZone, Utc};
use mathmate::progress::{
    ActivityKind, ManualClock, MemoryStore, NewActivity, ProgressManager, UserProgress,
    RECENT_ACTIVITY_LIMIT,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    AddXp(u32),
    PassQuiz,
    SolveProblem,
    Visit { days_later: i64 },
    Activity,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..400).prop_map(Op::AddXp),
        Just(Op::PassQuiz),
        Just(Op::SolveProblem),
        (0i64..3).prop_map(|days_later| Op::Visit { days_later }),
        Just(Op::Activity),
    ]
}

fn earned(progress: &UserProgress) -> Vec<String> {
    progress
        .achievements
        .iter()
        .filter(|a| a.earned)
        .map(|a| a.name.clone())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_xp_always_below_next_level(amounts in prop::collection::vec(0u32..2_000, 1..20)) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap());
        let manager = ProgressManager::with_clock(MemoryStore::new(), &clock);
        let mut level = 1;
        for amount in amounts {
            let progress = manager.add_xp(amount).unwrap();
            prop_assert!(progress.xp < progress.total_xp);
            prop_assert!(progress.level >= level);
            level = progress.level;
        }
    }

    #[test]
    fn prop_recent_activity_is_capped(count in 0usize..30) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap());
        let manager = ProgressManager::with_clock(MemoryStore::new(), &clock);
        for i in 0..count {
            manager
                .add_activity(NewActivity::new(ActivityKind::Lesson, format!("Lesson {}", i)))
                .unwrap();
        }
        let progress = manager.load();
        prop_assert_eq!(progress.recent_activity.len(), count.min(RECENT_ACTIVITY_LIMIT));
        if count > 0 {
            prop_assert_eq!(&progress.recent_activity[0].title, &format!("Lesson {}", count - 1));
        }
    }

    #[test]
    fn prop_achievements_never_revoked_and_state_persists(ops in prop::collection::vec(op(), 1..40)) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap());
        let manager = ProgressManager::with_clock(MemoryStore::new(), &clock);
        let mut last = manager.ensure_first_login_achievement().unwrap();

        for op in ops {
            let next = match op {
                Op::AddXp(amount) => manager.add_xp(amount),
                Op::PassQuiz => manager.update_quizzes_passed("3/5"),
                Op::SolveProblem => manager.update_problems_solved(),
                Op::Visit { days_later } => {
                    clock.advance(Duration::days(days_later));
                    manager.update_streak()
                }
                Op::Activity => manager.add_activity(NewActivity::new(ActivityKind::Game, "Speed Math")),
            }
            .unwrap();

            for name in earned(&last) {
                prop_assert!(next.is_earned(&name), "{} was revoked", name);
            }
            prop_assert_eq!(next.achievements.len(), last.achievements.len());
            prop_assert!(next.recent_activity.len() <= RECENT_ACTIVITY_LIMIT);
            last = next;
        }

        prop_assert_eq!(manager.load(), last);
    }
}
