use chrono::{DateTime, TimeZone, Utc};
use mathmate::games::tile_merge::{merge_line, Direction, Grid, TilePuzzle, SIZE};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn tile() -> impl Strategy<Value = u32> {
    prop_oneof![Just(0u32), (1u32..11).prop_map(|exp| 1 << exp)]
}

fn line() -> impl Strategy<Value = [u32; SIZE]> {
    prop::array::uniform4(tile())
}

fn grid() -> impl Strategy<Value = Grid> {
    prop::array::uniform4(line())
}

fn direction() -> impl Strategy<Value = Direction> {
    prop::sample::select(Direction::ALL.to_vec())
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn total(grid: &Grid) -> u32 {
    grid.iter().flatten().sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_merge_line_conserves_tiles(input in line()) {
        let merged = merge_line(input);
        prop_assert_eq!(merged.line.iter().sum::<u32>(), input.iter().sum::<u32>());

        let before = input.iter().filter(|&&v| v != 0).count() as u32;
        let after = merged.line.iter().filter(|&&v| v != 0).count() as u32;
        prop_assert_eq!(after + merged.merges, before);

        // Zeros only at the trailing end.
        if let Some(first_zero) = merged.line.iter().position(|&v| v == 0) {
            prop_assert!(merged.line[first_zero..].iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn prop_moves_keep_puzzle_consistent(start in grid(), dir in direction(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut puzzle = TilePuzzle::from_grid(start, t0(), 300);
        let before = puzzle.clone();

        let summary = puzzle.apply_move(dir, t0(), &mut rng);
        if summary.moved {
            prop_assert_eq!(puzzle.moves(), before.moves() + 1);
            prop_assert!(puzzle.score() >= before.score() + summary.gained);
            // Exactly one tile spawned on top of what was already there.
            let spawned = total(puzzle.grid()) - total(before.grid());
            prop_assert!(spawned == 2 || spawned == 4);
        } else {
            prop_assert_eq!(puzzle, before);
            prop_assert!(summary.finished.is_none());
        }
    }
}
