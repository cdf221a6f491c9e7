//! "Find the next number" sequence game.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{GameKind, GameReport};

/// Terms shown before the player has to guess the next one.
pub const SHOWN_TERMS: u32 = 4;
pub const MAX_LEVEL: u32 = 5;
pub const STARTING_LIVES: u32 = 3;
pub const STARTING_HINTS: u32 = 3;
pub const POINTS_PER_LEVEL: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternRule {
    Double,
    Square,
    AddThree,
    PowerOfTwo,
    Triangular,
    Fibonacci,
}

impl PatternRule {
    pub const ALL: [PatternRule; 6] = [
        PatternRule::Double,
        PatternRule::Square,
        PatternRule::AddThree,
        PatternRule::PowerOfTwo,
        PatternRule::Triangular,
        PatternRule::Fibonacci,
    ];

    /// The `n`-th term, counting from 1.
    pub fn term(&self, n: u32) -> u64 {
        let n = u64::from(n);
        match self {
            PatternRule::Double => n * 2,
            PatternRule::Square => n * n,
            PatternRule::AddThree => n + 3,
            PatternRule::PowerOfTwo => 1u64 << n.min(63),
            PatternRule::Triangular => n * (n + 1) / 2,
            PatternRule::Fibonacci => {
                let (mut a, mut b) = (0u64, 1u64);
                for _ in 0..n {
                    (a, b) = (b, a.saturating_add(b));
                }
                a
            }
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            PatternRule::Double => "Each term is twice its position.",
            PatternRule::Square => "Each term is its position squared.",
            PatternRule::AddThree => "Each term is its position plus three.",
            PatternRule::PowerOfTwo => "Each term is 2 raised to its position.",
            PatternRule::Triangular => "Each term adds its position to the previous one.",
            PatternRule::Fibonacci => "Each term is the sum of the two before it.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub correct: bool,
    pub expected: u64,
    pub awarded: u32,
    pub lives_left: u32,
    pub finished: Option<GameReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternPuzzle {
    rule: PatternRule,
    level: u32,
    score: u32,
    streak: u32,
    best_streak: u32,
    lives: u32,
    hints_left: u32,
    hint_used: bool,
    finished: bool,
}

impl PatternPuzzle {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut puzzle = Self {
            rule: PatternRule::Double,
            level: 1,
            score: 0,
            streak: 0,
            best_streak: 0,
            lives: STARTING_LIVES,
            hints_left: STARTING_HINTS,
            hint_used: false,
            finished: false,
        };
        puzzle.next_round(rng);
        puzzle
    }

    pub fn with_rule(rule: PatternRule) -> Self {
        Self {
            rule,
            level: 1,
            score: 0,
            streak: 0,
            best_streak: 0,
            lives: STARTING_LIVES,
            hints_left: STARTING_HINTS,
            hint_used: false,
            finished: false,
        }
    }

    fn next_round<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if let Some(rule) = PatternRule::ALL.choose(rng) {
            self.rule = *rule;
        }
        self.hint_used = false;
    }

    pub fn sequence(&self) -> Vec<u64> {
        (1..=SHOWN_TERMS).map(|n| self.rule.term(n)).collect()
    }

    pub fn expected(&self) -> u64 {
        self.rule.term(SHOWN_TERMS + 1)
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn best_streak(&self) -> u32 {
        self.best_streak
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn hints_left(&self) -> u32 {
        self.hints_left
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Reveals the rule for this round. Halves the points the round pays out.
    pub fn hint(&mut self) -> Option<&'static str> {
        if self.finished {
            return None;
        }
        if !self.hint_used {
            if self.hints_left == 0 {
                return None;
            }
            self.hints_left -= 1;
            self.hint_used = true;
        }
        Some(self.rule.hint())
    }

    fn report(&self) -> GameReport {
        GameReport {
            kind: GameKind::PatternPuzzle,
            score: self.score,
        }
    }

    /// Player walked away. The score so far still counts.
    pub fn abandon(&mut self) -> Option<GameReport> {
        if self.finished {
            return None;
        }
        self.finished = true;
        Some(self.report())
    }

    pub fn answer<R: Rng + ?Sized>(&mut self, guess: u64, rng: &mut R) -> Verdict {
        let expected = self.expected();
        let mut verdict = Verdict {
            correct: false,
            expected,
            awarded: 0,
            lives_left: self.lives,
            finished: None,
        };
        if self.finished {
            return verdict;
        }

        if guess == expected {
            let mut awarded = POINTS_PER_LEVEL * self.level;
            if self.hint_used {
                awarded /= 2;
            }
            self.score += awarded;
            self.streak += 1;
            self.best_streak = self.best_streak.max(self.streak);
            verdict.correct = true;
            verdict.awarded = awarded;

            if self.level >= MAX_LEVEL {
                self.finished = true;
                verdict.finished = Some(self.report());
            } else {
                self.level += 1;
                self.next_round(rng);
            }
        } else {
            self.lives = self.lives.saturating_sub(1);
            self.streak = 0;
            verdict.lives_left = self.lives;
            if self.lives == 0 {
                self.finished = true;
                verdict.finished = Some(self.report());
            }
        }
        verdict
    }
}
