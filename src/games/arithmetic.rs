//! Question generators for the quick-fire games: linear equations
//! ("Algebra Adventure") and timed mental arithmetic ("Speed Math").

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{GameKind, GameReport};

/// Submitted answers within this distance of the exact value are accepted.
pub const ANSWER_TOLERANCE: f64 = 1e-3;
pub const ALGEBRA_POINTS: u32 = 10;
pub const SPEED_MATH_POINTS: u32 = 10;
pub const SPEED_MATH_SECONDS: u32 = 30;

/// Reads a numeric answer out of what a player typed: `"4"`, `"-2.5"`,
/// `"x = 7/2"`, `"x=3"`.
pub fn parse_answer(text: &str) -> Option<f64> {
    let text = text.trim();
    let text = match text.split_once('=') {
        Some((_, rhs)) => rhs.trim(),
        None => text,
    };
    let text = text.replace(',', ".");
    match text.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            Some(num / den).filter(|v| v.is_finite())
        }
        None => text.parse().ok().filter(|v: &f64| v.is_finite()),
    }
}

/// What happened to an answer submitted in a Speed Math round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeedAnswer {
    /// Checked in time; `true` when it was right.
    Answered(bool),
    /// Arrived after the clock ran out. Carries the final report.
    TimeUp(GameReport),
    /// The round had already ended.
    Over,
}

/// `a·x + b = c`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearEquation {
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

impl LinearEquation {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            a: rng.gen_range(1..=10),
            b: rng.gen_range(0..20),
            c: rng.gen_range(0..20),
        }
    }

    pub fn solution(&self) -> f64 {
        f64::from(self.c - self.b) / f64::from(self.a)
    }

    pub fn check(&self, answer: f64) -> bool {
        (answer - self.solution()).abs() < ANSWER_TOLERANCE
    }
}

impl fmt::Display for LinearEquation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x + {} = {}", self.a, self.b, self.c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Add, Operation::Subtract, Operation::Multiply];

    fn symbol(&self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Subtract => '-',
            Operation::Multiply => '×',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArithmeticQuestion {
    pub lhs: i64,
    pub rhs: i64,
    pub operation: Operation,
}

impl ArithmeticQuestion {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            lhs: rng.gen_range(0..20),
            rhs: rng.gen_range(0..20),
            operation: Operation::ALL[rng.gen_range(0..Operation::ALL.len())],
        }
    }

    pub fn solution(&self) -> i64 {
        match self.operation {
            Operation::Add => self.lhs + self.rhs,
            Operation::Subtract => self.lhs - self.rhs,
            Operation::Multiply => self.lhs * self.rhs,
        }
    }

    pub fn check(&self, answer: f64) -> bool {
        (answer - self.solution() as f64).abs() < ANSWER_TOLERANCE
    }
}

impl fmt::Display for ArithmeticQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} = ?", self.lhs, self.operation.symbol(), self.rhs)
    }
}

/// Untimed: solve as many equations as you like, stop whenever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgebraAdventure {
    current: LinearEquation,
    solved: u32,
    attempts: u32,
}

impl AlgebraAdventure {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            current: LinearEquation::generate(rng),
            solved: 0,
            attempts: 0,
        }
    }

    pub fn current(&self) -> &LinearEquation {
        &self.current
    }

    pub fn solved(&self) -> u32 {
        self.solved
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A wrong answer keeps the same equation on the board.
    pub fn answer<R: Rng + ?Sized>(&mut self, answer: f64, rng: &mut R) -> bool {
        self.attempts += 1;
        if !self.current.check(answer) {
            return false;
        }
        self.solved += 1;
        self.current = LinearEquation::generate(rng);
        true
    }

    pub fn finish(&self) -> GameReport {
        GameReport {
            kind: GameKind::AlgebraAdventure,
            score: self.solved * ALGEBRA_POINTS,
        }
    }
}

/// Thirty seconds of arithmetic. Every answer, right or wrong, moves on to a
/// new question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedMath {
    current: ArithmeticQuestion,
    points: u32,
    started_at: DateTime<Utc>,
    time_limit_secs: u32,
    finished: bool,
}

impl SpeedMath {
    pub fn new<R: Rng + ?Sized>(started_at: DateTime<Utc>, rng: &mut R) -> Self {
        Self {
            current: ArithmeticQuestion::generate(rng),
            points: 0,
            started_at,
            time_limit_secs: SPEED_MATH_SECONDS,
            finished: false,
        }
    }

    pub fn current(&self) -> &ArithmeticQuestion {
        &self.current
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let left = self.started_at + Duration::seconds(i64::from(self.time_limit_secs)) - now;
        left.max(Duration::zero())
    }

    fn report(&self) -> GameReport {
        GameReport {
            kind: GameKind::SpeedMath,
            score: self.points * 2,
        }
    }

    /// Ends the round once time is up. Returns the report only on the call
    /// that ended it.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Option<GameReport> {
        if self.finished || self.remaining(now) > Duration::zero() {
            return None;
        }
        self.finished = true;
        Some(self.report())
    }

    pub fn answer<R: Rng + ?Sized>(
        &mut self,
        answer: f64,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> SpeedAnswer {
        if self.finished {
            return SpeedAnswer::Over;
        }
        if let Some(report) = self.expire(now) {
            return SpeedAnswer::TimeUp(report);
        }
        let correct = self.current.check(answer);
        if correct {
            self.points += SPEED_MATH_POINTS;
        }
        self.current = ArithmeticQuestion::generate(rng);
        SpeedAnswer::Answered(correct)
    }
}
