//! "Geometry Quest": five area questions about simple shapes.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::arithmetic::ANSWER_TOLERANCE;
use super::{GameKind, GameReport};

pub const QUESTIONS: u32 = 5;
pub const POINTS_PER_ANSWER: u32 = 20;
/// Largest side length a generated shape can have.
pub const MAX_SIDE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    Triangle { base: u32, height: u32 },
    Square { side: u32 },
    Rectangle { length: u32, width: u32 },
}

impl Shape {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let pick = rng.gen_range(0..3);
        let mut side = || rng.gen_range(1..=MAX_SIDE);
        match pick {
            0 => Shape::Triangle {
                base: side(),
                height: side(),
            },
            1 => Shape::Square { side: side() },
            _ => Shape::Rectangle {
                length: side(),
                width: side(),
            },
        }
    }

    pub fn area(&self) -> f64 {
        match *self {
            Shape::Triangle { base, height } => f64::from(base * height) / 2.0,
            Shape::Square { side } => f64::from(side * side),
            Shape::Rectangle { length, width } => f64::from(length * width),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Triangle { base, height } => write!(
                f,
                "Calculate the area of a triangle with base {} and height {}",
                base, height
            ),
            Shape::Square { side } => {
                write!(f, "Calculate the area of a square with side length {}", side)
            }
            Shape::Rectangle { length, width } => write!(
                f,
                "Calculate the area of a rectangle with length {} and width {}",
                length, width
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaVerdict {
    pub correct: bool,
    pub expected: f64,
    pub finished: Option<GameReport>,
}

/// Every answer, right or wrong, uses up one of the questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryQuest {
    current: Shape,
    score: u32,
    questions_left: u32,
}

impl GeometryQuest {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            current: Shape::generate(rng),
            score: 0,
            questions_left: QUESTIONS,
        }
    }

    pub fn current(&self) -> &Shape {
        &self.current
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn questions_left(&self) -> u32 {
        self.questions_left
    }

    pub fn is_finished(&self) -> bool {
        self.questions_left == 0
    }

    /// The reported score is the raw score times one and a half, rounded down.
    fn report(&self) -> GameReport {
        GameReport {
            kind: GameKind::GeometryQuest,
            score: self.score * 3 / 2,
        }
    }

    pub fn answer<R: Rng + ?Sized>(&mut self, answer: f64, rng: &mut R) -> AreaVerdict {
        let expected = self.current.area();
        let mut verdict = AreaVerdict {
            correct: false,
            expected,
            finished: None,
        };
        if self.is_finished() {
            return verdict;
        }

        verdict.correct = (answer - expected).abs() < ANSWER_TOLERANCE;
        if verdict.correct {
            self.score += POINTS_PER_ANSWER;
        }
        self.questions_left -= 1;
        if self.is_finished() {
            verdict.finished = Some(self.report());
        } else {
            self.current = Shape::generate(rng);
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_areas_and_prompts() {
        let triangle = Shape::Triangle { base: 3, height: 5 };
        assert_eq!(triangle.area(), 7.5);
        assert_eq!(
            triangle.to_string(),
            "Calculate the area of a triangle with base 3 and height 5"
        );
        assert_eq!(Shape::Square { side: 4 }.area(), 16.0);
        assert_eq!(Shape::Rectangle { length: 6, width: 7 }.area(), 42.0);
    }

    #[test]
    fn test_generated_shapes_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(31);
        let mut seen = [false; 3];
        for _ in 0..300 {
            let (kind, sides) = match Shape::generate(&mut rng) {
                Shape::Triangle { base, height } => (0, vec![base, height]),
                Shape::Square { side } => (1, vec![side]),
                Shape::Rectangle { length, width } => (2, vec![length, width]),
            };
            seen[kind] = true;
            assert!(sides.iter().all(|s| (1..=MAX_SIDE).contains(s)));
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn test_five_questions_then_scaled_report() {
        let mut rng = StdRng::seed_from_u64(32);
        let mut quest = GeometryQuest::new(&mut rng);
        let mut last = None;
        for n in 0..QUESTIONS {
            let area = quest.current().area();
            // Miss the second question on purpose.
            let guess = if n == 1 { area + 1.0 } else { area };
            let v = quest.answer(guess, &mut rng);
            assert_eq!(v.correct, n != 1);
            last = v.finished;
        }
        assert_eq!(quest.score(), 4 * POINTS_PER_ANSWER);
        assert_eq!(
            last,
            Some(GameReport {
                kind: GameKind::GeometryQuest,
                score: 120
            })
        );
        assert!(quest.is_finished());
        let area = quest.current().area();
        assert!(quest.answer(area, &mut rng).finished.is_none());
        assert_eq!(quest.score(), 80);
    }
}
