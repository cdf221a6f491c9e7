//! "Math Memory": match each expression card with the card holding its value.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{GameKind, GameReport};

/// Expression and value printed on each pair of cards.
pub const PAIRS: [(&str, &str); 6] = [
    ("2+2", "4"),
    ("3×3", "9"),
    ("10-7", "3"),
    ("8÷2", "4"),
    ("5+5", "10"),
    ("4×4", "16"),
];
pub const POINTS_PER_MATCH: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Face {
    Expression(usize),
    Value(usize),
}

impl Face {
    pub fn label(&self) -> &'static str {
        match *self {
            Face::Expression(i) => PAIRS[i].0,
            Face::Value(i) => PAIRS[i].1,
        }
    }

    /// An expression matches any value card showing its result, so "2+2" and
    /// "8÷2" both accept either "4".
    fn matches(&self, other: &Face) -> bool {
        match (*self, *other) {
            (Face::Expression(e), Face::Value(v)) | (Face::Value(v), Face::Expression(e)) => {
                PAIRS[e].1 == PAIRS[v].1
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub face: Face,
    pub matched: bool,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FlipError {
    #[error("there is no card {0}")]
    NoSuchCard(usize),
    #[error("pick two different cards")]
    SameCard,
    #[error("card {0} is already matched")]
    AlreadyMatched(usize),
    #[error("the game is over")]
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flip {
    pub first: &'static str,
    pub second: &'static str,
    pub matched: bool,
    pub finished: Option<GameReport>,
}

/// Reads two 1-based card numbers such as `"3 7"` or `"3, 7"` into indices.
pub fn parse_pair(text: &str) -> Option<(usize, usize)> {
    let mut numbers = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<usize>().ok().filter(|&n| n > 0).map(|n| n - 1));
    let first = numbers.next()??;
    let second = numbers.next()??;
    match numbers.next() {
        None => Some((first, second)),
        Some(_) => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathMemory {
    cards: Vec<Card>,
    score: u32,
    moves: u32,
}

impl MathMemory {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut cards: Vec<Card> = (0..PAIRS.len())
            .flat_map(|i| [Face::Expression(i), Face::Value(i)])
            .map(|face| Card {
                face,
                matched: false,
            })
            .collect();
        cards.shuffle(rng);
        Self {
            cards,
            score: 0,
            moves: 0,
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn is_finished(&self) -> bool {
        self.cards.iter().all(|card| card.matched)
    }

    /// Matched cards face up, the rest as their number.
    pub fn board(&self) -> String {
        self.cards
            .chunks(4)
            .enumerate()
            .map(|(row, cards)| {
                cards
                    .iter()
                    .enumerate()
                    .map(|(col, card)| {
                        if card.matched {
                            format!("[{:^4}]", card.face.label())
                        } else {
                            format!("[{:^4}]", row * 4 + col + 1)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn card(&self, index: usize) -> Result<&Card, FlipError> {
        let card = self.cards.get(index).ok_or(FlipError::NoSuchCard(index + 1))?;
        if card.matched {
            return Err(FlipError::AlreadyMatched(index + 1));
        }
        Ok(card)
    }

    /// Turns over two cards. A valid pick counts as a move whether or not the
    /// cards match.
    pub fn flip(&mut self, first: usize, second: usize) -> Result<Flip, FlipError> {
        if self.is_finished() {
            return Err(FlipError::Finished);
        }
        if first == second {
            return Err(FlipError::SameCard);
        }
        let a = self.card(first)?.face;
        let b = self.card(second)?.face;

        self.moves += 1;
        let matched = a.matches(&b);
        if matched {
            self.cards[first].matched = true;
            self.cards[second].matched = true;
            self.score += POINTS_PER_MATCH;
        }
        let finished = self.is_finished().then(|| GameReport {
            kind: GameKind::MathMemory,
            score: self.score,
        });
        Ok(Flip {
            first: a.label(),
            second: b.label(),
            matched,
            finished,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn position(game: &MathMemory, face: Face) -> usize {
        game.cards()
            .iter()
            .position(|card| card.face == face)
            .unwrap()
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("3 7"), Some((2, 6)));
        assert_eq!(parse_pair(" 12, 1 "), Some((11, 0)));
        assert_eq!(parse_pair("0 4"), None);
        assert_eq!(parse_pair("3"), None);
        assert_eq!(parse_pair("1 2 3"), None);
        assert_eq!(parse_pair("one two"), None);
    }

    #[test]
    fn test_new_game_deals_every_face_once() {
        let mut rng = StdRng::seed_from_u64(41);
        let game = MathMemory::new(&mut rng);
        assert_eq!(game.cards().len(), PAIRS.len() * 2);
        for i in 0..PAIRS.len() {
            position(&game, Face::Expression(i));
            position(&game, Face::Value(i));
        }
        assert!(game.cards().iter().all(|card| !card.matched));
        assert_eq!(game.board().lines().count(), 3);
    }

    #[test]
    fn test_mismatch_costs_a_move_only() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut game = MathMemory::new(&mut rng);
        // 3×3 is not 16.
        let a = position(&game, Face::Expression(1));
        let b = position(&game, Face::Value(5));
        let flip = game.flip(a, b).unwrap();
        assert!(!flip.matched);
        assert_eq!((flip.first, flip.second), ("3×3", "16"));
        assert_eq!((game.moves(), game.score()), (1, 0));

        // Two expressions never match.
        let c = position(&game, Face::Expression(0));
        assert!(!game.flip(a, c).unwrap().matched);
        assert_eq!(game.flip(a, a), Err(FlipError::SameCard));
        assert_eq!(game.flip(a, 99), Err(FlipError::NoSuchCard(100)));
        assert_eq!(game.moves(), 2);
    }

    #[test]
    fn test_equal_values_are_interchangeable() {
        let mut rng = StdRng::seed_from_u64(43);
        let mut game = MathMemory::new(&mut rng);
        // 2+2 takes the card dealt for 8÷2.
        let two_plus_two = position(&game, Face::Expression(0));
        let four = position(&game, Face::Value(3));
        assert!(game.flip(two_plus_two, four).unwrap().matched);
        assert_eq!(
            game.flip(two_plus_two, four),
            Err(FlipError::AlreadyMatched(two_plus_two + 1))
        );

        let eight_over_two = position(&game, Face::Expression(3));
        let other_four = position(&game, Face::Value(0));
        assert!(game.flip(other_four, eight_over_two).unwrap().matched);
        assert_eq!(game.score(), 2 * POINTS_PER_MATCH);
    }

    #[test]
    fn test_matching_everything_finishes_the_game() {
        let mut rng = StdRng::seed_from_u64(44);
        let mut game = MathMemory::new(&mut rng);
        let mut last = None;
        for i in 0..PAIRS.len() {
            let e = position(&game, Face::Expression(i));
            let v = position(&game, Face::Value(i));
            let flip = game.flip(e, v).unwrap();
            assert!(flip.matched);
            last = flip.finished;
        }
        assert_eq!(
            last,
            Some(GameReport {
                kind: GameKind::MathMemory,
                score: 60
            })
        );
        assert_eq!(game.moves(), 6);
        assert!(game.board().contains("[ 16 ]"));
        assert_eq!(game.flip(0, 1), Err(FlipError::Finished));
    }
}
