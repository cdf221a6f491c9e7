pub mod ai_helper;

use serde::{Deserialize, Serialize};

use crate::mock_test::GeneratedQuestion;

/// Share of correct answers needed for a quiz to count as passed.
pub const PASS_PERCENTAGE: u32 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(label.trim()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub topic: String,
    pub questions: Vec<Question>,
    pub current_question: usize,
    pub score: u32,
}

impl Quiz {
    pub fn new(topic: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            topic: topic.into(),
            questions,
            current_question: 0,
            score: 0,
        }
    }

    /// The built-in mixed practice quiz, used when no questions could be generated.
    pub fn practice() -> Self {
        let q = |text: &str, options: [&str; 4], correct: usize| {
            Question::new(
                text.to_string(),
                options
                    .iter()
                    .enumerate()
                    .map(|(i, o)| Answer::new(o.to_string(), i == correct))
                    .collect(),
            )
        };
        Self::new(
            "Mixed practice",
            vec![
                q("Solve for x: 3x + 5 = 14", ["x = 2", "x = 3", "x = 4", "x = 5"], 1),
                q(
                    "Find the derivative of f(x) = x²",
                    ["f'(x) = 2x", "f'(x) = x²", "f'(x) = 2", "f'(x) = x"],
                    0,
                ),
                q("What is the area of a circle with radius 5?", ["25π", "10π", "15π", "20π"], 0),
                q(
                    "Simplify: (3x² + 2x - 1) - (x² - 3x + 2)",
                    ["2x² + 5x - 3", "4x² - x + 1", "2x² - x - 3", "4x² + 5x - 3"],
                    0,
                ),
                q("What is the value of sin(30°)?", ["1/2", "√2/2", "√3/2", "1"], 0),
            ],
        )
    }

    pub fn from_generated(topic: impl Into<String>, generated: Vec<GeneratedQuestion>) -> Self {
        Self::new(topic, generated.into_iter().map(Question::from).collect())
    }

    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.current_question)
    }

    pub fn is_complete(&self) -> bool {
        self.current_question >= self.questions.len()
    }

    /// Checks a reply to the current question and moves on. Returns `None`
    /// when the quiz is already over or the reply matches no option.
    pub fn answer(&mut self, reply: &str) -> Option<AnswerCheck> {
        let question = self.current()?;
        let chosen = question.find_answer(reply)?;
        let check = AnswerCheck {
            correct: question.answers[chosen].is_correct,
            chosen_text: question.answers[chosen].text.clone(),
            correct_text: question
                .correct_answer()
                .map(|a| a.text.clone())
                .unwrap_or_default(),
            explanation: question.explanation.clone(),
        };
        if check.correct {
            self.score += 1;
        }
        self.current_question += 1;
        Some(check)
    }

    pub fn percentage(&self) -> u32 {
        match self.questions.len() {
            0 => 0,
            n => self.score * 100 / n as u32,
        }
    }

    pub fn passed(&self) -> bool {
        self.percentage() >= PASS_PERCENTAGE
    }

    /// `"4/5"`
    pub fn score_label(&self) -> String {
        format!("{}/{}", self.score, self.questions.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerCheck {
    pub correct: bool,
    pub chosen_text: String,
    pub correct_text: String,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub explanation: Option<String>,
}
impl Question {
    pub fn new(text: String, answers: Vec<Answer>) -> Self {
        Self {
            text,
            answers,
            explanation: None,
        }
    }

    pub fn correct_answer(&self) -> Option<&Answer> {
        self.answers.iter().find(|a| a.is_correct)
    }

    /// Keyboard label for an option, numbered from 1: `"4. 1"`.
    pub fn option_label(&self, index: usize) -> Option<String> {
        let answer = self.answers.get(index)?;
        Some(format!("{}. {}", index + 1, answer.text))
    }

    fn by_number(&self, reply: &str) -> Option<usize> {
        let n: usize = reply.trim().parse().ok()?;
        (1..=self.answers.len()).contains(&n).then(|| n - 1)
    }

    /// Matches a reply by 1-based number, by keyboard label or by option text.
    /// A bare number always means a position, even when some option reads
    /// like a number.
    fn find_answer(&self, reply: &str) -> Option<usize> {
        let reply = reply.trim();
        if let Some(i) = self.by_number(reply) {
            return Some(i);
        }
        let same = |i: usize, text: &str| self.answers[i].text.trim().eq_ignore_ascii_case(text);
        if let Some((n, text)) = reply.split_once(". ") {
            if let Some(i) = self.by_number(n).filter(|&i| same(i, text.trim())) {
                return Some(i);
            }
        }
        (0..self.answers.len()).find(|&i| same(i, reply))
    }
}

impl From<GeneratedQuestion> for Question {
    fn from(generated: GeneratedQuestion) -> Self {
        let correct = generated.correct_answer;
        Self {
            text: generated.question,
            answers: generated
                .options
                .into_iter()
                .enumerate()
                .map(|(i, text)| Answer::new(text, i == correct))
                .collect(),
            explanation: generated.explanation,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub is_correct: bool,
}
impl Answer {
    pub fn new(text: String, is_correct: bool) -> Self {
        Self { text, is_correct }
    }
}
