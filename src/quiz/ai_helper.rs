use std::future::Future;
use std::time::Duration;

use chatgpt::client::ChatGPT;
use chatgpt::types::CompletionResponse;

use crate::mock_test::{self, BlueprintEntry, BlueprintError, GeneratedQuestion, ParseError};
use crate::quiz::{Difficulty, Question};

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("language model request failed: {0}")]
    Backend(#[from] chatgpt::err::Error),
    #[error("unusable model reply: {0}")]
    Reply(#[from] ParseError),
    #[error(transparent)]
    Blueprint(#[from] BlueprintError),
    #[error("no correct answer on question {0:?}")]
    NoCorrectAnswer(String),
    #[error("gave up on {what} after {attempts} attempts: {last}")]
    GaveUp {
        what: &'static str,
        attempts: u32,
        #[source]
        last: Box<AiError>,
    },
}

impl AiError {
    /// Worth asking again with the same payload.
    pub fn is_transient(&self) -> bool {
        matches!(self, AiError::Backend(_) | AiError::Reply(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Doubled after every failed attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// attempts run out.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    what: &'static str,
    mut op: F,
) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut delay = policy.base_delay;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt == attempts => {
                return Err(AiError::GaveUp {
                    what,
                    attempts,
                    last: Box::new(e),
                })
            }
            Err(e) => {
                log::warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    what,
                    attempt,
                    attempts,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }
    }
    unreachable!("the last attempt always returns")
}

pub enum Persona {
    Friendly,
    Socratic,
    Concise,
}
impl Persona {
    pub fn get_persona(&self) -> &'static str {
        match self {
            Persona::Friendly => "a warm, encouraging math tutor",
            Persona::Socratic => "a tutor who guides with questions before revealing the answer",
            Persona::Concise => "a precise tutor who keeps explanations short",
        }
    }
}

pub struct MathHelper {
    persona: Persona,
    chat_gpt: ChatGPT,
    retry: RetryPolicy,
}

impl MathHelper {
    pub fn new(chat_gpt: ChatGPT, persona: Persona, retry: RetryPolicy) -> Self {
        Self {
            persona,
            chat_gpt,
            retry,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let response: CompletionResponse = self.chat_gpt.send_message(prompt).await?;
        let content = response.message().clone().content;
        log::debug!("Completion: {:?}", content);
        Ok(content)
    }

    pub async fn solve_problem(&self, problem: &str) -> Result<String, AiError> {
        log::info!("Solving problem: {:?}", problem);
        let prompt = format!(
            "You are {}. Solve the following math problem step by step, \
            numbering the steps and stating the final answer on its own line.\n\n{}",
            self.persona.get_persona(),
            problem
        );
        let prompt = prompt.as_str();
        retry_with_backoff(self.retry, "problem solving", move || async move {
            self.complete(prompt).await
        })
        .await
    }

    pub async fn generate_quiz(
        &self,
        topics: &[String],
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<GeneratedQuestion>, AiError> {
        log::info!("Generating {} {} questions on {:?}", count, difficulty.label(), topics);
        let prompt = mock_test::quiz_prompt(topics, difficulty, count);
        let prompt = prompt.as_str();
        retry_with_backoff(self.retry, "quiz generation", move || async move {
            let reply = self.complete(prompt).await?;
            Ok(mock_test::parse_generated_questions(&reply, count)?)
        })
        .await
    }

    /// Validates the blueprint first; an invalid one never reaches the model.
    pub async fn generate_mock_test(
        &self,
        education_level: &str,
        blueprint: &[BlueprintEntry],
        total_questions: u32,
    ) -> Result<Vec<GeneratedQuestion>, AiError> {
        mock_test::validate_blueprint(blueprint, total_questions)?;
        let prompt = mock_test::mock_test_prompt(education_level, blueprint, total_questions);
        let prompt = prompt.as_str();
        let expected = total_questions as usize;
        retry_with_backoff(self.retry, "mock test generation", move || async move {
            let reply = self.complete(prompt).await?;
            Ok(mock_test::parse_generated_questions(&reply, expected)?)
        })
        .await
    }

    pub async fn explain_wrong_answer(&self, question: &Question, chosen: &str) -> Result<String, AiError> {
        log::info!("Explaining wrong answer for question: {:?}", question.text);
        let correct = question
            .correct_answer()
            .ok_or_else(|| AiError::NoCorrectAnswer(question.text.clone()))?;
        let prompt = format!(
            "You are {}. A student answered this question:\n{}\n\
            They chose \"{}\", but the correct answer is \"{}\". \
            Explain the mistake and how to get the right answer in at most two short paragraphs.",
            self.persona.get_persona(),
            question.text,
            chosen,
            correct.text
        );
        // One attempt: the caller already has a fallback message.
        self.complete(&prompt).await
    }
}
