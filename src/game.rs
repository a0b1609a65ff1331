//! Generated quiz documents.
//!
//! The quiz flow returns its quiz as an opaque JSON string. Callers turn it
//! into a [`GameDocument`] here: multiple-choice quizzes become a typed
//! [`Quiz`], any other JSON is kept as-is for raw display.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::flow::extract_json;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameFormatError {
    #[error("The format might be unexpected: generated quiz is not valid JSON")]
    UnexpectedFormat { raw: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McqQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    pub questions: Vec<McqQuestion>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameDocument {
    Mcq(Quiz),
    /// Valid JSON in some other shape (word puzzle, partial quiz, ...).
    Unknown(Value),
}

/// Outcome of one answered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub index: usize,
    pub chosen: Option<String>,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizScore {
    pub correct: usize,
    pub total: usize,
    pub results: Vec<AnswerResult>,
}

/// Parse a generated quiz string.
pub fn classify(raw: &str) -> Result<GameDocument, GameFormatError> {
    let value = extract_json(raw).ok_or_else(|| GameFormatError::UnexpectedFormat {
        raw: raw.to_string(),
    })?;

    let is_mcq = value.get("type").and_then(|t| t.as_str()) == Some("mcq")
        && value.get("questions").map_or(false, Value::is_array);
    if is_mcq {
        if let Ok(quiz) = serde_json::from_value::<Quiz>(value.clone()) {
            return Ok(GameDocument::Mcq(quiz));
        }
    }
    Ok(GameDocument::Unknown(value))
}

impl Quiz {
    /// Grade chosen options, keyed by question index. Unanswered questions
    /// count as wrong.
    pub fn score(&self, answers: &HashMap<usize, String>) -> QuizScore {
        let results: Vec<AnswerResult> = self
            .questions
            .iter()
            .enumerate()
            .map(|(index, q)| {
                let chosen = answers.get(&index).cloned();
                let correct = chosen.as_deref() == Some(q.answer.as_str());
                AnswerResult {
                    index,
                    chosen,
                    correct,
                }
            })
            .collect();
        QuizScore {
            correct: results.iter().filter(|r| r.correct).count(),
            total: results.len(),
            results,
        }
    }
}
