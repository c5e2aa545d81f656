//! Mark scheme parsing and maximum-mark structure.
//!
//! The source is a JSON list of questions, each a list of `"<label> <max>"`
//! part strings, e.g. `[["a 2", "b 5"], [". 8"]]`.

use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::errors::{MarkingError, MarkingResult};

/// One labelled sub-part of a question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemePart {
    pub label: String,
    pub max: i64,
}

/// Maximum-mark structure a candidate's marks are checked against.
/// Immutable once parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkScheme {
    questions: Vec<Vec<SchemePart>>,
    question_max: Vec<i64>,
    total_max: i64,
}

impl MarkScheme {
    /// Parse a scheme from its JSON text.
    pub fn from_json_str(text: &str) -> MarkingResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| MarkingError::SchemeFormat(format!("not valid JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Read and parse a scheme file.
    pub fn load(path: &Path) -> MarkingResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MarkingError::SchemeFormat(format!("cannot read {}: {e}", path.display()))
        })?;
        let scheme = Self::from_json_str(&text)?;
        info!(
            questions = scheme.question_count(),
            total = scheme.total_max(),
            "Loaded mark scheme from {}",
            path.display()
        );
        Ok(scheme)
    }

    /// Build a scheme from an already-decoded JSON value.
    pub fn from_value(value: &Value) -> MarkingResult<Self> {
        let questions = value
            .as_array()
            .ok_or_else(|| MarkingError::SchemeFormat("top level must be a list".to_string()))?;

        let mut parsed = Vec::with_capacity(questions.len());
        for (qi, question) in questions.iter().enumerate() {
            let parts = question.as_array().ok_or_else(|| {
                MarkingError::SchemeFormat(format!("question {} must be a list", qi + 1))
            })?;
            let mut parsed_parts = Vec::with_capacity(parts.len());
            for (pi, part) in parts.iter().enumerate() {
                let text = part.as_str().ok_or_else(|| {
                    MarkingError::SchemeFormat(format!(
                        "question {} part {} must be a string",
                        qi + 1,
                        pi + 1
                    ))
                })?;
                parsed_parts.push(parse_part(text)?);
            }
            parsed.push(parsed_parts);
        }
        Self::from_parts(parsed)
    }

    /// Build a scheme from already-split parts.
    pub fn from_parts(questions: Vec<Vec<SchemePart>>) -> MarkingResult<Self> {
        if let Some(qi) = questions.iter().position(|q| q.is_empty()) {
            return Err(MarkingError::SchemeFormat(format!(
                "question {} has no parts",
                qi + 1
            )));
        }
        if questions.iter().flatten().any(|p| p.max < 0) {
            return Err(MarkingError::SchemeFormat(
                "part maxima must be non-negative".to_string(),
            ));
        }
        let question_max: Vec<i64> = questions
            .iter()
            .map(|q| q.iter().map(|p| p.max).sum())
            .collect();
        let total_max = question_max.iter().sum();
        debug_assert_eq!(question_max.len(), questions.len());
        Ok(Self {
            questions,
            question_max,
            total_max,
        })
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Maximum score of each question.
    pub fn question_max(&self) -> &[i64] {
        &self.question_max
    }

    pub fn total_max(&self) -> i64 {
        self.total_max
    }

    pub fn questions(&self) -> &[Vec<SchemePart>] {
        &self.questions
    }

    /// Part maxima of question `index` (0-based).
    pub fn part_max(&self, index: usize) -> Vec<i64> {
        self.questions
            .get(index)
            .map(|q| q.iter().map(|p| p.max).collect())
            .unwrap_or_default()
    }

    pub fn part_count(&self, index: usize) -> usize {
        self.questions.get(index).map_or(0, Vec::len)
    }

    /// Human-readable listing of question maxima, one line per question.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (i, max) in self.question_max.iter().enumerate() {
            out.push_str(&breakdown_line(
                i + 1,
                &max.to_string(),
                &self.part_max(i),
            ));
        }
        out
    }
}

/// Split `"<label> <max>"` on its single space.
fn parse_part(text: &str) -> MarkingResult<SchemePart> {
    let tokens: Vec<&str> = text.split(' ').collect();
    let [label, max_text] = tokens.as_slice() else {
        return Err(MarkingError::SchemeFormat(format!(
            "part {text:?} is not \"<label> <max>\""
        )));
    };
    let max: i64 = max_text
        .parse()
        .ok()
        .filter(|m: &i64| *m >= 0)
        .ok_or_else(|| {
            MarkingError::SchemeFormat(format!(
                "part {text:?} max {max_text:?} is not a non-negative integer"
            ))
        })?;
    Ok(SchemePart {
        label: (*label).to_string(),
        max,
    })
}

/// One `Qn:  total  [parts]` line shared by the scheme and candidate listings.
pub(crate) fn breakdown_line(number: usize, total: &str, parts: &[i64]) -> String {
    format!("Q{:<2}:  {:<2}  {:<20}\n", number, total, format!("{parts:?}"))
}
