//! Question sets for spot-checking retrieval.
//!
//! A question file is a JSON array or an id -> item object. Items are either
//! bare question strings or objects with `question` and an optional
//! reference `answer`.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use crate::index::QueryResult;
use crate::retrieval::RetrievalService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    pub answer: Option<String>,
}

/// One question with the chunks retrieved for it.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionHits {
    #[serde(flatten)]
    pub question: Question,
    pub hits: Vec<QueryResult>,
}

/// Load at most `limit` questions from `path`. Arrays keep their order;
/// objects are ordered by id.
pub fn load_questions(path: &Path, limit: Option<usize>) -> Result<Vec<Question>> {
    if !path.exists() {
        return Err(RagError::Questions(format!("{} does not exist", path.display())));
    }
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| RagError::Questions(format!("{}: {}", path.display(), e)))?;
    let mut questions = parse_questions(value)
        .map_err(|e| RagError::Questions(format!("{}: {}", path.display(), e)))?;
    if let Some(limit) = limit {
        questions.truncate(limit);
    }
    debug!(file = %path.display(), questions = questions.len(), "loaded question set");
    Ok(questions)
}

pub fn parse_questions(value: Value) -> std::result::Result<Vec<Question>, String> {
    let items: Vec<(String, Value)> = match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let id = item
                    .get("id")
                    .and_then(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .unwrap_or_else(|| (i + 1).to_string());
                (id, item)
            })
            .collect(),
        Value::Object(map) => map.into_iter().collect(),
        _ => return Err("question set must be a JSON array or object".to_string()),
    };

    let mut questions = Vec::with_capacity(items.len());
    for (id, item) in items {
        let (question, answer) = match &item {
            Value::String(s) => (Some(s.clone()), None),
            Value::Object(map) => (
                map.get("question").and_then(Value::as_str).map(str::to_string),
                map.get("answer").and_then(Value::as_str).map(str::to_string),
            ),
            _ => (None, None),
        };
        match question.filter(|q| !q.trim().is_empty()) {
            Some(question) => questions.push(Question { id, question, answer }),
            None => warn!(id = %id, "question item has no question text; skipping"),
        }
    }
    Ok(questions)
}

/// Retrieve the `top_k` chunks for every question.
pub async fn run_questions<E: Embedder>(
    service: &RetrievalService<E>,
    questions: Vec<Question>,
    top_k: usize,
) -> Result<Vec<QuestionHits>> {
    let mut out = Vec::with_capacity(questions.len());
    for question in questions {
        let hits = service.retrieve(&question.question, top_k).await?;
        out.push(QuestionHits { question, hits });
    }
    Ok(out)
}
