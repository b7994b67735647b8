pub const SYSTEM_MEDICAL_ASSISTANT: &str = r#"You are a medical information assistant. Answer the question using only the reference passages provided. If the passages do not contain the answer, say so. Be concise and factual, and do not give personal medical advice."#;

/// Answer returned when retrieval found nothing to ground a response on.
pub const NO_CONTEXT_ANSWER: &str =
    "I could not find relevant material in the knowledge base to answer this question.";

pub fn answer_prompt(question: &str, contexts: &[String]) -> String {
    let passages = contexts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("[{}] {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Reference passages:

{}

---
QUESTION:
{}
---

Answer:"#,
        truncate_for_llm(&passages),
        question.trim()
    )
}

/// Truncate passages to fit within small-model context limits
fn truncate_for_llm(text: &str) -> &str {
    const MAX_CHARS: usize = 12_000;
    match text.char_indices().nth(MAX_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}
