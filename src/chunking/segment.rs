use super::char_len;

/// Paragraphs shorter than this are assumed to be headers or numbering.
pub const DEFAULT_MIN_PARAGRAPH_LEN: usize = 50;

/// Split normalized text into trimmed paragraphs of at least `min_len`
/// characters, in input order.
///
/// An empty result means the document has nothing to index. Callers treat
/// that as a failure for the document instead of retrying with a lower
/// threshold.
pub fn segment(text: &str, min_len: usize) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|p| !p.is_empty() && char_len(p) >= min_len)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_short_paragraphs() {
        let long = "Hypertension is a chronic elevation of arterial blood pressure.";
        let text = format!("Chapter 1\n  {}  \n\n2.1", long);
        assert_eq!(segment(&text, DEFAULT_MIN_PARAGRAPH_LEN), vec![long.to_string()]);
    }

    #[test]
    fn test_all_short_yields_empty() {
        assert!(segment("a\nb\nc", DEFAULT_MIN_PARAGRAPH_LEN).is_empty());
        assert!(segment("", DEFAULT_MIN_PARAGRAPH_LEN).is_empty());
    }

    #[test]
    fn test_preserves_order_and_counts_chars() {
        // 10 CJK characters is 30 bytes but only 10 characters
        let cjk = "糖尿病是一种代谢疾病";
        let text = format!("{}\nsecond paragraph", cjk);
        assert_eq!(segment(&text, 10), vec![cjk.to_string(), "second paragraph".to_string()]);
        assert_eq!(segment(&text, 11), vec!["second paragraph".to_string()]);
    }
}
