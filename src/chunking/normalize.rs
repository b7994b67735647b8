use std::sync::OnceLock;

use regex::Regex;

fn newline_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+").expect("static regex"))
}

fn horizontal_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("static regex"))
}

fn sentence_ends() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\s+").expect("static regex"))
}

/// Clean raw corpus text for segmentation.
///
/// Line endings are unified, newline and space/tab runs collapse, the text is
/// reflowed onto one line, and every period followed by whitespace becomes a
/// paragraph break (`".\n"`). Never fails; `""` stays `""`.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = newline_runs().replace_all(&text, "\n");
    let text = text.replace('\n', " ");
    let text = horizontal_runs().replace_all(&text, " ");
    sentence_ends().replace_all(&text, ".\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_collapses_whitespace_and_breaks_sentences() {
        let raw = "Fever.  Cough\n\n\nand \t pain. End";
        assert_eq!(normalize(raw), "Fever.\nCough and pain.\nEnd");
    }

    #[test]
    fn test_windows_line_endings() {
        assert_eq!(normalize("a\r\n\r\nb"), "a b");
    }

    #[test]
    fn test_period_without_whitespace_is_not_a_break() {
        assert_eq!(normalize("0.5 mg. Twice daily"), "0.5 mg.\nTwice daily");
    }

    #[test]
    fn test_deterministic() {
        let raw = "Insulin lowers glucose.\nMetformin is first line.";
        assert_eq!(normalize(raw), normalize(raw));
    }
}
