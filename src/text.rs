//! Tokenization and normalization shared by the folder and contact pipelines.

/// Lowercase `input` and split it on every run of non-alphanumeric characters.
///
/// Empty tokens are dropped, so leading/trailing punctuation never yields `""`.
pub fn tokenize(input: &str) -> Vec<String> {
    input
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokenize and re-join with single spaces: `"Acme_Corp / 2024"` → `"acme corp 2024"`.
pub fn normalize(input: &str) -> String {
    tokenize(input).join(" ")
}

/// Strip the final extension from a filename (`"report.final.pdf"` → `"report.final"`).
///
/// Dot-files and names without a dot, or ending in one, are returned unchanged.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) if idx + 1 == name.len() => name,
        Some(idx) if name[idx + 1..].contains(['/', '\\']) => name,
        Some(idx) => &name[..idx],
    }
}

/// Every contiguous run of `tokens`, joined by single spaces.
///
/// For `n` tokens this yields `n * (n + 1) / 2` phrases, longest-first within
/// each starting position.
pub fn contiguous_phrases(tokens: &[String]) -> Vec<String> {
    let mut phrases = Vec::with_capacity(tokens.len() * (tokens.len() + 1) / 2);
    for start in 0..tokens.len() {
        for end in (start + 1..=tokens.len()).rev() {
            phrases.push(tokens[start..end].join(" "));
        }
    }
    phrases
}

/// Uppercase the first character and lowercase the rest.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Sørensen–Dice coefficient over character bigrams, whitespace ignored.
///
/// Identical strings score 1.0; strings shorter than two characters only
/// match when identical.
pub fn bigram_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().filter(|c| !c.is_whitespace()).collect();
    let b: Vec<char> = b.chars().filter(|c| !c.is_whitespace()).collect();

    if a == b {
        return 1.0;
    }
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    let mut remaining: Vec<(char, char)> = a.windows(2).map(|w| (w[0], w[1])).collect();
    let total = remaining.len() + b.len() - 1;

    let mut shared = 0usize;
    for pair in b.windows(2).map(|w| (w[0], w[1])) {
        if let Some(pos) = remaining.iter().position(|p| *p == pair) {
            remaining.swap_remove(pos);
            shared += 1;
        }
    }

    (2 * shared) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_punctuation() {
        assert_eq!(
            tokenize("Invoice_2024(Final).pdf"),
            vec!["invoice", "2024", "final", "pdf"]
        );
    }

    #[test]
    fn tokenize_is_deterministic() {
        let input = "Q3 -- Board  Pack.v2";
        assert_eq!(tokenize(input), tokenize(input));
    }

    #[test]
    fn tokenize_drops_empty_tokens() {
        assert!(tokenize("  __--..  ").is_empty());
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn tokenize_keeps_unicode_letters() {
        assert_eq!(tokenize("Offerte Müller-BV"), vec!["offerte", "müller", "bv"]);
    }

    #[test]
    fn normalize_joins_with_single_spaces() {
        assert_eq!(normalize("Acme_Corp / 2024"), "acme corp 2024");
    }

    #[test]
    fn strip_extension_variants() {
        assert_eq!(strip_extension("report.final.pdf"), "report.final");
        assert_eq!(strip_extension("README"), "README");
        assert_eq!(strip_extension(".env"), ".env");
        assert_eq!(strip_extension("file."), "file.");
        assert_eq!(strip_extension("offer.v2."), "offer.v2.");
    }

    #[test]
    fn contiguous_phrases_covers_all_runs() {
        let tokens = tokenize("acme corp offer");
        let phrases = contiguous_phrases(&tokens);
        assert_eq!(phrases.len(), 6);
        assert!(phrases.contains(&"acme corp offer".to_string()));
        assert!(phrases.contains(&"corp offer".to_string()));
        assert!(phrases.contains(&"corp".to_string()));
        assert!(!phrases.contains(&"acme offer".to_string()));
    }

    #[test]
    fn capitalize_word() {
        assert_eq!(capitalize("aCME"), "Acme");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn bigram_similarity_bounds() {
        assert_eq!(bigram_similarity("acme", "acme"), 1.0);
        assert_eq!(bigram_similarity("abc", "xyz"), 0.0);
        let partial = bigram_similarity("acme corp", "acme");
        assert!(partial > 0.0 && partial < 1.0);
    }
}
