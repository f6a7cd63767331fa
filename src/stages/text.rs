//! Tokenization shared by bag-of-words and tf-idf.

use regex::Regex;
use std::sync::LazyLock;

/// Two or more word characters between word boundaries.
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

/// Lowercased tokens of `text`, in order of appearance.
pub fn tokens(text: &str) -> Vec<String> {
    let text = text.to_lowercase();
    TOKEN.find_iter(&text).map(|m| m.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::tokens;

    #[test]
    fn drops_single_characters_and_punctuation() {
        assert_eq!(tokens("A cat, the Cat's hat!"), vec!["cat", "the", "cat", "hat"]);
    }

    #[test]
    fn keeps_unicode_words() {
        assert_eq!(tokens("Überall Straße"), vec!["überall", "straße"]);
    }
}
