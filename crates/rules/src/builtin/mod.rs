//! Built-in rules. Each is a plain struct implementing [`Rule`](crate::Rule);
//! [`RuleKind`](crate::RuleKind) is the registry that builds them.

mod article;
mod repetition;
mod sentence;
mod spacing;
mod spelling;

pub use article::ArticleAgreement;
pub use repetition::RepeatedWord;
pub use sentence::{SentenceCase, SentenceLength};
pub use spacing::{PunctuationSpacing, Whitespace};
pub use spelling::Spelling;

use unicode_segmentation::UnicodeSegmentation;

/// Word tokens with their byte offsets. Punctuation and whitespace runs are
/// skipped; contractions such as `don't` stay a single word.
pub(crate) fn words(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_word_bound_indices()
        .filter(|(_, w)| w.chars().any(char::is_alphanumeric))
}

pub(crate) fn is_english(language: &str) -> bool {
    language == "en" || language.starts_with("en-")
}

/// Re-apply the letter case of `original` to `replacement`.
pub(crate) fn match_case(original: &str, replacement: &str) -> String {
    let mut letters = original.chars().filter(|c| c.is_alphabetic());
    let first_upper = letters.next().is_some_and(char::is_uppercase);
    let all_upper = first_upper && original.chars().filter(|c| c.is_alphabetic()).count() > 1
        && original.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase);
    if all_upper {
        replacement.to_uppercase()
    } else if first_upper {
        capitalize(replacement)
    } else {
        replacement.to_string()
    }
}

pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_skip_punctuation() {
        let tokens: Vec<_> = words("Hello, don't stop!").collect();
        assert_eq!(tokens, vec![(0, "Hello"), (7, "don't"), (13, "stop")]);
    }

    #[test]
    fn case_is_preserved() {
        assert_eq!(match_case("thiss", "this"), "this");
        assert_eq!(match_case("Thiss", "this"), "This");
        assert_eq!(match_case("THISS", "this"), "THIS");
        assert_eq!(match_case("A", "an"), "An");
    }

    #[test]
    fn english_tags() {
        assert!(is_english("en"));
        assert!(is_english("en-GB"));
        assert!(!is_english("de"));
        assert!(!is_english("eng"));
    }
}
