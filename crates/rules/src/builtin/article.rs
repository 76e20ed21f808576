use super::{is_english, match_case, words};
use crate::finding::RuleMatch;
use crate::rule::{Rule, RuleContext, RuleError};

/// Vowel-initial words pronounced with a leading consonant sound.
const CONSONANT_SOUND_PREFIXES: &[&str] = &[
    "uni", "use", "usu", "uti", "uro", "eu", "one", "once", "ubiq", "ukr",
];

/// Consonant-initial words pronounced with a leading vowel sound.
const VOWEL_SOUND_PREFIXES: &[&str] = &["hour", "honest", "honor", "honour", "heir"];

/// Flags "a" before a vowel sound and "an" before a consonant sound.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArticleAgreement;

impl ArticleAgreement {
    fn expected_article(next: &str) -> Option<&'static str> {
        let lower = next.to_lowercase();
        let first = lower.chars().next()?;
        if !first.is_ascii_alphabetic() {
            return None;
        }
        // Acronyms ("an FAQ", "a URL") depend on how letters are spelled out.
        if next.len() > 1 && next.chars().all(|c| c.is_ascii_uppercase()) {
            return None;
        }
        let vowel_letter = matches!(first, 'a' | 'e' | 'i' | 'o' | 'u');
        let vowel_sound = if vowel_letter {
            !CONSONANT_SOUND_PREFIXES.iter().any(|p| lower.starts_with(p))
        } else {
            VOWEL_SOUND_PREFIXES.iter().any(|p| lower.starts_with(p))
        };
        Some(if vowel_sound { "an" } else { "a" })
    }
}

impl Rule for ArticleAgreement {
    fn id(&self) -> &str {
        "article-agreement"
    }

    fn supports(&self, language: &str) -> bool {
        is_english(language)
    }

    fn check(&self, text: &str, _ctx: &RuleContext) -> Result<Vec<RuleMatch>, RuleError> {
        let mut matches = Vec::new();
        let mut tokens = words(text).peekable();

        while let Some((offset, word)) = tokens.next() {
            let article = word.to_lowercase();
            if article != "a" && article != "an" {
                continue;
            }
            let Some(&(next_offset, next)) = tokens.peek() else {
                break;
            };
            let gap = &text[offset + word.len()..next_offset];
            if gap.is_empty() || !gap.chars().all(|c| c == ' ') {
                continue;
            }
            let Some(expected) = Self::expected_article(next) else {
                continue;
            };
            if expected != article {
                let suggestion = match_case(word, expected);
                matches.push(
                    RuleMatch::new(
                        offset,
                        word.len(),
                        format!("Use \"{suggestion}\" instead of \"{word}\" before \"{next}\"."),
                    )
                    .with_suggestion(suggestion),
                );
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str) -> Vec<RuleMatch> {
        ArticleAgreement.check(text, &RuleContext::new("en")).unwrap()
    }

    #[test]
    fn a_before_vowel() {
        let found = check("This is a apple.");
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].start, found[0].length), (8, 1));
        assert_eq!(found[0].suggestion.as_deref(), Some("an"));
    }

    #[test]
    fn an_before_consonant_keeps_case() {
        let found = check("An banana.");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].suggestion.as_deref(), Some("A"));
    }

    #[test]
    fn pronunciation_exceptions() {
        assert!(check("a university and an hour and a one-off").is_empty());
        assert!(check("an FAQ and a URL").is_empty());
    }
}
