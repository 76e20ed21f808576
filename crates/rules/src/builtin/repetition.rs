use super::words;
use crate::finding::RuleMatch;
use crate::rule::{Rule, RuleContext, RuleError};

/// Flags the same word appearing twice in a row, e.g. "the the".
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeatedWord;

impl Rule for RepeatedWord {
    fn id(&self) -> &str {
        "repeated-word"
    }

    fn check(&self, text: &str, _ctx: &RuleContext) -> Result<Vec<RuleMatch>, RuleError> {
        let mut matches = Vec::new();
        let mut previous: Option<(usize, &str)> = None;

        for (offset, word) in words(text) {
            if let Some((prev_offset, prev_word)) = previous {
                let gap = &text[prev_offset + prev_word.len()..offset];
                let adjacent = !gap.is_empty()
                    && gap.chars().all(char::is_whitespace)
                    && !gap.contains("\n\n");
                let is_number = word.chars().all(|c| c.is_ascii_digit());
                if adjacent && !is_number && prev_word.to_lowercase() == word.to_lowercase() {
                    let end = offset + word.len();
                    matches.push(
                        RuleMatch::new(
                            prev_offset,
                            end - prev_offset,
                            format!("Possible typo: you repeated the word \"{prev_word}\"."),
                        )
                        .with_suggestion(prev_word),
                    );
                    // "the the the" reports once per pair, not overlapping triples.
                    previous = None;
                    continue;
                }
            }
            previous = Some((offset, word));
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str) -> Vec<RuleMatch> {
        RepeatedWord.check(text, &RuleContext::new("en")).unwrap()
    }

    #[test]
    fn flags_repeated_word() {
        let found = check("This is the the end.");
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].start, found[0].length), (8, 7));
        assert_eq!(found[0].suggestion.as_deref(), Some("the"));
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(check("The the end.").len(), 1);
    }

    #[test]
    fn punctuation_or_paragraph_breaks_separate() {
        assert!(check("Is it? It is.").is_empty());
        assert!(check("end\n\nend").is_empty());
        assert!(check("wait, wait").is_empty());
    }

    #[test]
    fn numbers_ignored() {
        assert!(check("version 1 1 released").is_empty());
    }
}
