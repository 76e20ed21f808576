use std::ops::Range;

use super::{capitalize, is_english, words};
use crate::finding::{RuleMatch, Severity};
use crate::rule::{Rule, RuleContext, RuleError};

const ABBREVIATIONS: &[&str] = &[
    "e.g", "i.e", "etc", "vs", "cf", "mr", "mrs", "ms", "dr", "st", "no", "fig", "approx",
];

/// Flags sentences that start with a lowercase letter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceCase;

impl Rule for SentenceCase {
    fn id(&self) -> &str {
        "sentence-case"
    }

    fn supports(&self, language: &str) -> bool {
        is_english(language)
    }

    fn check(&self, text: &str, _ctx: &RuleContext) -> Result<Vec<RuleMatch>, RuleError> {
        let mut matches = Vec::new();
        for span in sentence_spans(text) {
            let Some((offset, word)) = words(&text[span.clone()]).next() else {
                continue;
            };
            let starts_lower = word.chars().next().is_some_and(char::is_lowercase);
            // Skip identifiers such as "iPhone" or "x86".
            let plain_word = word
                .chars()
                .skip(1)
                .all(|c| (c.is_alphabetic() && !c.is_uppercase()) || c == '\'');
            if starts_lower && plain_word {
                let start = span.start + offset;
                matches.push(
                    RuleMatch::new(
                        start,
                        word.len(),
                        "This sentence does not start with an uppercase letter.",
                    )
                    .with_suggestion(capitalize(word)),
                );
            }
        }
        Ok(matches)
    }
}

/// Flags sentences longer than a configured number of words.
#[derive(Debug, Clone, Copy)]
pub struct SentenceLength {
    max_words: usize,
}

impl SentenceLength {
    pub fn new(max_words: usize) -> Self {
        Self { max_words }
    }
}

impl Rule for SentenceLength {
    fn id(&self) -> &str {
        "sentence-length"
    }

    fn default_severity(&self) -> Severity {
        Severity::Info
    }

    fn check(&self, text: &str, ctx: &RuleContext) -> Result<Vec<RuleMatch>, RuleError> {
        let mut matches = Vec::new();
        for span in sentence_spans(text) {
            ctx.checkpoint()?;
            let count = words(&text[span.clone()]).count();
            if count > self.max_words {
                matches.push(RuleMatch::new(
                    span.start,
                    span.len(),
                    format!(
                        "This sentence has {count} words; consider splitting it (limit {}).",
                        self.max_words
                    ),
                ));
            }
        }
        Ok(matches)
    }
}

/// Split text into trimmed sentence ranges. A sentence ends at `.`, `!` or
/// `?` followed by whitespace, or at a blank line.
pub(crate) fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let boundary = match ch {
            '.' | '!' | '?' => {
                let mut end = idx + ch.len_utf8();
                while let Some(&(next_idx, next)) = chars.peek() {
                    if matches!(next, '.' | '!' | '?' | '"' | '\'' | ')' | '\u{201d}' | '\u{2019}') {
                        end = next_idx + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let followed_by_space = text[end..].chars().next().map_or(true, char::is_whitespace);
                let abbreviation = ch == '.' && ends_with_abbreviation(&text[start..idx]);
                (followed_by_space && !abbreviation).then_some(end)
            }
            '\n' if text[idx + 1..].starts_with('\n') => Some(idx),
            _ => None,
        };
        if let Some(end) = boundary {
            push_trimmed(text, start..end, &mut spans);
            start = end;
        }
    }
    push_trimmed(text, start..text.len(), &mut spans);
    spans
}

fn ends_with_abbreviation(prefix: &str) -> bool {
    let last = prefix
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .to_lowercase();
    ABBREVIATIONS.contains(&last.as_str())
}

fn push_trimmed(text: &str, range: Range<usize>, spans: &mut Vec<Range<usize>>) {
    let slice = &text[range.clone()];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading + trailing < slice.len() {
        spans.push(range.start + leading..range.end - trailing);
    }
}
