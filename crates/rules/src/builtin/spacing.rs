use crate::finding::{RuleMatch, Severity};
use crate::rule::{Rule, RuleContext, RuleError};

/// Flags runs of two or more spaces between words. Indentation and trailing
/// spaces are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct Whitespace;

impl Rule for Whitespace {
    fn id(&self) -> &str {
        "whitespace"
    }

    fn default_severity(&self) -> Severity {
        Severity::Info
    }

    fn check(&self, text: &str, _ctx: &RuleContext) -> Result<Vec<RuleMatch>, RuleError> {
        let mut matches = Vec::new();
        for (start, end) in space_runs(text) {
            if end - start < 2 {
                continue;
            }
            let inner = start > 0
                && !text[..start].ends_with('\n')
                && end < text.len()
                && !text[end..].starts_with('\n');
            if inner {
                matches.push(
                    RuleMatch::new(start, end - start, "Use a single space between words.")
                        .with_suggestion(" "),
                );
            }
        }
        Ok(matches)
    }
}

/// Flags whitespace directly before `,` `.` `;` `:` `!` or `?`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationSpacing;

impl Rule for PunctuationSpacing {
    fn id(&self) -> &str {
        "punctuation-spacing"
    }

    fn check(&self, text: &str, _ctx: &RuleContext) -> Result<Vec<RuleMatch>, RuleError> {
        let mut matches = Vec::new();
        for (start, end) in space_runs(text) {
            if start == 0 || text[..start].ends_with('\n') {
                continue;
            }
            let mut rest = text[end..].chars();
            let Some(mark) = rest.next() else {
                continue;
            };
            if !matches!(mark, ',' | '.' | ';' | ':' | '!' | '?') {
                continue;
            }
            // ".5", ".NET", " ..." and ":)" are not misplaced punctuation.
            let next = rest.next();
            if next.is_some_and(|c| c.is_alphanumeric() || c == '.' || c == ')' || c == '(') {
                continue;
            }
            matches.push(
                RuleMatch::new(
                    start,
                    end - start,
                    format!("Remove the space before \"{mark}\"."),
                )
                .with_suggestion(""),
            );
        }
        Ok(matches)
    }
}

/// Byte ranges of maximal runs of spaces and tabs.
fn space_runs(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut runs = Vec::new();
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b' ' || bytes[idx] == b'\t' {
            let start = idx;
            while idx < bytes.len() && (bytes[idx] == b' ' || bytes[idx] == b'\t') {
                idx += 1;
            }
            runs.push((start, idx));
        } else {
            idx += 1;
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RuleContext {
        RuleContext::new("en")
    }

    #[test]
    fn double_space_flagged() {
        let found = Whitespace.check("one  two", &ctx()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].start, found[0].length), (3, 2));
    }

    #[test]
    fn indentation_and_trailing_ignored() {
        assert!(Whitespace.check("  indented\nline  \nend", &ctx()).unwrap().is_empty());
    }

    #[test]
    fn space_before_comma() {
        let found = PunctuationSpacing.check("Hello , world", &ctx()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].start, found[0].length), (5, 1));
        assert_eq!(found[0].suggestion.as_deref(), Some(""));
    }

    #[test]
    fn numbers_and_ellipses_ignored() {
        let rule = PunctuationSpacing;
        assert!(rule.check("costs .5 dollars", &ctx()).unwrap().is_empty());
        assert!(rule.check("and then ...", &ctx()).unwrap().is_empty());
        assert!(rule.check("Hello, world.", &ctx()).unwrap().is_empty());
    }

    #[test]
    fn trailing_space_before_final_mark() {
        let found = PunctuationSpacing.check("Really ?", &ctx()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 6);
    }
}
