use std::collections::{BTreeMap, BTreeSet, HashMap};

use once_cell::sync::Lazy;

use super::{is_english, match_case, words};
use crate::finding::{RuleMatch, Severity};
use crate::rule::{Rule, RuleContext, RuleError};

static COMMON_MISSPELLINGS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("thiss", "this"),
        ("teh", "the"),
        ("recieve", "receive"),
        ("recieved", "received"),
        ("seperate", "separate"),
        ("occured", "occurred"),
        ("occurence", "occurrence"),
        ("definately", "definitely"),
        ("untill", "until"),
        ("wich", "which"),
        ("acheive", "achieve"),
        ("beleive", "believe"),
        ("adress", "address"),
        ("accomodate", "accommodate"),
        ("goverment", "government"),
        ("enviroment", "environment"),
        ("existance", "existence"),
        ("independant", "independent"),
        ("neccessary", "necessary"),
        ("tommorow", "tomorrow"),
        ("wierd", "weird"),
        ("alot", "a lot"),
        ("becuase", "because"),
        ("thier", "their"),
        ("freind", "friend"),
        ("begining", "beginning"),
        ("calender", "calendar"),
        ("truely", "truly"),
        ("publically", "publicly"),
        ("arguement", "argument"),
        ("succesful", "successful"),
        ("wether", "whether"),
        ("lenght", "length"),
        ("paramter", "parameter"),
        ("retreive", "retrieve"),
    ]
    .into_iter()
    .collect()
});

/// Flags words found in a list of common misspellings.
#[derive(Debug, Clone, Default)]
pub struct Spelling {
    custom: HashMap<String, String>,
    ignored: BTreeSet<String>,
}

impl Spelling {
    pub fn new(custom: &BTreeMap<String, String>, ignored: &BTreeSet<String>) -> Self {
        Self {
            custom: custom
                .iter()
                .map(|(wrong, right)| (wrong.to_lowercase(), right.clone()))
                .collect(),
            ignored: ignored.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    fn correction(&self, lower: &str) -> Option<&str> {
        if self.ignored.contains(lower) {
            return None;
        }
        self.custom
            .get(lower)
            .map(String::as_str)
            .or_else(|| COMMON_MISSPELLINGS.get(lower).copied())
    }
}

impl Rule for Spelling {
    fn id(&self) -> &str {
        "spelling"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn supports(&self, language: &str) -> bool {
        is_english(language)
    }

    fn check(&self, text: &str, _ctx: &RuleContext) -> Result<Vec<RuleMatch>, RuleError> {
        let mut matches = Vec::new();
        for (offset, word) in words(text) {
            let lower = word.to_lowercase();
            if let Some(fix) = self.correction(&lower) {
                let suggestion = match_case(word, fix);
                matches.push(
                    RuleMatch::new(
                        offset,
                        word.len(),
                        format!("Possible spelling mistake: did you mean \"{suggestion}\"?"),
                    )
                    .with_suggestion(suggestion),
                );
            }
        }
        Ok(matches)
    }
}
