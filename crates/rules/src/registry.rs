use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builtin::{
    ArticleAgreement, PunctuationSpacing, RepeatedWord, SentenceCase, SentenceLength, Spelling,
    Whitespace,
};
use crate::rule::Rule;

pub const DEFAULT_MAX_SENTENCE_WORDS: usize = 40;

/// Tunables shared by the built-in rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOptions {
    pub max_sentence_words: usize,
    /// Extra `misspelling -> correction` pairs for the spelling rule.
    pub custom_misspellings: BTreeMap<String, String>,
    /// Words the spelling rule never flags.
    pub ignored_words: BTreeSet<String>,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            max_sentence_words: DEFAULT_MAX_SENTENCE_WORDS,
            custom_misspellings: BTreeMap::new(),
            ignored_words: BTreeSet::new(),
        }
    }
}

/// The closed set of built-in rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    Spelling,
    RepeatedWord,
    Whitespace,
    PunctuationSpacing,
    SentenceCase,
    ArticleAgreement,
    SentenceLength,
}

impl RuleKind {
    pub const ALL: [RuleKind; 7] = [
        RuleKind::Spelling,
        RuleKind::RepeatedWord,
        RuleKind::Whitespace,
        RuleKind::PunctuationSpacing,
        RuleKind::SentenceCase,
        RuleKind::ArticleAgreement,
        RuleKind::SentenceLength,
    ];

    pub fn id(self) -> &'static str {
        match self {
            RuleKind::Spelling => "spelling",
            RuleKind::RepeatedWord => "repeated-word",
            RuleKind::Whitespace => "whitespace",
            RuleKind::PunctuationSpacing => "punctuation-spacing",
            RuleKind::SentenceCase => "sentence-case",
            RuleKind::ArticleAgreement => "article-agreement",
            RuleKind::SentenceLength => "sentence-length",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn build(self, options: &RuleOptions) -> Arc<dyn Rule> {
        match self {
            RuleKind::Spelling => Arc::new(Spelling::new(
                &options.custom_misspellings,
                &options.ignored_words,
            )),
            RuleKind::RepeatedWord => Arc::new(RepeatedWord),
            RuleKind::Whitespace => Arc::new(Whitespace),
            RuleKind::PunctuationSpacing => Arc::new(PunctuationSpacing),
            RuleKind::SentenceCase => Arc::new(SentenceCase),
            RuleKind::ArticleAgreement => Arc::new(ArticleAgreement),
            RuleKind::SentenceLength => Arc::new(SentenceLength::new(options.max_sentence_words)),
        }
    }
}
