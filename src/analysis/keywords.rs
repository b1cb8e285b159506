//! Keyword extraction from project titles.

use super::RunContext;
use crate::config::AnalysisConfig;
use crate::models::Dataset;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Letter runs of at least four characters, German umlauts included.
const WORD_PATTERN: &str = r"\b[A-ZÄÖÜa-zäöüß]{4,}\b";

/// Splits titles into normalized keyword candidates.
pub struct Tokenizer {
    pattern: Regex,
    stopwords: HashSet<String>,
    min_length: usize,
}

impl Tokenizer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            pattern: Regex::new(WORD_PATTERN).expect("keyword pattern is valid"),
            stopwords: config.stopwords.iter().map(|w| w.to_lowercase()).collect(),
            min_length: config.keyword_min_length,
        }
    }

    /// Lowercased keywords of `text`, in order of appearance.
    pub fn tokens<'t>(&'t self, text: &'t str) -> impl Iterator<Item = String> + 't {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(move |word| word.chars().count() >= self.min_length && !self.stopwords.contains(word))
    }
}

/// Uppercase the first letter of a lowercased keyword.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Keyword occurrence counts over every title, with the number of titles read.
pub fn count_keywords(dataset: &Dataset, tokenizer: &Tokenizer) -> (BTreeMap<String, usize>, usize) {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut titles = 0;

    for title in dataset.records().iter().filter_map(|r| r.title.as_deref()) {
        titles += 1;
        for word in tokenizer.tokens(title) {
            *counts.entry(word).or_default() += 1;
        }
    }

    (counts, titles)
}

/// Most frequent keywords first, alphabetical among equals.
pub fn rank_keywords(counts: BTreeMap<String, usize>) -> Vec<(String, usize)> {
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|(wa, ca), (wb, cb)| cb.cmp(ca).then_with(|| wa.cmp(wb)));
    ranked
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordEntry {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordsDocument {
    pub keywords: Vec<KeywordEntry>,
    pub titles_analyzed: usize,
    pub distinct_words: usize,
}

pub fn analyze(dataset: &Dataset, ctx: &RunContext) -> KeywordsDocument {
    let tokenizer = Tokenizer::new(&ctx.config.analysis);
    let (counts, titles_analyzed) = count_keywords(dataset, &tokenizer);
    let distinct_words = counts.len();

    let keywords = rank_keywords(counts)
        .into_iter()
        .take(ctx.config.analysis.top_keywords)
        .map(|(word, count)| KeywordEntry {
            word: capitalize(&word),
            count,
        })
        .collect();

    KeywordsDocument {
        keywords,
        titles_analyzed,
        distinct_words,
    }
}
