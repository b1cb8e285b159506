//! Yearly series for the most frequent title keywords.

use super::aggregator::{year_buckets, Tally};
use super::keywords::{capitalize, count_keywords, rank_keywords, Tokenizer};
use super::RunContext;
use crate::models::{Dataset, YearBucket};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Serialize)]
pub struct KeywordTrend {
    /// Projects whose title contains the keyword.
    pub total_projects: usize,
    pub total_funding: f64,
    pub yearly_data: Vec<YearBucket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordTrendsDocument {
    pub keywords: BTreeMap<String, KeywordTrend>,
    pub years: Vec<i32>,
}

pub fn analyze(dataset: &Dataset, ctx: &RunContext) -> KeywordTrendsDocument {
    let tokenizer = Tokenizer::new(&ctx.config.analysis);
    let (counts, _) = count_keywords(dataset, &tokenizer);
    let tracked: Vec<String> = rank_keywords(counts)
        .into_iter()
        .take(ctx.config.analysis.trend_keywords)
        .map(|(word, _)| word)
        .collect();

    let valid = ctx.valid_years();
    let mut series: BTreeMap<&str, BTreeMap<i32, Tally>> =
        tracked.iter().map(|w| (w.as_str(), BTreeMap::new())).collect();
    let mut years = BTreeSet::new();

    for record in dataset.records() {
        let (Some(title), Some(year)) = (record.title.as_deref(), record.start_year()) else {
            continue;
        };
        if !valid.contains(&year) {
            continue;
        }

        // A project counts once per keyword however often the word repeats.
        let words: HashSet<String> = tokenizer.tokens(title).collect();
        for (keyword, yearly) in series.iter_mut() {
            if words.contains(*keyword) {
                yearly.entry(year).or_default().add(record);
                years.insert(year);
            }
        }
    }

    let keywords = series
        .into_iter()
        .map(|(keyword, yearly)| {
            let mut total = Tally::default();
            for tally in yearly.values() {
                total.merge(tally);
            }
            let trend = KeywordTrend {
                total_projects: total.projects,
                total_funding: total.total_funding(),
                yearly_data: year_buckets(&yearly),
            };
            (capitalize(keyword), trend)
        })
        .collect();

    KeywordTrendsDocument {
        keywords,
        years: years.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{context, dataset, sample, RecordBuilder};

    #[test]
    fn test_projects_counted_once_per_keyword() {
        let records = vec![
            RecordBuilder::new("a")
                .title("Wasserstoff und Wasserstoff")
                .amount(10)
                .start(2020, 1, 1)
                .build(),
            RecordBuilder::new("b")
                .title("Wasserstoff Netze")
                .amount(5)
                .start(2022, 1, 1)
                .build(),
            RecordBuilder::new("c").title("Wasserstoff").build(),
        ];
        let doc = analyze(&dataset(records), &context());

        let trend = &doc.keywords["Wasserstoff"];
        assert_eq!(trend.total_projects, 2);
        assert_eq!(trend.total_funding, 15.0);
        let years: Vec<_> = trend.yearly_data.iter().map(|p| (p.year, p.project_count)).collect();
        assert_eq!(years, vec![(2020, 1), (2022, 1)]);
        assert_eq!(doc.years, vec![2020, 2022]);
    }

    #[test]
    fn test_only_top_keywords_are_tracked() {
        let mut ctx = context();
        ctx.config.analysis.trend_keywords = 2;
        let doc = analyze(&dataset(sample()), &ctx);

        let tracked: Vec<_> = doc.keywords.keys().map(String::as_str).collect();
        assert_eq!(tracked, vec!["Batteriespeicher", "Quantensensorik"]);
        assert_eq!(doc.keywords["Quantensensorik"].total_funding, 3_500_000.0);
    }
}
