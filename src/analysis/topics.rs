//! Research topics by classification code (Leistungsplansystematik).

use super::aggregator::{group_by, rank_by_funding, split_top};
use super::RunContext;
use crate::models::{Bucket, Dataset};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct TopicEntry {
    pub code: String,
    pub description: String,
    pub total_funding: f64,
    pub project_count: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicsDocument {
    pub classifications: Vec<TopicEntry>,
    /// Codes below the ranking cut-off.
    pub others: Bucket,
    /// Rows without a classification code.
    pub unassigned: Bucket,
    /// Distinct classification codes in the input.
    pub total_classifications: usize,
}

pub fn analyze(dataset: &Dataset, ctx: &RunContext) -> TopicsDocument {
    let grouped = group_by(dataset.records(), |r| r.topic_code.as_deref());

    // First non-empty description seen for each code.
    let mut descriptions: BTreeMap<&str, &str> = BTreeMap::new();
    for record in dataset.records() {
        if let (Some(code), Some(description)) = (&record.topic_code, &record.topic_description) {
            descriptions.entry(code.as_str()).or_insert(description.as_str());
        }
    }

    let total_classifications = grouped.groups.len();
    let (top, others) = split_top(rank_by_funding(grouped.groups), ctx.config.analysis.top_topics);

    let classifications = top
        .into_iter()
        .map(|(code, tally)| TopicEntry {
            code: code.to_string(),
            description: descriptions.get(code).copied().unwrap_or(code).to_string(),
            total_funding: tally.total_funding(),
            project_count: tally.projects,
            share_pct: tally.share_of(&grouped.total),
        })
        .collect();

    TopicsDocument {
        classifications,
        others: others.bucket(),
        unassigned: grouped.unassigned.bucket(),
        total_classifications,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{context, dataset, sample, RecordBuilder};

    #[test]
    fn test_description_lookup_uses_first_seen() {
        let records = vec![
            RecordBuilder::new("a").topic("C3", "").amount(1).build(),
            RecordBuilder::new("b").topic("C3", "Klimaforschung").amount(1).build(),
            RecordBuilder::new("c").topic("C3", "Klima").amount(1).build(),
            RecordBuilder::new("d").topic("D4", "").amount(1).build(),
        ];
        let doc = analyze(&dataset(records), &context());

        assert_eq!(doc.classifications[0].code, "C3");
        assert_eq!(doc.classifications[0].description, "Klimaforschung");
        assert_eq!(doc.classifications[1].description, "D4");
    }

    #[test]
    fn test_conservation_with_others_and_unassigned() {
        let mut ctx = context();
        ctx.config.analysis.top_topics = 1;
        let doc = analyze(&dataset(sample()), &ctx);

        assert_eq!(doc.total_classifications, 2);
        assert_eq!(doc.classifications.len(), 1);
        assert_eq!(doc.classifications[0].code, "A1");
        assert_eq!(doc.classifications[0].description, "Grundlagenforschung");

        let projects = doc.classifications[0].project_count
            + doc.others.project_count
            + doc.unassigned.project_count;
        assert_eq!(projects, 7);

        let funding = doc.classifications[0].total_funding
            + doc.others.total_funding
            + doc.unassigned.total_funding;
        assert!((funding - 5_125_000.0).abs() < 1e-6);
    }
}
