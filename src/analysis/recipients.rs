//! Top recipients by funding and by project count.
//!
//! Anonymized rows each stand for a group of withheld recipients. They are
//! ranked one row per entry, flagged, and never counted as a named
//! organization.

use super::aggregator::{rank_by_count, rank_by_funding, split_top, Grouped, Tally};
use super::RunContext;
use crate::models::{Bucket, Dataset, Recipient};
use serde::Serialize;

const ANONYMIZED_DISCLAIMER: &str =
    "Aggregate of several recipients whose names are withheld for data protection; not a single organization";

/// Ranking identity of a recipient row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum RecipientKey<'a> {
    Named(&'a str),
    /// Index of the anonymized row in the dataset.
    Anonymized(usize),
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipientEntry {
    pub rank: usize,
    pub name: String,
    pub total_funding: f64,
    pub avg_funding: f64,
    pub project_count: usize,
    pub anonymized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipientsDocument {
    pub top_by_funding: Vec<RecipientEntry>,
    pub top_by_count: Vec<RecipientEntry>,
    /// Distinct named recipients; anonymized rows are not included.
    pub unique_recipients: usize,
    pub anonymized_rows: usize,
    pub anonymized_funding: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_entities_note: Option<String>,
    /// Recipients below the funding ranking cut-off.
    pub others: Bucket,
    /// Rows without any recipient.
    pub unassigned: Bucket,
    pub total_funding: f64,
    pub total_projects: usize,
}

pub fn analyze(dataset: &Dataset, ctx: &RunContext) -> RecipientsDocument {
    let records = dataset.records();
    let mut grouped = Grouped::default();
    for (index, record) in records.iter().enumerate() {
        let key = record.recipient.as_ref().map(|recipient| match recipient {
            Recipient::Named(name) => RecipientKey::Named(name.as_str()),
            Recipient::AnonymizedGroup => RecipientKey::Anonymized(index),
        });
        grouped.insert(key, record);
    }

    let mut unique_recipients = 0;
    let mut anonymized = Tally::default();
    for (key, tally) in &grouped.groups {
        match key {
            RecipientKey::Named(_) => unique_recipients += 1,
            RecipientKey::Anonymized(_) => anonymized.merge(tally),
        }
    }

    let marker = ctx.config.ingest.anonymized_marker.as_str();
    let entry = |rank: usize, key: RecipientKey<'_>, tally: Tally| match key {
        RecipientKey::Named(name) => RecipientEntry {
            rank,
            name: name.to_string(),
            total_funding: tally.total_funding(),
            avg_funding: tally.avg_funding(),
            project_count: tally.projects,
            anonymized: false,
            project_id: None,
            disclaimer: None,
        },
        RecipientKey::Anonymized(index) => RecipientEntry {
            rank,
            name: marker.to_string(),
            total_funding: tally.total_funding(),
            avg_funding: tally.avg_funding(),
            project_count: tally.projects,
            anonymized: true,
            project_id: Some(records[index].project_id.clone()),
            disclaimer: Some(ANONYMIZED_DISCLAIMER),
        },
    };

    let limit = ctx.config.analysis.top_recipients;
    let groups: Vec<(RecipientKey<'_>, Tally)> = grouped.groups.into_iter().collect();

    let (by_funding, others) = split_top(rank_by_funding(groups.iter().copied()), limit);
    let top_by_funding = by_funding
        .into_iter()
        .enumerate()
        .map(|(i, (key, tally))| entry(i + 1, key, tally))
        .collect();

    let top_by_count = rank_by_count(groups)
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (key, tally))| entry(i + 1, key, tally))
        .collect();

    let hidden_entities_note = (anonymized.projects > 0).then(|| {
        format!(
            "{} anonymized rows stand for {}+ recipients whose names are withheld",
            anonymized.projects, anonymized.projects
        )
    });

    RecipientsDocument {
        top_by_funding,
        top_by_count,
        unique_recipients,
        anonymized_rows: anonymized.projects,
        anonymized_funding: anonymized.total_funding(),
        hidden_entities_note,
        others: others.bucket(),
        unassigned: grouped.unassigned.bucket(),
        total_funding: grouped.total.total_funding(),
        total_projects: grouped.total.projects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{context, dataset, sample, RecordBuilder};

    #[test]
    fn test_anonymized_rows_stay_distinct() {
        let records = vec![
            RecordBuilder::new("X1").anonymized().amount(100).build(),
            RecordBuilder::new("X2").anonymized().amount(200).build(),
            RecordBuilder::new("X3").anonymized().amount(300).build(),
            RecordBuilder::new("N1").recipient("Universität Bonn").amount(50).build(),
        ];
        let doc = analyze(&dataset(records), &context());

        let anonymized: Vec<_> = doc.top_by_funding.iter().filter(|e| e.anonymized).collect();
        assert_eq!(anonymized.len(), 3);
        assert!(anonymized.iter().all(|e| e.project_count == 1));
        assert!(anonymized.iter().all(|e| e.disclaimer.is_some()));

        let ids: Vec<_> = anonymized.iter().filter_map(|e| e.project_id.as_deref()).collect();
        assert_eq!(ids, vec!["X3", "X2", "X1"]);

        assert_eq!(doc.unique_recipients, 1);
        assert_eq!(doc.anonymized_rows, 3);
        assert_eq!(doc.anonymized_funding, 600.0);
        assert!(doc.hidden_entities_note.is_some());
    }

    #[test]
    fn test_named_recipients_merge_across_rows() {
        let doc = analyze(&dataset(sample()), &context());

        let bonn = doc
            .top_by_funding
            .iter()
            .find(|e| e.name == "Universität Bonn")
            .unwrap();
        assert_eq!(bonn.project_count, 2);
        assert_eq!(bonn.total_funding, 1_750_000.0);
        assert!(!bonn.anonymized);

        // Fraunhofer, Universität Bonn, Hafen GmbH.
        assert_eq!(doc.unique_recipients, 3);
        assert_eq!(doc.top_by_funding[0].name, "Fraunhofer");
        assert_eq!(doc.top_by_funding[0].rank, 1);
    }

    #[test]
    fn test_rank_by_count_orders_by_projects() {
        let doc = analyze(&dataset(sample()), &context());

        let counts: Vec<_> = doc.top_by_count.iter().map(|e| e.project_count).collect();
        assert_eq!(counts[..2], [2, 2]);
        // Equal counts fall back to funding.
        assert_eq!(doc.top_by_count[0].name, "Fraunhofer");
    }

    #[test]
    fn test_conservation_with_cut_off() {
        let mut ctx = context();
        ctx.config.analysis.top_recipients = 2;
        let doc = analyze(&dataset(sample()), &ctx);

        assert_eq!(doc.top_by_funding.len(), 2);
        let projects: usize = doc.top_by_funding.iter().map(|e| e.project_count).sum::<usize>()
            + doc.others.project_count
            + doc.unassigned.project_count;
        assert_eq!(projects, doc.total_projects);

        let funding: f64 = doc.top_by_funding.iter().map(|e| e.total_funding).sum::<f64>()
            + doc.others.total_funding
            + doc.unassigned.total_funding;
        assert!((funding - doc.total_funding).abs() < 1e-6);
    }

    #[test]
    fn test_no_recipients_gives_empty_rankings() {
        let records = vec![RecordBuilder::new("A").amount(10).build()];
        let doc = analyze(&dataset(records), &context());

        assert!(doc.top_by_funding.is_empty());
        assert_eq!(doc.unique_recipients, 0);
        assert_eq!(doc.unassigned.project_count, 1);
        assert!(doc.hidden_entities_note.is_none());
    }
}
