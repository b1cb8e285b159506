//! Project duration histogram and per-ministry statistics.

use super::aggregator::{mean, median};
use super::RunContext;
use crate::models::Dataset;
use serde::Serialize;
use std::collections::BTreeMap;

/// Upper bound of the analysis, in months (exclusive).
const MAX_MONTHS: f64 = 360.0;

/// Right-closed histogram bins in months.
const BINS: [(f64, f64, &str); 7] = [
    (0.0, 6.0, "<6 months"),
    (6.0, 12.0, "6-12 months"),
    (12.0, 24.0, "1-2 years"),
    (24.0, 36.0, "2-3 years"),
    (36.0, 60.0, "3-5 years"),
    (60.0, 120.0, "5-10 years"),
    (120.0, MAX_MONTHS, ">10 years"),
];

fn bin_of(months: f64) -> Option<usize> {
    BINS.iter().position(|(lower, upper, _)| months > *lower && months <= *upper)
}

#[derive(Debug, Clone, Serialize)]
pub struct DurationBin {
    pub range: &'static str,
    pub min_months: f64,
    pub max_months: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallStats {
    pub mean_months: Option<f64>,
    pub median_months: Option<f64>,
    pub total_analyzed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinistryDuration {
    pub ministry: String,
    pub mean_months: f64,
    pub median_months: f64,
    pub project_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DurationDocument {
    pub distribution: Vec<DurationBin>,
    pub overall_stats: OverallStats,
    pub by_ministry: Vec<MinistryDuration>,
    /// Rows with both dates but a duration outside the analysis range.
    pub out_of_range: usize,
    /// Rows missing a start or end date.
    pub undated: usize,
}

pub fn analyze(dataset: &Dataset, _ctx: &RunContext) -> DurationDocument {
    let mut counts = [0usize; BINS.len()];
    let mut durations = Vec::new();
    let mut by_ministry: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    let mut out_of_range = 0;
    let mut undated = 0;

    for record in dataset.records() {
        let Some(months) = record.duration_months() else {
            undated += 1;
            continue;
        };
        if months <= 0.0 || months >= MAX_MONTHS {
            out_of_range += 1;
            continue;
        }
        let Some(bin) = bin_of(months) else {
            out_of_range += 1;
            continue;
        };

        counts[bin] += 1;
        durations.push(months);
        if let Some(ministry) = record.ministry_code.as_deref() {
            by_ministry.entry(ministry).or_default().push(months);
        }
    }

    let distribution = BINS
        .iter()
        .zip(counts)
        .map(|((lower, upper, label), count)| DurationBin {
            range: *label,
            min_months: *lower,
            max_months: *upper,
            count,
        })
        .collect();

    let by_ministry = by_ministry
        .into_iter()
        .filter_map(|(ministry, mut months)| {
            Some(MinistryDuration {
                ministry: ministry.to_string(),
                mean_months: mean(&months)?,
                median_months: median(&mut months)?,
                project_count: months.len(),
            })
        })
        .collect();

    DurationDocument {
        distribution,
        overall_stats: OverallStats {
            mean_months: mean(&durations),
            total_analyzed: durations.len(),
            median_months: median(&mut durations),
        },
        by_ministry,
        out_of_range,
        undated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{context, dataset, sample, RecordBuilder};
    use crate::models::DAYS_PER_MONTH;

    #[test]
    fn test_bins_are_right_closed() {
        assert_eq!(bin_of(6.0), Some(0));
        assert_eq!(bin_of(6.01), Some(1));
        assert_eq!(bin_of(0.0), None);
        assert_eq!(bin_of(359.9), Some(6));
    }

    #[test]
    fn test_distribution_and_stats() {
        let doc = analyze(&dataset(sample()), &context());

        let counts: Vec<_> = doc.distribution.iter().map(|b| (b.range, b.count)).collect();
        assert_eq!(
            counts,
            vec![
                ("<6 months", 0),
                ("6-12 months", 2),
                ("1-2 years", 1),
                ("2-3 years", 3),
                ("3-5 years", 0),
                ("5-10 years", 0),
                (">10 years", 0),
            ]
        );
        assert_eq!(doc.overall_stats.total_analyzed, 6);
        assert_eq!(doc.undated, 1);
        assert_eq!(doc.out_of_range, 0);

        let bmftr = doc.by_ministry.iter().find(|m| m.ministry == "BMFTR").unwrap();
        assert_eq!(bmftr.project_count, 2);
        let expected = (1095.0 / DAYS_PER_MONTH + 1094.0 / DAYS_PER_MONTH) / 2.0;
        assert!((bmftr.mean_months - expected).abs() < 1e-9);
        assert!((bmftr.median_months - expected).abs() < 1e-9);
    }

    #[test]
    fn test_zero_and_extreme_durations_are_excluded() {
        let records = vec![
            RecordBuilder::new("a").start(2020, 1, 1).end(2020, 1, 1).build(),
            RecordBuilder::new("b").start(2020, 1, 1).end(2019, 1, 1).build(),
            RecordBuilder::new("c").start(1990, 1, 1).end(2025, 1, 1).build(),
            RecordBuilder::new("d").start(2020, 1, 1).end(2020, 7, 1).build(),
        ];
        let doc = analyze(&dataset(records), &context());

        assert_eq!(doc.out_of_range, 3);
        assert_eq!(doc.overall_stats.total_analyzed, 1);
        assert_eq!(doc.distribution[0].count, 1);
    }

    #[test]
    fn test_no_durations_gives_null_stats() {
        let doc = analyze(&dataset(Vec::new()), &context());
        assert_eq!(doc.overall_stats.mean_months, None);
        assert_eq!(doc.distribution.len(), 7);
        assert!(doc.by_ministry.is_empty());
    }
}
