//! Grouping and ranking primitives shared by the aggregation passes.
//!
//! Funding is summed exactly as [`Decimal`] and only converted to `f64`
//! when a document is built. Averages divide by the number of records
//! whose amount parsed; project counts include every record.

use crate::models::{Bucket, Record, YearBucket};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Running funding total and project count of one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub funding: Decimal,
    /// Records in the group.
    pub projects: usize,
    /// Records whose amount parsed.
    pub funded: usize,
}

impl Tally {
    pub fn add(&mut self, record: &Record) {
        self.projects += 1;
        if let Some(amount) = record.amount {
            self.funding += amount;
            self.funded += 1;
        }
    }

    pub fn merge(&mut self, other: &Tally) {
        self.funding += other.funding;
        self.projects += other.projects;
        self.funded += other.funded;
    }

    pub fn total_funding(&self) -> f64 {
        to_f64(self.funding)
    }

    pub fn avg_funding(&self) -> f64 {
        if self.funded == 0 {
            0.0
        } else {
            self.total_funding() / self.funded as f64
        }
    }

    pub fn share_of(&self, whole: &Tally) -> f64 {
        share_pct(self.funding, whole.funding)
    }

    pub fn bucket(&self) -> Bucket {
        Bucket {
            total_funding: self.total_funding(),
            project_count: self.projects,
        }
    }
}

impl<'a> FromIterator<&'a Record> for Tally {
    fn from_iter<I: IntoIterator<Item = &'a Record>>(records: I) -> Self {
        let mut tally = Tally::default();
        for record in records {
            tally.add(record);
        }
        tally
    }
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// `part` as a percentage of `whole`, zero when `whole` is zero.
pub fn share_pct(part: Decimal, whole: Decimal) -> f64 {
    if whole.is_zero() {
        0.0
    } else {
        to_f64(part) / to_f64(whole) * 100.0
    }
}

/// Records split by a grouping key.
#[derive(Debug, Clone)]
pub struct Grouped<K> {
    pub groups: BTreeMap<K, Tally>,
    /// Records the key function returned `None` for.
    pub unassigned: Tally,
    pub total: Tally,
}

impl<K> Default for Grouped<K> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
            unassigned: Tally::default(),
            total: Tally::default(),
        }
    }
}

impl<K: Ord> Grouped<K> {
    /// Count `record` under `key`, or as unassigned without one.
    pub fn insert(&mut self, key: Option<K>, record: &Record) {
        self.total.add(record);
        match key {
            Some(k) => self.groups.entry(k).or_default().add(record),
            None => self.unassigned.add(record),
        }
    }
}

/// Group records by `key`, keeping keyless records in `unassigned`.
pub fn group_by<'a, K, I, F>(records: I, mut key: F) -> Grouped<K>
where
    K: Ord,
    I: IntoIterator<Item = &'a Record>,
    F: FnMut(&'a Record) -> Option<K>,
{
    let mut grouped = Grouped::default();
    for record in records {
        grouped.insert(key(record), record);
    }
    grouped
}

/// Funding descending, then project count descending.
fn by_funding(a: &Tally, b: &Tally) -> Ordering {
    b.funding
        .cmp(&a.funding)
        .then_with(|| b.projects.cmp(&a.projects))
}

/// Order groups by funding, project count, then key.
pub fn rank_by_funding<K: Ord>(groups: impl IntoIterator<Item = (K, Tally)>) -> Vec<(K, Tally)> {
    let mut ranked: Vec<_> = groups.into_iter().collect();
    ranked.sort_by(|(ka, a), (kb, b)| by_funding(a, b).then_with(|| ka.cmp(kb)));
    ranked
}

/// Order groups by project count, funding, then key.
pub fn rank_by_count<K: Ord>(groups: impl IntoIterator<Item = (K, Tally)>) -> Vec<(K, Tally)> {
    let mut ranked: Vec<_> = groups.into_iter().collect();
    ranked.sort_by(|(ka, a), (kb, b)| {
        b.projects
            .cmp(&a.projects)
            .then_with(|| b.funding.cmp(&a.funding))
            .then_with(|| ka.cmp(kb))
    });
    ranked
}

/// Keep the first `n` ranked groups and fold the rest into one tally.
pub fn split_top<K>(mut ranked: Vec<(K, Tally)>, n: usize) -> (Vec<(K, Tally)>, Tally) {
    let mut others = Tally::default();
    if ranked.len() > n {
        for (_, tally) in ranked.drain(n..) {
            others.merge(&tally);
        }
    }
    (ranked, others)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Median of `values`; sorts in place.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Per start year tallies of `records`. Undated records are ignored.
pub fn yearly<'a>(records: impl IntoIterator<Item = &'a Record>) -> BTreeMap<i32, Tally> {
    let mut years: BTreeMap<i32, Tally> = BTreeMap::new();
    for record in records {
        if let Some(year) = record.start_year() {
            years.entry(year).or_default().add(record);
        }
    }
    years
}

pub fn year_buckets(years: &BTreeMap<i32, Tally>) -> Vec<YearBucket> {
    years
        .iter()
        .map(|(year, tally)| YearBucket {
            year: *year,
            total_funding: tally.total_funding(),
            project_count: tally.projects,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(amount: i64) -> Record {
        Record {
            amount: Some(Decimal::from(amount)),
            ..Record::default()
        }
    }

    fn tally(funding: i64, projects: usize) -> Tally {
        Tally {
            funding: Decimal::from(funding),
            projects,
            funded: projects,
        }
    }

    #[test]
    fn test_tally_skips_unparsed_amounts_in_average() {
        let records = [funded(100), funded(300), Record::default()];
        let tally: Tally = records.iter().collect();

        assert_eq!(tally.projects, 3);
        assert_eq!(tally.funded, 2);
        assert_eq!(tally.total_funding(), 400.0);
        assert_eq!(tally.avg_funding(), 200.0);
    }

    #[test]
    fn test_group_by_conserves_totals() {
        let records = [funded(1), funded(2), funded(4), funded(8)];
        let grouped = group_by(records.iter(), |r| {
            let amount = r.amount?;
            (amount > Decimal::ONE).then(|| amount > Decimal::from(3))
        });

        let mut sum = grouped.unassigned;
        for tally in grouped.groups.values() {
            sum.merge(tally);
        }
        assert_eq!(sum, grouped.total);
        assert_eq!(grouped.unassigned.projects, 1);
        assert_eq!(grouped.groups[&true].funding, Decimal::from(12));
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let groups = vec![
            ("beta".to_string(), tally(100, 1)),
            ("alpha".to_string(), tally(100, 1)),
            ("gamma".to_string(), tally(100, 3)),
            ("delta".to_string(), tally(500, 1)),
        ];

        let ranked = rank_by_funding(groups.clone());
        let keys: Vec<_> = ranked.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["delta", "gamma", "alpha", "beta"]);

        let reversed = rank_by_funding(groups.into_iter().rev());
        assert_eq!(ranked, reversed);
    }

    #[test]
    fn test_rank_by_count() {
        let ranked = rank_by_count(vec![
            ("a", tally(10, 2)),
            ("b", tally(99, 1)),
            ("c", tally(20, 2)),
        ]);
        let keys: Vec<_> = ranked.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_split_top_folds_remainder() {
        let ranked = rank_by_funding(vec![("a", tally(5, 1)), ("b", tally(3, 2)), ("c", tally(1, 4))]);
        let (top, others) = split_top(ranked, 1);

        assert_eq!(top.len(), 1);
        assert_eq!(others.funding, Decimal::from(4));
        assert_eq!(others.projects, 6);

        let (all, none) = split_top(rank_by_funding(vec![("a", tally(5, 1))]), 10);
        assert_eq!(all.len(), 1);
        assert_eq!(none, Tally::default());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }

    #[test]
    fn test_share_pct_of_zero_total() {
        assert_eq!(share_pct(Decimal::from(5), Decimal::ZERO), 0.0);
        assert_eq!(share_pct(Decimal::from(1), Decimal::from(4)), 25.0);
    }
}
