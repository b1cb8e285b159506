//! Funding over time: yearly totals, months, decades and growth.
//!
//! Only start years inside [`RunContext::valid_years`] are charted; the
//! rest is reported as `unassigned`.

use super::aggregator::{group_by, rank_by_funding, Tally};
use super::RunContext;
use crate::models::{Bucket, Dataset, Record};
use chrono::Datelike;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Serialize)]
pub struct YearlyTotal {
    pub year: i32,
    pub total_funding: f64,
    pub avg_funding: f64,
    pub project_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearMonthTotal {
    pub year: i32,
    pub month: u32,
    pub total_funding: f64,
    pub project_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthTotal {
    pub month: u32,
    pub month_name: &'static str,
    pub total_funding: f64,
    pub project_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinistryYear {
    pub year: i32,
    pub funding: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecadeShare {
    pub ministry: String,
    pub funding: f64,
    pub project_count: usize,
    /// Share of the decade's funding across all ministries.
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearGrowth {
    pub year: i32,
    pub funding: f64,
    /// Change against the previous calendar year, `None` without a base.
    pub growth_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemporalDocument {
    pub yearly_totals: Vec<YearlyTotal>,
    pub year_month: Vec<YearMonthTotal>,
    pub monthly_distribution: Vec<MonthTotal>,
    pub ministry_yearly: BTreeMap<String, Vec<MinistryYear>>,
    pub decade_ministry_share: BTreeMap<String, Vec<DecadeShare>>,
    pub year_over_year_growth: Vec<YearGrowth>,
    pub years: Vec<i32>,
    pub valid_year_range: YearRange,
    /// Rows without a start year inside the valid range.
    pub unassigned: Bucket,
}

pub fn analyze(dataset: &Dataset, ctx: &RunContext) -> TemporalDocument {
    let valid = ctx.valid_years();
    let by_year = group_by(dataset.records(), |r| {
        r.start_year().filter(|year| valid.contains(year))
    });
    let dated: Vec<&Record> = dataset
        .records()
        .iter()
        .filter(|r| r.start_year().is_some_and(|year| valid.contains(&year)))
        .collect();

    let years: Vec<i32> = by_year.groups.keys().copied().collect();

    let yearly_totals = by_year
        .groups
        .iter()
        .map(|(year, tally)| YearlyTotal {
            year: *year,
            total_funding: tally.total_funding(),
            avg_funding: tally.avg_funding(),
            project_count: tally.projects,
        })
        .collect();

    TemporalDocument {
        yearly_totals,
        year_month: year_month(&dated),
        monthly_distribution: monthly_distribution(&dated),
        ministry_yearly: ministry_yearly(&dated, &years),
        decade_ministry_share: decade_ministry_share(&dated),
        year_over_year_growth: growth(&by_year.groups, ctx.config.analysis.growth_start_year),
        years,
        valid_year_range: YearRange {
            start: *valid.start(),
            end: *valid.end(),
        },
        unassigned: by_year.unassigned.bucket(),
    }
}

fn year_month(dated: &[&Record]) -> Vec<YearMonthTotal> {
    let grouped = group_by(dated.iter().copied(), |r| {
        r.start_date.map(|d| (d.year(), d.month()))
    });

    grouped
        .groups
        .into_iter()
        .map(|((year, month), tally)| YearMonthTotal {
            year,
            month,
            total_funding: tally.total_funding(),
            project_count: tally.projects,
        })
        .collect()
}

fn monthly_distribution(dated: &[&Record]) -> Vec<MonthTotal> {
    let grouped = group_by(dated.iter().copied(), |r| r.start_date.map(|d| d.month()));

    grouped
        .groups
        .into_iter()
        .map(|(month, tally)| MonthTotal {
            month,
            month_name: MONTH_NAMES[(month - 1) as usize],
            total_funding: tally.total_funding(),
            project_count: tally.projects,
        })
        .collect()
}

/// Per ministry funding for every charted year, zero where nothing started.
fn ministry_yearly(dated: &[&Record], years: &[i32]) -> BTreeMap<String, Vec<MinistryYear>> {
    let grouped = group_by(dated.iter().copied(), |r| {
        Some((r.ministry_code.as_deref()?, r.start_year()?))
    });

    let ministries: BTreeSet<&str> = grouped.groups.keys().map(|(m, _)| *m).collect();

    ministries
        .into_iter()
        .map(|ministry| {
            let series = years
                .iter()
                .map(|year| MinistryYear {
                    year: *year,
                    funding: grouped
                        .groups
                        .get(&(ministry, *year))
                        .map(Tally::total_funding)
                        .unwrap_or(0.0),
                })
                .collect();
            (ministry.to_string(), series)
        })
        .collect()
}

fn decade_of(year: i32) -> i32 {
    year.div_euclid(10) * 10
}

fn decade_ministry_share(dated: &[&Record]) -> BTreeMap<String, Vec<DecadeShare>> {
    let mut decades: BTreeMap<i32, Vec<&Record>> = BTreeMap::new();
    for record in dated {
        if let (Some(year), Some(_)) = (record.start_year(), &record.ministry_code) {
            decades.entry(decade_of(year)).or_default().push(*record);
        }
    }

    decades
        .into_iter()
        .map(|(decade, records)| {
            let grouped = group_by(records, |r| r.ministry_code.as_deref());
            let shares = rank_by_funding(grouped.groups)
                .into_iter()
                .map(|(ministry, tally)| DecadeShare {
                    ministry: ministry.to_string(),
                    funding: tally.total_funding(),
                    project_count: tally.projects,
                    share_pct: tally.share_of(&grouped.total),
                })
                .collect();
            (decade.to_string(), shares)
        })
        .collect()
}

fn growth(years: &BTreeMap<i32, Tally>, start_year: i32) -> Vec<YearGrowth> {
    years
        .range(start_year..)
        .map(|(year, tally)| {
            let growth_pct = years
                .get(&(year - 1))
                .filter(|previous| !previous.funding.is_zero())
                .map(|previous| {
                    let before = previous.total_funding();
                    (tally.total_funding() - before) / before * 100.0
                });
            YearGrowth {
                year: *year,
                funding: tally.total_funding(),
                growth_pct,
            }
        })
        .collect()
}
