//! Yearly series per state, city and recipient for drill-down views.
//!
//! Entries are keyed by the exact names used in the primary documents so
//! the dashboard can look them up directly.

use super::aggregator::{group_by, rank_by_funding, year_buckets, Tally};
use super::geography::{city_key, city_of};
use super::RunContext;
use crate::models::{Dataset, Record, YearBucket};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct EntitySeries {
    pub total_funding: f64,
    pub project_count: usize,
    pub yearly: Vec<YearBucket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityTrendsDocument {
    pub states: BTreeMap<String, EntitySeries>,
    pub cities: BTreeMap<String, EntitySeries>,
    pub recipients: BTreeMap<String, EntitySeries>,
}

/// Series for the top `limit` entities by funding, named by `name`.
fn series<'a, K, F, N>(records: &[&'a Record], limit: usize, key: F, name: N) -> BTreeMap<String, EntitySeries>
where
    K: Ord + Copy,
    F: Fn(&'a Record) -> Option<K>,
    N: Fn(K) -> String,
{
    let grouped = group_by(records.iter().copied(), &key);
    let tracked: Vec<(K, Tally)> = rank_by_funding(grouped.groups)
        .into_iter()
        .take(limit)
        .collect();

    let mut yearly: BTreeMap<K, BTreeMap<i32, Tally>> = tracked
        .iter()
        .map(|(entity, _)| (*entity, BTreeMap::new()))
        .collect();
    for record in records.iter().copied() {
        if let (Some(entity), Some(year)) = (key(record), record.start_year()) {
            if let Some(points) = yearly.get_mut(&entity) {
                points.entry(year).or_default().add(record);
            }
        }
    }

    tracked
        .into_iter()
        .map(|(entity, tally)| {
            let points = yearly.get(&entity).map(year_buckets).unwrap_or_default();
            (
                name(entity),
                EntitySeries {
                    total_funding: tally.total_funding(),
                    project_count: tally.projects,
                    yearly: points,
                },
            )
        })
        .collect()
}

pub fn analyze(dataset: &Dataset, ctx: &RunContext) -> EntityTrendsDocument {
    let analysis = &ctx.config.analysis;
    let valid = ctx.valid_years();
    let domestic_country = ctx.config.ingest.domestic_country.as_str();

    let dated: Vec<&Record> = dataset
        .records()
        .iter()
        .filter(|r| r.start_year().is_some_and(|year| valid.contains(&year)))
        .collect();
    let domestic: Vec<&Record> = dated
        .iter()
        .copied()
        .filter(|r| r.location.is_domestic(domestic_country))
        .collect();

    EntityTrendsDocument {
        states: series(&domestic, usize::MAX, |r| r.location.state.as_deref(), str::to_string),
        // Keyed like `top_cities[].key` in the geographic document.
        cities: series(&domestic, analysis.trend_cities, city_of, |(city, state)| {
            city_key(city, state)
        }),
        recipients: series(
            &dated,
            analysis.trend_recipients,
            |r| r.recipient.as_ref().and_then(|recipient| recipient.name()),
            str::to_string,
        ),
    }
}
