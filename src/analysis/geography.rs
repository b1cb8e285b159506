//! Geographic distribution of funding.
//!
//! Domestic rows are broken down by federal state and city; everything
//! else is summarized per country. Population figures come from the
//! configuration.

use super::aggregator::{group_by, rank_by_funding, split_top, Tally};
use super::RunContext;
use crate::models::{Bucket, Dataset, Record};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct StateEntry {
    pub name: String,
    pub total_funding: f64,
    pub avg_funding: f64,
    pub project_count: usize,
    /// Share of domestic funding.
    pub share_pct: f64,
    pub population: Option<u64>,
    /// Funding per inhabitant, `None` without a population figure.
    pub per_capita: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CityEntry {
    /// Lookup key into the city drill-down series.
    pub key: String,
    pub city: String,
    pub state: Option<String>,
    pub total_funding: f64,
    pub project_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryEntry {
    pub country: String,
    pub total_funding: f64,
    pub project_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InternationalSummary {
    pub countries: Vec<CountryEntry>,
    pub total_funding: f64,
    pub project_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeographyDocument {
    pub states: Vec<StateEntry>,
    /// Domestic rows without a state.
    pub unassigned_state: Bucket,
    pub top_cities: Vec<CityEntry>,
    /// Domestic rows in cities outside the top list.
    pub other_cities: Bucket,
    /// Domestic rows without a city.
    pub unassigned_city: Bucket,
    pub international: InternationalSummary,
    /// Rows without a country.
    pub unassigned_country: Bucket,
    pub total_domestic_funding: f64,
    pub total_domestic_projects: usize,
}

/// A city together with its state, so namesakes in different states stay apart.
pub fn city_of(record: &Record) -> Option<(&str, Option<&str>)> {
    let city = record.location.city.as_deref()?;
    Some((city, record.location.state.as_deref()))
}

/// Display key of a city, qualified by its state when known.
pub fn city_key(city: &str, state: Option<&str>) -> String {
    match state {
        Some(state) => format!("{} ({})", city, state),
        None => city.to_string(),
    }
}

pub fn analyze(dataset: &Dataset, ctx: &RunContext) -> GeographyDocument {
    let domestic_country = ctx.config.ingest.domestic_country.as_str();
    let population = &ctx.config.geography.population;

    let by_country = group_by(dataset.records(), |r| r.location.country.as_deref());
    let domestic: Vec<_> = dataset
        .records()
        .iter()
        .filter(|r| r.location.is_domestic(domestic_country))
        .collect();

    let by_state = group_by(domestic.iter().copied(), |r| r.location.state.as_deref());
    let states = rank_by_funding(by_state.groups)
        .into_iter()
        .map(|(name, tally)| {
            let inhabitants = population.get(name).copied();
            StateEntry {
                name: name.to_string(),
                total_funding: tally.total_funding(),
                avg_funding: tally.avg_funding(),
                project_count: tally.projects,
                share_pct: tally.share_of(&by_state.total),
                population: inhabitants,
                per_capita: inhabitants
                    .filter(|n| *n > 0)
                    .map(|n| tally.total_funding() / n as f64),
            }
        })
        .collect();

    let by_city = group_by(domestic.iter().copied(), city_of);
    let (top, other_cities) = split_top(rank_by_funding(by_city.groups), ctx.config.analysis.top_cities);
    let top_cities = top
        .into_iter()
        .map(|((city, state), tally)| CityEntry {
            key: city_key(city, state),
            city: city.to_string(),
            state: state.map(str::to_string),
            total_funding: tally.total_funding(),
            project_count: tally.projects,
        })
        .collect();

    let foreign = by_country
        .groups
        .into_iter()
        .filter(|(country, _)| *country != domestic_country);
    let mut foreign_total = Tally::default();
    let mut countries = Vec::new();
    for (country, tally) in rank_by_funding(foreign) {
        foreign_total.merge(&tally);
        countries.push(CountryEntry {
            country: country.to_string(),
            total_funding: tally.total_funding(),
            project_count: tally.projects,
        });
    }

    GeographyDocument {
        states,
        unassigned_state: by_state.unassigned.bucket(),
        top_cities,
        other_cities: other_cities.bucket(),
        unassigned_city: by_city.unassigned.bucket(),
        international: InternationalSummary {
            countries,
            total_funding: foreign_total.total_funding(),
            project_count: foreign_total.projects,
        },
        unassigned_country: by_country.unassigned.bucket(),
        total_domestic_funding: by_state.total.total_funding(),
        total_domestic_projects: by_state.total.projects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{context, dataset, sample};

    #[test]
    fn test_states_with_per_capita() {
        let doc = analyze(&dataset(sample()), &context());

        let names: Vec<_> = doc.states.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Bayern", "Nordrhein-Westfalen", "Hamburg"]);

        let bayern = &doc.states[0];
        assert_eq!(bayern.total_funding, 2_800_000.0);
        assert_eq!(bayern.population, Some(13_369_393));
        let per_capita = bayern.per_capita.unwrap();
        assert!((per_capita - 2_800_000.0 / 13_369_393.0).abs() < 1e-9);
    }

    #[test]
    fn test_state_without_population_has_no_per_capita() {
        let mut ctx = context();
        ctx.config.geography.population.clear();
        let doc = analyze(&dataset(sample()), &ctx);

        assert!(doc.states.iter().all(|s| s.per_capita.is_none()));
    }

    #[test]
    fn test_conservation_across_domestic_and_international() {
        let records = sample();
        let grand_total: usize = records.len();
        let doc = analyze(&dataset(records), &context());

        let state_projects: usize = doc.states.iter().map(|s| s.project_count).sum();
        assert_eq!(state_projects + doc.unassigned_state.project_count, doc.total_domestic_projects);
        assert_eq!(
            doc.total_domestic_projects
                + doc.international.project_count
                + doc.unassigned_country.project_count,
            grand_total
        );

        let funding = doc.total_domestic_funding
            + doc.international.total_funding
            + doc.unassigned_country.total_funding;
        assert!((funding - 5_125_000.0).abs() < 1e-6);

        let city_projects: usize = doc.top_cities.iter().map(|c| c.project_count).sum();
        assert_eq!(
            city_projects + doc.other_cities.project_count + doc.unassigned_city.project_count,
            doc.total_domestic_projects
        );
    }

    #[test]
    fn test_top_cities_truncate_into_others() {
        let mut ctx = context();
        ctx.config.analysis.top_cities = 1;
        let doc = analyze(&dataset(sample()), &ctx);

        assert_eq!(doc.top_cities.len(), 1);
        assert_eq!(doc.top_cities[0].city, "München");
        assert_eq!(doc.top_cities[0].state.as_deref(), Some("Bayern"));
        assert_eq!(doc.top_cities[0].key, "München (Bayern)");
        assert_eq!(doc.other_cities.project_count, 3);
        assert_eq!(doc.international.countries[0].country, "Frankreich");
    }
}
