//! Funding by issuing ministry (Ressort).

use super::aggregator::{group_by, rank_by_funding};
use super::RunContext;
use crate::models::{Bucket, Dataset};
use serde::Serialize;

/// Full names of the ministry codes used in the catalog.
pub fn ministry_name(code: &str) -> &str {
    match code {
        "BMFTR" => "Bundesministerium für Forschung, Technologie und Raumfahrt",
        "BMWE" => "Bundesministerium für Wirtschaft und Energie",
        "BMV" => "Bundesministerium für Verkehr",
        "BMLEH" => "Bundesministerium für Landwirtschaft, Ernährung und Heimat",
        "BMUKN" => "Bundesministerium für Umwelt, Klimaschutz und Naturschutz",
        "BMJV" => "Bundesministerium der Justiz und für Verbraucherschutz",
        "BMJV_BLE" => "BMJV - Bundesanstalt für Landwirtschaft und Ernährung",
        other => other,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MinistryEntry {
    pub code: String,
    pub name: String,
    pub total_funding: f64,
    pub avg_funding: f64,
    pub project_count: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinistryDocument {
    pub ministries: Vec<MinistryEntry>,
    /// Rows without a ministry code.
    pub unassigned: Bucket,
    pub total_funding: f64,
    pub total_projects: usize,
}

pub fn analyze(dataset: &Dataset, _ctx: &RunContext) -> MinistryDocument {
    let grouped = group_by(dataset.records(), |r| r.ministry_code.as_deref());

    let ministries = rank_by_funding(grouped.groups)
        .into_iter()
        .map(|(code, tally)| MinistryEntry {
            code: code.to_string(),
            name: ministry_name(code).to_string(),
            total_funding: tally.total_funding(),
            avg_funding: tally.avg_funding(),
            project_count: tally.projects,
            share_pct: tally.share_of(&grouped.total),
        })
        .collect();

    MinistryDocument {
        ministries,
        unassigned: grouped.unassigned.bucket(),
        total_funding: grouped.total.total_funding(),
        total_projects: grouped.total.projects,
    }
}
