//! Project sponsors (Projektträger) that administer grants for ministries.

use super::aggregator::{group_by, rank_by_funding, split_top};
use super::RunContext;
use crate::models::{Bucket, Dataset};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Full names of common sponsor codes.
pub fn sponsor_name(code: &str) -> &str {
    match code {
        "BF" => "DLR Projektträger (ehem. Beratungsfirma)",
        "VDI/VDE" => "VDI/VDE Innovation + Technik GmbH",
        "PT-DLR" => "DLR Projektträger",
        "FZ-Jül" => "Forschungszentrum Jülich",
        "GSI" => "GSI Helmholtzzentrum für Schwerionenforschung",
        "PTJ" => "Projektträger Jülich",
        "PTKA" => "Karlsruher Institut für Technologie (KIT)",
        "TÜV" => "TÜV Rheinland Consulting GmbH",
        "PT-SW" => "DLR Projektträger Software",
        "LF" => "Landwirtschaftliche Fakultät",
        "BLE" => "Bundesanstalt für Landwirtschaft und Ernährung",
        "FNR" => "Fachagentur Nachwachsende Rohstoffe e.V.",
        other => other,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SponsorEntry {
    pub code: String,
    pub name: String,
    pub total_funding: f64,
    pub avg_funding: f64,
    pub project_count: usize,
    pub share_pct: f64,
    /// Ministries served, alphabetical.
    pub ministries: Vec<String>,
    pub ministry_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SponsorMinistryPair {
    pub pt: String,
    pub ministry: String,
    pub funding: f64,
    pub projects: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SponsorsDocument {
    pub projekttraeger: Vec<SponsorEntry>,
    pub unique_count: usize,
    /// Rows without a sponsor.
    pub unassigned: Bucket,
    pub pt_ministry_breakdown: Vec<SponsorMinistryPair>,
}

pub fn analyze(dataset: &Dataset, ctx: &RunContext) -> SponsorsDocument {
    let grouped = group_by(dataset.records(), |r| r.sponsor_code.as_deref());

    let mut ministries: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in dataset.records() {
        if let (Some(sponsor), Some(ministry)) = (record.sponsor_code.as_deref(), record.ministry_code.as_deref()) {
            ministries.entry(sponsor).or_default().insert(ministry);
        }
    }

    let unique_count = grouped.groups.len();
    let projekttraeger = rank_by_funding(grouped.groups)
        .into_iter()
        .map(|(code, tally)| {
            let served: Vec<String> = ministries
                .get(code)
                .map(|set| set.iter().map(|m| m.to_string()).collect())
                .unwrap_or_default();
            SponsorEntry {
                code: code.to_string(),
                name: sponsor_name(code).to_string(),
                total_funding: tally.total_funding(),
                avg_funding: tally.avg_funding(),
                project_count: tally.projects,
                share_pct: tally.share_of(&grouped.total),
                ministry_count: served.len(),
                ministries: served,
            }
        })
        .collect();

    let pairs = group_by(dataset.records(), |r| {
        Some((r.sponsor_code.as_deref()?, r.ministry_code.as_deref()?))
    });
    let (top_pairs, _) = split_top(
        rank_by_funding(pairs.groups),
        ctx.config.analysis.top_sponsor_ministry_pairs,
    );
    let pt_ministry_breakdown = top_pairs
        .into_iter()
        .map(|((pt, ministry), tally)| SponsorMinistryPair {
            pt: pt.to_string(),
            ministry: ministry.to_string(),
            funding: tally.total_funding(),
            projects: tally.projects,
        })
        .collect();

    SponsorsDocument {
        projekttraeger,
        unique_count,
        unassigned: grouped.unassigned.bucket(),
        pt_ministry_breakdown,
    }
}
