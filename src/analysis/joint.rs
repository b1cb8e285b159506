//! Joint projects (Verbundprojekte) versus individual projects.

use super::aggregator::{group_by, rank_by_funding, split_top, Tally};
use super::RunContext;
use crate::models::{Bucket, Dataset};
use serde::Serialize;
use std::collections::BTreeMap;

/// States listed per joint project.
const MAX_STATES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct SplitBlock {
    pub project_count: usize,
    pub total_funding: f64,
    pub share_pct: f64,
}

impl SplitBlock {
    fn new(tally: &Tally, whole: &Tally) -> Self {
        Self {
            project_count: tally.projects,
            total_funding: tally.total_funding(),
            share_pct: tally.share_of(whole),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JointProjectEntry {
    pub name: String,
    pub total_funding: f64,
    pub subproject_count: usize,
    /// Up to five states, in order of first appearance.
    pub states_involved: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JointProjectsDocument {
    pub joint_projects: SplitBlock,
    pub individual_projects: SplitBlock,
    pub distinct_joint_projects: usize,
    pub top_joint_projects: Vec<JointProjectEntry>,
    /// Joint projects below the ranking cut-off.
    pub others: Bucket,
}

pub fn analyze(dataset: &Dataset, ctx: &RunContext) -> JointProjectsDocument {
    let split = group_by(dataset.records(), |r| Some(r.is_joint_project()));
    let joint = split.groups.get(&true).copied().unwrap_or_default();
    let individual = split.groups.get(&false).copied().unwrap_or_default();

    let by_name = group_by(dataset.records(), |r| r.joint_project.as_deref());

    let mut states: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for record in dataset.records() {
        if let (Some(name), Some(state)) = (record.joint_project.as_deref(), record.location.state.as_deref()) {
            let seen = states.entry(name).or_default();
            if seen.len() < MAX_STATES && !seen.contains(&state) {
                seen.push(state);
            }
        }
    }

    let distinct_joint_projects = by_name.groups.len();
    let (top, others) = split_top(
        rank_by_funding(by_name.groups),
        ctx.config.analysis.top_joint_projects,
    );

    let top_joint_projects = top
        .into_iter()
        .map(|(name, tally)| JointProjectEntry {
            name: name.to_string(),
            total_funding: tally.total_funding(),
            subproject_count: tally.projects,
            states_involved: states
                .get(name)
                .map(|s| s.iter().map(|state| state.to_string()).collect())
                .unwrap_or_default(),
        })
        .collect();

    JointProjectsDocument {
        joint_projects: SplitBlock::new(&joint, &split.total),
        individual_projects: SplitBlock::new(&individual, &split.total),
        distinct_joint_projects,
        top_joint_projects,
        others: others.bucket(),
    }
}
