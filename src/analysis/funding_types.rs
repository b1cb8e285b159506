//! Funding by funding type (Förderart) and funding profile (Förderprofil).

use super::aggregator::{group_by, rank_by_funding, Grouped};
use super::RunContext;
use crate::models::{Bucket, Dataset};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryEntry {
    pub name: String,
    pub total_funding: f64,
    pub project_count: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnassignedCategories {
    pub funding_types: Bucket,
    pub funding_profiles: Bucket,
}

#[derive(Debug, Clone, Serialize)]
pub struct FundingTypesDocument {
    pub funding_types: Vec<CategoryEntry>,
    pub funding_profiles: Vec<CategoryEntry>,
    pub unassigned: UnassignedCategories,
}

fn entries(grouped: Grouped<&str>) -> (Vec<CategoryEntry>, Bucket) {
    let entries = rank_by_funding(grouped.groups)
        .into_iter()
        .map(|(name, tally)| CategoryEntry {
            name: name.to_string(),
            total_funding: tally.total_funding(),
            project_count: tally.projects,
            share_pct: tally.share_of(&grouped.total),
        })
        .collect();
    (entries, grouped.unassigned.bucket())
}

pub fn analyze(dataset: &Dataset, _ctx: &RunContext) -> FundingTypesDocument {
    let (funding_types, types_unassigned) =
        entries(group_by(dataset.records(), |r| r.funding_type.as_deref()));
    let (funding_profiles, profiles_unassigned) =
        entries(group_by(dataset.records(), |r| r.funding_profile.as_deref()));

    FundingTypesDocument {
        funding_types,
        funding_profiles,
        unassigned: UnassignedCategories {
            funding_types: types_unassigned,
            funding_profiles: profiles_unassigned,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{context, dataset, sample};

    #[test]
    fn test_types_and_profiles_conserve_totals() {
        let doc = analyze(&dataset(sample()), &context());

        let names: Vec<_> = doc.funding_types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Zuschuss", "Zuweisung"]);

        let types: usize = doc.funding_types.iter().map(|t| t.project_count).sum();
        assert_eq!(types + doc.unassigned.funding_types.project_count, 7);

        let profiles: f64 = doc.funding_profiles.iter().map(|p| p.total_funding).sum();
        assert!((profiles + doc.unassigned.funding_profiles.total_funding - 5_125_000.0).abs() < 1e-6);
        assert_eq!(doc.funding_profiles.len(), 1);
        assert_eq!(doc.unassigned.funding_profiles.project_count, 5);
    }

    #[test]
    fn test_shares_are_of_the_whole_dataset() {
        let doc = analyze(&dataset(sample()), &context());
        let share = doc.funding_types[0].share_pct;
        assert!((share - 3_500_000.0 / 5_125_000.0 * 100.0).abs() < 1e-9);
    }
}
