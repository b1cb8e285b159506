//! Run metadata and headline figures.

use super::aggregator::{group_by, median, rank_by_funding, Grouped, Tally};
use super::RunContext;
use crate::models::{Dataset, IngestDiagnostics};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DateRange {
    pub earliest_start: Option<NaiveDate>,
    pub latest_start: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Highlights {
    pub top_ministry: Option<String>,
    pub top_state: Option<String>,
    /// Best funded named recipient; anonymized groups never qualify.
    pub top_recipient: Option<String>,
    pub avg_project_funding: f64,
    pub median_project_funding: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryDocument {
    pub generated_at: DateTime<Utc>,
    pub reference_date: NaiveDate,
    pub data_source: String,
    pub total_projects: usize,
    pub total_funding: f64,
    pub unique_recipients: usize,
    pub anonymized_rows: usize,
    pub unique_ministries: usize,
    pub date_range: DateRange,
    pub ministry_count: usize,
    pub state_count: usize,
    pub highlights: Highlights,
    pub diagnostics: IngestDiagnostics,
}

fn top(grouped: Grouped<&str>) -> Option<String> {
    rank_by_funding(grouped.groups)
        .first()
        .map(|(key, _)| key.to_string())
}

pub fn analyze(dataset: &Dataset, ctx: &RunContext) -> SummaryDocument {
    let records = dataset.records();
    let domestic_country = ctx.config.ingest.domestic_country.as_str();
    let total: Tally = records.iter().collect();

    let ministries = group_by(records, |r| r.ministry_code.as_deref());
    let states = group_by(
        records.iter().filter(|r| r.location.is_domestic(domestic_country)),
        |r| r.location.state.as_deref(),
    );
    let recipients = group_by(records, |r| r.recipient.as_ref().and_then(|recipient| recipient.name()));
    let anonymized_rows = records
        .iter()
        .filter(|r| r.recipient.as_ref().is_some_and(|recipient| recipient.is_anonymized()))
        .count();

    let starts = records.iter().filter_map(|r| r.start_date);
    let date_range = DateRange {
        earliest_start: starts.clone().min(),
        latest_start: starts.max(),
    };

    let mut amounts: Vec<f64> = records
        .iter()
        .filter_map(|r| r.amount.and_then(|amount| amount.to_f64()))
        .collect();

    let unique_ministries = ministries.groups.len();
    let state_count = states.groups.len();
    let unique_recipients = recipients.groups.len();

    SummaryDocument {
        generated_at: ctx.generated_at,
        reference_date: ctx.reference_date,
        data_source: dataset.source().to_string(),
        total_projects: total.projects,
        total_funding: total.total_funding(),
        unique_recipients,
        anonymized_rows,
        unique_ministries,
        date_range,
        ministry_count: unique_ministries,
        state_count,
        highlights: Highlights {
            top_ministry: top(ministries),
            top_state: top(states),
            top_recipient: top(recipients),
            avg_project_funding: total.avg_funding(),
            median_project_funding: median(&mut amounts),
        },
        diagnostics: dataset.diagnostics().clone(),
    }
}
