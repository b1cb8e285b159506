//! Data models for the funding catalog.
//!
//! This module contains the normalized record model produced by
//! ingestion, the immutable [`Dataset`] every aggregation pass reads,
//! and the small output shapes shared between documents.

use crate::error::PassError;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Average month length used to turn a day span into months.
pub const DAYS_PER_MONTH: f64 = 30.44;

/// Source columns the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    ProjectId,
    Ministry,
    Sponsor,
    Recipient,
    TopicCode,
    TopicDescription,
    Amount,
    StartDate,
    EndDate,
    Country,
    State,
    City,
    FundingType,
    FundingProfile,
    JointProject,
    Title,
}

impl Column {
    pub const ALL: [Column; 16] = [
        Column::ProjectId,
        Column::Ministry,
        Column::Sponsor,
        Column::Recipient,
        Column::TopicCode,
        Column::TopicDescription,
        Column::Amount,
        Column::StartDate,
        Column::EndDate,
        Column::Country,
        Column::State,
        Column::City,
        Column::FundingType,
        Column::FundingProfile,
        Column::JointProject,
        Column::Title,
    ];

    /// Header text as it appears in the catalog export.
    pub fn header(self) -> &'static str {
        match self {
            Column::ProjectId => "FKZ",
            Column::Ministry => "Ressort",
            Column::Sponsor => "PT",
            Column::Recipient => "Zuwendungsempfänger",
            Column::TopicCode => "Leistungsplansystematik",
            Column::TopicDescription => "Klartext Leistungsplansystematik",
            Column::Amount => "Fördersumme in EUR",
            Column::StartDate => "Laufzeit von",
            Column::EndDate => "Laufzeit bis",
            Column::Country => "Staat",
            Column::State => "Bundesland",
            Column::City => "Ort",
            Column::FundingType => "Förderart",
            Column::FundingProfile => "Förderprofil",
            Column::JointProject => "Verbundprojekt",
            Column::Title => "Thema",
        }
    }

    /// Resolve a cleaned header cell.
    pub fn from_header(header: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.header() == header)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

/// Identity of a grant recipient.
///
/// The catalog replaces protected recipients with a placeholder text. Such
/// a row stands for a group of several real recipients, never for one
/// organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    Named(String),
    AnonymizedGroup,
}

impl Recipient {
    /// Name of a named recipient.
    pub fn name(&self) -> Option<&str> {
        match self {
            Recipient::Named(name) => Some(name),
            Recipient::AnonymizedGroup => None,
        }
    }

    pub fn is_anonymized(&self) -> bool {
        matches!(self, Recipient::AnonymizedGroup)
    }
}

/// Where the funded work takes place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

impl Location {
    pub fn is_domestic(&self, domestic_country: &str) -> bool {
        self.country.as_deref() == Some(domestic_country)
    }
}

/// One funding decision line of the catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Funding reference number (FKZ).
    pub project_id: String,
    pub ministry_code: Option<String>,
    /// Administrative body (Projektträger) managing the grant.
    pub sponsor_code: Option<String>,
    pub recipient: Option<Recipient>,
    pub topic_code: Option<String>,
    pub topic_description: Option<String>,
    /// Granted amount in EUR; `None` when the cell did not parse.
    pub amount: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location: Location,
    pub funding_type: Option<String>,
    pub funding_profile: Option<String>,
    /// Name of the consortium the line belongs to.
    pub joint_project: Option<String>,
    /// Project title, used for keyword extraction.
    pub title: Option<String>,
}

impl Record {
    pub fn is_joint_project(&self) -> bool {
        self.joint_project.is_some()
    }

    pub fn start_year(&self) -> Option<i32> {
        self.start_date.map(|d| d.year())
    }

    /// Project duration in months, when both dates are known.
    pub fn duration_months(&self) -> Option<f64> {
        let (start, end) = (self.start_date?, self.end_date?);
        let days = (end - start).num_days() as f64;
        Some((days / DAYS_PER_MONTH).max(0.0))
    }
}

/// Parse failures of a single field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiagnostics {
    /// Cells that were blank.
    pub empty: usize,
    /// Cells that held something unparseable.
    pub invalid: usize,
}

impl FieldDiagnostics {
    pub fn failures(&self) -> usize {
        self.empty + self.invalid
    }
}

/// Counters collected while reading the input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestDiagnostics {
    /// Data rows encountered (excluding the header).
    pub rows_read: usize,
    /// Rows dropped because they were structurally malformed.
    pub rows_skipped: usize,
    pub amount: FieldDiagnostics,
    pub start_date: FieldDiagnostics,
    pub end_date: FieldDiagnostics,
}

impl IngestDiagnostics {
    pub fn rows_kept(&self) -> usize {
        self.rows_read - self.rows_skipped
    }

    pub fn has_failures(&self) -> bool {
        self.rows_skipped > 0
            || self.amount.failures() > 0
            || self.start_date.failures() > 0
            || self.end_date.failures() > 0
    }
}

/// The immutable record table shared by every aggregation pass.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    columns: BTreeSet<Column>,
    diagnostics: IngestDiagnostics,
    source: String,
}

impl Dataset {
    pub fn new(
        records: Vec<Record>,
        columns: BTreeSet<Column>,
        diagnostics: IngestDiagnostics,
        source: impl Into<String>,
    ) -> Self {
        Self {
            records,
            columns,
            diagnostics,
            source: source.into(),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn diagnostics(&self) -> &IngestDiagnostics {
        &self.diagnostics
    }

    /// Name of the file the records came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Fail when a pass needs a column the input never had.
    pub fn require(&self, pass: &'static str, columns: &[Column]) -> Result<(), PassError> {
        match columns.iter().find(|c| !self.has_column(**c)) {
            Some(column) => Err(PassError::MissingField {
                pass,
                column: column.header(),
            }),
            None => Ok(()),
        }
    }
}

/// Funding total and project count of a residual group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub total_funding: f64,
    pub project_count: usize,
}

/// One point of a yearly series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearBucket {
    pub year: i32,
    pub total_funding: f64,
    pub project_count: usize,
}
