//! Ingestion of the catalog export.
//!
//! This module decodes the legacy single-byte export, validates its
//! header, and turns each row into a normalized [`Record`]. Malformed rows
//! are skipped and counted; bad cells are counted and left empty.

pub mod values;

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::models::{Column, Dataset, FieldDiagnostics, IngestDiagnostics, Location, Recipient, Record};
use csv::StringRecord;
use encoding_rs::Encoding;
use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};
use values::ValueError;

/// Rows between progress bar updates.
const PROGRESS_STEP: usize = 10_000;

/// Exports smaller than this are most likely truncated downloads.
pub const MIN_EXPECTED_SIZE: u64 = 1024 * 1024;

/// Bytes read when peeking at the header.
const HEADER_PEEK: u64 = 64 * 1024;

/// Options for reading an export.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub encoding: &'static Encoding,
    pub delimiter: u8,
    pub anonymized_marker: String,
    pub required_columns: Vec<String>,
    pub show_progress: bool,
}

impl TryFrom<&IngestConfig> for IngestOptions {
    type Error = IngestError;

    fn try_from(config: &IngestConfig) -> Result<Self, Self::Error> {
        let encoding = Encoding::for_label(config.encoding.as_bytes())
            .ok_or_else(|| IngestError::UnsupportedEncoding(config.encoding.clone()))?;

        let delimiter = u8::try_from(config.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(IngestError::UnsupportedDelimiter(config.delimiter))?;

        Ok(Self {
            encoding,
            delimiter,
            anonymized_marker: config.anonymized_marker.clone(),
            required_columns: config.required_columns.clone(),
            show_progress: false,
        })
    }
}

impl IngestOptions {
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// Positions of the known columns within the header.
#[derive(Debug, Clone, Default)]
struct ColumnLayout {
    positions: BTreeMap<Column, usize>,
    headers: BTreeSet<String>,
}

impl ColumnLayout {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut layout = Self::default();

        for (index, raw) in headers.iter().enumerate() {
            let name = values::clean_cell(raw).to_string();
            // Duplicate header names keep their first occurrence.
            if !layout.headers.insert(name.clone()) {
                continue;
            }
            if let Some(column) = Column::from_header(&name) {
                layout.positions.insert(column, index);
            }
        }

        layout
    }

    fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a String> {
        required
            .iter()
            .filter(|name| !self.headers.contains(name.as_str()))
            .collect()
    }

    fn columns(&self) -> BTreeSet<Column> {
        self.positions.keys().copied().collect()
    }

    fn cell<'r>(&self, row: &'r StringRecord, column: Column) -> Option<&'r str> {
        self.positions.get(&column).and_then(|i| row.get(*i))
    }
}

/// Reader turning a catalog export into a [`Dataset`].
pub struct CsvIngestor {
    options: IngestOptions,
}

impl CsvIngestor {
    /// Create a new ingestor.
    pub fn new(options: IngestOptions) -> Self {
        Self { options }
    }

    /// Read and normalize the export at `path`.
    pub fn ingest_path(&self, path: &Path) -> Result<Dataset, IngestError> {
        if !path.is_file() {
            return Err(IngestError::MissingInput(path.to_path_buf()));
        }

        info!("Reading {}", path.display());
        let bytes = std::fs::read(path)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        self.ingest_bytes(&bytes, &source)
    }

    /// Normalize an in-memory export.
    pub fn ingest_bytes(&self, bytes: &[u8], source: &str) -> Result<Dataset, IngestError> {
        if bytes.is_empty() {
            return Err(IngestError::EmptyInput);
        }

        let text = self.decode(bytes)?;
        self.check_delimiter(&text)?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(text.as_bytes());

        let layout = ColumnLayout::from_headers(reader.headers()?);
        let missing = layout.missing(&self.options.required_columns);
        if !missing.is_empty() {
            return Err(IngestError::MissingColumns(
                missing.into_iter().cloned().collect(),
            ));
        }

        let progress = self.progress_bar(text.len() as u64);
        let mut diagnostics = IngestDiagnostics::default();
        let mut records = Vec::new();

        let mut row = StringRecord::new();
        loop {
            match reader.read_record(&mut row) {
                Ok(false) => break,
                Ok(true) => {
                    diagnostics.rows_read += 1;
                    records.push(self.build_record(&layout, &row, &mut diagnostics));
                }
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
                Err(e) => {
                    diagnostics.rows_read += 1;
                    diagnostics.rows_skipped += 1;
                    debug!("Skipping malformed row {}: {}", diagnostics.rows_read, e);
                }
            }

            if let Some(ref pb) = progress {
                if diagnostics.rows_read % PROGRESS_STEP == 0 {
                    pb.set_position(reader.position().byte());
                }
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        log_diagnostics(&diagnostics);

        Ok(Dataset::new(records, layout.columns(), diagnostics, source))
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, IngestError> {
        let (text, had_errors) = self.options.encoding.decode_with_bom_removal(bytes);
        if had_errors {
            return Err(IngestError::Undecodable(self.options.encoding.name()));
        }
        Ok(text)
    }

    fn check_delimiter(&self, text: &str) -> Result<(), IngestError> {
        let header = text.lines().next().unwrap_or("");
        let expected = char::from(self.options.delimiter);

        if header.trim().is_empty() {
            return Err(IngestError::EmptyInput);
        }
        if header.contains(expected) {
            return Ok(());
        }

        match [',', '\t', ';', '|'].into_iter().find(|c| *c != expected && header.contains(*c)) {
            Some(found) => Err(IngestError::WrongDelimiter { expected, found }),
            // A single-column header falls through to the column check.
            None => Ok(()),
        }
    }

    fn build_record(
        &self,
        layout: &ColumnLayout,
        row: &StringRecord,
        diagnostics: &mut IngestDiagnostics,
    ) -> Record {
        let text = |column: Column| layout.cell(row, column).and_then(values::text);

        let amount = layout
            .cell(row, Column::Amount)
            .and_then(|cell| tally(values::parse_amount(cell), &mut diagnostics.amount));
        let start_date = layout
            .cell(row, Column::StartDate)
            .and_then(|cell| tally(values::parse_date(cell), &mut diagnostics.start_date));
        let end_date = layout
            .cell(row, Column::EndDate)
            .and_then(|cell| tally(values::parse_date(cell), &mut diagnostics.end_date));

        let recipient = text(Column::Recipient).map(|name| {
            if name.starts_with(&self.options.anonymized_marker) {
                Recipient::AnonymizedGroup
            } else {
                Recipient::Named(name)
            }
        });

        Record {
            project_id: text(Column::ProjectId).unwrap_or_default(),
            ministry_code: text(Column::Ministry),
            sponsor_code: text(Column::Sponsor),
            recipient,
            topic_code: text(Column::TopicCode),
            topic_description: text(Column::TopicDescription),
            amount,
            start_date,
            end_date,
            location: Location {
                country: text(Column::Country),
                state: text(Column::State),
                city: text(Column::City),
            },
            funding_type: text(Column::FundingType),
            funding_profile: text(Column::FundingProfile),
            joint_project: text(Column::JointProject),
            title: text(Column::Title),
        }
    }

    fn progress_bar(&self, len: u64) -> Option<ProgressBar> {
        if !self.options.show_progress {
            return None;
        }

        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    }
}

/// Result of a quick look at an export before a full run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportCheck {
    pub size: u64,
    /// Whether the header carries the project id column.
    pub has_project_ids: bool,
}

impl ExportCheck {
    pub fn looks_truncated(&self) -> bool {
        self.size < MIN_EXPECTED_SIZE
    }
}

/// Peek at the header of the export at `path` without parsing rows.
pub fn inspect_export(path: &Path, options: &IngestOptions) -> Result<ExportCheck, IngestError> {
    if !path.is_file() {
        return Err(IngestError::MissingInput(path.to_path_buf()));
    }

    let size = std::fs::metadata(path)?.len();
    let mut head = Vec::new();
    std::fs::File::open(path)?
        .take(HEADER_PEEK)
        .read_to_end(&mut head)?;

    // The peek may cut a character in half, so decoding errors are ignored.
    let (text, _) = options.encoding.decode_with_bom_removal(&head);
    let has_project_ids = text.lines().next().is_some_and(|header| {
        header
            .split(char::from(options.delimiter))
            .any(|cell| values::clean_cell(cell) == Column::ProjectId.header())
    });

    debug!("Export {} is {} bytes", path.display(), size);
    Ok(ExportCheck {
        size,
        has_project_ids,
    })
}

/// Keep a parsed value or count the failure.
fn tally<T>(parsed: Result<T, ValueError>, field: &mut FieldDiagnostics) -> Option<T> {
    match parsed {
        Ok(value) => Some(value),
        Err(ValueError::Empty) => {
            field.empty += 1;
            None
        }
        Err(ValueError::Invalid) => {
            field.invalid += 1;
            None
        }
    }
}

fn log_diagnostics(diagnostics: &IngestDiagnostics) {
    info!(
        "Loaded {} rows ({} skipped as malformed)",
        diagnostics.rows_kept(),
        diagnostics.rows_skipped
    );

    for (field, counts) in [
        ("amount", diagnostics.amount),
        ("start date", diagnostics.start_date),
        ("end date", diagnostics.end_date),
    ] {
        if counts.failures() > 0 {
            warn!(
                "{} unusable {} cells ({} empty, {} invalid)",
                counts.failures(),
                field,
                counts.empty,
                counts.invalid
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const HEADER: &str = "=\"FKZ\";=\"Ressort\";=\"PT\";=\"Zuwendungsempfänger\";=\"Fördersumme in EUR\";=\"Laufzeit von\";=\"Laufzeit bis\";=\"Staat\";=\"Bundesland\";=\"Ort\";=\"Thema\"";

    fn encode(text: &str) -> Vec<u8> {
        let (bytes, _, unmappable) = encoding_rs::WINDOWS_1252.encode(text);
        assert!(!unmappable);
        bytes.into_owned()
    }

    fn ingestor() -> CsvIngestor {
        CsvIngestor::new(IngestOptions::try_from(&IngestConfig::default()).unwrap())
    }

    fn export(rows: &[&str]) -> Vec<u8> {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push_str("\r\n");
            text.push_str(row);
        }
        encode(&text)
    }

    #[test]
    fn test_ingest_decorated_cp1252_rows() {
        let bytes = export(&[
            "=\"01AB1\";=\"BMFTR\";=\"PTJ\";=\"Universität Köln\";1.234,56;15.03.2019;14.03.2022;=\"Deutschland\";=\"Nordrhein-Westfalen\";=\"Köln\";=\"Künstliche Intelligenz für Böden\"",
        ]);

        let dataset = ingestor().ingest_bytes(&bytes, "Suchliste.csv").unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.source(), "Suchliste.csv");

        let record = &dataset.records()[0];
        assert_eq!(record.project_id, "01AB1");
        assert_eq!(record.ministry_code.as_deref(), Some("BMFTR"));
        assert_eq!(
            record.recipient,
            Some(Recipient::Named("Universität Köln".to_string()))
        );
        assert_eq!(record.amount, Some(Decimal::new(123456, 2)));
        assert_eq!(record.start_year(), Some(2019));
        assert_eq!(record.location.city.as_deref(), Some("Köln"));
        assert!(dataset.has_column(Column::Title));
        assert!(!dataset.has_column(Column::JointProject));
    }

    #[test]
    fn test_anonymized_marker_becomes_group() {
        let bytes = export(&[
            "=\"01AB1\";=\"BMEL\";;=\"Keine Anzeige aufgrund Datenschutz\";100,00;01.01.2020;;;;;",
        ]);

        let dataset = ingestor().ingest_bytes(&bytes, "x.csv").unwrap();
        assert_eq!(
            dataset.records()[0].recipient,
            Some(Recipient::AnonymizedGroup)
        );
    }

    #[test]
    fn test_bad_cells_are_counted_not_fatal() {
        let bytes = export(&[
            "=\"A\";=\"BMV\";;=\"X\";abc;31.02.2019;;;;;",
            "=\"B\";=\"BMV\";;=\"Y\";;01.01.2019;01.01.2020;;;;",
            "=\"C\";=\"BMV\";;=\"Z\";10,00;01.01.2019;01.01.2020;;;;",
        ]);

        let dataset = ingestor().ingest_bytes(&bytes, "x.csv").unwrap();
        let diagnostics = dataset.diagnostics();

        assert_eq!(dataset.len(), 3);
        assert_eq!(diagnostics.rows_read, 3);
        assert_eq!(diagnostics.amount.invalid, 1);
        assert_eq!(diagnostics.amount.empty, 1);
        assert_eq!(diagnostics.start_date.invalid, 1);
        assert_eq!(diagnostics.end_date.empty, 1);
        assert_eq!(dataset.records()[0].amount, None);
        assert_eq!(dataset.records()[0].ministry_code.as_deref(), Some("BMV"));
    }

    #[test]
    fn test_malformed_row_is_skipped() {
        let bytes = export(&[
            "=\"A\";=\"BMV\";;=\"X\";1,00;01.01.2019;;;;;",
            "=\"B\";=\"BMV\";only-three-fields",
            "=\"C\";=\"BMV\";;=\"Z\";2,00;01.01.2019;;;;;",
        ]);

        let dataset = ingestor().ingest_bytes(&bytes, "x.csv").unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.diagnostics().rows_read, 3);
        assert_eq!(dataset.diagnostics().rows_skipped, 1);
        assert_eq!(dataset.diagnostics().rows_kept(), 2);
    }

    #[test]
    fn test_wrong_delimiter_is_fatal() {
        let bytes = encode("FKZ,Ressort,Fördersumme in EUR\nA,BMV,\"1,00\"");
        let err = ingestor().ingest_bytes(&bytes, "x.csv").unwrap_err();
        assert!(matches!(
            err,
            IngestError::WrongDelimiter {
                expected: ';',
                found: ','
            }
        ));
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let bytes = encode("=\"FKZ\";=\"Ressort\"\r\n=\"A\";=\"BMV\"");
        let err = ingestor().ingest_bytes(&bytes, "x.csv").unwrap_err();
        match err {
            IngestError::MissingColumns(columns) => {
                assert_eq!(columns, vec!["Fördersumme in EUR".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_input_is_fatal() {
        assert!(matches!(
            ingestor().ingest_bytes(&[], "x.csv"),
            Err(IngestError::EmptyInput)
        ));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = ingestor()
            .ingest_path(&dir.path().join("Suchliste.csv"))
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingInput(_)));
    }

    #[test]
    fn test_unknown_encoding_label_is_rejected() {
        let config = IngestConfig {
            encoding: "klingon".to_string(),
            ..IngestConfig::default()
        };
        assert!(matches!(
            IngestOptions::try_from(&config),
            Err(IngestError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_utf8_input_with_invalid_bytes_is_fatal() {
        let config = IngestConfig {
            encoding: "utf-8".to_string(),
            ..IngestConfig::default()
        };
        let ingestor = CsvIngestor::new(IngestOptions::try_from(&config).unwrap());
        let bytes = encode("=\"FKZ\";=\"Fördersumme in EUR\"\r\n=\"A\";1,00");

        assert!(matches!(
            ingestor.ingest_bytes(&bytes, "x.csv"),
            Err(IngestError::Undecodable(_))
        ));
    }

    #[test]
    fn test_duplicate_header_keeps_first_column() {
        let bytes = encode(
            "=\"FKZ\";=\"Fördersumme in EUR\";=\"Fördersumme in EUR\"\r\n=\"A\";1,00;999,00",
        );
        let dataset = ingestor().ingest_bytes(&bytes, "x.csv").unwrap();
        assert_eq!(dataset.records()[0].amount, Some(Decimal::new(100, 2)));
    }

    #[test]
    fn test_inspect_export_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let options = IngestOptions::try_from(&IngestConfig::default()).unwrap();

        let export = dir.path().join("Suchliste.csv");
        std::fs::write(&export, encode(&format!("{HEADER}\n"))).unwrap();
        let check = inspect_export(&export, &options).unwrap();
        assert!(check.has_project_ids);
        assert!(check.looks_truncated());

        let other = dir.path().join("other.csv");
        std::fs::write(&other, b"Name;Wert\nA;1\n").unwrap();
        assert!(!inspect_export(&other, &options).unwrap().has_project_ids);

        assert!(matches!(
            inspect_export(&dir.path().join("missing.csv"), &options),
            Err(IngestError::MissingInput(_))
        ));
    }
}
