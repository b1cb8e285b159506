//! Console summary of a run.
//!
//! Printed after ingestion (and after writing, for runs that write) so the
//! operator sees how many rows were dropped or partially unusable.

use super::writer::WrittenDocument;
use crate::models::{FieldDiagnostics, IngestDiagnostics};
use std::path::Path;

/// What a finished command reports.
#[derive(Debug, Clone)]
pub struct RunSummary<'a> {
    pub source: &'a str,
    pub diagnostics: &'a IngestDiagnostics,
    /// Where documents went; `None` for runs that only validate.
    pub output_dir: Option<&'a Path>,
    pub documents: &'a [WrittenDocument],
    pub duration_seconds: f64,
}

/// Generate the complete console summary.
pub fn generate_run_summary(summary: &RunSummary) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n📊 Input: {}\n", summary.source));
    output.push_str(&generate_diagnostics_section(summary.diagnostics));

    if let Some(dir) = summary.output_dir {
        output.push_str(&generate_documents_section(dir, summary.documents));
    }

    output.push_str(&format!("   Duration: {:.1}s\n", summary.duration_seconds));
    output
}

/// Row counts and per-field failure counts.
fn generate_diagnostics_section(diagnostics: &IngestDiagnostics) -> String {
    let mut section = String::new();

    section.push_str(&format!("   Rows read: {}\n", diagnostics.rows_read));
    section.push_str(&format!("   Rows kept: {}\n", diagnostics.rows_kept()));
    if diagnostics.rows_skipped > 0 {
        section.push_str(&format!(
            "   Rows skipped (malformed): {}\n",
            diagnostics.rows_skipped
        ));
    }

    if !diagnostics.has_failures() {
        section.push_str("   No parse failures\n");
        return section;
    }

    for (field, counts) in [
        ("Amount", diagnostics.amount),
        ("Start date", diagnostics.start_date),
        ("End date", diagnostics.end_date),
    ] {
        if let Some(line) = field_line(field, counts) {
            section.push_str(&line);
        }
    }

    section
}

fn field_line(field: &str, counts: FieldDiagnostics) -> Option<String> {
    (counts.failures() > 0).then(|| {
        format!(
            "   - {}: {} empty | {} invalid\n",
            field, counts.empty, counts.invalid
        )
    })
}

/// Documents written and where.
fn generate_documents_section(dir: &Path, documents: &[WrittenDocument]) -> String {
    let mut section = String::new();

    let bytes: usize = documents.iter().map(|d| d.bytes).sum();
    section.push_str(&format!(
        "   Documents: {} ({:.1} KiB) in {}\n",
        documents.len(),
        bytes as f64 / 1024.0,
        dir.display()
    ));

    section
}
