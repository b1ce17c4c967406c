use crate::error::Result;
use crate::schema::{RawSupervisionRecord, RecordIssue};
use crate::utils::parse_evaluation_date;
use chrono::NaiveDate;
use log::debug;
use std::io::Read;
use std::path::Path;

/// Reads supervision rows from a CSV export with a header row.
///
/// Dates stay as text here; a malformed date is flagged on the enriched record instead of
/// failing the whole file.
pub fn read_supervision_csv<R: Read>(reader: R) -> Result<Vec<RawSupervisionRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.deserialize() {
        let record: RawSupervisionRecord = row?;
        records.push(record);
    }

    debug!("Read {} supervision rows from CSV", records.len());
    Ok(records)
}

pub fn read_supervision_csv_path<P: AsRef<Path>>(path: P) -> Result<Vec<RawSupervisionRecord>> {
    let file = std::fs::File::open(path)?;
    read_supervision_csv(file)
}

/// Reads supervision rows from a JSON array, as produced by a database export.
pub fn read_supervision_json<R: Read>(reader: R) -> Result<Vec<RawSupervisionRecord>> {
    let records: Vec<RawSupervisionRecord> = serde_json::from_reader(reader)?;
    debug!("Read {} supervision rows from JSON", records.len());
    Ok(records)
}

pub fn percentage_issue(percentage: Option<f64>) -> Option<RecordIssue> {
    match percentage {
        Some(value) if !value.is_finite() || !(0.0..=100.0).contains(&value) => {
            Some(RecordIssue::MalformedPercentage { value })
        }
        _ => None,
    }
}

/// Parses the evaluation date and collects every data-quality issue on a row.
pub fn inspect_record(record: &RawSupervisionRecord) -> (Option<NaiveDate>, Vec<RecordIssue>) {
    let mut issues = Vec::new();

    let date = match parse_evaluation_date(&record.evaluation_date) {
        Ok(date) => Some(date),
        Err(_) => {
            issues.push(RecordIssue::MalformedDate {
                raw: record.evaluation_date.clone(),
            });
            None
        }
    };

    if let Some(issue) = percentage_issue(record.percentage) {
        issues.push(issue);
    }

    (date, issues)
}
