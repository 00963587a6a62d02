use std::path::Path;

use anyhow::{Context, Result};
use kazi_core::models::CategorizedRecord;
use serde::Serialize;

/// One CSV row. `csv` cannot serialize flattened structs, so the record is
/// spelled out column by column.
#[derive(Serialize)]
struct ExportRow<'a> {
    title: &'a str,
    company: &'a str,
    #[serde(rename = "type")]
    category: &'a str,
    status: &'a str,
    location: &'a str,
    source_platform: &'a str,
    source_url: &'a str,
    description: &'a str,
}

impl<'a> From<&'a CategorizedRecord> for ExportRow<'a> {
    fn from(r: &'a CategorizedRecord) -> Self {
        Self {
            title: &r.record.title,
            company: &r.record.company,
            category: r.category.as_str(),
            status: r.status.as_str(),
            location: &r.record.location,
            source_platform: &r.record.source_platform,
            source_url: &r.record.source_url,
            description: &r.record.description,
        }
    }
}

/// Write categorized records to a CSV file. The header row comes from the
/// first record, so an empty batch leaves an empty file.
pub fn write_csv(path: &Path, records: &[CategorizedRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;

    for record in records {
        writer
            .serialize(ExportRow::from(record))
            .context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush CSV export")?;

    Ok(())
}
