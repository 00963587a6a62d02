use std::collections::HashMap;

use crate::models::RawRecord;

/// Collapse records to at most one per `source_url`.
///
/// The last record seen for a URL wins. It takes the slot where the URL
/// first appeared, so the output order follows first appearance.
pub fn deduplicate<I>(records: I) -> Vec<RawRecord>
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut unique: Vec<RawRecord> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for record in records {
        match slots.get(&record.source_url) {
            Some(&slot) => {
                tracing::debug!(url = %record.source_url, "Duplicate URL, keeping later record");
                unique[slot] = record;
            }
            None => {
                slots.insert(record.source_url.clone(), unique.len());
                unique.push(record);
            }
        }
    }

    unique
}
