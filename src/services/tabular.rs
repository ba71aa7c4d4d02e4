//! CSV parsing into a [`TabularSource`].
//!
//! The first record is the header. Header names are trimmed; values are kept
//! verbatim so a mapped cell substitutes exactly what the spreadsheet holds. Ragged rows are tolerated:
//! missing trailing cells read as empty, extra cells are dropped.

#[cfg(test)]
#[path = "tabular_test.rs"]
mod tabular_test;

use std::collections::HashMap;

use canvas::bulk::TabularSource;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum TabularError {
    #[error("CSV has no header row")]
    MissingHeader,
    #[error("CSV header contains an empty column name at position {0}")]
    EmptyColumn(usize),
    #[error("CSV has more than {limit} rows")]
    TooManyRows { limit: usize },
    #[error("malformed CSV: {0}")]
    Malformed(#[from] csv::Error),
}

/// Parse `text` into ordered rows keyed by header name.
///
/// # Errors
///
/// `MissingHeader` for empty input, `EmptyColumn` for a blank header cell,
/// `TooManyRows` past `max_rows`, `Malformed` for invalid CSV.
pub fn parse_csv(text: &str, max_rows: usize) -> Result<TabularSource, TabularError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_owned()).collect();
    if columns.is_empty() || columns.iter().all(String::is_empty) {
        return Err(TabularError::MissingHeader);
    }
    if let Some(pos) = columns.iter().position(String::is_empty) {
        return Err(TabularError::EmptyColumn(pos));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() != columns.len() {
            warn!(line = record.position().map(csv::Position::line), cells = record.len(), "ragged CSV row");
        }
        if rows.len() == max_rows {
            return Err(TabularError::TooManyRows { limit: max_rows });
        }
        let row: HashMap<String, String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.clone(), record.get(i).unwrap_or_default().to_owned()))
            .collect();
        rows.push(row);
    }

    debug!(columns = columns.len(), rows = rows.len(), "parsed CSV");
    Ok(TabularSource::new(columns, rows))
}
