//! Zip packaging for bulk output.
//!
//! Entries are written in row order as `<name>.png`. PNG data is already
//! compressed, so entries are stored rather than deflated. Two rows that
//! sanitize to the same name get `_2`, `_3`, ... suffixes so no entry is
//! silently replaced inside the archive.

#[cfg(test)]
#[path = "archive_test.rs"]
mod archive_test;

use std::collections::HashSet;
use std::io::{Cursor, Write};

use canvas::bulk::BulkOutput;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write every output into an in-memory zip.
///
/// # Errors
///
/// Returns `ArchiveError` when the zip writer fails.
pub fn write_zip(outputs: &[BulkOutput]) -> Result<Vec<u8>, ArchiveError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let names = entry_names(outputs);
    for (name, output) in names.iter().zip(outputs) {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&output.png)?;
    }

    let bytes = zip.finish()?.into_inner();
    debug!(entries = outputs.len(), bytes = bytes.len(), "zip written");
    Ok(bytes)
}

/// `<name>.png` per output, suffixing repeats with `_2`, `_3`, ...
#[must_use]
pub fn entry_names(outputs: &[BulkOutput]) -> Vec<String> {
    let mut taken = HashSet::new();
    outputs
        .iter()
        .map(|output| {
            let mut candidate = format!("{}.png", output.name);
            let mut n = 2;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{}_{n}.png", output.name);
                n += 1;
            }
            candidate
        })
        .collect()
}
