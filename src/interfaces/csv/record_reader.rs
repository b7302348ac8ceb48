use crate::error::{FeeError, Result};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads typed records (billing items, students, payments) from a CSV source.
///
/// Whitespace around fields is trimmed and record lengths may vary, so
/// trailing optional columns can be left off.
pub struct RecordReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RecordReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes records; each bad row surfaces as its own error.
    pub fn records<T: DeserializeOwned>(self) -> impl Iterator<Item = Result<T>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(FeeError::from))
    }
}

/// Loads every record in a file, skipping malformed rows with a warning.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let mut records = Vec::new();
    for (row, result) in RecordReader::new(file).records::<T>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::warn!(path = %path.display(), row = row + 1, error = %err, "skipping malformed row");
            }
        }
    }
    Ok(records)
}
