//! Directory-of-CSV input.

use std::fs::File;
use std::path::Path;

use serde::de::DeserializeOwned;

use super::InputData;
use crate::error::InputError;

pub const AGE_GROUPS_FILE: &str = "age_groups.csv";
pub const PROBABILITY_FILE: &str = "probability.csv";
pub const DURATION_FILE: &str = "duration.csv";

pub(super) fn read_dir(dir: &Path) -> Result<InputData, InputError> {
    Ok(InputData {
        age_groups: read_age_groups(&dir.join(AGE_GROUPS_FILE))?,
        probability: read_records(&dir.join(PROBABILITY_FILE))?,
        duration: read_records(&dir.join(DURATION_FILE))?,
    })
}

/// First column of every data row; the header row is skipped.
fn read_age_groups(path: &Path) -> Result<Vec<String>, InputError> {
    let mut rdr = open(path)?;
    let mut ages = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        if let Some(age) = record.get(0).map(str::trim).filter(|a| !a.is_empty()) {
            ages.push(age.to_string());
        }
    }
    Ok(ages)
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, InputError> {
    let mut rdr = open(path)?;
    rdr.deserialize()
        .map(|row| row.map_err(|e| csv_error(path, e)))
        .collect()
}

fn open(path: &Path) -> Result<csv::Reader<File>, InputError> {
    let file = File::open(path).map_err(|e| InputError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn csv_error(path: &Path, e: csv::Error) -> InputError {
    InputError::Csv {
        path: path.to_path_buf(),
        source: e,
    }
}
