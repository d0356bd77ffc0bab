//! Persisted calibration results.
//!
//! One joint calibration at a given alpha writes three files next to each
//! other:
//!
//! - `{output}-{alpha}.{ext}`: transition matrices of all age groups
//! - `{output}-{alpha}-summary.{ext}`: per-stage hitting probabilities and durations
//! - `{output}-{alpha}-parameters.json`: fitted parameter vectors

mod params;
mod tables;

pub use params::{GroupParameters, ParameterFile};
pub use tables::{SummaryRow, SummaryTable, Tabular, TransitionRow, TransitionTable};

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sf_config::SettingsSnapshot;

use crate::error::{Error, OutputError};
use crate::fit::{JointFitter, JointReport};

/// File format of the result tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Where one result set goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultPaths {
    pub transitions: PathBuf,
    pub summary: PathBuf,
    pub parameters: PathBuf,
}

impl ResultPaths {
    pub fn new(output: &Path, alpha: f64, format: OutputFormat) -> Self {
        let base = format!("{}-{}", output.display(), alpha);
        let ext = format.extension();
        Self {
            transitions: PathBuf::from(format!("{}.{}", base, ext)),
            summary: PathBuf::from(format!("{}-summary.{}", base, ext)),
            parameters: PathBuf::from(format!("{}-parameters.json", base)),
        }
    }
}

/// Write `table` to `path` in `format`.
pub fn write_table<T>(table: &T, path: &Path, format: OutputFormat) -> Result<(), OutputError>
where
    T: Tabular + Serialize,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| OutputError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let file = File::create(path).map_err(|e| OutputError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    render_table(table, format, BufWriter::new(file), path)
}

/// Render `table` into any writer; `origin` names the destination in errors.
pub fn render_table<T, W>(
    table: &T,
    format: OutputFormat,
    mut writer: W,
    origin: &Path,
) -> Result<(), OutputError>
where
    T: Tabular + Serialize,
    W: Write,
{
    match format {
        OutputFormat::Csv => {
            let csv_err = |e: csv::Error| OutputError::Csv {
                path: origin.to_path_buf(),
                source: e,
            };
            let mut wtr = csv::Writer::from_writer(writer);
            wtr.write_record(table.header()).map_err(csv_err)?;
            for record in table.records() {
                wtr.write_record(&record).map_err(csv_err)?;
            }
            wtr.flush().map_err(|e| OutputError::Io {
                path: origin.to_path_buf(),
                source: e,
            })
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, table).map_err(|e| OutputError::Json {
                path: origin.to_path_buf(),
                source: e,
            })?;
            writeln!(writer)
                .and_then(|()| writer.flush())
                .map_err(|e| OutputError::Io {
                    path: origin.to_path_buf(),
                    source: e,
                })
        }
    }
}

/// Write the transition, summary and parameter files of one calibration.
pub fn write_results(
    joint: &JointFitter,
    report: &JointReport,
    output: &Path,
    format: OutputFormat,
    run_id: &str,
    snapshot: Option<&SettingsSnapshot>,
) -> Result<ResultPaths, Error> {
    let paths = ResultPaths::new(output, joint.alpha(), format);
    let Some(first) = joint.fitters().first() else {
        return Err(crate::error::FitError::NoAgeGroups.into());
    };
    let layout = first.builder().layout();

    let transitions = TransitionTable::from_fitters(layout, joint.fitters());
    write_table(&transitions.pre_save(layout), &paths.transitions, format)?;

    let summary = SummaryTable::from_fitters(layout, joint.fitters())?;
    write_table(&summary, &paths.summary, format)?;

    let mut params = ParameterFile::from_joint(joint, report, layout).with_run_id(run_id);
    if let Some(snapshot) = snapshot {
        params = params.with_settings(snapshot.clone());
    }
    params.save(&paths.parameters)?;

    tracing::info!(
        alpha = joint.alpha(),
        transitions = %paths.transitions.display(),
        summary = %paths.summary.display(),
        "results written"
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn result_names_carry_alpha() {
        let paths = ResultPaths::new(Path::new("out/test"), 0.991, OutputFormat::Csv);
        assert_eq!(paths.transitions, PathBuf::from("out/test-0.991.csv"));
        assert_eq!(paths.summary, PathBuf::from("out/test-0.991-summary.csv"));
        assert_eq!(paths.parameters, PathBuf::from("out/test-0.991-parameters.json"));

        let json = ResultPaths::new(Path::new("test"), 0.98, OutputFormat::Json);
        assert_eq!(json.summary, PathBuf::from("test-0.98-summary.json"));
    }

    #[test]
    fn csv_table_has_header_and_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("t.csv");
        let table = TransitionTable {
            stages: vec!["A".into(), "B".into()],
            rows: vec![TransitionRow {
                age: "Age_all".into(),
                stage: "A".into(),
                values: vec![0.25, 0.75],
            }],
        };
        write_table(&table, &path, OutputFormat::Csv).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "age,stage,A,B\nAge_all,A,0.25,0.75\n");
    }

    #[test]
    fn json_table_renders_infinity_as_null() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s.json");
        let table = SummaryTable {
            columns: vec!["duration".into()],
            rows: vec![SummaryRow {
                age: "Age_all".into(),
                stage: "DEAD".into(),
                values: vec![f64::INFINITY],
            }],
        };
        write_table(&table, &path, OutputFormat::Json).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value["rows"][0]["values"][0].is_null());
    }

    #[test]
    fn format_parses_from_cli_values() {
        assert_eq!(OutputFormat::from_str("csv", true).unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_str("json", true).unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
