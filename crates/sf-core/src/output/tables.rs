//! Result tables: transition matrices and per-stage summaries.

use serde::Serialize;
use sf_config::ChainLayout;

use crate::chain::Chain;
use crate::error::ChainError;
use crate::fit::SingleFitter;

/// A table that can be written as CSV.
pub trait Tabular {
    fn header(&self) -> Vec<String>;
    fn records(&self) -> Vec<Vec<String>>;
}

/// One outgoing row of one age group's transition matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionRow {
    pub age: String,
    pub stage: String,
    pub values: Vec<f64>,
}

/// Transition matrices of all age groups, indexed by age and from-stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionTable {
    pub stages: Vec<String>,
    pub rows: Vec<TransitionRow>,
}

impl TransitionTable {
    pub fn new(stages: Vec<String>) -> Self {
        Self {
            stages,
            rows: Vec::new(),
        }
    }

    pub fn push_chain(&mut self, age: &str, chain: &Chain) {
        let m = chain.transition_matrix();
        for (stage, row) in self.stages.iter().zip(m.row_iter()) {
            self.rows.push(TransitionRow {
                age: age.to_string(),
                stage: stage.clone(),
                values: row.iter().copied().collect(),
            });
        }
    }

    pub fn from_fitters(layout: &ChainLayout, fitters: &[SingleFitter]) -> Self {
        let mut table = Self::new(layout.stages().to_vec());
        for f in fitters {
            table.push_chain(f.age(), f.chain());
        }
        table
    }

    /// Copy for persisting: the layout's cleared stage has its row zeroed.
    ///
    /// The cleared stage's internal transition only seeds the chain; its real
    /// exit is decided downstream, so persisted output carries no row for it.
    pub fn pre_save(&self, layout: &ChainLayout) -> Self {
        let mut table = self.clone();
        let cleared = layout
            .cleared_output_state()
            .and_then(|s| layout.stage_name(s));
        if let Some(name) = cleared {
            for row in table.rows.iter_mut().filter(|r| r.stage == name) {
                row.values.iter_mut().for_each(|v| *v = 0.0);
            }
        }
        table
    }
}

impl Tabular for TransitionTable {
    fn header(&self) -> Vec<String> {
        let mut header = vec!["age".to_string(), "stage".to_string()];
        header.extend(self.stages.iter().cloned());
        header
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| {
                let mut rec = vec![r.age.clone(), r.stage.clone()];
                rec.extend(r.values.iter().map(f64::to_string));
                rec
            })
            .collect()
    }
}

/// One stage of one age group's summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub age: String,
    pub stage: String,
    /// Hitting probability from each reference stage, then the duration.
    pub values: Vec<f64>,
}

/// Per-stage hitting probabilities and durations of all age groups.
///
/// Durations of absorbing stages are infinite; JSON output renders them as
/// `null`, CSV as `inf`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    pub columns: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Empty table with `p given <label>` per reference stage and `duration`.
    pub fn new(layout: &ChainLayout) -> Self {
        let mut columns: Vec<String> = layout
            .reference_states()
            .iter()
            .map(|(_, label)| format!("p given {}", label))
            .collect();
        columns.push("duration".to_string());
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_chain(
        &mut self,
        age: &str,
        chain: &Chain,
        layout: &ChainLayout,
    ) -> Result<(), ChainError> {
        for (stage, name) in layout.stages().iter().enumerate() {
            let mut values = Vec::with_capacity(self.columns.len());
            for &(reference, _) in layout.reference_states() {
                values.push(chain.hitting_probability_to(reference, stage)?);
            }
            values.push(chain.duration_stage(stage)?);
            self.rows.push(SummaryRow {
                age: age.to_string(),
                stage: name.clone(),
                values,
            });
        }
        Ok(())
    }

    pub fn from_fitters(layout: &ChainLayout, fitters: &[SingleFitter]) -> Result<Self, ChainError> {
        let mut table = Self::new(layout);
        for f in fitters {
            table.push_chain(f.age(), f.chain(), layout)?;
        }
        Ok(table)
    }
}

impl Tabular for SummaryTable {
    fn header(&self) -> Vec<String> {
        let mut header = vec!["age".to_string(), "stage".to_string()];
        header.extend(self.columns.iter().cloned());
        header
    }

    fn records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| {
                let mut rec = vec![r.age.clone(), r.stage.clone()];
                rec.extend(r.values.iter().map(f64::to_string));
                rec
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MatrixBuilder;
    use sf_config::ChainConfig;

    fn covid_fitter(age: &str) -> SingleFitter {
        let builder = MatrixBuilder::new(ChainConfig::covid().layout().unwrap());
        SingleFitter::new(age, builder, vec![], vec![0.02; 11]).unwrap()
    }

    #[test]
    fn transition_table_has_one_row_per_stage_and_age() {
        let layout = ChainConfig::covid().layout().unwrap();
        let fitters = vec![covid_fitter("A"), covid_fitter("B")];
        let table = TransitionTable::from_fitters(&layout, &fitters);
        assert_eq!(table.rows.len(), 18);
        assert_eq!(table.header().len(), 11);
        assert_eq!(table.rows[9].age, "B");
        assert_eq!(table.rows[9].stage, "HEALTHY");
        assert_eq!(table.rows[0].values[1], 1.0);
    }

    #[test]
    fn pre_save_clears_only_the_healthy_row() {
        let layout = ChainConfig::covid().layout().unwrap();
        let fitters = vec![covid_fitter("A")];
        let table = TransitionTable::from_fitters(&layout, &fitters);
        let saved = table.pre_save(&layout);
        assert!(saved.rows[0].values.iter().all(|&v| v == 0.0));
        assert_eq!(saved.rows[1..], table.rows[1..]);
        // The internal chain keeps its seed entry.
        assert_eq!(fitters[0].chain().transition_matrix()[(0, 1)], 1.0);
        assert_eq!(table.rows[0].values[1], 1.0);
    }

    #[test]
    fn summary_columns_follow_reference_labels() {
        let layout = ChainConfig::covid().layout().unwrap();
        let table = SummaryTable::new(&layout);
        assert_eq!(
            table.columns,
            vec!["p given INN", "p given IM", "p given IC", "duration"]
        );
    }

    #[test]
    fn summary_values_are_probabilities_and_durations() {
        let layout = ChainConfig::covid().layout().unwrap();
        let fitters = vec![covid_fitter("A")];
        let table = SummaryTable::from_fitters(&layout, &fitters).unwrap();
        assert_eq!(table.rows.len(), 9);
        let cured = &table.rows[7];
        let dead = &table.rows[8];
        // Every infected path ends in CURED or DEAD.
        for k in 0..3 {
            assert!((cured.values[k] + dead.values[k] - 1.0).abs() < 1e-9);
        }
        assert!(cured.values[3].is_infinite());
        // INN self-loop 0.96 over half-day steps.
        assert!((table.rows[1].values[3] - 0.5 / 0.04).abs() < 1e-9);
        let rec = &table.records()[7];
        assert_eq!(rec[5], "inf");
    }
}
