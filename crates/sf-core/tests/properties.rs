//! Property-based tests for matrix building and chain analytics.

use std::collections::BTreeSet;

use proptest::prelude::*;
use sf_config::{ChainConfig, ChainLayout};
use sf_core::constraints::{Bounds, FeasibleRegion, LinearConstraints};
use sf_core::target::TargetInfo;
use sf_core::{Chain, MatrixBuilder, SingleFitter, Target};

fn covid_layout() -> ChainLayout {
    ChainConfig::covid().layout().unwrap()
}

/// Parameter vectors whose per-stage sums stay below one.
fn feasible_parameters() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..0.3f64, 11)
}

/// Strictly positive rates, so every transient stage can leave.
fn positive_parameters() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.001..0.3f64, 11)
}

/// Rates pinned to the lower bound, vanishingly small, or ordinary.
fn boundary_rate() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 1e-15..1e-9f64, 0.001..0.3f64]
}

fn boundary_parameters() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(boundary_rate(), 11)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Every built row is stochastic.
    #[test]
    fn built_rows_sum_to_one(x in feasible_parameters()) {
        let builder = MatrixBuilder::new(covid_layout());
        let m = builder.build(&x).unwrap();
        for sum in sf_math::row_sums(&m) {
            prop_assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    /// Free entries read back unchanged.
    #[test]
    fn free_entries_round_trip(x in feasible_parameters()) {
        let builder = MatrixBuilder::new(covid_layout());
        let m = builder.build(&x).unwrap();
        prop_assert_eq!(builder.free_entries(&m), x);
    }

    /// From any stage, the outcome probabilities are a distribution.
    #[test]
    fn outcomes_partition_unity(x in positive_parameters(), start in 0usize..9) {
        let layout = covid_layout();
        let m = MatrixBuilder::new(layout.clone()).build(&x).unwrap();
        let chain = Chain::new(m, layout.unit_of_time()).unwrap();
        let cured = layout.stage_index("CURED").unwrap();
        let dead = layout.stage_index("DEAD").unwrap();

        let pc = chain.hitting_probability_to(start, cured).unwrap();
        let pd = chain.hitting_probability_to(start, dead).unwrap();
        prop_assert!((-1e-9..=1.0 + 1e-9).contains(&pc));
        prop_assert!((-1e-9..=1.0 + 1e-9).contains(&pd));
        prop_assert!((pc + pd - 1.0).abs() < 1e-8);

        let both = chain
            .hitting_probability(start, &BTreeSet::from([cured, dead]))
            .unwrap();
        prop_assert!((both - 1.0).abs() < 1e-8);
    }

    /// A stage's own duration matches the diagonal of the fundamental matrix.
    #[test]
    fn duration_matches_mean_time(x in positive_parameters()) {
        let layout = covid_layout();
        let m = MatrixBuilder::new(layout.clone()).build(&x).unwrap();
        let chain = Chain::new(m, layout.unit_of_time()).unwrap();
        let mean = chain.mean_time().unwrap();
        for s in chain.transient_states() {
            let d = chain.duration_stage(s).unwrap();
            prop_assert!(d > 0.0);
            prop_assert!((d - mean[&(s, s)]).abs() < 1e-6 * d.max(1.0));
        }
    }

    /// Projection lands inside the box and the per-stage constraints.
    #[test]
    fn projection_is_feasible(x in prop::collection::vec(-0.5..1.5f64, 11)) {
        let layout = covid_layout();
        let region = FeasibleRegion::new(
            Bounds::unit(layout.num_parameters()),
            LinearConstraints::from_layout(&layout),
        );
        let p = region.project(&x);
        prop_assert!(region.contains(&p, 1e-9));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Rates at or near zero never make a solvable chain fail, and hitting
    /// probabilities stay probabilities.
    #[test]
    fn solves_survive_boundary_rates(x in boundary_parameters(), start in 0usize..9) {
        let layout = covid_layout();
        let m = MatrixBuilder::new(layout.clone()).build(&x).unwrap();
        let chain = Chain::new(m, layout.unit_of_time()).unwrap();
        // A zero-exit stage is written as exactly absorbing, so nothing is trapped.
        prop_assert_eq!(chain.trapped_state(&chain.absorbing_states()), None);

        let cured = layout.stage_index("CURED").unwrap();
        let dead = layout.stage_index("DEAD").unwrap();
        let pc = chain.hitting_probability_to(start, cured).unwrap();
        let pd = chain.hitting_probability_to(start, dead).unwrap();
        prop_assert!((-1e-12..=1.0 + 1e-12).contains(&pc), "p(cured) = {}", pc);
        prop_assert!((-1e-12..=1.0 + 1e-12).contains(&pd), "p(dead) = {}", pd);
        prop_assert!(pc + pd <= 1.0 + 1e-9);

        for s in 0..layout.num_stages() {
            let d = chain.duration_stage(s).unwrap();
            prop_assert!(!d.is_nan());
            prop_assert!(d >= 0.0);
            prop_assert_eq!(d.is_infinite(), chain.is_absorbing(s));
        }
        prop_assert!(chain.mean_time().is_ok());
    }

    /// Zero-weight targets cost nothing wherever the rates sit.
    #[test]
    fn zero_weight_loss_is_zero_on_boundary(x in boundary_parameters()) {
        let layout = covid_layout();
        let targets: Vec<Target> = (0..layout.num_stages())
            .map(|s| Target::duration(BTreeSet::from([s]), 5.0, 0.0, TargetInfo::default()))
            .collect();
        let mut fitter = SingleFitter::new(
            "Age_all",
            MatrixBuilder::new(layout),
            targets,
            x.clone(),
        )
        .unwrap();
        prop_assert_eq!(fitter.evaluate(&x).unwrap(), 0.0);
    }
}
