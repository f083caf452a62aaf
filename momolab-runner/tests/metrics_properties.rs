//! Property tests for the metrics aggregator.
//!
//! Uses proptest to verify:
//! 1. Max drawdown stays within [-1, 0] for positive equity curves
//! 2. Longest drawdown never exceeds the curve length
//! 3. CAGR and total return agree in sign
//! 4. Quintiles cover 0..=4 and are monotone in rank

use momolab_runner::metrics::{cagr, longest_drawdown, max_drawdown, quintile, total_return};
use proptest::prelude::*;

fn arb_curve() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..1_000_000.0_f64, 2..200)
}

proptest! {
    #[test]
    fn max_drawdown_is_bounded(values in arb_curve()) {
        let dd = max_drawdown(&values).unwrap();
        prop_assert!(dd <= 0.0);
        prop_assert!(dd > -1.0);
    }

    #[test]
    fn longest_drawdown_fits_curve(values in arb_curve()) {
        let longest = longest_drawdown(&values).unwrap();
        prop_assert!(longest < values.len());
    }

    #[test]
    fn cagr_sign_follows_total_return(values in arb_curve(), span in 365_i64..5000) {
        let total = total_return(&values).unwrap();
        prop_assume!(total.abs() > 1e-9);
        let annual = cagr(&values, Some(span)).unwrap();
        prop_assert_eq!(total > 0.0, annual > 0.0);
    }

    #[test]
    fn quintile_is_monotone(top_n in 1_usize..100, rank in 1_u32..100) {
        let q = quintile(rank, top_n);
        prop_assert!(q <= 4);
        prop_assert!(quintile(rank + 1, top_n) >= q);
    }
}
