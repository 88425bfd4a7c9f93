use tracing::trace;

use super::{LoanParameters, RateChangeSchedule, simulate};
use crate::error::{PayoffError, Result};

/// Upper bound on bisection steps accepted from callers.
pub const MAX_SOLVER_ITERATIONS: u32 = 200;

#[derive(Debug, Clone, Copy)]
pub struct PayoffSolveConfig {
    pub target_months: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoffSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_extra: f64,
    pub months_to_close: u32,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoffSolveResult {
    pub target_months: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_extra_payment: Option<f64>,
    pub achieved_months_to_close: Option<u32>,
    pub iterations: Vec<PayoffSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Finds the smallest extra monthly payment that closes the loan within
/// `config.target_months`.
///
/// Months to close never grow as the extra payment grows, so the feasible payments
/// form an interval `[x, search_max]` and bisection converges on `x`. The
/// `extra_monthly_payment` in `params` is ignored.
pub fn solve_extra_payment(
    params: &LoanParameters,
    rate_changes: &RateChangeSchedule,
    config: PayoffSolveConfig,
) -> Result<PayoffSolveResult> {
    validate_config(params, config)?;

    let months_for =
        |extra: f64| simulate(&params.with_extra(extra), rate_changes).months_to_close();
    let meets_target = |months: u32| months <= config.target_months;

    let mut iterations = Vec::new();
    let low_months = months_for(config.search_min);
    let high_months = months_for(config.search_max);

    let mut solved_extra_payment = None;
    let mut converged = false;
    let feasible;
    let message;

    if meets_target(low_months) {
        solved_extra_payment = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Already closes within the target at the lower payment bound.".to_string();
    } else if !meets_target(high_months) {
        feasible = false;
        message = "No extra payment within the search bounds closes the loan in time.".to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            if mid <= lo || mid >= hi {
                // Bracket is down to adjacent floats.
                converged = true;
                break;
            }
            let months = months_for(mid);
            trace!(iteration = it, lo, hi, mid, months, "payoff solver step");
            iterations.push(PayoffSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_extra: mid,
                months_to_close: months,
            });

            if meets_target(months) {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_extra_payment = Some(hi);
        feasible = true;
        message = if converged {
            "Solved minimum extra monthly payment.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    Ok(PayoffSolveResult {
        target_months: config.target_months,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_extra_payment,
        achieved_months_to_close: solved_extra_payment.map(months_for),
        iterations,
        converged,
        feasible,
        message,
    })
}

fn validate_config(params: &LoanParameters, config: PayoffSolveConfig) -> Result<()> {
    let invalid = |msg: &str| Err(PayoffError::InvalidSolveConfig(msg.to_string()));

    if config.target_months == 0 || config.target_months > params.term_months {
        return invalid("target_months must be between 1 and term_months");
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return invalid("search bounds must be finite");
    }
    if config.search_min < 0.0 {
        return invalid("search_min must be >= 0");
    }
    if config.search_max <= config.search_min {
        return invalid("search_max must be greater than search_min");
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return invalid("tolerance must be > 0");
    }
    if config.max_iterations == 0 || config.max_iterations > MAX_SOLVER_ITERATIONS {
        return Err(PayoffError::InvalidSolveConfig(format!(
            "max_iterations must be between 1 and {MAX_SOLVER_ITERATIONS}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn straight_line_loan() -> LoanParameters {
        LoanParameters {
            principal: 12_000.0,
            annual_rate_percent: 0.0,
            term_months: 12,
            extra_monthly_payment: 0.0,
        }
    }

    fn config(target_months: u32) -> PayoffSolveConfig {
        PayoffSolveConfig {
            target_months,
            search_min: 0.0,
            search_max: 20_000.0,
            tolerance: 0.01,
            max_iterations: 64,
        }
    }

    #[test]
    fn solver_finds_payment_for_zero_rate_loan() {
        let result =
            solve_extra_payment(&straight_line_loan(), &RateChangeSchedule::new(), config(6))
                .expect("must solve");

        assert!(result.feasible);
        assert!(result.converged);
        assert!(!result.iterations.is_empty());
        let solved = result.solved_extra_payment.expect("value expected");
        assert_close(solved, 1_357.70, 0.05);
        assert!(result.achieved_months_to_close.expect("months expected") <= 6);
    }

    #[test]
    fn solved_payment_is_close_to_the_boundary() {
        let params = LoanParameters {
            principal: 250_000.0,
            annual_rate_percent: 6.5,
            term_months: 360,
            extra_monthly_payment: 0.0,
        };
        let rate_changes = RateChangeSchedule::new();
        let result = solve_extra_payment(&params, &rate_changes, config(240)).expect("must solve");
        let solved = result.solved_extra_payment.expect("value expected");

        let at = simulate(&params.with_extra(solved), &rate_changes);
        let below = simulate(&params.with_extra(solved - 0.05), &rate_changes);
        assert!(at.months_to_close() <= 240);
        assert!(below.months_to_close() > 240);
    }

    #[test]
    fn solver_reports_already_met_at_lower_bound() {
        let result =
            solve_extra_payment(&straight_line_loan(), &RateChangeSchedule::new(), config(12))
                .expect("must solve");
        assert!(result.feasible);
        assert!(result.converged);
        assert_eq!(result.solved_extra_payment, Some(0.0));
        assert!(result.iterations.is_empty());
    }

    #[test]
    fn solver_reports_infeasible_when_bounds_too_low() {
        let mut cfg = config(2);
        cfg.search_max = 100.0;
        let result = solve_extra_payment(&straight_line_loan(), &RateChangeSchedule::new(), cfg)
            .expect("must return result");
        assert!(!result.feasible);
        assert!(result.solved_extra_payment.is_none());
        assert!(result.achieved_months_to_close.is_none());
    }

    #[test]
    fn solver_rejects_invalid_configs() {
        let params = straight_line_loan();
        let changes = RateChangeSchedule::new();

        let mut cfg = config(13);
        assert!(matches!(
            solve_extra_payment(&params, &changes, cfg),
            Err(PayoffError::InvalidSolveConfig(_))
        ));

        cfg = config(6);
        cfg.search_max = cfg.search_min;
        let err = solve_extra_payment(&params, &changes, cfg).expect_err("must reject bounds");
        assert!(err.to_string().contains("search_max"));

        cfg = config(6);
        cfg.tolerance = 0.0;
        let err = solve_extra_payment(&params, &changes, cfg).expect_err("must reject tolerance");
        assert!(err.to_string().contains("tolerance"));

        cfg = config(6);
        cfg.max_iterations = 0;
        assert!(solve_extra_payment(&params, &changes, cfg).is_err());

        cfg = config(6);
        cfg.max_iterations = u32::MAX;
        let err = solve_extra_payment(&params, &changes, cfg).expect_err("must reject huge cap");
        assert!(err.to_string().contains("max_iterations"));

        cfg.max_iterations = MAX_SOLVER_ITERATIONS;
        assert!(solve_extra_payment(&params, &changes, cfg).is_ok());
    }

    #[test]
    fn solver_stops_once_bracket_cannot_shrink() {
        let params = LoanParameters {
            principal: 250_000.0,
            annual_rate_percent: 6.5,
            term_months: 360,
            extra_monthly_payment: 0.0,
        };
        let mut cfg = config(240);
        cfg.tolerance = 1e-300;
        cfg.max_iterations = MAX_SOLVER_ITERATIONS;

        let result =
            solve_extra_payment(&params, &RateChangeSchedule::new(), cfg).expect("must solve");

        assert!(result.converged);
        assert!(result.iterations.len() < MAX_SOLVER_ITERATIONS as usize);
        assert!(result.achieved_months_to_close.expect("months expected") <= 240);
    }
}
