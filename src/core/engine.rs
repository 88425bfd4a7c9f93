use super::types::{
    AmortizationResult, LoanParameters, LoanSummary, PrepaymentComparison, RateChangeSchedule,
    ScheduleEntry,
};

/// Balances within this distance of zero count as retired.
const BALANCE_EPSILON: f64 = 1e-9;

/// Converts an annual rate in percent to the monthly periodic rate.
pub fn monthly_rate(annual_rate_percent: f64) -> f64 {
    (annual_rate_percent / 100.0) / 12.0
}

/// Level payment that retires `balance` over `remaining_months` at `monthly_rate`.
///
/// A zero rate degenerates to straight-line amortization. The annuity factor is
/// computed through `ln_1p`/`exp_m1` so tiny positive rates stay accurate.
pub fn standard_payment(balance: f64, monthly_rate: f64, remaining_months: u32) -> f64 {
    let periods = remaining_months.max(1) as f64;
    if monthly_rate == 0.0 {
        return balance / periods;
    }

    // 1 - (1 + r)^-n
    let denom = -(-periods * monthly_rate.ln_1p()).exp_m1();
    if !denom.is_finite() || denom <= 0.0 {
        return balance / periods;
    }
    balance * monthly_rate / denom
}

/// Runs the month-by-month amortization.
///
/// The standard payment is recomputed every month from the live balance, the
/// remaining term and the rate in effect, so extra payments already made and any rate
/// change feed straight into the following months. The loop stops at the end of the
/// term or in the first month the balance reaches zero.
pub fn simulate(params: &LoanParameters, rate_changes: &RateChangeSchedule) -> AmortizationResult {
    let term = params.term_months;
    if params.principal <= 0.0 || term == 0 {
        return AmortizationResult::default();
    }

    let mut entries = Vec::with_capacity(term as usize);
    let mut balance = params.principal;
    let mut current_rate = params.annual_rate_percent;

    for month in 1..=term {
        if let Some(rate) = rate_changes.rate_at(month) {
            current_rate = rate;
        }

        let periodic_rate = monthly_rate(current_rate);
        let interest = balance * periodic_rate;
        let payment = standard_payment(balance, periodic_rate, term - month + 1);
        let principal_paid = (payment - interest) + params.extra_monthly_payment;

        balance -= principal_paid;
        if balance.abs() < BALANCE_EPSILON {
            balance = 0.0;
        }

        entries.push(ScheduleEntry {
            month,
            annual_rate_percent: current_rate,
            standard_payment: payment,
            interest,
            principal_paid,
            balance: balance.max(0.0),
        });

        if balance <= 0.0 {
            break;
        }
    }

    AmortizationResult { entries }
}

pub fn summarize(params: &LoanParameters, result: &AmortizationResult) -> LoanSummary {
    let months_to_close = result.months_to_close();
    let final_balance = result.final_balance().unwrap_or(params.principal.max(0.0));
    let total_interest = result.total_interest();
    // The last month can overpay; only what was owed counts as principal.
    let total_principal = (params.principal.max(0.0) - final_balance).max(0.0);
    let months_saved = params.term_months.saturating_sub(months_to_close);

    LoanSummary {
        months_to_close,
        months_saved,
        years_early: months_saved as f64 / 12.0,
        total_interest,
        total_principal,
        total_paid: total_interest + total_principal,
        final_balance,
        paid_off: !result.is_empty() && final_balance <= 0.0,
    }
}

/// Compares the plan against the same loan and rate path with no extra payment.
pub fn compare_with_baseline(
    params: &LoanParameters,
    rate_changes: &RateChangeSchedule,
) -> PrepaymentComparison {
    let plan_result = simulate(params, rate_changes);
    let baseline_params = params.without_extra();
    let baseline_result = simulate(&baseline_params, rate_changes);

    let plan = summarize(params, &plan_result);
    let baseline = summarize(&baseline_params, &baseline_result);

    PrepaymentComparison {
        plan,
        baseline,
        interest_saved: baseline.total_interest - plan.total_interest,
        months_saved: baseline.months_to_close.saturating_sub(plan.months_to_close),
    }
}
