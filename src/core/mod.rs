mod engine;
mod solver;
mod types;

pub use engine::{compare_with_baseline, monthly_rate, simulate, standard_payment, summarize};
pub use solver::{PayoffSolveConfig, PayoffSolveIteration, PayoffSolveResult, solve_extra_payment};
pub use types::{
    AmortizationResult, LoanParameters, LoanSummary, PrepaymentComparison, RateChangeSchedule,
    ScheduleEntry,
};
