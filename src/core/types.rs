use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanParameters {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub term_months: u32,
    pub extra_monthly_payment: f64,
}

impl LoanParameters {
    pub fn without_extra(self) -> Self {
        Self {
            extra_monthly_payment: 0.0,
            ..self
        }
    }

    pub fn with_extra(self, extra_monthly_payment: f64) -> Self {
        Self {
            extra_monthly_payment,
            ..self
        }
    }
}

/// Scheduled annual rate changes keyed by 1-based month.
///
/// Iteration is in month order. Months outside `1..=term_months` are kept but never
/// reached by the simulator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateChangeSchedule {
    changes: BTreeMap<u32, f64>,
}

impl RateChangeSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new annual rate from `month` onward. A second insert for the same
    /// month replaces the first.
    pub fn insert(&mut self, month: u32, annual_rate_percent: f64) -> Option<f64> {
        self.changes.insert(month, annual_rate_percent)
    }

    pub fn rate_at(&self, month: u32) -> Option<f64> {
        self.changes.get(&month).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.changes.iter().map(|(month, rate)| (*month, *rate))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl FromIterator<(u32, f64)> for RateChangeSchedule {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        let mut schedule = Self::new();
        for (month, rate) in iter {
            schedule.insert(month, rate);
        }
        schedule
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub month: u32,
    pub annual_rate_percent: f64,
    pub standard_payment: f64,
    pub interest: f64,
    /// Amortized share of the standard payment plus the extra payment.
    pub principal_paid: f64,
    /// Remaining balance after this month, never below zero.
    pub balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AmortizationResult {
    pub entries: Vec<ScheduleEntry>,
}

impl AmortizationResult {
    /// Months needed to close the loan, or the full term if it never closed.
    pub fn months_to_close(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn final_balance(&self) -> Option<f64> {
        self.entries.last().map(|entry| entry.balance)
    }

    pub fn total_interest(&self) -> f64 {
        self.entries.iter().map(|entry| entry.interest).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    pub months_to_close: u32,
    pub months_saved: u32,
    pub years_early: f64,
    pub total_interest: f64,
    pub total_principal: f64,
    pub total_paid: f64,
    pub final_balance: f64,
    pub paid_off: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepaymentComparison {
    pub plan: LoanSummary,
    pub baseline: LoanSummary,
    pub interest_saved: f64,
    pub months_saved: u32,
}
