//! Month-by-month loan amortization with extra payments and floating rates.
//!
//! The [`core`] module holds the simulator, the summary metrics and the prepayment
//! solver. [`api`] wraps them in a JSON HTTP API and the one-shot CLI commands.

pub mod api;
pub mod args;
pub mod core;
pub mod error;

pub use error::{PayoffError, Result};
