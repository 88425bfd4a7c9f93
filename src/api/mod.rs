use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::{
    AmortizationResult, LoanParameters, LoanSummary, PayoffSolveConfig, PayoffSolveResult,
    PrepaymentComparison, RateChangeSchedule, compare_with_baseline, simulate,
    solve_extra_payment, summarize,
};
use crate::error::{PayoffError, Result};

/// Longest term accepted from callers, in months.
pub const MAX_TERM_MONTHS: u32 = 1200;
const MAX_RATE_PERCENT: f64 = 100.0;

/// A scheduled rate change, written `MONTH:RATE` on the command line.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateChangeArg {
    pub month: u32,
    #[serde(alias = "rate")]
    pub rate_percent: f64,
}

impl FromStr for RateChangeArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (month, rate) = s
            .split_once(':')
            .ok_or_else(|| format!("expected MONTH:RATE, got '{s}'"))?;
        let month = month
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid month '{month}': {e}"))?;
        let rate_percent = rate
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid rate '{rate}': {e}"))?;
        Ok(Self {
            month,
            rate_percent,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoanArgs {
    #[arg(long, default_value_t = 250_000.0, help = "Outstanding loan amount")]
    principal: f64,
    #[arg(long, default_value_t = 6.5, help = "Annual interest rate in percent, e.g. 6.5")]
    rate: f64,
    #[arg(long, default_value_t = 360, help = "Remaining term in months")]
    term_months: u32,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Extra principal paid every month on top of the standard payment"
    )]
    extra_payment: f64,
    #[arg(
        long = "rate-change",
        value_name = "MONTH:RATE",
        help = "New annual rate in percent from MONTH onward; repeatable"
    )]
    rate_changes: Vec<RateChangeArg>,
    #[arg(long, help = "Include the month-by-month schedule in the output")]
    schedule: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SolveArgs {
    #[command(flatten)]
    loan: LoanArgs,
    #[arg(long, help = "Month by which the loan must be closed")]
    target_months: u32,
    #[arg(long, default_value_t = 0.0, help = "Lowest extra payment to consider")]
    search_min: f64,
    #[arg(long, default_value_t = 10_000.0, help = "Highest extra payment to consider")]
    search_max: f64,
    #[arg(long, default_value_t = 0.01, help = "Stop once the bracket is this narrow")]
    tolerance: f64,
    #[arg(long, default_value_t = 64)]
    max_iterations: u32,
}

/// Where `serve` listens.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ServeConfig {
    pub bind: IpAddr,
    pub port: u16,
}

impl ServeConfig {
    pub fn addr(self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    principal: Option<f64>,
    #[serde(alias = "annualRatePercent")]
    rate: Option<f64>,
    #[serde(alias = "term")]
    term_months: Option<u32>,
    #[serde(alias = "extraMonthlyPayment", alias = "extra")]
    extra_payment: Option<f64>,
    rate_changes: Option<Vec<RateChangeArg>>,
    rate_change_month: Option<u32>,
    rate_change_rate: Option<f64>,
    include_schedule: Option<bool>,

    target_months: Option<u32>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

#[derive(Debug)]
struct ApiRequest {
    params: LoanParameters,
    rate_changes: RateChangeSchedule,
    include_schedule: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    parameters: LoanParameters,
    rate_changes: Vec<RateChangeArg>,
    summary: LoanSummary,
    comparison: PrepaymentComparison,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<AmortizationResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveResponse {
    parameters: LoanParameters,
    rate_changes: Vec<RateChangeArg>,
    solve: PayoffSolveResult,
    solved_summary: Option<LoanSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<AmortizationResult>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_request(args: LoanArgs) -> Result<ApiRequest> {
    if !args.principal.is_finite() || args.principal < 0.0 {
        return Err(PayoffError::invalid_input("--principal", "must be >= 0"));
    }

    if !args.rate.is_finite() || !(0.0..=MAX_RATE_PERCENT).contains(&args.rate) {
        return Err(PayoffError::invalid_input(
            "--rate",
            "must be between 0 and 100",
        ));
    }

    if args.term_months > MAX_TERM_MONTHS {
        return Err(PayoffError::invalid_input(
            "--term-months",
            format!("must be <= {MAX_TERM_MONTHS}"),
        ));
    }

    if !args.extra_payment.is_finite() || args.extra_payment < 0.0 {
        return Err(PayoffError::invalid_input("--extra-payment", "must be >= 0"));
    }

    for change in &args.rate_changes {
        if change.month == 0 || change.month > args.term_months {
            return Err(PayoffError::invalid_input(
                "--rate-change",
                format!(
                    "month {} must be between 1 and --term-months ({})",
                    change.month, args.term_months
                ),
            ));
        }
        if !change.rate_percent.is_finite()
            || !(0.0..=MAX_RATE_PERCENT).contains(&change.rate_percent)
        {
            return Err(PayoffError::invalid_input(
                "--rate-change",
                format!("rate at month {} must be between 0 and 100", change.month),
            ));
        }
    }

    Ok(ApiRequest {
        params: LoanParameters {
            principal: args.principal,
            annual_rate_percent: args.rate,
            term_months: args.term_months,
            extra_monthly_payment: args.extra_payment,
        },
        rate_changes: args
            .rate_changes
            .iter()
            .map(|change| (change.month, change.rate_percent))
            .collect(),
        include_schedule: args.schedule,
    })
}

fn build_solve_config(args: &SolveArgs) -> PayoffSolveConfig {
    PayoffSolveConfig {
        target_months: args.target_months,
        search_min: args.search_min,
        search_max: args.search_max,
        tolerance: args.tolerance,
        max_iterations: args.max_iterations,
    }
}

/// Runs one simulation and returns the response as pretty JSON.
pub fn run_simulate_command(args: LoanArgs) -> Result<String> {
    let request = build_request(args)?;
    debug!(?request, "simulate request");
    let response = build_simulate_response(&request);
    Ok(serde_json::to_string_pretty(&response)?)
}

/// Solves for the extra payment and returns the response as pretty JSON.
pub fn run_solve_command(args: SolveArgs) -> Result<String> {
    let config = build_solve_config(&args);
    let request = build_request(args.loan)?;
    debug!(?request, ?config, "solve request");
    let response = build_solve_response(&request, config)?;
    Ok(serde_json::to_string_pretty(&response)?)
}

pub fn router() -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/solve",
            get(solve_get_handler).post(solve_post_handler),
        )
        .fallback(not_found_handler)
}

pub async fn run_http_server(config: ServeConfig) -> std::io::Result<()> {
    let addr = config.addr();
    let listener = TcpListener::bind(addr).await?;
    info!("Payoff HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{}/api/simulate", config.port);

    axum::serve(listener, router()).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn solve_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    solve_handler_impl(payload).await
}

async fn solve_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    solve_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected simulate request: {e}");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    let response = build_simulate_response(&request);
    info!(
        principal = request.params.principal,
        term_months = request.params.term_months,
        months_to_close = response.summary.months_to_close,
        "simulated loan"
    );
    json_response(StatusCode::OK, response)
}

async fn solve_handler_impl(payload: SimulatePayload) -> Response {
    let (request, config) = match solve_request_from_payload(payload) {
        Ok(parts) => parts,
        Err(e) => {
            warn!("Rejected solve request: {e}");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    match build_solve_response(&request, config) {
        Ok(response) => {
            info!(
                target_months = config.target_months,
                feasible = response.solve.feasible,
                solved = ?response.solve.solved_extra_payment,
                "solved extra payment"
            );
            json_response(StatusCode::OK, response)
        }
        Err(e) => {
            warn!("Rejected solve request: {e}");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest> {
    let payload = serde_json::from_str::<SimulatePayload>(json)?;
    api_request_from_payload(payload)
}

fn loan_args_from_payload(payload: &SimulatePayload) -> Result<LoanArgs> {
    let mut args = default_loan_args_for_api();

    if let Some(v) = payload.principal {
        args.principal = v;
    }
    if let Some(v) = payload.rate {
        args.rate = v;
    }
    if let Some(v) = payload.term_months {
        args.term_months = v;
    }
    if let Some(v) = payload.extra_payment {
        args.extra_payment = v;
    }
    if let Some(v) = &payload.rate_changes {
        args.rate_changes = v.clone();
    }
    match (payload.rate_change_month, payload.rate_change_rate) {
        (Some(month), Some(rate_percent)) => args.rate_changes.push(RateChangeArg {
            month,
            rate_percent,
        }),
        (None, None) => {}
        _ => {
            return Err(PayoffError::invalid_input(
                "rateChangeMonth",
                "rateChangeMonth and rateChangeRate must be given together",
            ));
        }
    }
    if let Some(v) = payload.include_schedule {
        args.schedule = v;
    }

    Ok(args)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest> {
    build_request(loan_args_from_payload(&payload)?)
}

fn solve_request_from_payload(
    payload: SimulatePayload,
) -> Result<(ApiRequest, PayoffSolveConfig)> {
    let loan = loan_args_from_payload(&payload)?;
    let target_months = payload
        .target_months
        .ok_or_else(|| PayoffError::invalid_input("targetMonths", "is required"))?;

    let mut args = SolveArgs {
        loan,
        target_months,
        ..default_solve_args_for_api()
    };
    if let Some(v) = payload.search_min {
        args.search_min = v;
    }
    if let Some(v) = payload.search_max {
        args.search_max = v;
    }
    if let Some(v) = payload.tolerance {
        args.tolerance = v;
    }
    if let Some(v) = payload.max_iterations {
        args.max_iterations = v;
    }

    let config = build_solve_config(&args);
    Ok((build_request(args.loan)?, config))
}

fn default_loan_args_for_api() -> LoanArgs {
    LoanArgs {
        principal: 250_000.0,
        rate: 6.5,
        term_months: 360,
        extra_payment: 500.0,
        rate_changes: Vec::new(),
        schedule: true,
    }
}

fn default_solve_args_for_api() -> SolveArgs {
    SolveArgs {
        loan: default_loan_args_for_api(),
        target_months: 360,
        search_min: 0.0,
        search_max: 10_000.0,
        tolerance: 0.01,
        max_iterations: 64,
    }
}

fn echo_rate_changes(rate_changes: &RateChangeSchedule) -> Vec<RateChangeArg> {
    rate_changes
        .iter()
        .map(|(month, rate_percent)| RateChangeArg {
            month,
            rate_percent,
        })
        .collect()
}

fn build_simulate_response(request: &ApiRequest) -> SimulateResponse {
    let comparison = compare_with_baseline(&request.params, &request.rate_changes);
    let schedule = request
        .include_schedule
        .then(|| simulate(&request.params, &request.rate_changes));

    SimulateResponse {
        parameters: request.params,
        rate_changes: echo_rate_changes(&request.rate_changes),
        summary: comparison.plan,
        comparison,
        schedule,
    }
}

fn build_solve_response(request: &ApiRequest, config: PayoffSolveConfig) -> Result<SolveResponse> {
    let solve = solve_extra_payment(&request.params, &request.rate_changes, config)?;

    let solved = solve.solved_extra_payment.map(|extra| {
        let params = request.params.with_extra(extra);
        let result = simulate(&params, &request.rate_changes);
        (summarize(&params, &result), result)
    });
    let (solved_summary, schedule) = match solved {
        Some((summary, result)) => (Some(summary), request.include_schedule.then_some(result)),
        None => (None, None),
    };

    Ok(SolveResponse {
        parameters: request.params,
        rate_changes: echo_rate_changes(&request.rate_changes),
        solve,
        solved_summary,
        schedule,
    })
}
