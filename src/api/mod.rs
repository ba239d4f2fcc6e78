use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;

use crate::core::{
    Assumptions, ModelError, MonthRecord, MonthlyUnitEconomics, YearSummary, aggregate,
    break_even_month, monthly_unit_economics, simulate,
};

const DEFAULT_HORIZON_MONTHS: u32 = 36;

#[derive(Parser, Debug)]
#[command(
    name = "growth-model",
    about = "Monthly growth, revenue and cash projection for a subscription business"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the projection API over HTTP.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run one projection and print it as JSON.
    Project(ProjectArgs),
    /// Print the default assumptions as JSON.
    Defaults,
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[arg(long, conflicts_with = "years", help = "Horizon in months (default 36)")]
    months: Option<u32>,
    #[arg(long, help = "Horizon in years; shorthand for --months N*12")]
    years: Option<u32>,
    #[arg(long, help = "JSON file mapping assumption names to numbers")]
    assumptions: Option<PathBuf>,
    #[arg(
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        help = "Override one assumption; may be repeated"
    )]
    overrides: Vec<(String, f64)>,
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    horizon_months: Option<u32>,
    years: Option<u32>,
    assumptions: BTreeMap<String, f64>,
}

#[derive(Debug)]
struct ProjectionRequest {
    assumptions: Assumptions,
    horizon_months: u32,
    ignored_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    horizon_months: u32,
    assumptions: BTreeMap<String, f64>,
    ignored_keys: Vec<String>,
    break_even_month: Option<u32>,
    months: Vec<MonthRecord>,
    unit_economics: Vec<MonthlyUnitEconomics>,
    years: Vec<YearSummary>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run_cli(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Serve { port } => run_http_server(port)
            .await
            .map_err(|e| format!("Server error: {e}")),
        Command::Project(args) => {
            let pretty = args.pretty;
            let request = request_from_args(args)?;
            let response = run_projection(request).map_err(|e| e.to_string())?;
            print_json(&response, pretty)
        }
        Command::Defaults => print_json(&Assumptions::default().to_map(), true),
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| format!("Failed to serialize output: {e}"))?;
    println!("{json}");
    Ok(())
}

fn parse_key_value(raw: &str) -> Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in `{raw}`"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid number for {key}: `{}`", value.trim()))?;
    Ok((key.to_string(), value))
}

fn load_assumption_file(path: &Path) -> Result<BTreeMap<String, f64>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&text)
        .map_err(|e| format!("Invalid assumptions JSON in {}: {e}", path.display()))
}

fn request_from_args(args: ProjectArgs) -> Result<ProjectionRequest, String> {
    let mut values = match &args.assumptions {
        Some(path) => load_assumption_file(path)?,
        None => BTreeMap::new(),
    };
    for (key, value) in args.overrides {
        values.insert(key, value);
    }
    build_request(ProjectPayload {
        horizon_months: args.months,
        years: args.years,
        assumptions: values,
    })
}

fn resolve_horizon(horizon_months: Option<u32>, years: Option<u32>) -> Result<u32, String> {
    match (horizon_months, years) {
        (Some(_), Some(_)) => Err("give either horizonMonths or years, not both".to_string()),
        (Some(months), None) => Ok(months),
        (None, Some(years)) => years
            .checked_mul(12)
            .ok_or_else(|| format!("years {years} is too large")),
        (None, None) => Ok(DEFAULT_HORIZON_MONTHS),
    }
}

fn build_request(payload: ProjectPayload) -> Result<ProjectionRequest, String> {
    let horizon_months = resolve_horizon(payload.horizon_months, payload.years)?;
    let (assumptions, ignored_keys) = Assumptions::from_map(&payload.assumptions);

    for key in &ignored_keys {
        if Assumptions::is_deprecated_key(key) {
            log::warn!("assumption {key} is derived by the model; supplied value ignored");
        } else {
            log::warn!("unknown assumption {key} ignored");
        }
    }

    Ok(ProjectionRequest {
        assumptions,
        horizon_months,
        ignored_keys,
    })
}

fn run_projection(request: ProjectionRequest) -> Result<ProjectionResponse, ModelError> {
    let months = simulate(&request.assumptions, request.horizon_months)?;
    let years = aggregate(&months)?;
    let break_even = break_even_month(&months);
    log::info!(
        "projected {} months ({} years), break-even month {:?}",
        months.len(),
        years.len(),
        break_even
    );

    Ok(ProjectionResponse {
        horizon_months: request.horizon_months,
        assumptions: request.assumptions.to_map(),
        ignored_keys: request.ignored_keys,
        break_even_month: break_even,
        unit_economics: monthly_unit_economics(&months),
        months,
        years,
    })
}

pub fn build_router() -> Router {
    Router::new()
        .route("/api/defaults", get(defaults_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    log::info!("projection API listening on http://{addr}");
    log::info!("local access: http://127.0.0.1:{port}/api/defaults");

    axum::serve(listener, build_router()).await
}

async fn defaults_handler() -> Response {
    json_response(StatusCode::OK, Assumptions::default().to_map())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(query): Query<BTreeMap<String, String>>) -> Response {
    match payload_from_query(query) {
        Ok(payload) => project_handler_impl(payload),
        Err(msg) => reject(&msg),
    }
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

fn project_handler_impl(payload: ProjectPayload) -> Response {
    let request = match build_request(payload) {
        Ok(request) => request,
        Err(msg) => return reject(&msg),
    };
    match run_projection(request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => reject(&err.to_string()),
    }
}

fn reject(msg: &str) -> Response {
    log::warn!("rejected projection request: {msg}");
    error_response(StatusCode::BAD_REQUEST, msg)
}

/// Query strings carry the horizon and any assumption as flat parameters,
/// e.g. `?horizonMonths=24&ARPU=30`.
fn payload_from_query(query: BTreeMap<String, String>) -> Result<ProjectPayload, String> {
    let mut payload = ProjectPayload::default();
    for (key, raw) in query {
        match key.as_str() {
            "horizonMonths" => {
                payload.horizon_months = Some(
                    raw.parse()
                        .map_err(|_| format!("invalid horizonMonths: `{raw}`"))?,
                );
            }
            "years" => {
                payload.years = Some(raw.parse().map_err(|_| format!("invalid years: `{raw}`"))?);
            }
            _ => {
                let value = raw
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number for {key}: `{raw}`"))?;
                payload.assumptions.insert(key, value);
            }
        }
    }
    Ok(payload)
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
