//! Route handlers.

use std::sync::LazyLock;

use axum::extract::{Query, State};
use axum::Json;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::error::Error;
use crate::live::LiveResponse;
use crate::model::{AircraftMetadata, FlightJourney};
use crate::storage::{AircraftStats, Store};

/// Page size when none is requested.
pub const DEFAULT_LIMIT: u32 = 50;

/// Largest page size a client may request.
pub const MAX_LIMIT: u32 = 100;

static ICAO24_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{6}$"));

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub(super) struct AircraftQuery {
    page: Option<String>,
    limit: Option<String>,
    search: Option<String>,
}

impl AircraftQuery {
    /// Requested page, 1 when absent or unparsable.
    fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .map_or(1, |p| u32::try_from(p.max(1)).unwrap_or(u32::MAX))
    }

    /// Requested page size clamped to `1..=MAX_LIMIT`.
    fn limit(&self) -> u32 {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .map_or(DEFAULT_LIMIT, |l| {
                u32::try_from(l.clamp(1, i64::from(MAX_LIMIT))).unwrap_or(DEFAULT_LIMIT)
            })
    }
}

/// Pagination block of [`AircraftListResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

/// Body of `GET /api/aircraft`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftListResponse {
    pub aircraft: Vec<AircraftMetadata>,
    pub pagination: Pagination,
}

/// Body of `GET /api/aircraft/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub flights: Vec<FlightJourney>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct HistoryQuery {
    icao24: Option<String>,
}

pub(super) async fn list_aircraft(
    State(state): State<AppState>,
    Query(query): Query<AircraftQuery>,
) -> ApiResult<AircraftListResponse> {
    let page = query.page();
    let limit = query.limit();
    let search = query.search.filter(|s| !s.trim().is_empty());

    let result = state
        .store
        .read(move |store| store.list_aircraft(page, limit, search.as_deref()))
        .await?;

    Ok(Json(AircraftListResponse {
        aircraft: result.aircraft,
        pagination: Pagination {
            page,
            limit,
            total: result.total,
            total_pages: result.total.div_ceil(u64::from(limit)),
        },
    }))
}

pub(super) async fn aircraft_stats(State(state): State<AppState>) -> ApiResult<AircraftStats> {
    let stats = state.store.read(Store::aircraft_stats).await?;
    Ok(Json(stats))
}

pub(super) async fn flight_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let icao24 = validate_icao24(query.icao24.as_deref())?;
    let flights = state
        .store
        .read(move |store| store.flight_history(&icao24))
        .await?;

    Ok(Json(HistoryResponse {
        total: flights.len(),
        flights,
    }))
}

pub(super) async fn live(State(state): State<AppState>) -> Json<LiveResponse> {
    Json(state.live.snapshot().await)
}

pub(super) async fn health() -> &'static str {
    "ok"
}

/// Check an `icao24` parameter and return it lowercased.
fn validate_icao24(value: Option<&str>) -> Result<String, Error> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(Error::invalid_parameter("icao24", "ICAO24 parameter is required"));
    }

    let pattern = ICAO24_PATTERN
        .as_ref()
        .map_err(|e| Error::internal(format!("icao24 pattern: {e}")))?;
    if !pattern.is_match(value) {
        return Err(Error::invalid_parameter(
            "icao24",
            format!("expected six hex digits, got '{value}'"),
        ));
    }
    Ok(value.to_ascii_lowercase())
}
