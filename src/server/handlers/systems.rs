use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::instrument;

use crate::error::StarportError;
use crate::server::AppState;
use crate::types::{StationView, SystemView};

use super::ApiError;

#[derive(Debug, Deserialize)]
pub struct NameSearch {
    #[serde(rename = "str")]
    pub part: Option<String>,
}

/// Display names of systems containing `str`, case-insensitively.
#[instrument(skip(state))]
pub async fn search_systems(
    State(state): State<AppState>,
    Query(params): Query<NameSearch>,
) -> Result<Json<Vec<String>>, ApiError> {
    let min = state.config.server.min_search_length;
    let part = params
        .part
        .filter(|p| p.chars().count() >= min)
        .ok_or_else(|| {
            StarportError::Validation(format!(
                "query param str is required to be at least {min} characters long"
            ))
        })?;
    Ok(Json(state.index.find_systems_with_name(&part)))
}

pub async fn get_system(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SystemView>, ApiError> {
    let system = state
        .index
        .system(&name)
        .ok_or(StarportError::SystemNotFound { name })?;
    Ok(Json(SystemView::new(&system, &state.catalog)))
}

pub async fn get_station(
    State(state): State<AppState>,
    Path((system, station)): Path<(String, String)>,
) -> Result<Json<StationView>, ApiError> {
    let (_, station) = state.index.station(&system, &station)?;
    Ok(Json(StationView::new(&station, &state.catalog)))
}
