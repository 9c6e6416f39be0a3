use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::catalog::{ModuleCategory, Ship};
use crate::error::Result;
use crate::index::BuildQuery;
use crate::server::AppState;
use crate::types::CandidateView;

use super::ApiError;

/// Query string of a find-near request. Module lists are comma-separated
/// canonical ids.
#[derive(Debug, Default, Deserialize)]
pub struct FindParams {
    pub ship: Option<String>,
    pub standard: Option<String>,
    pub internal: Option<String>,
    pub hardpoints: Option<String>,
    pub utilities: Option<String>,
}

impl FindParams {
    fn ids(&self, category: ModuleCategory) -> Vec<&str> {
        let raw = match category {
            ModuleCategory::Standard => &self.standard,
            ModuleCategory::Internal => &self.internal,
            ModuleCategory::Hardpoint => &self.hardpoints,
            ModuleCategory::Utility => &self.utilities,
        };
        raw.as_deref()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Compile into a query. Unknown ships and module ids are caller errors.
    pub fn to_query(&self, state: &AppState) -> Result<BuildQuery> {
        let ship = self
            .ship
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(Ship::parse)
            .transpose()?;
        let mut query = BuildQuery::new(ship);
        for category in ModuleCategory::ALL {
            let matcher = state.catalog.matcher(category, self.ids(category).as_slice())?;
            query = query.with_matcher(category, matcher);
        }
        Ok(query)
    }
}

/// Nearest stations around `name` able to supply the requested loadout.
#[instrument(skip(state, params))]
pub async fn find_near(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<FindParams>,
) -> std::result::Result<Json<Vec<CandidateView>>, ApiError> {
    let query = params.to_query(&state)?;
    let candidates = state.index.find_near(&name, &query)?;
    info!(origin = %name, results = candidates.len(), "find-near served");
    Ok(Json(
        candidates
            .iter()
            .map(|c| CandidateView::new(c, &state.catalog))
            .collect(),
    ))
}
