use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use super::app_state::AppState;

/// GET /groups: names of all live channels. Always 200, empty array if none.
pub async fn list_groups(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.engine.list_channels())
}
