use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use pricewatch_market_data::ProviderStatus;

use crate::{error::ApiResult, main_lib::AppState};

async fn get_provider_status(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<BTreeMap<String, ProviderStatus>>> {
    Ok(Json(state.quote_manager.get_provider_status()))
}

#[derive(serde::Deserialize)]
struct DefaultProviderBody {
    name: String,
}

async fn set_default_provider(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DefaultProviderBody>,
) -> ApiResult<Json<BTreeMap<String, ProviderStatus>>> {
    state.quote_manager.set_default_provider(&body.name)?;
    Ok(Json(state.quote_manager.get_provider_status()))
}

async fn reset_error_tracking(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    state.quote_manager.reset_error_tracking(&name)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers", get(get_provider_status))
        .route("/providers/default", put(set_default_provider))
        .route("/providers/{name}/reset", post(reset_error_tracking))
}
