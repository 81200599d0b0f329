use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use pricewatch_market_data::SearchResult;

use crate::{error::ApiResult, main_lib::AppState};

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationResponse {
    symbol: String,
    is_valid: bool,
}

async fn validate_symbol(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ValidationResponse>> {
    let is_valid = state.quote_manager.validate_symbol(&symbol).await;
    Ok(Json(ValidationResponse { symbol, is_valid }))
}

#[derive(serde::Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_symbols(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    let results = state.quote_manager.search_symbols(&query.q).await;
    Ok(Json(results))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/symbols/search", get(search_symbols))
        .route("/symbols/{symbol}/validate", get(validate_symbol))
}
