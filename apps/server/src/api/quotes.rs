use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use pricewatch_market_data::{BatchQuoteRequest, Quote, QuoteRequest};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

fn default_fallback() -> bool {
    true
}

#[derive(serde::Deserialize)]
struct QuoteQuery {
    provider: Option<String>,
    #[serde(default = "default_fallback")]
    fallback: bool,
}

async fn get_quote(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
    Query(q): Query<QuoteQuery>,
) -> ApiResult<Json<Quote>> {
    let request = QuoteRequest {
        symbol,
        preferred_provider: q.provider,
        allow_fallback: q.fallback,
    };
    state
        .quote_manager
        .fetch_quote(request)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[derive(serde::Deserialize)]
struct BatchQuery {
    symbols: String,
    provider: Option<String>,
    #[serde(default = "default_fallback")]
    fallback: bool,
    concurrency: Option<usize>,
}

async fn get_quotes(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BatchQuery>,
) -> ApiResult<Json<HashMap<String, Quote>>> {
    let symbols: Vec<&str> = q
        .symbols
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if symbols.is_empty() {
        return Err(ApiError::BadRequest("No symbols given".to_string()));
    }

    let mut request = BatchQuoteRequest::new(symbols)
        .with_max_concurrency(q.concurrency.unwrap_or(state.max_concurrency));
    request.preferred_provider = q.provider;
    request.allow_fallback = q.fallback;

    let quotes = state.quote_manager.fetch_multiple_quotes(request).await;
    Ok(Json(quotes))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quotes", get(get_quotes))
        .route("/quotes/{symbol}", get(get_quote))
}
