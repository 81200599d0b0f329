use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use pricewatch_market_data::{
    MarketDataProvider, ProviderHandle, Quote, QuoteError, QuoteManager, RateLimitPolicy,
    SearchResult,
};
use pricewatch_server::{api::app_router, config::Config, AppState};
use serde_json::Value;
use tower::ServiceExt;

struct StubProvider {
    name: &'static str,
    priority: i32,
    prices: HashMap<&'static str, f64>,
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    fn id(&self) -> &'static str {
        self.name
    }

    fn default_priority(&self) -> i32 {
        self.priority
    }

    fn rate_limit(&self) -> RateLimitPolicy {
        RateLimitPolicy::unlimited()
    }

    fn supports_search(&self) -> bool {
        true
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        Quote::new(symbol, self.prices.get(symbol).copied(), self.name)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, QuoteError> {
        Ok(self
            .prices
            .keys()
            .filter(|s| s.starts_with(&query.to_uppercase()))
            .map(|s| SearchResult::new(s.to_string(), format!("{} Inc.", s)))
            .collect())
    }
}

fn build_test_router() -> axum::Router {
    let stub = |name, priority, prices: &[(&'static str, f64)]| {
        Arc::new(ProviderHandle::new(Arc::new(StubProvider {
            name,
            priority,
            prices: prices.iter().copied().collect(),
        })))
    };
    let manager = QuoteManager::new(vec![
        stub("YAHOO", 1, &[("AAPL", 189.5)]),
        stub("FMP", 2, &[("AAPL", 190.0), ("MSFT", 400.0)]),
    ])
    .unwrap();

    let state = Arc::new(AppState::new(Arc::new(manager), 5));
    app_router(state, &Config::default())
}

async fn call(
    app: &axum::Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn healthz_is_ok() {
    let app = build_test_router();
    let response = app
        .oneshot(Request::builder().uri("/api/v1/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn quote_lookup_and_not_found() {
    let app = build_test_router();

    let (status, quote) = call(&app, Method::GET, "/api/v1/quotes/aapl", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["symbol"], "AAPL");
    assert_eq!(quote["price"], 189.5);
    assert_eq!(quote["source"], "YAHOO");

    let (status, body) = call(&app, Method::GET, "/api/v1/quotes/ZZZZZ999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn preferred_provider_query() {
    let app = build_test_router();

    let (status, quote) =
        call(&app, Method::GET, "/api/v1/quotes/AAPL?provider=FMP&fallback=false", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["source"], "FMP");
}

#[tokio::test]
async fn batch_quotes_skip_unknown_symbols() {
    let app = build_test_router();

    let (status, quotes) =
        call(&app, Method::GET, "/api/v1/quotes?symbols=AAPL,MSFT,ZZZZZ999", None).await;
    assert_eq!(status, StatusCode::OK);
    let quotes = quotes.as_object().unwrap();
    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes["MSFT"]["source"], "FMP");

    let (status, _) = call(&app, Method::GET, "/api/v1/quotes?symbols=,", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validate_and_search() {
    let app = build_test_router();

    let (_, body) = call(&app, Method::GET, "/api/v1/symbols/MSFT/validate", None).await;
    assert_eq!(body["isValid"], true);

    let (_, body) = call(&app, Method::GET, "/api/v1/symbols/NOPE/validate", None).await;
    assert_eq!(body["isValid"], false);

    let (status, results) = call(&app, Method::GET, "/api/v1/symbols/search?q=aa", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results[0]["symbol"], "AAPL");
}

#[tokio::test]
async fn provider_admin_routes() {
    let app = build_test_router();

    let (status, providers) = call(&app, Method::GET, "/api/v1/providers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(providers["YAHOO"]["priority"], 1);
    assert_eq!(providers["FMP"]["isHealthy"], true);

    let (status, providers) = call(
        &app,
        Method::PUT,
        "/api/v1/providers/default",
        Some(serde_json::json!({ "name": "FMP" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(providers["FMP"]["priority"], 1);
    assert_eq!(providers["YAHOO"]["priority"], 11);

    let (_, quote) = call(&app, Method::GET, "/api/v1/quotes/AAPL", None).await;
    assert_eq!(quote["source"], "FMP");

    let (status, _) = call(&app, Method::POST, "/api/v1/providers/yahoo/reset", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&app, Method::POST, "/api/v1/providers/NOPE/reset", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Unknown provider: NOPE");
}
