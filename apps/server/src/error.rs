use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pricewatch_market_data::QuoteError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Quote(#[from] QuoteError),
    #[error("Not Found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Quote(e) => match e {
                QuoteError::NotFound(_) | QuoteError::UnknownProvider(_) => StatusCode::NOT_FOUND,
                QuoteError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                QuoteError::NoProviderAvailable => StatusCode::SERVICE_UNAVAILABLE,
                QuoteError::NotSupported { .. } => StatusCode::NOT_IMPLEMENTED,
                QuoteError::Timeout { .. } | QuoteError::UpstreamError { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            },
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
