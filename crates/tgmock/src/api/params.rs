//! Method parameter decoding.
//!
//! Bot libraries send parameters as JSON, as url-encoded forms, or in the
//! query string. All three end up in the same typed struct.

use axum::{
    Form, Json,
    extract::{FromRequest, Query, Request},
    http::{Method, header::CONTENT_TYPE},
};
use serde::de::DeserializeOwned;

use super::error::{ApiError, ApiResult};

fn content_type(request: &Request) -> Option<String> {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase())
}

/// Decode `T` from the request body or query string.
pub async fn parse_params<T>(request: Request) -> ApiResult<T>
where
    T: DeserializeOwned + Send,
{
    match content_type(&request) {
        Some(ct) if ct.starts_with("application/json") => {
            let Json(params) = Json::<T>::from_request(request, &())
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            Ok(params)
        }
        Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
            let Form(params) = Form::<T>::from_request(request, &())
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            Ok(params)
        }
        Some(ct) if request.method() != Method::GET => Err(ApiError::bad_request(format!(
            "unsupported content type: {ct}"
        ))),
        _ => {
            let Query(params) = Query::<T>::try_from_uri(request.uri())
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            Ok(params)
        }
    }
}
