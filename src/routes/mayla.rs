//! # Mayla Proxy
//!
//! Thin `reqwest` passthrough to the upstream clinical API. The body is treated as opaque
//! JSON in both directions: this subsystem does not interpret the clinical payload, only
//! forwards it and relays (or wraps) the upstream response.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::Value;

use crate::config::mayla_api_base;
use crate::error::AppError;
use crate::state::AppState;

pub async fn login(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Json<Value>, AppError> {
    let url = format!("{}/api/auth/patient/login", mayla_api_base());
    forward(&state, &url, body, None).await
}

pub async fn vital_signs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::MissingBearerToken)?;
    let url = format!("{}/api/vital-signs", mayla_api_base());
    forward(&state, &url, body, Some(token)).await
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    if value.len() < 7 || !value.as_bytes()[..7].eq_ignore_ascii_case(b"bearer ") {
        return None;
    }
    let token = value[7..].trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

async fn forward(
    state: &AppState,
    url: &str,
    body: Value,
    bearer: Option<String>,
) -> Result<Json<Value>, AppError> {
    let mut req = state.http_client.post(url).json(&body);
    if let Some(token) = bearer {
        req = req.bearer_auth(token);
    }

    let response = req.send().await.map_err(|err| AppError::UpstreamFailure {
        upstream: "mayla",
        status: None,
        body: err.to_string(),
    })?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(AppError::UpstreamFailure {
            upstream: "mayla",
            status: Some(status.as_u16()),
            body: text,
        });
    }

    let value: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok(Json(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extracts_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(bearer_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn bearer_token_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("bearer abc123"),
        );
        assert_eq!(bearer_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn missing_bearer_prefix_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic abc123"),
        );
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn empty_token_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
