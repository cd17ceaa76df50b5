// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::state::GatewayState;

/// Constant-time comparison to avoid a timing side-channel on the token.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

fn validate_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), GatewayError> {
    let Some(expected) = expected else { return Ok(()) };

    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::Unauthorized)?;
    let token = header.strip_prefix("Bearer ").ok_or(GatewayError::Unauthorized)?;

    if constant_time_eq(token, expected) {
        Ok(())
    } else {
        Err(GatewayError::Unauthorized)
    }
}

/// Bearer-token auth for the staff/admin surface. Kiosk-facing routes are
/// exempt: kiosks authenticate implicitly by knowing their `kiosk_id`
/// (spec §6.1 carries no credential for them).
pub async fn admin_auth_layer(
    state: State<Arc<GatewayState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !req.uri().path().starts_with("/admin/") {
        return next.run(req).await;
    }

    if let Err(code) = validate_bearer(req.headers(), state.config.admin_token.as_deref()) {
        let (status, body) = code.to_http_response("missing or invalid admin bearer token");
        return (status, body).into_response();
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
