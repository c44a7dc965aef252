// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Request handlers.
//!
//! The front-end is deliberately thin: it validates parameters, hands the
//! raw body to the engine, and maps engine failures onto structured JSON
//! error responses. Parameters are length- and character-guarded before
//! anything reaches the engine.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use koral_engine::{Direction, EngineError, Overrides};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;

/// Parameters longer than this are rejected outright.
const MAX_PARAM_BYTES: usize = 1024;
/// Characters no parameter may carry.
const FORBIDDEN: &[char] = &['<', '>', '{', '}', '[', ']', '\\'];

/// Query parameters of the mapping endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct MapParams {
    #[serde(default)]
    dir: Option<String>,
    #[serde(default, rename = "foundryA")]
    foundry_a: Option<String>,
    #[serde(default, rename = "layerA")]
    layer_a: Option<String>,
    #[serde(default, rename = "foundryB")]
    foundry_b: Option<String>,
    #[serde(default, rename = "layerB")]
    layer_b: Option<String>,
    /// Whether replaced subtrees carry rewrite trail entries.
    #[serde(default)]
    rewrites: Option<bool>,
}

/// A request failure with its HTTP status and a JSON `error` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = axum::Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::UnknownList(_) => StatusCode::NOT_FOUND,
            // rule sides are validated at startup; a matcher failure here
            // is a bug, not a caller mistake
            EngineError::Matcher(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "internal mapping failure");
            "internal error".to_string()
        } else {
            err.to_string()
        };
        ApiError { status, message }
    }
}

fn check_param(name: &str, value: &str) -> Result<(), ApiError> {
    if value.len() >= MAX_PARAM_BYTES {
        return Err(ApiError::bad_request(format!("parameter {name} too long")));
    }
    if value.contains(FORBIDDEN) {
        return Err(ApiError::bad_request(format!(
            "parameter {name} contains forbidden characters"
        )));
    }
    Ok(())
}

struct MapRequest {
    direction: Direction,
    overrides: Overrides,
    trail: bool,
}

impl MapParams {
    fn resolve(&self, list: &str) -> Result<MapRequest, ApiError> {
        check_param("list", list)?;
        for (name, value) in [
            ("dir", &self.dir),
            ("foundryA", &self.foundry_a),
            ("layerA", &self.layer_a),
            ("foundryB", &self.foundry_b),
            ("layerB", &self.layer_b),
        ] {
            if let Some(value) = value {
                check_param(name, value)?;
            }
        }
        let direction = self
            .dir
            .as_deref()
            .unwrap_or(Direction::AtoB.as_str())
            .parse::<Direction>()?;
        let overrides = Overrides {
            foundry_a: self.foundry_a.clone().unwrap_or_default(),
            layer_a: self.layer_a.clone().unwrap_or_default(),
            foundry_b: self.foundry_b.clone().unwrap_or_default(),
            layer_b: self.layer_b.clone().unwrap_or_default(),
        };
        Ok(MapRequest {
            direction,
            overrides,
            trail: self.rewrites.unwrap_or(true),
        })
    }
}

fn json_body(payload: String) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        payload,
    )
        .into_response()
}

/// `POST /{list}/query` — rewrite a query tree.
pub async fn map_query(
    State(state): State<Arc<AppState>>,
    Path(list): Path<String>,
    Query(params): Query<MapParams>,
    body: String,
) -> Result<Response, ApiError> {
    let request = params.resolve(&list)?;
    let rewritten = state.engine.apply_query(
        &list,
        request.direction,
        &request.overrides,
        &body,
        request.trail,
    )?;
    Ok(json_body(rewritten))
}

/// `POST /{list}/response` — rewrite the snippet of a response payload.
pub async fn map_response(
    State(state): State<Arc<AppState>>,
    Path(list): Path<String>,
    Query(params): Query<MapParams>,
    body: String,
) -> Result<Response, ApiError> {
    let request = params.resolve(&list)?;
    let rewritten =
        state
            .engine
            .apply_response(&list, request.direction, &request.overrides, &body)?;
    Ok(json_body(rewritten))
}

/// `GET /` — the embedded UI integration page.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}
