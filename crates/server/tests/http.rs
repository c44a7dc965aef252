// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Front-end behavior through the router, no sockets involved.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use koral_engine::Engine;
use koral_server::{AppState, build_router};
use serde_json::{Value, json};
use tower::ServiceExt;

const LISTS: &str = r#"
- id: stts-ud
  foundryA: opennlp
  layerA: p
  foundryB: opennlp
  layerB: p
  mappings:
    - "[PIDAT] <> [PIDAT & AdjType:Pdt]"
- id: marmot-custom
  mappings:
    - "[marmot/m=gender:masc] <> [custom/p=M & custom/m=M]"
"#;

fn app() -> Router {
    let (_, engine) = Engine::from_yaml_sources(Some(LISTS), &[]).expect("lists load");
    build_router(Arc::new(AppState { engine }))
}

fn post(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request builds")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

fn pidat() -> String {
    json!({
        "@type": "koral:token",
        "wrap": {"@type": "koral:term", "foundry": "opennlp", "layer": "p",
                 "key": "PIDAT", "match": "match:eq"},
    })
    .to_string()
}

#[tokio::test]
async fn index_page_is_served() {
    let response = app()
        .oneshot(Request::get("/").body(Body::empty()).expect("request builds"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    assert!(String::from_utf8_lossy(&bytes).contains("Koral-Mapper"));
}

#[tokio::test]
async fn query_endpoint_rewrites() {
    let response = app()
        .oneshot(post("/stts-ud/query?rewrites=false", pidat()))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let value = body_json(response).await;
    assert_eq!(value["wrap"]["@type"], "koral:termGroup");
    assert_eq!(value["wrap"]["operands"][1]["key"], "AdjType");
}

#[tokio::test]
async fn query_endpoint_emits_trail_by_default() {
    let response = app()
        .oneshot(post("/stts-ud/query", pidat()))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let value = body_json(response).await;
    assert_eq!(value["wrap"]["rewrites"][0]["editor"], "Koral-Mapper");
}

#[tokio::test]
async fn response_endpoint_rewrites_the_snippet() {
    let body = json!({
        "snippet": "<span title=\"marmot/m:gender:masc\">Der</span>",
    })
    .to_string();
    let response = app()
        .oneshot(post("/marmot-custom/response", body))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let value = body_json(response).await;
    let snippet = value["snippet"].as_str().expect("snippet string");
    assert!(snippet.contains("class=\"notinindex\""));
    assert!(snippet.contains("custom/p:M"));
}

#[tokio::test]
async fn unknown_list_is_not_found() {
    let response = app()
        .oneshot(post("/nope/query", pidat()))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let value = body_json(response).await;
    assert_eq!(value["error"], "mapping list not found: \"nope\"");
}

#[tokio::test]
async fn bad_direction_is_rejected() {
    let response = app()
        .oneshot(post("/stts-ud/query?dir=sideways", pidat()))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let value = body_json(response).await;
    assert_eq!(value["error"], "unknown direction \"sideways\"");
}

#[tokio::test]
async fn forbidden_parameter_characters_are_rejected() {
    let response = app()
        .oneshot(post("/stts-ud/query?foundryA=%3Cscript%3E", pidat()))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let value = body_json(response).await;
    assert_eq!(
        value["error"],
        "parameter foundryA contains forbidden characters"
    );
}

#[tokio::test]
async fn oversized_parameter_is_rejected() {
    let long = "x".repeat(2048);
    let response = app()
        .oneshot(post(&format!("/stts-ud/query?layerB={long}"), pidat()))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let value = body_json(response).await;
    assert_eq!(value["error"], "parameter layerB too long");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let padding = "x".repeat(2 * 1024 * 1024);
    let response = app()
        .oneshot(post("/stts-ud/query", padding))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn malformed_body_is_a_request_error() {
    let response = app()
        .oneshot(post("/stts-ud/query", "{not json".to_string()))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
