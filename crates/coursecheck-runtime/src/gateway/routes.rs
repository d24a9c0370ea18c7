//! HTTP surface of the gateway.

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use super::{Gateway, HEALTH_PATH, VALIDATE_PATH};

pub(super) fn router(gateway: Gateway) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route(VALIDATE_PATH, any(validate_answer))
        .route(HEALTH_PATH, get(health))
        .with_state(gateway)
        .layer(cors)
        .layer(middleware::from_fn(preflight_no_content))
}

/// Answer successful OPTIONS calls with 204 and no body.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options && response.status().is_success() {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

async fn validate_answer(
    State(gateway): State<Gateway>,
    method: Method,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    match gateway.handle(&method, &body).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    upstream_configured: bool,
}

async fn health(State(gateway): State<Gateway>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        upstream_configured: gateway.upstream_healthy().await,
    })
}
