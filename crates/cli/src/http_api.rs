use anyhow::{Context as AnyhowContext, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tabula_protocol::{
    serialize_json, HealthResponse, QueryRequest, HEALTH_ROUTE, QUERY_ROUTE, SCHEMA_ROUTE,
};
use tower_http::cors::CorsLayer;

use crate::context::AppContext;
use crate::gateway::{self, GatewayError};

/// Routes of the gateway. CORS applies to `/query` only and admits exactly
/// `allow_origin`.
pub fn router(ctx: Arc<AppContext>, allow_origin: &str) -> Result<Router> {
    let origin = HeaderValue::from_str(allow_origin)
        .with_context(|| format!("Invalid CORS origin: {allow_origin}"))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let query = Router::new()
        .route(QUERY_ROUTE, post(query_handler))
        .layer(cors);

    Ok(Router::new()
        .merge(query)
        .route(SCHEMA_ROUTE, get(schema_handler))
        .route(HEALTH_ROUTE, get(health_handler))
        .with_state(ctx))
}

async fn query_handler(State(ctx): State<Arc<AppContext>>, body: Bytes) -> Response {
    let request = QueryRequest::from_slice(&body).unwrap_or_default();
    let Some(question) = request.question() else {
        log::warn!("Rejected request without a query");
        return error_response(&GatewayError::MissingQuery);
    };
    match gateway::answer(&ctx, question).await {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(err) => error_response(&err),
    }
}

async fn schema_handler(State(ctx): State<Arc<AppContext>>) -> Response {
    json_response(StatusCode::OK, &ctx.schema())
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, &HealthResponse::ok())
}

pub(crate) fn error_response(err: &GatewayError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &err.envelope())
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serialize_json(body) {
        Ok(text) => (status, [(header::CONTENT_TYPE, "application/json")], text).into_response(),
        Err(err) => {
            log::error!("Failed to serialize response: {err:#}");
            let fallback = GatewayError::Internal(err.to_string()).envelope();
            let text = serde_json::json!({
                "error": fallback.error,
                "kind": fallback.kind.as_str(),
            })
            .to_string();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                text,
            )
                .into_response()
        }
    }
}
