//! JSON-RPC request handlers, split by domain.

mod autocomplete;
mod options;
mod relationships;

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tagrel_core::{RpcConfig, ServiceId, TagRelError};
use tracing::{debug, error, warn};

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String, retryable: bool) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: retryable.then(|| json!({"retryable": true})),
            }),
            id,
        }
    }
}

// ============================================================================
// Parameter extraction helpers
// ============================================================================

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(params: &Value, snake: &str, camel: &str) -> tagrel_core::Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| TagRelError::InvalidParams {
            message: format!("Missing required parameter: {}", snake),
        })
}

/// Extract an optional bool parameter, supporting both snake_case and camelCase.
pub(crate) fn get_bool_param(params: &Value, snake: &str, camel: &str) -> Option<bool> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_bool())
}

/// Extract an optional u64 parameter, supporting both snake_case and camelCase.
pub(crate) fn get_u64_param(params: &Value, snake: &str, camel: &str) -> Option<u64> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_u64())
}

/// Deserialize a required structured parameter.
pub(crate) fn require_param<T: DeserializeOwned>(
    params: &Value,
    snake: &str,
    camel: &str,
) -> tagrel_core::Result<T> {
    let value = params
        .get(snake)
        .or_else(|| params.get(camel))
        .ok_or_else(|| TagRelError::InvalidParams {
            message: format!("Missing required parameter: {}", snake),
        })?;
    serde_json::from_value(value.clone()).map_err(|e| TagRelError::InvalidParams {
        message: format!("Invalid parameter {}: {}", snake, e),
    })
}

/// The `service` parameter, defaulting to the combined service.
pub(crate) fn service_param(params: &Value) -> ServiceId {
    get_str_param(params, "service", "service")
        .map(ServiceId::new)
        .unwrap_or_else(ServiceId::combined)
}

/// The `session` parameter, defaulting to the shared session.
pub(crate) fn session_param(params: &Value) -> &str {
    get_str_param(params, "session", "session").unwrap_or(RpcConfig::DEFAULT_SESSION)
}

// ============================================================================
// HTTP endpoints
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    // Handle built-in methods
    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    match dispatch_method(&state, method, &params).await {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(e) => {
            if matches!(e, TagRelError::Cancelled) {
                debug!("RPC call {} superseded by a newer request", method);
            } else {
                error!("RPC error for {}: {}", method, e);
            }
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(
                    id,
                    e.to_rpc_error_code(),
                    e.to_string(),
                    e.is_retryable(),
                )),
            )
        }
    }
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Dispatch a method call to the appropriate domain handler.
async fn dispatch_method(state: &AppState, method: &str, params: &Value) -> tagrel_core::Result<Value> {
    match method {
        // Relationship lookups
        "collapse_tag" => relationships::collapse_tag(state, params).await,
        "collapse_tags" => relationships::collapse_tags(state, params).await,
        "get_parents" => relationships::get_parents(state, params).await,
        "expand_tags" => relationships::expand_tags(state, params).await,
        "get_all_siblings" => relationships::get_all_siblings(state, params).await,
        "expand_predicates" => relationships::expand_predicates(state, params).await,

        // Relationship edits & rebuilds
        "list_services" => relationships::list_services(state, params).await,
        "refresh" => relationships::refresh(state, params).await,
        "add_sibling" => relationships::add_sibling(state, params).await,
        "remove_sibling" => relationships::remove_sibling(state, params).await,
        "add_parent" => relationships::add_parent(state, params).await,
        "remove_parent" => relationships::remove_parent(state, params).await,
        "get_status" => relationships::get_status(state, params).await,

        // Options
        "get_options" => options::get_options(state, params).await,
        "set_options" => options::set_options(state, params).await,

        // Autocomplete
        "autocomplete" => autocomplete::autocomplete(state, params).await,
        "set_media_selection" => autocomplete::set_media_selection(state, params).await,
        "clear_media_selection" => autocomplete::clear_media_selection(state, params).await,
        "close_session" => autocomplete::close_session(state, params).await,

        // Unknown method
        _ => {
            warn!("Method not found: {}", method);
            Err(TagRelError::Other(format!("Method not found: {}", method)))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
