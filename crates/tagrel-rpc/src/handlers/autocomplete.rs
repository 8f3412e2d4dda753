//! Autocomplete handlers.
//!
//! Each client names a session; requests on the same session cancel each
//! other, so only the newest keystroke's fetch completes.

use super::{require_param, require_str_param, service_param, session_param};
use crate::server::AppState;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub async fn autocomplete(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = service_param(params);
    let text = require_str_param(params, "text", "text")?;
    let session = state.session(session_param(params), &service).await?;

    let predicates = session.lookup(&text).await?;
    Ok(serde_json::to_value(predicates)?)
}

pub async fn set_media_selection(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = service_param(params);
    let tag_counts: BTreeMap<String, u64> = require_param(params, "tag_counts", "tagCounts")?;
    let session = state.session(session_param(params), &service).await?;

    let count = tag_counts.len();
    session.set_media_selection(tag_counts);
    Ok(json!({"success": true, "tags": count}))
}

pub async fn clear_media_selection(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = service_param(params);
    let session = state.session(session_param(params), &service).await?;
    session.clear_media_selection();
    Ok(json!({"success": true}))
}

pub async fn close_session(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let closed = state.close_session(session_param(params)).await;
    Ok(json!({"success": closed}))
}
