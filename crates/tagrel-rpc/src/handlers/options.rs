//! Tag option handlers.

use super::require_param;
use crate::server::AppState;
use serde_json::{json, Value};
use tagrel_core::TagOptions;

pub async fn get_options(state: &AppState, _params: &Value) -> tagrel_core::Result<Value> {
    Ok(serde_json::to_value(state.manager.options())?)
}

/// Replace the options. Missing fields take their defaults.
pub async fn set_options(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let options: TagOptions = require_param(params, "options", "options")?;
    let changed = state.manager.set_options(options);
    Ok(json!({"success": true, "changed": changed}))
}
