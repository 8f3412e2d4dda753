//! Relationship lookup, edit and rebuild handlers.

use super::{get_bool_param, get_u64_param, require_param, require_str_param, service_param};
use crate::server::AppState;
use serde_json::{json, Value};
use tagrel_core::{LookupScope, ParentPair, Predicate, ServiceId, SiblingPair, TagRelError};
use tracing::info;

pub async fn collapse_tag(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = service_param(params);
    let tag = require_str_param(params, "tag", "tag")?;
    Ok(json!(state.manager.collapse_tag(&service, &tag)?))
}

pub async fn collapse_tags(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = service_param(params);
    let tags: Vec<String> = require_param(params, "tags", "tags")?;
    Ok(json!(state.manager.collapse_tags(&service, &tags)?))
}

pub async fn get_parents(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = service_param(params);
    let tag = require_str_param(params, "tag", "tag")?;
    let scope = if get_bool_param(params, "service_only", "serviceOnly").unwrap_or(false) {
        LookupScope::ServiceOnly
    } else {
        LookupScope::FollowOptions
    };
    Ok(json!(state.manager.get_parents_scoped(&service, &tag, scope)?))
}

pub async fn expand_tags(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = service_param(params);
    let tags: Vec<String> = require_param(params, "tags", "tags")?;
    Ok(json!(state.manager.expand_tags(&service, &tags)?))
}

pub async fn get_all_siblings(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = service_param(params);
    let tag = require_str_param(params, "tag", "tag")?;
    Ok(json!(state.manager.get_all_siblings(&service, &tag)?))
}

pub async fn expand_predicates(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = service_param(params);
    let predicates: Vec<Predicate> = require_param(params, "predicates", "predicates")?;
    Ok(serde_json::to_value(
        state.manager.expand_predicates(&service, predicates)?,
    )?)
}

pub async fn list_services(state: &AppState, _params: &Value) -> tagrel_core::Result<Value> {
    let mut services = state.manager.services()?;
    services.push(ServiceId::combined());
    Ok(json!(services))
}

pub async fn refresh(state: &AppState, _params: &Value) -> tagrel_core::Result<Value> {
    state.manager.refresh_now().await?;
    Ok(json!({"success": true, "rebuild_count": state.manager.rebuild_count()}))
}

pub async fn add_sibling(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = require_str_param(params, "service", "service").map(ServiceId::new)?;
    let pair = SiblingPair::new(
        require_str_param(params, "bad", "bad")?,
        require_str_param(params, "good", "good")?,
    );
    let group = get_u64_param(params, "group", "group").unwrap_or(0);
    let group = usize::try_from(group).map_err(|_| TagRelError::InvalidParams {
        message: format!("Sibling group {} out of range", group),
    })?;

    info!("Adding sibling {} -> {} to {}", pair.bad, pair.good, service);
    state.store.add_sibling(&service, group, pair)?;
    siblings_changed(state, params).await
}

pub async fn remove_sibling(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = require_str_param(params, "service", "service").map(ServiceId::new)?;
    let pair = SiblingPair::new(
        require_str_param(params, "bad", "bad")?,
        require_str_param(params, "good", "good")?,
    );

    if !state.store.remove_sibling(&service, &pair)? {
        return Ok(json!({"success": false}));
    }
    info!("Removed sibling {} -> {} from {}", pair.bad, pair.good, service);
    siblings_changed(state, params).await
}

pub async fn add_parent(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = require_str_param(params, "service", "service").map(ServiceId::new)?;
    let pair = ParentPair::new(
        require_str_param(params, "child", "child")?,
        require_str_param(params, "parent", "parent")?,
    );

    info!("Adding parent {} -> {} to {}", pair.child, pair.parent, service);
    state.store.add_parent(&service, pair)?;
    parents_changed(state, params).await
}

pub async fn remove_parent(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    let service = require_str_param(params, "service", "service").map(ServiceId::new)?;
    let pair = ParentPair::new(
        require_str_param(params, "child", "child")?,
        require_str_param(params, "parent", "parent")?,
    );

    if !state.store.remove_parent(&service, &pair)? {
        return Ok(json!({"success": false}));
    }
    info!("Removed parent {} -> {} from {}", pair.child, pair.parent, service);
    parents_changed(state, params).await
}

pub async fn get_status(state: &AppState, _params: &Value) -> tagrel_core::Result<Value> {
    let status = state.manager.status()?;
    let sessions = state.sessions.read().await.len();

    let mut response = serde_json::to_value(status)?;
    response["sessions"] = json!(sessions);
    Ok(response)
}

/// After an edit: rebuild now if the caller asked for it, otherwise let the
/// debounce timer pick it up.
async fn siblings_changed(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    if get_bool_param(params, "refresh", "refresh").unwrap_or(false) {
        state.manager.refresh_now().await?;
    } else {
        state.manager.notify_siblings_changed();
    }
    Ok(json!({"success": true, "state": state.manager.state()}))
}

async fn parents_changed(state: &AppState, params: &Value) -> tagrel_core::Result<Value> {
    if get_bool_param(params, "refresh", "refresh").unwrap_or(false) {
        state.manager.refresh_now().await?;
    } else {
        state.manager.notify_parents_changed();
    }
    Ok(json!({"success": true, "state": state.manager.state()}))
}
