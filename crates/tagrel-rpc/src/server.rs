//! HTTP server implementation using Axum.

use crate::handlers::{handle_health, handle_rpc};
use axum::{
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tagrel_core::{
    AutocompleteSession, MemoryStore, RelationshipCacheManager, RpcConfig, ServiceId, TagOptions,
    TagRelError,
};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// Backing store; edits go here before the manager is notified
    pub store: Arc<MemoryStore>,
    /// Resolved relationship graphs
    pub manager: Arc<RelationshipCacheManager>,
    /// Autocomplete sessions by client-chosen key
    pub sessions: RwLock<HashMap<String, Arc<AutocompleteSession>>>,
}

impl AppState {
    /// Build state from optional store snapshot and options files and run
    /// the first rebuild.
    pub async fn load(store_path: Option<&Path>, options_path: Option<&Path>) -> anyhow::Result<Self> {
        let store = match store_path {
            Some(path) => MemoryStore::load(path)?,
            None => MemoryStore::new(),
        };
        let options = match options_path {
            Some(path) => TagOptions::load(path)?,
            None => TagOptions::default(),
        };

        let store = Arc::new(store);
        let manager = RelationshipCacheManager::start(store.clone(), options).await?;
        Ok(Self::new(store, manager))
    }

    pub fn new(store: Arc<MemoryStore>, manager: Arc<RelationshipCacheManager>) -> Self {
        Self {
            store,
            manager,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The autocomplete session for `key`, created on first use or when the
    /// client switches it to another service.
    ///
    /// New keys are refused once [`RpcConfig::MAX_SESSIONS`] are open.
    pub async fn session(
        &self,
        key: &str,
        service: &ServiceId,
    ) -> tagrel_core::Result<Arc<AutocompleteSession>> {
        if let Some(session) = self.sessions.read().await.get(key) {
            if session.service() == service {
                return Ok(Arc::clone(session));
            }
        }

        let mut sessions = self.sessions.write().await;
        match sessions.get(key) {
            Some(session) if session.service() == service => return Ok(Arc::clone(session)),
            Some(_) => {}
            None if sessions.len() >= RpcConfig::MAX_SESSIONS => {
                return Err(TagRelError::InvalidParams {
                    message: format!(
                        "Too many autocomplete sessions ({}), close one first",
                        sessions.len()
                    ),
                });
            }
            None => {}
        }

        let session = Arc::new(AutocompleteSession::new(
            service.clone(),
            self.store.clone(),
            Arc::clone(&self.manager),
        ));
        sessions.insert(key.to_string(), Arc::clone(&session));
        Ok(session)
    }

    /// Drop the session for `key`, cancelling its in-flight lookup.
    pub async fn close_session(&self, key: &str) -> bool {
        match self.sessions.write().await.remove(key) {
            Some(session) => {
                session.invalidate();
                true
            }
            None => false,
        }
    }
}

/// Build the router serving `/health` and `/rpc`.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Configure CORS for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the JSON-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let app = build_router(Arc::new(state));

    // Parse the address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    // Bind to the address
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
