//! i-SMART keyword workspace - re-exports for testing and external use.
//!
//! The core is [`controller::KeywordAcquisitionController`]; the remaining
//! modules supply its collaborators (remote service client, local keyword
//! strategies) and the web view that drives it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod keywords;
pub mod models;
pub mod strategy;
pub mod templates;

// ============================================================================
// Configuration Defaults
// ============================================================================

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_PROMPT_CMD: &str = "claude";
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Upload size accepted by the view's upload route.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

// ============================================================================
// Application State
// ============================================================================

/// Key of an open workspace: (user id, project id).
type WorkspaceKey = (i64, i64);

pub struct AppState {
    pub config: Config,
    pub api: ApiClient,
    pub local_strategy: Arc<dyn KeywordStrategy>,
    pub session_secret: Vec<u8>,
    workspaces: Mutex<HashMap<WorkspaceKey, Arc<KeywordAcquisitionController>>>,
}

impl AppState {
    /// Build the client and run local capability discovery once.
    pub async fn new(config: Config) -> Result<Self, KeywordError> {
        let api = ApiClient::new(&config.api_base, config.http_timeout)?;
        let local_strategy = strategy::discover_local_strategy(&config, api.http().clone()).await;
        let session_secret = config
            .session_secret
            .clone()
            .unwrap_or_else(auth::generate_secret);
        Ok(Self::from_parts(config, api, local_strategy, session_secret))
    }

    pub fn from_parts(
        config: Config,
        api: ApiClient,
        local_strategy: Arc<dyn KeywordStrategy>,
        session_secret: Vec<u8>,
    ) -> Self {
        Self {
            config,
            api,
            local_strategy,
            session_secret,
            workspaces: Mutex::new(HashMap::new()),
        }
    }

    /// Open a workspace for `project`, dismissing any previous workspace of
    /// the same user and project, then load its keywords and stats.
    pub async fn enter_workspace(
        &self,
        user_id: i64,
        project: Project,
    ) -> Arc<KeywordAcquisitionController> {
        let key = (user_id, project.project_id);
        let controller = Arc::new(KeywordAcquisitionController::new(
            SessionContext {
                user_id,
                project: Some(project),
            },
            self.api.clone(),
            Arc::clone(&self.local_strategy),
        ));

        let previous = self
            .workspaces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, Arc::clone(&controller));
        if let Some(previous) = previous {
            previous.dismiss();
        }

        info!(user_id, project_id = key.1, "workspace entered");
        if let Err(e) = controller.refresh().await {
            warn!(user_id, project_id = key.1, error = %e, "initial workspace load skipped");
        }
        controller
    }

    pub fn workspace(&self, user_id: i64, project_id: i64) -> Option<Arc<KeywordAcquisitionController>> {
        self.workspaces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(user_id, project_id))
            .cloned()
    }

    /// Dismiss and forget every workspace of `user_id`.
    pub fn close_workspaces(&self, user_id: i64) {
        let mut workspaces = self.workspaces.lock().unwrap_or_else(|e| e.into_inner());
        workspaces.retain(|(owner, _), controller| {
            if *owner == user_id {
                controller.dismiss();
                false
            } else {
                true
            }
        });
    }
}

// ============================================================================
// Routes
// ============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Pages
        .route("/", get(handlers::index))
        .route("/login", get(handlers::login_page).post(handlers::login_submit))
        .route("/logout", get(handlers::logout))
        .route("/workspace", get(handlers::workspace_page))
        // Workspace API
        .route("/api/workspace/{project_id}", get(handlers::workspace_snapshot))
        .route("/api/workspace/{project_id}/generate", post(handlers::generate))
        .route("/api/workspace/{project_id}/keywords", post(handlers::add_keyword))
        .route(
            "/api/workspace/{project_id}/keywords/{index}",
            delete(handlers::remove_keyword),
        )
        .route("/api/workspace/{project_id}/save", post(handlers::save))
        .route("/api/workspace/{project_id}/refresh", post(handlers::refresh))
        .route(
            "/api/workspace/{project_id}/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Re-export commonly used types
pub use api::{upload_percent, AnalyzeSubmission, ApiClient, ProgressFn};
pub use config::Config;
pub use controller::KeywordAcquisitionController;
pub use error::{ConfigError, KeywordError};
pub use keywords::{heuristic_keywords, parse_keyword_output, MAX_KEYWORDS};
pub use models::{
    AcquisitionMode, DocumentUpload, KeywordSet, ManualStoreRequest, Project, ProjectStats,
    RemoteUser, SessionContext, UploadOutcome, UploadSession, WorkspacePhase, WorkspaceSnapshot,
};
pub use strategy::{
    discover_local_strategy, HeuristicStrategy, KeywordStrategy, OllamaModel, PromptCommandModel,
};
