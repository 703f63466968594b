//! In-process fake of the remote i-SMART service for integration tests.
//!
//! Serves the keyword, stats, analyze, manual-store and login endpoints on
//! an ephemeral port and records every request it sees.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ismart::{
    ApiClient, KeywordAcquisitionController, KeywordError, KeywordStrategy, ManualStoreRequest,
    Project, SessionContext,
};

pub const USER_ID: i64 = 42;
pub const PROJECT_ID: i64 = 7;

#[derive(Debug, Clone)]
pub struct AnalyzeCall {
    pub user_id: String,
    pub project_id: String,
    pub prompt: String,
    /// (file name, content type, byte count) of the `files` part.
    pub file: Option<(String, String, usize)>,
}

#[derive(Debug)]
pub struct BackendState {
    /// Stored keywords per project.
    pub keywords: HashMap<i64, Vec<String>>,
    /// What the store holds after a successful analyze.
    pub analyze_result: Vec<String>,
    pub analyze_status: u16,
    pub analyze_delay: Duration,
    pub store_status: u16,
    pub store_delay: Duration,
    pub stats_status: u16,
    pub analyze_calls: Vec<AnalyzeCall>,
    pub store_calls: Vec<ManualStoreRequest>,
    /// Every request path in arrival order.
    pub log: Vec<String>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            keywords: HashMap::new(),
            analyze_result: vec!["arsenic speciation".to_string(), "OsLsi1".to_string()],
            analyze_status: 200,
            analyze_delay: Duration::ZERO,
            store_status: 200,
            store_delay: Duration::ZERO,
            stats_status: 200,
            analyze_calls: Vec::new(),
            store_calls: Vec::new(),
            log: Vec::new(),
        }
    }
}

pub type Shared = Arc<Mutex<BackendState>>;

pub struct FakeBackend {
    pub base_url: String,
    pub state: Shared,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(BackendState::default()));

        let app = Router::new()
            .route("/", get(root))
            .route("/auth/login", post(login))
            .route("/keyword/fetch/{project_id}", get(fetch_keywords))
            .route("/papers/stats/project/{project_id}", get(stats))
            .route("/keyword/analyze", post(analyze))
            .route("/keyword/manual-store", post(manual_store))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn api(&self) -> ApiClient {
        ApiClient::new(&self.base_url, Duration::from_secs(10)).unwrap()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut BackendState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().log.len()
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }
}

fn record(state: &Shared, entry: String) {
    state.lock().unwrap().log.push(entry);
}

async fn root(State(state): State<Shared>) -> &'static str {
    record(&state, "GET /".to_string());
    "ok"
}

async fn login(State(state): State<Shared>, Json(body): Json<serde_json::Value>) -> Response {
    record(&state, "POST /auth/login".to_string());
    if body.get("password").and_then(|p| p.as_str()) == Some("secret") {
        Json(json!({ "user": { "user_id": USER_ID, "email": body["email"] } })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
            .into_response()
    }
}

async fn fetch_keywords(State(state): State<Shared>, Path(project_id): Path<i64>) -> Response {
    let mut s = state.lock().unwrap();
    s.log.push(format!("GET /keyword/fetch/{}", project_id));
    let keywords = s.keywords.get(&project_id).cloned().unwrap_or_default();
    Json(json!({ "keywords": keywords })).into_response()
}

async fn stats(State(state): State<Shared>, Path(project_id): Path<i64>) -> Response {
    let mut s = state.lock().unwrap();
    s.log.push(format!("GET /papers/stats/project/{}", project_id));
    if s.stats_status != 200 {
        let status = StatusCode::from_u16(s.stats_status).unwrap();
        return (status, Json(json!({ "detail": "Project not found" }))).into_response();
    }
    Json(json!({
        "project_id": project_id,
        "project_name": "Arsenic in rice",
        "total_papers": 12,
        "analyzed_papers": 5,
        "unanalyzed_papers": 7
    }))
    .into_response()
}

async fn analyze(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    let mut call = AnalyzeCall {
        user_id: String::new(),
        project_id: String::new(),
        prompt: String::new(),
        file: None,
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name().unwrap_or("").to_string().as_str() {
            "user_id" => call.user_id = field.text().await.unwrap(),
            "project_id" => call.project_id = field.text().await.unwrap(),
            "prompt" => call.prompt = field.text().await.unwrap(),
            "files" => {
                let name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let len = field.bytes().await.unwrap().len();
                call.file = Some((name, content_type, len));
            }
            _ => {}
        }
    }

    let delay = {
        let mut s = state.lock().unwrap();
        s.log.push("POST /keyword/analyze".to_string());
        s.analyze_calls.push(call.clone());
        s.analyze_delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut s = state.lock().unwrap();
    if s.analyze_status != 200 {
        let status = StatusCode::from_u16(s.analyze_status).unwrap();
        return (status, Json(json!({ "detail": "Gemini quota exceeded" }))).into_response();
    }
    let project_id: i64 = call.project_id.parse().unwrap_or(0);
    let result = s.analyze_result.clone();
    s.keywords.insert(project_id, result);
    // The echoed payload must never be used by the client
    Json(json!({ "keywords": ["echoed-only"] })).into_response()
}

async fn manual_store(
    State(state): State<Shared>,
    Json(body): Json<ManualStoreRequest>,
) -> Response {
    let delay = state.lock().unwrap().store_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut s = state.lock().unwrap();
    s.log.push("POST /keyword/manual-store".to_string());
    s.store_calls.push(body.clone());
    if s.store_status != 200 {
        let status = StatusCode::from_u16(s.store_status).unwrap();
        return (status, "store unavailable").into_response();
    }
    s.keywords.insert(body.project_id, body.keywords);
    Json(json!({ "status": "stored" })).into_response()
}

// ============================================================================
// Local strategy doubles
// ============================================================================

/// Returns a fixed block of text, like a local model would.
pub struct FixedModel(pub &'static str);

#[async_trait]
impl KeywordStrategy for FixedModel {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, KeywordError> {
        Ok(self.0.to_string())
    }
}

pub struct BrokenModel;

#[async_trait]
impl KeywordStrategy for BrokenModel {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, KeywordError> {
        Err(KeywordError::Strategy("model crashed".to_string()))
    }
}

// ============================================================================
// Controller helpers
// ============================================================================

pub fn project() -> Project {
    Project {
        project_id: PROJECT_ID,
        project_name: Some("Arsenic in rice".to_string()),
        raw_query: Some("arsenic uptake in rice roots".to_string()),
    }
}

pub fn controller(
    backend: &FakeBackend,
    local: Arc<dyn KeywordStrategy>,
) -> KeywordAcquisitionController {
    KeywordAcquisitionController::new(
        SessionContext {
            user_id: USER_ID,
            project: Some(project()),
        },
        backend.api(),
        local,
    )
}

pub fn pdf(bytes: usize) -> ismart::DocumentUpload {
    ismart::DocumentUpload {
        file_name: "paper.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        bytes: vec![b'%'; bytes],
    }
}
