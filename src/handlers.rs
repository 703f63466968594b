//! HTTP route handlers for the workspace view.
//!
//! Pages render HTML; `/api/workspace/...` routes forward user actions to
//! the workspace's controller and always answer with a JSON
//! [`WorkspaceResponse`] carrying the fresh snapshot and, on failure, the
//! user-facing error.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{clear_session_cookie, create_session, session_cookie, session_user};
use crate::error::KeywordError;
use crate::models::{AcquisitionMode, DocumentUpload, Project, WorkspaceSnapshot};
use crate::templates::{base_html, render_index, render_login, render_workspace};
use crate::AppState;

// ============================================================================
// Index
// ============================================================================

pub async fn index(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if session_user(&jar, &state.session_secret).is_none() {
        return Redirect::to("/login").into_response();
    }
    Html(render_index()).into_response()
}

// ============================================================================
// Login
// ============================================================================

pub async fn login_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if session_user(&jar, &state.session_secret).is_some() {
        return Redirect::to("/").into_response();
    }
    Html(render_login(None, "")).into_response()
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    axum::Form(form): axum::Form<LoginForm>,
) -> Response {
    let user = match state.api.login(form.email.trim(), &form.password).await {
        Ok(user) => user,
        Err(KeywordError::Auth(message)) => {
            return Html(render_login(Some(&message), &form.email)).into_response();
        }
        Err(e) => {
            warn!(error = %e, "login request failed");
            return Html(render_login(Some("Something went wrong! Try again."), &form.email))
                .into_response();
        }
    };

    if user.user_id <= 0 {
        return Html(render_login(Some("User not authenticated."), &form.email)).into_response();
    }

    let token = match create_session(&state.session_secret, user.user_id) {
        Some(t) => t,
        None => {
            let html = r#"<div class="message error">Failed to create session.</div>"#;
            return Html(base_html("Error", html, false)).into_response();
        }
    };

    info!(user_id = user.user_id, "user logged in");

    let mut headers = HeaderMap::new();
    if let Ok(value) = session_cookie(&token).parse() {
        headers.insert(SET_COOKIE, value);
    }
    (headers, Redirect::to("/")).into_response()
}

pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(user_id) = session_user(&jar, &state.session_secret) {
        state.close_workspaces(user_id);
    }
    let mut headers = HeaderMap::new();
    if let Ok(value) = clear_session_cookie().parse() {
        headers.insert(SET_COOKIE, value);
    }
    (headers, Redirect::to("/login")).into_response()
}

// ============================================================================
// Workspace Page
// ============================================================================

#[derive(Deserialize)]
pub struct WorkspaceQuery {
    pub project_id: i64,
    pub project_name: Option<String>,
    pub raw_query: Option<String>,
    pub mode: Option<String>,
}

pub async fn workspace_page(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<WorkspaceQuery>,
) -> Response {
    let Some(user_id) = session_user(&jar, &state.session_secret) else {
        return Redirect::to("/login").into_response();
    };

    let project = Project {
        project_id: query.project_id,
        project_name: query.project_name.filter(|n| !n.trim().is_empty()),
        raw_query: query.raw_query,
    };
    let mode = query
        .mode
        .as_deref()
        .and_then(|m| m.parse().ok())
        .unwrap_or_default();

    let controller = state.enter_workspace(user_id, project).await;
    Html(render_workspace(&controller.snapshot(), mode)).into_response()
}

// ============================================================================
// Workspace API
// ============================================================================

#[derive(Serialize)]
pub struct WorkspaceResponse {
    pub snapshot: Option<WorkspaceSnapshot>,
    pub error: Option<String>,
}

impl WorkspaceResponse {
    fn error(message: &str) -> Response {
        axum::Json(WorkspaceResponse {
            snapshot: None,
            error: Some(message.to_string()),
        })
        .into_response()
    }
}

/// Build the JSON answer for a finished action.
fn respond(snapshot: WorkspaceSnapshot, result: Result<(), KeywordError>) -> Response {
    axum::Json(WorkspaceResponse {
        snapshot: Some(snapshot),
        error: result.err().map(|e| e.notice()),
    })
    .into_response()
}

macro_rules! open_workspace {
    ($state:expr, $jar:expr, $project_id:expr) => {{
        let Some(user_id) = session_user(&$jar, &$state.session_secret) else {
            return WorkspaceResponse::error("Not logged in");
        };
        match $state.workspace(user_id, $project_id) {
            Some(c) => c,
            None => return WorkspaceResponse::error("Workspace is not open"),
        }
    }};
}

pub async fn workspace_snapshot(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(project_id): Path<i64>,
) -> Response {
    let controller = open_workspace!(state, jar, project_id);
    respond(controller.snapshot(), Ok(()))
}

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub mode: AcquisitionMode,
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(project_id): Path<i64>,
    axum::Json(body): axum::Json<GenerateRequest>,
) -> Response {
    let controller = open_workspace!(state, jar, project_id);
    let result = controller.generate(&body.prompt, body.mode).await.map(|_| ());
    respond(controller.snapshot(), result)
}

#[derive(Deserialize)]
pub struct AddKeywordRequest {
    pub word: String,
}

pub async fn add_keyword(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(project_id): Path<i64>,
    axum::Json(body): axum::Json<AddKeywordRequest>,
) -> Response {
    let controller = open_workspace!(state, jar, project_id);
    controller.add_keyword(&body.word);
    respond(controller.snapshot(), Ok(()))
}

pub async fn remove_keyword(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path((project_id, index)): Path<(i64, usize)>,
) -> Response {
    let controller = open_workspace!(state, jar, project_id);
    controller.remove_keyword(index);
    respond(controller.snapshot(), Ok(()))
}

#[derive(Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub prompt: String,
}

pub async fn save(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(project_id): Path<i64>,
    axum::Json(body): axum::Json<SaveRequest>,
) -> Response {
    let controller = open_workspace!(state, jar, project_id);
    let result = controller.save(&body.prompt).await;
    respond(controller.snapshot(), result)
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(project_id): Path<i64>,
) -> Response {
    let controller = open_workspace!(state, jar, project_id);
    let result = controller.refresh().await;
    respond(controller.snapshot(), result)
}

/// Multipart fields: `mode`, `prompt`, `file`.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(project_id): Path<i64>,
    mut multipart: Multipart,
) -> Response {
    let controller = open_workspace!(state, jar, project_id);

    let mut mode = AcquisitionMode::Local;
    let mut prompt = String::new();
    let mut document: Option<DocumentUpload> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return WorkspaceResponse::error(&format!("Failed to read upload: {}", e));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "mode" => {
                if let Ok(text) = field.text().await {
                    mode = text.parse().unwrap_or(AcquisitionMode::Local);
                }
            }
            "prompt" => {
                prompt = field.text().await.unwrap_or_default();
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("document").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        document = Some(DocumentUpload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        });
                    }
                    Err(e) => {
                        return WorkspaceResponse::error(&format!("Failed to read file: {}", e));
                    }
                }
            }
            _ => {}
        }
    }

    let Some(document) = document else {
        return WorkspaceResponse::error("No file uploaded");
    };

    let result = controller.upload_document(&document, mode, &prompt).await;
    respond(controller.snapshot(), result)
}
