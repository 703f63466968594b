//! Client for the remote i-SMART keyword/analysis service.
//!
//! Wraps the service's REST endpoints:
//! - `GET  /` (wake-up probe)
//! - `POST /auth/login`
//! - `GET  /keyword/fetch/{project_id}`
//! - `GET  /papers/stats/project/{project_id}`
//! - `POST /keyword/analyze` (multipart, optional PDF)
//! - `POST /keyword/manual-store`

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::KeywordError;
use crate::models::{
    DocumentUpload, KeywordFetchResponse, LoginRequest, LoginResponse, ManualStoreRequest,
    ProjectStats, RemoteUser,
};

/// Upload body chunk size; progress is reported once per chunk.
const UPLOAD_CHUNK: usize = 64 * 1024;

/// Called with `(bytes_sent, bytes_total)` while a document uploads.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// One `/keyword/analyze` submission.
pub struct AnalyzeSubmission<'a> {
    pub user_id: i64,
    pub project_id: i64,
    pub prompt: &'a str,
    pub file: Option<&'a DocumentUpload>,
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, KeywordError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ismart/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ping the service root so a sleeping host starts up. Failures are
    /// only logged.
    pub async fn wake(&self) {
        match self.client.get(self.url("/")).send().await {
            Ok(r) if !r.status().is_success() => {
                warn!(status = %r.status(), "server wake-up answered with error");
            }
            Ok(_) => debug!("server awake"),
            Err(e) => warn!(error = %e, "server wake-up failed"),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<RemoteUser, KeywordError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        let body = read_body(response).await;

        if !status.is_success() {
            let message = body_field(&body, "message").unwrap_or_else(|| "Login failed".to_string());
            return Err(KeywordError::Auth(message));
        }

        let parsed: LoginResponse = body
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or_else(|| KeywordError::Auth("Login failed".to_string()))?;
        Ok(parsed.user)
    }

    /// The stored keyword list for a project.
    pub async fn fetch_keywords(&self, project_id: i64) -> Result<Vec<String>, KeywordError> {
        let response = self
            .client
            .get(self.url(&format!("/keyword/fetch/{}", project_id)))
            .send()
            .await?;

        let status = response.status();
        let body = read_body(response).await;
        if !status.is_success() {
            return Err(KeywordError::RemoteAnalysis(format!(
                "keyword fetch returned {}",
                status
            )));
        }

        Ok(body
            .and_then(|v| serde_json::from_value::<KeywordFetchResponse>(v).ok())
            .map(|r| r.keywords)
            .unwrap_or_default())
    }

    /// Paper counts for a project. Failures are `KeywordError::Stats`
    /// carrying the server's `detail` when it sent one.
    pub async fn fetch_stats(&self, project_id: i64) -> Result<ProjectStats, KeywordError> {
        let response = self
            .client
            .get(self.url(&format!("/papers/stats/project/{}", project_id)))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| KeywordError::Stats(format!("Error loading stats: {}", e)))?;

        let status = response.status();
        let body = read_body(response).await;
        if !status.is_success() {
            let detail =
                body_field(&body, "detail").unwrap_or_else(|| "Failed to fetch stats".to_string());
            return Err(KeywordError::Stats(detail));
        }

        body.and_then(|v| serde_json::from_value(v).ok())
            .ok_or_else(|| KeywordError::Stats("Error loading stats".to_string()))
    }

    /// Submit a prompt (and optionally a document) for remote analysis.
    /// Only HTTP 200 counts as success; the response body is ignored.
    pub async fn analyze(
        &self,
        submission: AnalyzeSubmission<'_>,
        progress: Option<ProgressFn>,
    ) -> Result<(), KeywordError> {
        let mut form = Form::new()
            .text("user_id", submission.user_id.to_string())
            .text("project_id", submission.project_id.to_string())
            .text("prompt", submission.prompt.to_string());

        if let Some(doc) = submission.file {
            form = form.part("files", progress_part(doc, progress)?);
        }

        let response = self
            .client
            .post(self.url("/keyword/analyze"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = read_body(response).await;
            let detail = body_field(&body, "detail")
                .map(|d| format!(": {}", d))
                .unwrap_or_default();
            return Err(KeywordError::RemoteAnalysis(format!(
                "analysis returned {}{}",
                status, detail
            )));
        }
        Ok(())
    }

    /// Store a keyword list verbatim as the project's authoritative value.
    pub async fn manual_store(&self, request: &ManualStoreRequest) -> Result<(), KeywordError> {
        let response = self
            .client
            .post(self.url("/keyword/manual-store"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeywordError::RemoteAnalysis(format!(
                "keyword save returned {}",
                status
            )));
        }
        Ok(())
    }
}

/// Build the `files` part as a chunked stream that reports progress as each
/// chunk is handed to the transport.
fn progress_part(doc: &DocumentUpload, progress: Option<ProgressFn>) -> Result<Part, KeywordError> {
    let total = doc.bytes.len() as u64;
    let chunks: Vec<Bytes> = doc
        .bytes
        .chunks(UPLOAD_CHUNK)
        .map(Bytes::copy_from_slice)
        .collect();

    let mut sent = 0u64;
    let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(ref report) = progress {
            report(sent, total);
        }
        Ok::<Bytes, std::io::Error>(chunk)
    }));

    let part = Part::stream_with_length(Body::wrap_stream(stream), total)
        .file_name(doc.file_name.clone())
        .mime_str(&doc.content_type)?;
    Ok(part)
}

/// Integer percentage of `sent` over `total`, rounded. Zero totals give 0.
pub fn upload_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (sent as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Read a response body leniently: empty is `None`, non-JSON is kept as a
/// JSON string.
async fn read_body(response: Response) -> Option<serde_json::Value> {
    let text = response.text().await.ok()?;
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(&text) {
        Ok(v) => Some(v),
        Err(_) => Some(serde_json::Value::String(text)),
    }
}

fn body_field(body: &Option<serde_json::Value>, field: &str) -> Option<String> {
    body.as_ref()?
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
