//! Data models for the keyword workspace.
//!
//! This module contains the project and keyword types shared by the
//! controller, the remote service client and the view binding, along with
//! the wire payloads of the remote i-SMART service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Projects
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub project_id: i64,
    #[serde(default)]
    pub project_name: Option<String>,
    /// The original search prompt the project was created with.
    #[serde(default)]
    pub raw_query: Option<String>,
}

impl Project {
    pub fn display_name(&self) -> &str {
        self.project_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Untitled")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectStats {
    pub project_id: i64,
    pub project_name: String,
    pub total_papers: u64,
    pub analyzed_papers: u64,
    pub unanalyzed_papers: u64,
}

/// Identity handed to a workspace when it is entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Remote user id; `0` means the identity could not be resolved.
    pub user_id: i64,
    pub project: Option<Project>,
}

// ============================================================================
// Keywords
// ============================================================================

/// Ordered keyword list. Insertion order is display order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordSet {
    pub keywords: Vec<String>,
    /// True while the user may edit the list; false when freshly loaded or saved.
    pub editable: bool,
}

impl KeywordSet {
    pub fn loaded(keywords: Vec<String>) -> Self {
        Self {
            keywords,
            editable: false,
        }
    }

    pub fn generated(keywords: Vec<String>) -> Self {
        Self {
            keywords,
            editable: true,
        }
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    /// In-process model or heuristic; no call to the analysis backend.
    #[default]
    Local,
    /// Cloud analysis backend, optionally with an uploaded document.
    Remote,
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionMode::Local => write!(f, "local"),
            AcquisitionMode::Remote => write!(f, "remote"),
        }
    }
}

impl FromStr for AcquisitionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(AcquisitionMode::Local),
            "remote" => Ok(AcquisitionMode::Remote),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

// ============================================================================
// Workspace State
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkspacePhase {
    Idle,
    Generating,
    Editable,
    Saving,
    Uploading,
    Failed,
}

impl WorkspacePhase {
    /// Phases during which a network operation is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            WorkspacePhase::Generating | WorkspacePhase::Saving | WorkspacePhase::Uploading
        )
    }

    pub fn activity(&self) -> &'static str {
        match self {
            WorkspacePhase::Generating => "keyword generation",
            WorkspacePhase::Saving => "saving",
            WorkspacePhase::Uploading => "upload",
            _ => "nothing",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadOutcome {
    Success,
    Failure,
}

/// Progress of one remote analysis call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadSession {
    /// 0-100; only meaningful when `has_file` is true.
    pub percent: u8,
    pub has_file: bool,
    pub status: String,
    pub outcome: Option<UploadOutcome>,
}

impl UploadSession {
    pub fn start(has_file: bool) -> Self {
        Self {
            percent: 0,
            has_file,
            status: if has_file {
                "Uploading & analyzing...".to_string()
            } else {
                "Analyzing with Gemini...".to_string()
            },
            outcome: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }
}

/// A document picked for remote analysis.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    /// Content type as declared by the client.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn is_pdf(&self) -> bool {
        self.content_type.trim().eq_ignore_ascii_case("application/pdf")
    }
}

/// Everything the view needs to render a workspace.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSnapshot {
    pub project: Option<Project>,
    pub keywords: Vec<String>,
    pub editable: bool,
    pub phase: WorkspacePhase,
    pub upload: Option<UploadSession>,
    pub stats: Option<ProjectStats>,
    pub stats_error: Option<String>,
    pub notice: Option<String>,
}

// ============================================================================
// Remote Service Payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordFetchResponse {
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualStoreRequest {
    pub project_id: i64,
    pub project_name: String,
    pub raw_query: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteUser {
    pub user_id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: RemoteUser,
}
