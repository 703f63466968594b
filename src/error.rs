//! Error taxonomy for the keyword workspace.
//!
//! Every controller operation returns `Result<_, KeywordError>`. Route
//! handlers turn these into the single user-visible notice via
//! [`KeywordError::notice`].

/// All errors a workspace operation can produce.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KeywordError {
    /// Missing prompt, missing project, or unsupported file type.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No resolvable user identity, or the login was refused.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Non-200 status or transport failure talking to the remote service.
    #[error("Remote analysis error: {0}")]
    RemoteAnalysis(String),

    /// Operation invoked in the wrong acquisition mode.
    #[error("Mode error: {0}")]
    Mode(String),

    /// Another generate/upload/save is still in flight.
    #[error("Workspace busy: {0} in progress")]
    Busy(&'static str),

    /// The workspace was dismissed before the operation completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// A local generative capability failed to produce text.
    #[error("Keyword strategy failed: {0}")]
    Strategy(String),

    /// Project statistics could not be loaded. Carries the server's detail.
    #[error("Stats unavailable: {0}")]
    Stats(String),
}

impl KeywordError {
    /// Short message suitable for the workspace notice.
    pub fn notice(&self) -> String {
        match self {
            KeywordError::Validation(msg) => format!("⚠️ {}", msg),
            KeywordError::Auth(msg) => format!("⚠️ {}", msg),
            KeywordError::RemoteAnalysis(msg) => format!("❌ {}", msg),
            KeywordError::Mode(msg) => format!("⚠️ {}", msg),
            KeywordError::Busy(what) => format!("⏳ Please wait, {} is still running.", what),
            KeywordError::Cancelled => "Workspace closed.".to_string(),
            KeywordError::Strategy(msg) => format!("❌ Failed to generate keywords: {}", msg),
            KeywordError::Stats(msg) => format!("❌ {}", msg),
        }
    }
}

impl From<reqwest::Error> for KeywordError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            KeywordError::RemoteAnalysis(format!("server returned {}", status))
        } else {
            KeywordError::RemoteAnalysis(format!("network error: {}", err))
        }
    }
}

/// Errors raised while reading configuration at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL in {var}: {reason}")]
    InvalidUrl { var: &'static str, reason: String },

    #[error("Invalid value in {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}
