//! Keyword acquisition controller.
//!
//! One controller backs one workspace session (a user working on one
//! project). It decides per action whether keywords come from the local
//! strategy or the remote analysis service, keeps the editable keyword
//! list, and tracks upload progress.
//!
//! Phases: `Idle → Generating → {Editable, Failed}`,
//! `Editable → Saving → {Idle, Editable}` and
//! `Idle/Editable → Uploading → {Editable, Failed}`. While any of the three
//! network phases is active further generate/upload/save/refresh calls
//! are rejected with [`KeywordError::Busy`] and keyword edits are ignored.
//!
//! Every async operation races the workspace's cancellation token. After
//! [`KeywordAcquisitionController::dismiss`] pending operations resolve as
//! [`KeywordError::Cancelled`] and never touch state again.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{upload_percent, AnalyzeSubmission, ApiClient, ProgressFn};
use crate::error::KeywordError;
use crate::keywords::{self, parse_keyword_output};
use crate::models::{
    AcquisitionMode, DocumentUpload, KeywordSet, ManualStoreRequest, Project, ProjectStats,
    SessionContext, UploadOutcome, UploadSession, WorkspacePhase, WorkspaceSnapshot,
};
use crate::strategy::KeywordStrategy;

#[derive(Debug)]
struct WorkspaceState {
    keywords: KeywordSet,
    phase: WorkspacePhase,
    upload: Option<UploadSession>,
    stats: Option<ProjectStats>,
    stats_error: Option<String>,
    notice: Option<String>,
}

impl WorkspaceState {
    fn new() -> Self {
        Self {
            keywords: KeywordSet::default(),
            phase: WorkspacePhase::Idle,
            upload: None,
            stats: None,
            stats_error: None,
            notice: None,
        }
    }
}

pub struct KeywordAcquisitionController {
    session: SessionContext,
    api: ApiClient,
    local: Arc<dyn KeywordStrategy>,
    state: Arc<Mutex<WorkspaceState>>,
    cancel: CancellationToken,
}

impl KeywordAcquisitionController {
    pub fn new(session: SessionContext, api: ApiClient, local: Arc<dyn KeywordStrategy>) -> Self {
        Self {
            session,
            api,
            local,
            state: Arc::new(Mutex::new(WorkspaceState::new())),
            cancel: CancellationToken::new(),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn project(&self) -> Option<&Project> {
        self.session.project.as_ref()
    }

    /// Close the workspace. In-flight operations resolve as `Cancelled`.
    pub fn dismiss(&self) {
        self.cancel.cancel();
    }

    pub fn is_dismissed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn keywords(&self) -> KeywordSet {
        self.lock().keywords.clone()
    }

    pub fn phase(&self) -> WorkspacePhase {
        self.lock().phase
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        let state = self.lock();
        WorkspaceSnapshot {
            project: self.session.project.clone(),
            keywords: state.keywords.keywords.clone(),
            editable: state.keywords.editable,
            phase: state.phase,
            upload: state.upload.clone(),
            stats: state.stats.clone(),
            stats_error: state.stats_error.clone(),
            notice: state.notice.clone(),
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load the stored keywords and the project statistics. Rejected with
    /// `Busy` while a generate/upload/save is in flight; fetch failures are
    /// recorded on the workspace, not returned.
    pub async fn refresh(&self) -> Result<(), KeywordError> {
        if self.is_dismissed() {
            return Err(KeywordError::Cancelled);
        }
        {
            let state = self.lock();
            if state.phase.is_busy() {
                return Err(KeywordError::Busy(state.phase.activity()));
            }
        }
        self.reload().await;
        Ok(())
    }

    /// Fetch keywords, then stats. Also the tail of every remote analysis,
    /// which runs it from inside its own busy phase.
    async fn reload(&self) {
        let Some(project_id) = self.session.project.as_ref().map(|p| p.project_id) else {
            return;
        };

        match self.cancellable(self.api.fetch_keywords(project_id)).await {
            Ok(list) if !list.is_empty() => {
                if !self.is_dismissed() {
                    self.lock().keywords = KeywordSet::loaded(list);
                }
            }
            Ok(_) => {}
            Err(KeywordError::Cancelled) => return,
            Err(e) => warn!(project_id, error = %e, "keyword fetch failed"),
        }

        match self.cancellable(self.api.fetch_stats(project_id)).await {
            Ok(stats) => {
                if !self.is_dismissed() {
                    let mut state = self.lock();
                    state.stats = Some(stats);
                    state.stats_error = None;
                }
            }
            Err(KeywordError::Cancelled) => {}
            Err(e) => {
                warn!(project_id, error = %e, "stats fetch failed");
                if !self.is_dismissed() {
                    let mut state = self.lock();
                    state.stats = None;
                    state.stats_error = Some(match e {
                        KeywordError::Stats(detail) => detail,
                        other => other.to_string(),
                    });
                }
            }
        }
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Generate a fresh keyword set for `prompt`.
    ///
    /// Remote mode always calls the analysis service (without a document)
    /// and adopts whatever list the store holds afterwards. Local mode runs
    /// the discovered local strategy and normalizes its output.
    pub async fn generate(
        &self,
        prompt: &str,
        mode: AcquisitionMode,
    ) -> Result<KeywordSet, KeywordError> {
        if prompt.trim().is_empty() || self.session.project.is_none() {
            return Err(self.reject(KeywordError::Validation(
                "Enter a valid research prompt first.".to_string(),
            )));
        }

        self.begin(WorkspacePhase::Generating)?;

        match mode {
            AcquisitionMode::Remote => {
                self.set_notice("⚡ Sending prompt to Gemini for keyword extraction…");
                match self.run_analysis(prompt, None).await {
                    Ok(()) => {
                        let mut state = self.lock();
                        state.keywords.editable = true;
                        state.phase = WorkspacePhase::Editable;
                        info!(count = state.keywords.len(), "remote keywords ready");
                        Ok(state.keywords.clone())
                    }
                    Err(e) => Err(self.fail(e, WorkspacePhase::Failed)),
                }
            }
            AcquisitionMode::Local => {
                self.set_notice("🧠 Generating domain-specific keywords… please wait.");
                let start = Instant::now();
                match self.cancellable(self.local.generate(prompt)).await {
                    Ok(_) if self.is_dismissed() => Err(KeywordError::Cancelled),
                    Ok(raw) => {
                        let elapsed = start.elapsed().as_secs_f64();
                        let set = KeywordSet::generated(parse_keyword_output(&raw));
                        let mut state = self.lock();
                        state.keywords = set.clone();
                        state.phase = WorkspacePhase::Editable;
                        state.notice = Some(format!(
                            "✅ Keywords generated in {:.2}s. You can edit before saving.",
                            elapsed
                        ));
                        info!(
                            strategy = self.local.name(),
                            count = set.len(),
                            "local keywords generated"
                        );
                        Ok(set)
                    }
                    Err(e) => Err(self.fail(e, WorkspacePhase::Failed)),
                }
            }
        }
    }

    // ========================================================================
    // Remote Analysis
    // ========================================================================

    /// Submit the prompt and optional document for remote analysis, then
    /// reload keywords and stats from the store.
    pub async fn analyze_remote(
        &self,
        prompt: &str,
        file: Option<&DocumentUpload>,
    ) -> Result<(), KeywordError> {
        self.begin(WorkspacePhase::Uploading)?;
        match self.run_analysis(prompt, file).await {
            Ok(()) => {
                let mut state = self.lock();
                state.keywords.editable = true;
                state.phase = WorkspacePhase::Editable;
                Ok(())
            }
            Err(e) => Err(self.fail(e, WorkspacePhase::Failed)),
        }
    }

    /// Upload a PDF for remote analysis. Only allowed in remote mode.
    pub async fn upload_document(
        &self,
        file: &DocumentUpload,
        mode: AcquisitionMode,
        prompt: &str,
    ) -> Result<(), KeywordError> {
        if mode == AcquisitionMode::Local {
            return Err(self.reject(KeywordError::Mode(
                "Upload is only available in Gemini Mode.".to_string(),
            )));
        }
        if self.session.project.is_none() {
            return Err(self.reject(KeywordError::Validation(
                "Please select a project first.".to_string(),
            )));
        }
        if !file.is_pdf() {
            return Err(self.reject(KeywordError::Validation(
                "Only PDF files are supported.".to_string(),
            )));
        }
        self.analyze_remote(prompt, Some(file)).await
    }

    /// The shared analyze-then-reload sequence. Caller owns the phase.
    async fn run_analysis(
        &self,
        prompt: &str,
        file: Option<&DocumentUpload>,
    ) -> Result<(), KeywordError> {
        let project_id = self
            .session
            .project
            .as_ref()
            .map(|p| p.project_id)
            .ok_or_else(|| KeywordError::Validation("Please select a project first.".to_string()))?;

        if self.session.user_id <= 0 {
            return Err(KeywordError::Auth("User not authenticated.".to_string()));
        }

        let has_file = file.is_some();
        self.lock().upload = Some(UploadSession::start(has_file));

        let progress: Option<ProgressFn> = if has_file {
            let state = Arc::clone(&self.state);
            let cancel = self.cancel.clone();
            let report: ProgressFn = Arc::new(move |sent: u64, total: u64| {
                if cancel.is_cancelled() {
                    return;
                }
                if let Ok(mut guard) = state.lock() {
                    if let Some(upload) = guard.upload.as_mut() {
                        upload.percent = upload_percent(sent, total);
                    }
                }
            });
            Some(report)
        } else {
            None
        };

        let submission = AnalyzeSubmission {
            user_id: self.session.user_id,
            project_id,
            prompt,
            file,
        };

        if let Err(e) = self.cancellable(self.api.analyze(submission, progress)).await {
            if !matches!(e, KeywordError::Cancelled) {
                let status = match &e {
                    KeywordError::RemoteAnalysis(msg) if msg.starts_with("network error") => {
                        "❌ Network error."
                    }
                    _ => "❌ Analysis failed.",
                };
                self.finish_upload(UploadOutcome::Failure, status);
            }
            return Err(e);
        }

        self.finish_upload(
            UploadOutcome::Success,
            if has_file {
                "✅ Upload and analysis complete!"
            } else {
                "✅ Analysis complete!"
            },
        );
        self.set_notice("✅ Gemini analysis finished. Keywords updated from server.");
        info!(project_id, has_file, "remote analysis complete");

        // Store is authoritative from here on: keywords first, then stats.
        self.reload().await;
        if self.is_dismissed() {
            return Err(KeywordError::Cancelled);
        }
        Ok(())
    }

    fn finish_upload(&self, outcome: UploadOutcome, status: &str) {
        if self.is_dismissed() {
            return;
        }
        let mut state = self.lock();
        if let Some(upload) = state.upload.as_mut() {
            upload.outcome = Some(outcome);
            upload.status = status.to_string();
            if outcome == UploadOutcome::Success && upload.has_file {
                upload.percent = 100;
            }
        }
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Append a keyword. Ignored when the set is read-only, an operation
    /// is in flight, the word is blank, or it is already present.
    pub fn add_keyword(&self, word: &str) -> bool {
        let mut state = self.lock();
        if !state.keywords.editable || state.phase.is_busy() {
            return false;
        }
        keywords::add_keyword(&mut state.keywords.keywords, word)
    }

    /// Remove the keyword at `index`. Ignored when read-only, busy, or out
    /// of range.
    pub fn remove_keyword(&self, index: usize) -> Option<String> {
        let mut state = self.lock();
        if !state.keywords.editable || state.phase.is_busy() {
            return None;
        }
        keywords::remove_keyword(&mut state.keywords.keywords, index)
    }

    // ========================================================================
    // Saving
    // ========================================================================

    /// Store the current keyword list as the project's authoritative value.
    pub async fn save(&self, prompt: &str) -> Result<(), KeywordError> {
        let Some(project) = self.session.project.as_ref() else {
            return Err(self.reject(KeywordError::Validation(
                "Please select a project first.".to_string(),
            )));
        };

        let previous = self.begin(WorkspacePhase::Saving)?;
        let request = ManualStoreRequest {
            project_id: project.project_id,
            project_name: project.display_name().to_string(),
            raw_query: prompt.to_string(),
            keywords: self.lock().keywords.keywords.clone(),
        };

        match self.cancellable(self.api.manual_store(&request)).await {
            Ok(()) => {
                let mut state = self.lock();
                state.keywords.editable = false;
                state.phase = WorkspacePhase::Idle;
                state.notice = Some("✅ Keywords saved successfully!".to_string());
                info!(
                    project_id = project.project_id,
                    count = request.keywords.len(),
                    "keywords saved"
                );
                Ok(())
            }
            Err(e) => {
                let err = self.fail(e, previous);
                if !self.is_dismissed() {
                    self.set_notice("❌ Failed to save keywords.");
                }
                Err(err)
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn lock(&self) -> MutexGuard<'_, WorkspaceState> {
        // A poisoned lock only means a panic elsewhere; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enter a network phase. Returns the phase being left.
    fn begin(&self, phase: WorkspacePhase) -> Result<WorkspacePhase, KeywordError> {
        if self.is_dismissed() {
            return Err(KeywordError::Cancelled);
        }
        let mut state = self.lock();
        if state.phase.is_busy() {
            let err = KeywordError::Busy(state.phase.activity());
            state.notice = Some(err.notice());
            return Err(err);
        }
        let previous = state.phase;
        state.phase = phase;
        Ok(previous)
    }

    /// Record a failure of the running operation and move to `next`.
    /// Late failures after dismissal leave state untouched.
    fn fail(&self, err: KeywordError, next: WorkspacePhase) -> KeywordError {
        if self.is_dismissed() || matches!(err, KeywordError::Cancelled) {
            return KeywordError::Cancelled;
        }
        let mut state = self.lock();
        state.phase = next;
        state.notice = Some(err.notice());
        warn!(error = %err, phase = ?next, "workspace operation failed");
        err
    }

    /// Record a failure that never started an operation.
    fn reject(&self, err: KeywordError) -> KeywordError {
        if !self.is_dismissed() {
            self.lock().notice = Some(err.notice());
        }
        err
    }

    fn set_notice(&self, notice: &str) {
        self.lock().notice = Some(notice.to_string());
    }

    async fn cancellable<T>(
        &self,
        fut: impl Future<Output = Result<T, KeywordError>>,
    ) -> Result<T, KeywordError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(KeywordError::Cancelled),
            result = fut => result,
        }
    }
}
