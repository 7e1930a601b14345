//! In-memory [`ShopApi`] and scripted [`Prompter`] shared by the
//! integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use kiss_client::api::{ApiError, ShopApi};
use kiss_client::commit::CommitConfig;
use kiss_client::messages::{
    CommitRequest, CommitResponse, DeletionReport, ProgressMessage, StagedImport,
};
use kiss_client::progress::ProgressChannel;
use kiss_client::prompt::{Notice, Prompter, Question};
use kiss_client::session::ImportSession;
use kiss_core::commit_flow::Response;
use kiss_core::preferences::{DiscardType, FileHeader, ImportPreferences};
use kiss_core::staged_part::StagedPart;
use kiss_core::status::ImportStatus;
use kiss_core::types::{JobId, Timestamp};

pub const JOB_ID: JobId = 1042;

// ---------------------------------------------------------------------------
// Fake API
// ---------------------------------------------------------------------------

/// What the fake server answers to a commit.
#[derive(Clone)]
pub enum CommitReply {
    Success(CommitResponse),
    Conflict,
    ServerError,
}

pub struct FakeApi {
    calls: Mutex<Vec<String>>,
    commits: Mutex<Vec<CommitRequest>>,
    /// Messages the progress channel delivers; `None` refuses to open.
    pub progress_script: Option<Vec<ProgressMessage>>,
    /// Keep the channel open after the script until it is closed.
    pub hold_channel_open: bool,
    pub commit_reply: CommitReply,
    pub commit_delay: Duration,
    pub refresh: StagedImport,
    /// Name of an operation that fails with a server error.
    pub fail_operation: Option<&'static str>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
            progress_script: Some(vec![ProgressMessage::Session {
                sseid: "sse-1".into(),
            }]),
            hold_channel_open: false,
            commit_reply: CommitReply::Success(success()),
            commit_delay: Duration::ZERO,
            refresh: staged(ImportPreferences::default(), false),
            fail_operation: None,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commits(&self) -> Vec<CommitRequest> {
        self.commits.lock().unwrap().clone()
    }

    fn record(&self, call: &str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call.to_string());
        if self.fail_operation == Some(call) {
            return Err(ApiError::from_status(
                500,
                r#"{"Header":"Save failed","Detail":"database unavailable"}"#,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ShopApi for FakeApi {
    async fn fetch_staged_records(
        &self,
        _job_id: JobId,
        keep_minors: bool,
        use_cached_settings: bool,
    ) -> Result<StagedImport, ApiError> {
        self.record(&format!(
            "fetch_staged_records(keep_minors={keep_minors}, cached={use_cached_settings})"
        ))?;
        Ok(self.refresh.clone())
    }

    async fn fetch_preferences(&self, _job_id: JobId) -> Result<ImportPreferences, ApiError> {
        self.record("fetch_preferences")?;
        Ok(self.refresh.preferences.clone())
    }

    async fn cache_edited_parts(&self, _parts: &[StagedPart], _job_id: JobId) -> Result<(), ApiError> {
        self.record("cache_edited_parts")
    }

    async fn save_preferences(
        &self,
        _preferences: &ImportPreferences,
        _job_id: JobId,
    ) -> Result<(), ApiError> {
        self.record("save_preferences")
    }

    async fn save_discard_types(&self, _discard_types: &[DiscardType]) -> Result<(), ApiError> {
        self.record("save_discard_types")
    }

    async fn commit_import(&self, request: &CommitRequest) -> Result<CommitResponse, ApiError> {
        self.record("commit_import")?;
        self.commits.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.commit_delay).await;
        match &self.commit_reply {
            CommitReply::Success(response) => Ok(response.clone()),
            CommitReply::Conflict => Err(ApiError::from_status(
                409,
                r#"{"Header":"Sequence conflict","Detail":"Sequence 4 already imported"}"#,
            )),
            CommitReply::ServerError => Err(ApiError::from_status(
                500,
                r#"{"Header":"Import failed","Detail":"Shape W8X31 is unknown"}"#,
            )),
        }
    }

    async fn request_deletion_report(
        &self,
        _job_id: JobId,
        _import_start_time: &Timestamp,
    ) -> Result<DeletionReport, ApiError> {
        self.record("request_deletion_report")?;
        Ok(DeletionReport { id: 77 })
    }

    async fn open_progress_channel(&self, _session_token: &str) -> Result<ProgressChannel, ApiError> {
        self.record("open_progress_channel")?;
        let Some(script) = self.progress_script.clone() else {
            return Err(ApiError::from_status(503, "progress unavailable"));
        };

        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let closed = cancel.clone();
        let hold_open = self.hold_channel_open;
        tokio::spawn(async move {
            for message in script {
                if tx.send(message).await.is_err() {
                    return;
                }
            }
            if hold_open {
                closed.cancelled().await;
            }
        });
        Ok(ProgressChannel::new(rx, cancel))
    }
}

// ---------------------------------------------------------------------------
// Scripted operator
// ---------------------------------------------------------------------------

/// Answers questions from a fixed script; dismisses once it runs out.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Response>>,
    asked: Mutex<Vec<Question>>,
    notices: Mutex<Vec<Notice>>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[Response]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            asked: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<Question> {
        self.asked.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn confirm(&self, question: Question) -> Response {
        self.asked.lock().unwrap().push(question);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Response::Dismiss)
    }

    async fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn part(unique_number: i64, quantity: i64, status: ImportStatus) -> StagedPart {
    let mut part = StagedPart::new(unique_number, quantity);
    part.status = status;
    part.piecemark = format!("PM{unique_number}");
    part
}

pub fn staged(preferences: ImportPreferences, routes_in_file_found: bool) -> StagedImport {
    StagedImport {
        parts: vec![
            part(1, 10, ImportStatus::Create),
            part(2, 4, ImportStatus::NoImport),
            part(3, 1, ImportStatus::Update),
        ],
        file_header: FileHeader {
            routes_in_file_found,
            ..Default::default()
        },
        preferences,
        discard_types: vec![DiscardType::new("PL")],
    }
}

/// Preferences with a routing code and nothing unsaved.
pub fn routed_preferences() -> ImportPreferences {
    let mut preferences = ImportPreferences {
        route_code_id: Some(5),
        route_code: Some("FAB".into()),
        ..Default::default()
    };
    preferences.mark_saved();
    preferences
}

pub fn success() -> CommitResponse {
    CommitResponse {
        bad_filters: None,
        need_to_delete_records: None,
        import_start_time: Utc::now(),
        preferences: None,
    }
}

pub fn session(preferences: ImportPreferences, routes_in_file_found: bool) -> ImportSession {
    ImportSession::from_staged(
        JOB_ID,
        "token-abc".into(),
        staged(preferences, routes_in_file_found),
    )
}

pub fn fast_config() -> CommitConfig {
    CommitConfig {
        settle_delay: Duration::ZERO,
        open_timeout: Some(Duration::from_secs(5)),
    }
}
