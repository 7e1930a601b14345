//! Submitting a confirmed import to the server.
//!
//! The commit request runs alongside a server-sent progress channel. The
//! channel only feeds the progress text; the request's own result is what
//! decides how the attempt ends.

use std::time::Duration;

use kiss_core::commit_flow::{Response, RoutingSource};
use kiss_core::filters::FilterField;
use kiss_core::types::{JobId, Timestamp};
use tokio::sync::watch;
use uuid::Uuid;

use crate::api::{ApiError, ShopApi};
use crate::messages::{CommitRequest, CommitResponse, ProgressMessage};
use crate::progress::ProgressChannel;
use crate::prompt::{Notice, Prompter, Question};
use crate::session::ImportSession;

/// Timing knobs for a commit attempt.
#[derive(Debug, Clone)]
pub struct CommitConfig {
    /// Pause between the channel announcing its session and submitting.
    pub settle_delay: Duration,
    /// Upper bound on waiting for the channel's session id. `None` waits
    /// until the channel announces itself or closes.
    pub open_timeout: Option<Duration>,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            open_timeout: None,
        }
    }
}

/// Hand-off to the deletion-review workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionHandOff {
    pub job_id: JobId,
    pub report_id: i64,
    pub import_start_time: Timestamp,
}

/// How a submitted commit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The import succeeded. Carries the deletion report to review, if the
    /// operator asked for one.
    Completed { deletion_review: Option<DeletionHandOff> },
    /// The server could not apply these filters. They were cleared in the
    /// live preferences for correction and retry.
    FiltersRejected(Vec<FilterField>),
    /// The server reported a conflict and the operator kept what was
    /// imported.
    PartiallyCompleted,
    /// The server reported a conflict; the sequence filter was cleared for
    /// a manual retry.
    ConflictRetry,
    /// Any other failure; the session stays open for correction.
    Failed { header: String, detail: String },
}

impl CommitOutcome {
    /// Whether the import session is over after this outcome.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::PartiallyCompleted)
    }
}

/// Submit the session's commit records with the confirmed routing.
pub(crate) async fn run_commit(
    session: &mut ImportSession,
    api: &dyn ShopApi,
    prompter: &dyn Prompter,
    routing: RoutingSource,
    config: &CommitConfig,
    attempt_id: Uuid,
) -> CommitOutcome {
    let job_id = session.job_id();
    let progress = session.progress_sender();
    progress.send_replace(String::new());

    let mut channel = open_channel(api, session.session_token(), config, progress, attempt_id).await;
    let sseid = channel
        .as_ref()
        .and_then(|c| c.session_id())
        .map(str::to_string);
    if sseid.is_some() {
        tokio::time::sleep(config.settle_delay).await;
    }

    let mut preferences = session.preferences.clone();
    preferences.use_routes_in_file = routing == RoutingSource::File;
    let request = CommitRequest {
        job_id,
        parts: session.records.commit_records(),
        filters: preferences.filter_lists(),
        preferences,
        routing,
        sseid,
    };

    tracing::info!(
        job_id,
        %attempt_id,
        parts = request.parts.len(),
        ?routing,
        sseid = request.sseid.as_deref().unwrap_or("-"),
        "Submitting import"
    );

    let result = submit(api, &request, channel.as_mut(), progress).await;

    if let Some(channel) = channel.as_mut() {
        channel.close();
    }

    match result {
        Ok(response) => {
            handle_success(session, api, prompter, response, request.parts.len(), attempt_id).await
        }
        Err(e) if e.is_conflict() => handle_conflict(session, prompter, e, attempt_id).await,
        Err(e) => {
            tracing::error!(job_id, %attempt_id, error = %e, "Import failed");
            prompter.notify(Notice::error(e.header(), e.detail())).await;
            CommitOutcome::Failed {
                header: e.header().to_string(),
                detail: e.detail(),
            }
        }
    }
}

/// Open the progress channel and wait for its session id.
///
/// Failing to open is not fatal: the commit is submitted without one.
async fn open_channel(
    api: &dyn ShopApi,
    session_token: &str,
    config: &CommitConfig,
    progress: &watch::Sender<String>,
    attempt_id: Uuid,
) -> Option<ProgressChannel> {
    let mut channel = match api.open_progress_channel(session_token).await {
        Ok(channel) => channel,
        Err(e) => {
            tracing::warn!(%attempt_id, error = %e, "Progress channel unavailable");
            return None;
        }
    };

    let announced = match config.open_timeout {
        Some(limit) => {
            match tokio::time::timeout(limit, wait_for_session(&mut channel, progress)).await {
                Ok(announced) => announced,
                Err(_) => {
                    tracing::warn!(
                        %attempt_id,
                        timeout_ms = limit.as_millis() as u64,
                        "Progress channel did not open in time"
                    );
                    return Some(channel);
                }
            }
        }
        None => wait_for_session(&mut channel, progress).await,
    };

    if !announced {
        tracing::warn!(%attempt_id, "Progress channel closed before announcing a session");
    }
    Some(channel)
}

async fn wait_for_session(channel: &mut ProgressChannel, progress: &watch::Sender<String>) -> bool {
    while let Some(message) = channel.next().await {
        match message {
            ProgressMessage::Session { .. } => return true,
            ProgressMessage::Progress(text) => {
                progress.send_replace(text);
            }
            ProgressMessage::End => return false,
        }
    }
    false
}

/// Send the request, relaying progress until it completes.
async fn submit(
    api: &dyn ShopApi,
    request: &CommitRequest,
    channel: Option<&mut ProgressChannel>,
    progress: &watch::Sender<String>,
) -> Result<CommitResponse, ApiError> {
    let commit = api.commit_import(request);
    tokio::pin!(commit);

    let Some(channel) = channel else {
        return commit.await;
    };

    let mut listening = !channel.is_closed();
    loop {
        tokio::select! {
            result = &mut commit => return result,
            message = channel.next(), if listening => match message {
                Some(ProgressMessage::Progress(text)) => {
                    tracing::debug!(progress = %text, "Import progress");
                    progress.send_replace(text);
                }
                Some(ProgressMessage::Session { .. }) => {}
                Some(ProgressMessage::End) | None => {
                    tracing::debug!("Progress channel finished");
                    listening = false;
                    channel.close();
                }
            },
        }
    }
}

async fn handle_success(
    session: &mut ImportSession,
    api: &dyn ShopApi,
    prompter: &dyn Prompter,
    response: CommitResponse,
    submitted: usize,
    attempt_id: Uuid,
) -> CommitOutcome {
    let job_id = session.job_id();

    if let Some(preferences) = response.preferences.clone() {
        session.preferences = preferences;
    }

    let bad_filters = response.bad_filter_fields();
    if !bad_filters.is_empty() {
        for field in &bad_filters {
            session.preferences.clear_filter(*field);
        }
        let names: Vec<&str> = bad_filters.iter().map(FilterField::as_str).collect();
        tracing::warn!(job_id, filters = %names.join(","), "Server rejected filters; cleared");
        prompter
            .notify(Notice::warning(
                "Filters cleared",
                format!(
                    "These filters could not be applied and were cleared: {}. Correct them and import again.",
                    names.join(", ")
                ),
            ))
            .await;
        return CommitOutcome::FiltersRejected(bad_filters);
    }

    tracing::info!(job_id, %attempt_id, submitted, "Import committed");
    prompter
        .notify(Notice::info(
            "Import complete",
            format!("{submitted} records were imported."),
        ))
        .await;

    if !response.needs_deletion_review() {
        return CommitOutcome::Completed { deletion_review: None };
    }

    if prompter.confirm(Question::ReviewDeletions).await != Response::Accept {
        tracing::info!(job_id, "Deletion review declined");
        return CommitOutcome::Completed { deletion_review: None };
    }

    match api
        .request_deletion_report(job_id, &response.import_start_time)
        .await
    {
        Ok(report) => {
            tracing::info!(job_id, report_id = report.id, "Deletion report ready");
            CommitOutcome::Completed {
                deletion_review: Some(DeletionHandOff {
                    job_id,
                    report_id: report.id,
                    import_start_time: response.import_start_time,
                }),
            }
        }
        Err(e) => {
            tracing::warn!(job_id, error = %e, "Deletion report request failed");
            prompter.notify(Notice::error(e.header(), e.detail())).await;
            CommitOutcome::Completed { deletion_review: None }
        }
    }
}

async fn handle_conflict(
    session: &mut ImportSession,
    prompter: &dyn Prompter,
    error: ApiError,
    attempt_id: Uuid,
) -> CommitOutcome {
    let job_id = session.job_id();
    tracing::warn!(job_id, %attempt_id, error = %error, "Import conflict");

    prompter.notify(Notice::warning(error.header(), error.detail())).await;

    if prompter.confirm(Question::AbortAfterConflict).await == Response::Accept {
        tracing::info!(job_id, "Conflict accepted; import finalized as partial");
        return CommitOutcome::PartiallyCompleted;
    }

    session.preferences.clear_filter(FilterField::Sequences);
    tracing::info!(job_id, "Sequence filter cleared for retry");
    CommitOutcome::ConflictRetry
}
