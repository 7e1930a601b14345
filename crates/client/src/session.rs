//! One operator's import session for a job.
//!
//! [`ImportSession`] owns the staged record set, the live preferences and
//! discard types, and the in-flight guard that keeps a second commit from
//! starting while one is running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kiss_core::commit_flow::{AbortReason, CommitContext};
use kiss_core::error::CoreError;
use kiss_core::preferences::{DiscardSetting, DiscardType, FileHeader, ImportPreferences};
use kiss_core::record_set::{LabelEdit, StagedRecordSet};
use kiss_core::types::{JobId, UniqueNumber};
use tokio::sync::watch;
use uuid::Uuid;

use crate::api::{ApiError, ShopApi};
use crate::commit::{self, CommitConfig, CommitOutcome};
use crate::messages::StagedImport;
use crate::prompt::{Notice, Prompter};
use crate::settings::{self, SettingsOutcome};

// ---------------------------------------------------------------------------
// In-flight guard
// ---------------------------------------------------------------------------

/// Shared "an import is running" flag.
///
/// Clones observe the same flag, so a front-end can disable its import
/// action while [`ImportSession::import`] runs.
#[derive(Debug, Clone, Default)]
pub struct ImportGate {
    busy: Arc<AtomicBool>,
}

impl ImportGate {
    /// Claim the gate, or fail with [`CoreError::Conflict`] if it is held.
    pub fn try_acquire(&self) -> Result<ImportGuard, CoreError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::Conflict("An import is already in progress".to_string()))?;
        Ok(ImportGuard {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the [`ImportGate`] when dropped.
#[derive(Debug)]
pub struct ImportGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for ImportGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// How an [`ImportSession::import`] call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Stopped during the settings sequence; nothing was submitted.
    Aborted(AbortReason),
    /// A settings call failed; nothing was submitted.
    SettingsFailed { operation: &'static str },
    /// The commit was submitted.
    Commit(CommitOutcome),
}

pub struct ImportSession {
    job_id: JobId,
    session_token: String,
    pub(crate) records: StagedRecordSet,
    pub(crate) preferences: ImportPreferences,
    header: FileHeader,
    pub(crate) discard_types: Vec<DiscardType>,
    gate: ImportGate,
    progress: watch::Sender<String>,
    finished: bool,
}

impl ImportSession {
    /// Fetch the staged import for `job_id` and open a session on it.
    pub async fn load(
        api: &dyn ShopApi,
        job_id: JobId,
        keep_minors: bool,
        session_token: String,
    ) -> Result<Self, ApiError> {
        let staged = api.fetch_staged_records(job_id, keep_minors, false).await?;
        let session = Self::from_staged(job_id, session_token, staged);
        tracing::info!(
            job_id,
            rows = session.records.len(),
            routes_in_file = session.header.routes_in_file_found,
            "Staged import loaded"
        );
        Ok(session)
    }

    pub fn from_staged(job_id: JobId, session_token: String, staged: StagedImport) -> Self {
        let (progress, _) = watch::channel(String::new());
        let session = Self {
            job_id,
            session_token,
            records: StagedRecordSet::new(staged.parts),
            preferences: staged.preferences,
            header: staged.file_header,
            discard_types: staged.discard_types,
            gate: ImportGate::default(),
            progress,
            finished: false,
        };
        session.log_invalid_rows();
        session
    }

    fn log_invalid_rows(&self) {
        for (unique_number, errors) in self.records.invalid_rows() {
            tracing::warn!(job_id = self.job_id, unique_number, errors = %errors, "Invalid staged row");
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn records(&self) -> &StagedRecordSet {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut StagedRecordSet {
        &mut self.records
    }

    pub fn preferences(&self) -> &ImportPreferences {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut ImportPreferences {
        &mut self.preferences
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn discard_types(&self) -> &[DiscardType] {
        &self.discard_types
    }

    /// Change how rows of the discard type `shape` are imported. Shapes
    /// match without regard to case.
    pub fn set_discard_setting(&mut self, shape: &str, setting: DiscardSetting) -> Result<(), CoreError> {
        let discard = self
            .discard_types
            .iter_mut()
            .find(|d| d.shape.eq_ignore_ascii_case(shape))
            .ok_or_else(|| CoreError::Validation(format!("Unknown discard type '{shape}'")))?;
        discard.apply(setting);
        tracing::debug!(job_id = self.job_id, shape = %discard.shape, ?setting, "Discard type changed");
        Ok(())
    }

    /// `true` once an import completed; no further import is accepted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn import_gate(&self) -> ImportGate {
        self.gate.clone()
    }

    /// Latest progress text of the running import.
    pub fn subscribe_progress(&self) -> watch::Receiver<String> {
        self.progress.subscribe()
    }

    pub(crate) fn progress_sender(&self) -> &watch::Sender<String> {
        &self.progress
    }

    pub(crate) fn commit_context(&self) -> CommitContext {
        CommitContext::new(&self.preferences, &self.header)
    }

    /// Take the rows and header of a server refresh. Live preferences and
    /// discard types are kept.
    pub(crate) fn apply_refresh(&mut self, staged: StagedImport) {
        self.records.reset(staged.parts);
        self.header = staged.file_header;
        self.log_invalid_rows();
    }

    /// Apply an operator-entered `LabelsNeeded`, telling the operator when
    /// the value is rejected.
    pub async fn edit_labels_needed(
        &mut self,
        prompter: &dyn Prompter,
        unique_number: UniqueNumber,
        labels_needed: i64,
    ) -> Result<LabelEdit, CoreError> {
        let edit = self.records.set_labels_needed(unique_number, labels_needed)?;
        match &edit {
            LabelEdit::Accepted(allocation) => {
                tracing::debug!(
                    unique_number,
                    labels_needed,
                    per_label_marks = allocation.per_label_marks,
                    marks_on_partial_label = allocation.marks_on_partial_label,
                    "Labels needed updated"
                );
            }
            LabelEdit::Rejected(rejection) => {
                tracing::warn!(unique_number, labels_needed, reason = %rejection.reason, "Labels needed rejected");
                prompter
                    .notify(Notice::warning("Invalid labels needed", rejection.to_string()))
                    .await;
            }
        }
        Ok(edit)
    }

    /// Confirm settings and commit the import.
    ///
    /// Refused with [`CoreError::Conflict`] while another import holds the
    /// gate or after the session finished; nothing is sent in that case.
    pub async fn import(
        &mut self,
        api: &dyn ShopApi,
        prompter: &dyn Prompter,
        config: &CommitConfig,
    ) -> Result<ImportOutcome, CoreError> {
        if self.finished {
            return Err(CoreError::Conflict("This import already finished".to_string()));
        }
        let _guard = self.gate.try_acquire()?;

        let attempt_id = Uuid::new_v4();
        tracing::info!(job_id = self.job_id, %attempt_id, "Import requested");

        let routing = match settings::run_settings_flow(self, api, prompter).await? {
            SettingsOutcome::Ready(routing) => routing,
            SettingsOutcome::Aborted(reason) => return Ok(ImportOutcome::Aborted(reason)),
            SettingsOutcome::Failed { operation } => {
                return Ok(ImportOutcome::SettingsFailed { operation })
            }
        };

        let outcome = commit::run_commit(self, api, prompter, routing, config, attempt_id).await;
        if outcome.ends_session() {
            self.finished = true;
        }
        tracing::info!(job_id = self.job_id, %attempt_id, ?outcome, "Import attempt finished");
        Ok(ImportOutcome::Commit(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn gate_refuses_second_claim_until_released() {
        let gate = ImportGate::default();
        let guard = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert_matches!(gate.clone().try_acquire(), Err(CoreError::Conflict(_)));

        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_ok());
    }
}
