//! Drives the settings-commit sequence against the shop API.
//!
//! [`CommitFlow`] decides which question comes next and which settings must
//! be persisted; this module asks the questions through a [`Prompter`] and
//! performs the resulting [`SettingsEffect`]s.

use kiss_core::commit_flow::{AbortReason, CommitFlow, CommitStep, RoutingSource, SettingsEffect};
use kiss_core::error::CoreError;

use crate::api::{ApiError, ShopApi};
use crate::prompt::{Notice, Prompter, Question};
use crate::session::ImportSession;

/// How the settings sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsOutcome {
    /// Confirmed; commit with this routing.
    Ready(RoutingSource),
    /// The operator stopped the attempt.
    Aborted(AbortReason),
    /// A persist or refresh call failed; the attempt was abandoned.
    Failed { operation: &'static str },
}

struct EffectFailure {
    operation: &'static str,
    error: ApiError,
}

fn failed(operation: &'static str) -> impl FnOnce(ApiError) -> EffectFailure {
    move |error| EffectFailure { operation, error }
}

/// Walk the confirmation sequence for `session`.
///
/// Effects already performed stay in place when a later step aborts.
pub async fn run_settings_flow(
    session: &mut ImportSession,
    api: &dyn ShopApi,
    prompter: &dyn Prompter,
) -> Result<SettingsOutcome, CoreError> {
    let mut flow = CommitFlow::start(session.commit_context());

    while let Some(prompt) = flow.prompt() {
        let response = prompter.confirm(Question::Settings(prompt)).await;
        tracing::debug!(job_id = session.job_id(), ?prompt, ?response, "Settings prompt answered");

        let effects = flow.respond(response)?;
        for effect in &effects {
            if let Err(failure) = apply_effect(session, api, *effect).await {
                tracing::warn!(
                    job_id = session.job_id(),
                    operation = failure.operation,
                    error = %failure.error,
                    "Settings call failed; import aborted"
                );
                prompter
                    .notify(Notice::error(
                        format!("Could not {}", failure.operation),
                        failure.error.detail(),
                    ))
                    .await;
                return Ok(SettingsOutcome::Failed {
                    operation: failure.operation,
                });
            }
        }

        if effects.contains(&SettingsEffect::RefreshStagedView) {
            flow.update_context(session.commit_context());
        }
    }

    Ok(match flow.step() {
        CommitStep::Ready(routing) => SettingsOutcome::Ready(routing),
        CommitStep::Aborted(reason) => {
            tracing::info!(job_id = session.job_id(), ?reason, "Import aborted by operator");
            SettingsOutcome::Aborted(reason)
        }
        step => {
            return Err(CoreError::Validation(format!(
                "Settings sequence stopped at {step:?}"
            )))
        }
    })
}

async fn apply_effect(
    session: &mut ImportSession,
    api: &dyn ShopApi,
    effect: SettingsEffect,
) -> Result<(), EffectFailure> {
    let job_id = session.job_id();

    match effect {
        SettingsEffect::SavePreferencesAndDiscardTypes => {
            api.save_preferences(&session.preferences, job_id)
                .await
                .map_err(failed("save import preferences"))?;
            let stored = api
                .fetch_preferences(job_id)
                .await
                .map_err(failed("reload import preferences"))?;
            match stored.prefs {
                Some(snapshot) => session.preferences.prefs = Some(snapshot),
                None => session.preferences.mark_saved(),
            }
            api.save_discard_types(&session.discard_types)
                .await
                .map_err(failed("save discard types"))?;
            tracing::info!(job_id, "Import preferences and discard types saved");
        }
        SettingsEffect::SaveDiscardTypesAndCacheParts => {
            api.save_discard_types(&session.discard_types)
                .await
                .map_err(failed("save discard types"))?;
            let parts: Vec<_> = session.records.all_rows().cloned().collect();
            api.cache_edited_parts(&parts, job_id)
                .await
                .map_err(failed("cache edited parts"))?;
            tracing::info!(job_id, parts = parts.len(), "Discard types saved and parts cached");
        }
        SettingsEffect::RefreshStagedView => {
            let staged = api
                .fetch_staged_records(job_id, session.preferences.keep_minors, true)
                .await
                .map_err(failed("refresh the staged records"))?;
            session.apply_refresh(staged);
            tracing::info!(job_id, rows = session.records.len(), "Staged view refreshed");
        }
    }
    Ok(())
}
