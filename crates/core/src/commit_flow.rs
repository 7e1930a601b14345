//! Pre-commit confirmation sequence for a KISS import.
//!
//! Before an import is committed the operator walks a fixed, linear series
//! of confirmations:
//!
//! 1. Dirty-minors check (only when `KeepMinors` changed since last save).
//! 2. Discard-type save prompt.
//! 3. Routing: use the file's routing if it has any, otherwise require a
//!    routing code or explicit consent to go without one.
//!
//! [`CommitFlow`] is a pure state machine. Each [`CommitFlow::respond`] call
//! advances exactly one step forward and returns the [`SettingsEffect`]s the
//! caller must carry out (persisting settings, refreshing the staged view)
//! before asking the next question. No step ever moves backward, and an
//! abort never rolls back effects already performed.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::preferences::{FileHeader, ImportPreferences};

// ---------------------------------------------------------------------------
// Prompts and responses
// ---------------------------------------------------------------------------

/// A blocking yes/no question put to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    /// "Have the import settings been applied?"
    SettingsApplied,
    /// "Are the discard-type exclusions already saved?"
    SaveDiscardTypes,
    /// "Use the routing found in the import file?"
    UseFileRouting,
    /// "Proceed without a routing code?"
    ProceedWithoutRouteCode,
}

impl Prompt {
    pub fn message(&self) -> &'static str {
        match self {
            Self::SettingsApplied => {
                "Keep minors changed since the last save. Have the import settings been applied?"
            }
            Self::SaveDiscardTypes => {
                "Are the discard type exclusions already saved? Answer no to save them now."
            }
            Self::UseFileRouting => "The import file contains routing. Use the routing from the file?",
            Self::ProceedWithoutRouteCode => "No routing code is selected. Proceed without one?",
        }
    }
}

/// The operator's answer to a [`Prompt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Accept,
    Reject,
    /// Closed without choosing; aborts the commit attempt.
    Dismiss,
}

// ---------------------------------------------------------------------------
// Effects and outcomes
// ---------------------------------------------------------------------------

/// Work the caller performs between two prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsEffect {
    /// Persist the live preferences and the discard types.
    SavePreferencesAndDiscardTypes,
    /// Persist the discard types and cache the edited part rows.
    SaveDiscardTypesAndCacheParts,
    /// Re-fetch the staged rows using the server's cached settings.
    RefreshStagedView,
}

/// Where the committed parts get their routing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingSource {
    /// Routing carried in the import file.
    File,
    /// The routing code selected in the preferences.
    RouteCode,
    /// No routing; the operator agreed to proceed without.
    Unrouted,
}

/// Form control that should receive input focus after an abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusField {
    RouteCode,
}

/// Why a commit attempt stopped before reaching the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The operator closed a prompt without answering.
    Dismissed(Prompt),
    /// The operator declined to proceed without a routing code.
    RouteCodeRequired,
}

impl AbortReason {
    pub fn focus(&self) -> Option<FocusField> {
        match self {
            Self::RouteCodeRequired => Some(FocusField::RouteCode),
            Self::Dismissed(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// The facts the sequence branches on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitContext {
    pub keep_minors_dirty: bool,
    pub routes_in_file_found: bool,
    pub has_route_code: bool,
}

impl CommitContext {
    pub fn new(preferences: &ImportPreferences, header: &FileHeader) -> Self {
        Self {
            keep_minors_dirty: preferences.keep_minors_dirty(),
            routes_in_file_found: header.routes_in_file_found,
            has_route_code: preferences.has_route_code(),
        }
    }
}

/// Current position in the confirmation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStep {
    DirtyMinors,
    DiscardTypes,
    FileRouting,
    RouteCodeRequired,
    /// Confirmed; the commit may be submitted.
    Ready(RoutingSource),
    /// Stopped; the session returns to idle.
    Aborted(AbortReason),
}

impl CommitStep {
    /// Position in the sequence. Strictly increases with every transition.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::DirtyMinors => 1,
            Self::DiscardTypes => 2,
            Self::FileRouting => 3,
            Self::RouteCodeRequired => 4,
            Self::Ready(_) | Self::Aborted(_) => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Aborted(_))
    }

    /// The question asked at this step, if any.
    pub fn prompt(&self) -> Option<Prompt> {
        match self {
            Self::DirtyMinors => Some(Prompt::SettingsApplied),
            Self::DiscardTypes => Some(Prompt::SaveDiscardTypes),
            Self::FileRouting => Some(Prompt::UseFileRouting),
            Self::RouteCodeRequired => Some(Prompt::ProceedWithoutRouteCode),
            Self::Ready(_) | Self::Aborted(_) => None,
        }
    }
}

/// One walk through the confirmation sequence.
#[derive(Debug, Clone)]
pub struct CommitFlow {
    context: CommitContext,
    step: CommitStep,
}

impl CommitFlow {
    /// Begin at the first applicable step.
    pub fn start(context: CommitContext) -> Self {
        let step = if context.keep_minors_dirty {
            CommitStep::DirtyMinors
        } else {
            CommitStep::DiscardTypes
        };
        Self { context, step }
    }

    pub fn step(&self) -> CommitStep {
        self.step
    }

    pub fn prompt(&self) -> Option<Prompt> {
        self.step.prompt()
    }

    pub fn context(&self) -> CommitContext {
        self.context
    }

    /// Replace the branching facts, e.g. after the staged view was
    /// refreshed. The current step is not revisited.
    pub fn update_context(&mut self, context: CommitContext) {
        self.context = context;
    }

    /// Answer the pending prompt and advance.
    ///
    /// Returns the effects to perform before the next prompt. Fails if the
    /// sequence already finished.
    pub fn respond(&mut self, response: Response) -> Result<Vec<SettingsEffect>, CoreError> {
        let Some(prompt) = self.step.prompt() else {
            return Err(finished(self.step));
        };

        if response == Response::Dismiss {
            self.step = CommitStep::Aborted(AbortReason::Dismissed(prompt));
            return Ok(Vec::new());
        }
        let accepted = response == Response::Accept;

        let (next, effects) = match self.step {
            CommitStep::DirtyMinors if accepted => (CommitStep::DiscardTypes, vec![]),
            CommitStep::DirtyMinors => (
                CommitStep::DiscardTypes,
                vec![
                    SettingsEffect::SavePreferencesAndDiscardTypes,
                    SettingsEffect::RefreshStagedView,
                ],
            ),
            CommitStep::DiscardTypes if accepted => (self.routing_step(), vec![]),
            CommitStep::DiscardTypes => (
                self.routing_step(),
                vec![
                    SettingsEffect::SaveDiscardTypesAndCacheParts,
                    SettingsEffect::RefreshStagedView,
                ],
            ),
            CommitStep::FileRouting if accepted => (CommitStep::Ready(RoutingSource::File), vec![]),
            CommitStep::FileRouting => (self.route_code_step(), vec![]),
            CommitStep::RouteCodeRequired if accepted => {
                (CommitStep::Ready(RoutingSource::Unrouted), vec![])
            }
            CommitStep::RouteCodeRequired => {
                (CommitStep::Aborted(AbortReason::RouteCodeRequired), vec![])
            }
            CommitStep::Ready(_) | CommitStep::Aborted(_) => return Err(finished(self.step)),
        };

        self.step = next;
        Ok(effects)
    }

    fn routing_step(&self) -> CommitStep {
        if self.context.routes_in_file_found {
            CommitStep::FileRouting
        } else {
            self.route_code_step()
        }
    }

    fn route_code_step(&self) -> CommitStep {
        if self.context.has_route_code {
            CommitStep::Ready(RoutingSource::RouteCode)
        } else {
            CommitStep::RouteCodeRequired
        }
    }
}

fn finished(step: CommitStep) -> CoreError {
    CoreError::Validation(format!("Commit flow already finished at {step:?}"))
}
