//! The operator, as seen by the import drivers.
//!
//! Every interaction is blocking from the driver's point of view: a
//! [`Question`] is answered with a [`Response`], a [`Notice`] is
//! acknowledged before the driver continues.

use async_trait::async_trait;
use kiss_core::commit_flow::{Prompt, Response};

/// A yes/no question put to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Question {
    /// A step of the settings-commit sequence.
    Settings(Prompt),
    /// The import left destination records that may need deleting.
    ReviewDeletions,
    /// The server rejected the import with a conflict.
    AbortAfterConflict,
}

impl Question {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Settings(prompt) => prompt.message(),
            Self::ReviewDeletions => {
                "Some existing records are not in the import file. Review them for deletion now?"
            }
            Self::AbortAfterConflict => {
                "The import conflicts with existing records. Stop here and keep what was imported? \
                 Answer no to clear the sequence filter and try again."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message the operator must acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub detail: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Info, title, detail)
    }

    pub fn warning(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Warning, title, detail)
    }

    pub fn error(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Error, title, detail)
    }

    fn with_level(level: NoticeLevel, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            detail: detail.into(),
        }
    }
}

/// Blocking confirmation and notice surface.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn confirm(&self, question: Question) -> Response;

    async fn notify(&self, notice: Notice);
}
