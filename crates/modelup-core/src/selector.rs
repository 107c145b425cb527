//! The interactive decision points of a run.
//!
//! The core asks yes/no and pick-some questions through [`VersionSelector`];
//! the CLI answers them with terminal prompts and tests answer them from a
//! script.

use crate::error::UpdaterError;
use thiserror::Error;

/// Why a prompt produced no answer.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// The user interrupted the prompt (Ctrl-C, Esc).
    #[error("Cancelled by user")]
    Interrupted,

    /// The prompt could not be shown or read.
    #[error("Prompt failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SelectionError> for UpdaterError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::Interrupted => UpdaterError::UserCancelled,
            SelectionError::Io(e) => UpdaterError::Prompt {
                message: e.to_string(),
                source: Some(e),
            },
        }
    }
}

/// Asks the user to approve updates.
///
/// Calls are blocking and happen one at a time. Any error aborts the whole
/// run.
pub trait VersionSelector: Send + Sync {
    /// Yes/no question.
    fn confirm(&self, message: &str) -> Result<bool, SelectionError>;

    /// Choose any subset of `options`, in the order given. An empty
    /// selection means "skip".
    fn choose_many(&self, message: &str, options: &[String])
        -> Result<Vec<String>, SelectionError>;
}
