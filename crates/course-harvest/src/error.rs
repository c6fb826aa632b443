// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Classified faults raised by the extraction pipeline.
//!
//! Absence conditions (a missing element or control) are never errors; they
//! are `Option`/`bool` values branched on at the call site. The variants here
//! cover the faults that abandon a resource, and the one fault that aborts the
//! whole run ([`HarvestError::AuthenticationFailed`]).

/// All errors the pipeline classifies.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// Login was submitted but the session is still unauthenticated.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The login page did not render the expected credential fields.
    #[error("Login form not found at {0}")]
    LoginFormMissing(String),

    /// A download-triggering action completed without any download starting.
    #[error("No download started for {0}")]
    NoDownload(String),

    /// A folder page has no "download as archive" control.
    #[error("No archive download control on {0}")]
    NoDownloadControl(String),

    /// An external link neither left the portal nor showed a workaround notice.
    #[error("Could not resolve external link {name} (ended at {url})")]
    UnresolvedLink { name: String, url: String },

    /// A quiz offers neither a resume nor a start control.
    #[error("Quiz cannot be entered: {0}")]
    QuizUnavailable(String),

    /// An attempt was entered but lists no question controls.
    #[error("No question controls found in quiz {0}")]
    NoQuestions(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarvestError {
    /// Whether this fault must terminate the run rather than one resource.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::AuthenticationFailed(_) | HarvestError::LoginFormMissing(_)
        )
    }
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;
