// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for run telemetry.
//!
//! The pipeline emits `ProgressEvent`s as it works through courses,
//! resources and quiz questions. They flow through a
//! `tokio::sync::broadcast` channel to the terminal renderer. When no
//! subscriber exists, events are silently dropped.

use crate::model::ResourceKind;
use serde::{Deserialize, Serialize};

/// A progress event emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    CourseStarted { name: String, url: String },
    ResourceStarted {
        section: String,
        name: String,
        kind: ResourceKind,
    },
    ResourceCompleted { name: String, kind: ResourceKind },
    /// Extraction of one resource was abandoned; the run continues.
    ResourceFailed {
        name: String,
        kind: ResourceKind,
        reason: String,
    },
    QuestionProcessed {
        quiz: String,
        number: String,
        completed: bool,
        /// The content may lack test-case detail.
        partial: bool,
    },
    QuizSkipped { name: String, reason: String },
    /// A non-fatal warning occurred.
    Warning { message: String },
    RunComplete {
        courses: u32,
        resources: u32,
        elapsed_ms: u64,
    },
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, silently ignoring send errors (which occur when
/// no receivers are listening).
pub fn emit(tx: &Option<ProgressSender>, run_id: &str, seq: &mut u64, event: ProgressEventKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent {
            run_id: run_id.to_string(),
            seq: *seq,
            event,
        });
    }
}

/// Per-run emitter carrying the run id and sequence counter.
#[derive(Debug, Clone)]
pub struct Progress {
    tx: Option<ProgressSender>,
    run_id: String,
    seq: u64,
}

impl Progress {
    pub fn new(tx: Option<ProgressSender>) -> Self {
        Self {
            tx,
            run_id: uuid::Uuid::new_v4().to_string(),
            seq: 0,
        }
    }

    /// An emitter with no listeners.
    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(&mut self, event: ProgressEventKind) {
        emit(&self.tx, &self.run_id, &mut self.seq, event);
    }

    /// Surface a tolerated fault: as a warning event when someone is
    /// listening, otherwise as a log line.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.tx.is_some() {
            tracing::debug!("{message}");
        } else {
            tracing::warn!("{message}");
        }
        self.emit(ProgressEventKind::Warning { message });
    }
}
