// Per-request state machine

use std::fmt;

use super::errors::DownloadError;

/// Request states. They only move forward: `Resolving → Selecting →
/// Materializing → Streaming → Closed`, or to `Failed` before streaming ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Resolving,
    Selecting,
    Materializing,
    Streaming,
    Closed,
    Failed,
}

impl RequestState {
    pub fn can_advance_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Resolving, Selecting)
                | (Selecting, Materializing)
                | (Materializing, Streaming)
                | (Streaming, Closed)
                | (Resolving | Selecting | Materializing | Streaming, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::Selecting => "selecting",
            Self::Materializing => "materializing",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks one request from resolution until its stream is closed.
///
/// Created by the orchestrator and handed to the stream once the request
/// reaches `Streaming`. Every transition is logged at debug level.
#[derive(Debug)]
pub struct Lifecycle {
    state: RequestState,
    history: Vec<RequestState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: RequestState::Resolving,
            history: vec![RequestState::Resolving],
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Every state entered so far, oldest first
    pub fn history(&self) -> &[RequestState] {
        &self.history
    }

    /// Move to `next`. Invalid transitions are logged and ignored, so a
    /// terminal state is never left.
    pub fn advance(&mut self, next: RequestState) {
        if !self.state.can_advance_to(next) {
            tracing::warn!(from = %self.state, to = %next, "ignoring invalid request state transition");
            return;
        }
        tracing::debug!(from = %self.state, to = %next, "request state");
        self.state = next;
        self.history.push(next);
    }

    pub fn fail(&mut self, error: &DownloadError) {
        tracing::warn!(
            state = %self.state,
            error = %error,
            diagnostics = error.diagnostics().unwrap_or(""),
            "request failed"
        );
        self.advance(RequestState::Failed);
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
