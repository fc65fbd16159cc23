//! # Session Events
//!
//! Server-push frames for one research session.
//!
//! A session produces any number of `state` frames followed by exactly one
//! terminal `complete` or `error` frame. [`EventStream`] enforces that: once
//! a terminal frame is emitted every further emit is refused.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Kind of frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Snapshot of the session so far
    State,
    /// Final report, session succeeded
    Complete,
    /// Session failed
    Error,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::State => "state",
            FrameKind::Complete => "complete",
            FrameKind::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, FrameKind::State)
    }
}

/// One named event with a JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub kind: FrameKind,
    pub data: Value,
}

impl Frame {
    /// SSE wire format: `event: <kind>\ndata: <json>\n\n`
    pub fn to_sse(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.kind.as_str(), self.data)
    }
}

/// Payload of the `complete` frame
#[derive(Debug, Serialize)]
pub struct CompletePayload<'a> {
    pub status: &'static str,
    pub final_report: &'a str,
}

impl<'a> CompletePayload<'a> {
    pub fn success(final_report: &'a str) -> Self {
        Self {
            status: "success",
            final_report,
        }
    }
}

/// Payload of the `error` frame
#[derive(Debug, Serialize)]
pub struct ErrorPayload<'a> {
    pub error: &'a str,
    pub logs: &'a [String],
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("event stream consumer is gone")]
    Closed,
    #[error("session already emitted its terminal frame")]
    Terminated,
    #[error("failed to serialize frame payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Ordered frame sink for one session
#[derive(Debug)]
pub struct EventStream {
    tx: mpsc::Sender<Frame>,
    terminated: bool,
}

impl EventStream {
    /// Bounded channel; the receiver is the consumer side (SSE response, CLI)
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                terminated: false,
            },
            rx,
        )
    }

    /// Emit one frame. Waits while the consumer is behind.
    pub async fn emit<T: Serialize + ?Sized>(
        &mut self,
        kind: FrameKind,
        payload: &T,
    ) -> Result<(), StreamError> {
        if self.terminated {
            return Err(StreamError::Terminated);
        }
        let data = serde_json::to_value(payload)?;
        if kind.is_terminal() {
            self.terminated = true;
        }
        self.tx
            .send(Frame { kind, data })
            .await
            .map_err(|_| StreamError::Closed)
    }

    /// Resolves once the consumer has dropped its receiver
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}
