//! Progress events for long-running session work.
//!
//! Every session gets its own broadcast channel; transports subscribe and
//! forward events (the HTTP server streams them as SSE).

use crate::util::types::Answer;
use dashmap::DashMap;
use log::trace;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        total: usize,
        timestamp: i64,
    },
    Progress {
        current: usize,
        total: usize,
        status: String,
        timestamp: i64,
    },
    Completed {
        answers: Vec<Answer>,
        elapsed_secs: f64,
        timestamp: i64,
    },
    Failed {
        error: String,
        timestamp: i64,
    },
    Cancelled {
        timestamp: i64,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed { .. } | ProgressEvent::Failed { .. } | ProgressEvent::Cancelled { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::Started { .. } => "started",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Completed { .. } => "completed",
            ProgressEvent::Failed { .. } => "failed",
            ProgressEvent::Cancelled { .. } => "cancelled",
        }
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Default)]
pub struct ProgressHub {
    channels: DashMap<String, broadcast::Sender<ProgressEvent>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, session_id: &str) -> broadcast::Sender<ProgressEvent> {
        self.channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<ProgressEvent> {
        self.sender(session_id).subscribe()
    }

    /// Send to current subscribers; events with no listener are dropped.
    pub fn emit(&self, session_id: &str, event: ProgressEvent) {
        trace!("Progress event: session_id={}, event={}", session_id, event.name());
        if let Some(sender) = self.channels.get(session_id) {
            let _ = sender.send(event);
        }
    }

    pub fn remove(&self, session_id: &str) {
        self.channels.remove(session_id);
    }
}
