//! Append-only record of direct messages the bot has sent.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Cap on stored records. The context digest only ever reads the most
/// recent few, so older records are dropped instead of accumulating for the
/// process lifetime.
const MAX_RECORDS: usize = 100;

/// How many records the context digest includes.
pub const DIGEST_LEN: usize = 5;

/// Whether a send went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Success,
    Failure,
}

/// One side-effecting send: who, what, when, and how it went.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub recipient: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: ActionOutcome,
    pub error_detail: Option<String>,
}

/// Process-local log of direct messages sent on the model's (or a user's)
/// behalf, shared across conversations. Read back into the model context so
/// it remembers what it has already done.
#[derive(Debug, Default)]
pub struct ActionLog {
    records: Mutex<VecDeque<ActionRecord>>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, recipient: &str, content: &str) {
        self.push(ActionRecord {
            recipient: recipient.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
            outcome: ActionOutcome::Success,
            error_detail: None,
        });
    }

    pub fn record_failure(&self, recipient: &str, content: &str, detail: &str) {
        self.push(ActionRecord {
            recipient: recipient.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
            outcome: ActionOutcome::Failure,
            error_detail: Some(detail.to_string()),
        });
    }

    fn push(&self, record: ActionRecord) {
        let mut records = self.records.lock().expect("action log lock poisoned");
        records.push_back(record);
        while records.len() > MAX_RECORDS {
            records.pop_front();
        }
    }

    /// The most recent records, oldest first, at most [`DIGEST_LEN`].
    pub fn recent(&self) -> Vec<ActionRecord> {
        let records = self.records.lock().expect("action log lock poisoned");
        let skip = records.len().saturating_sub(DIGEST_LEN);
        records.iter().skip(skip).cloned().collect()
    }

    /// One-line digest of recent sends for the model context, `None` when
    /// nothing has been sent yet.
    pub fn digest(&self) -> Option<String> {
        let recent = self.recent();
        if recent.is_empty() {
            return None;
        }

        let lines: Vec<String> = recent
            .iter()
            .map(|record| match record.outcome {
                ActionOutcome::Success => {
                    format!("sent a DM to {}: \"{}\"", record.recipient, record.content)
                }
                ActionOutcome::Failure => format!("failed to DM {}", record.recipient),
            })
            .collect();

        Some(lines.join(", "))
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("action log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
