//! Compute history: an ordered, append-only list of attempts per record,
//! each with append-only output streams (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which stream an [`OutputStream`] blob belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Stdout,
    Stderr,
    Error,
}

/// An append-only blob for one `(record, stream_kind)` pair. Concurrent
/// appends serialise on the stream row (§5).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputStream {
    pub kind_buffers: std::collections::HashMap<String, String>,
}

impl OutputStream {
    pub fn append(&mut self, kind: StreamKind, chunk: &str) {
        self.kind_buffers
            .entry(kind_key(kind))
            .or_default()
            .push_str(chunk);
    }

    pub fn get(&self, kind: StreamKind) -> Option<&str> {
        self.kind_buffers.get(&kind_key(kind)).map(String::as_str)
    }
}

fn kind_key(kind: StreamKind) -> String {
    match kind {
        StreamKind::Stdout => "stdout",
        StreamKind::Stderr => "stderr",
        StreamKind::Error => "error",
    }
    .to_string()
}

/// One entry in a record's compute history: a single worker attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub manager_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub provenance: Value,
    pub streams: OutputStream,
    /// `None` while the attempt is open; `Some(true)` on success,
    /// `Some(false)` on failure.
    pub succeeded: Option<bool>,
}

impl Attempt {
    /// Open a new attempt for the given manager.
    pub fn open(manager_id: impl Into<String>) -> Self {
        Self {
            manager_id: manager_id.into(),
            started_at: Utc::now(),
            ended_at: None,
            provenance: Value::Null,
            streams: OutputStream::default(),
            succeeded: None,
        }
    }

    /// Close an already-open attempt with a verdict.
    pub fn close(&mut self, succeeded: bool) {
        self.ended_at = Some(Utc::now());
        self.succeeded = Some(succeeded);
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_are_ordered_within_a_stream() {
        let mut streams = OutputStream::default();
        streams.append(StreamKind::Stdout, "line 1\n");
        streams.append(StreamKind::Stdout, "line 2\n");
        assert_eq!(streams.get(StreamKind::Stdout), Some("line 1\nline 2\n"));
    }

    #[test]
    fn stream_kinds_are_independent() {
        let mut streams = OutputStream::default();
        streams.append(StreamKind::Stdout, "out");
        streams.append(StreamKind::Stderr, "err");
        assert_eq!(streams.get(StreamKind::Stdout), Some("out"));
        assert_eq!(streams.get(StreamKind::Stderr), Some("err"));
        assert_eq!(streams.get(StreamKind::Error), None);
    }

    #[test]
    fn attempt_lifecycle() {
        let mut attempt = Attempt::open("manager-1");
        assert!(attempt.is_open());
        attempt.close(true);
        assert!(!attempt.is_open());
        assert_eq!(attempt.succeeded, Some(true));
    }
}
