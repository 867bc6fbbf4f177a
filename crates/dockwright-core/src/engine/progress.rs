use super::scores::ScoreRecord;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::trace;

/// An event in one docking job's progress stream.
///
/// Serialized as a JSON object tagged by `type` with camelCase payload keys, so a
/// transport layer can forward events verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgressEvent {
    Start {
        total: usize,
        message: String,
    },
    Progress {
        current: usize,
        total: usize,
        percent: u8,
    },
    Score {
        score: f64,
        desc: String,
        line: String,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        best_score: f64,
        best_model: String,
        pdb_path: Option<PathBuf>,
        index: Option<u32>,
        all_models: Vec<ScoreRecord>,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Complete { .. } | ProgressEvent::Error { .. }
        )
    }
}

/// `min(100, round(100 * current / total))`, with an empty run reported as done.
pub fn percent(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let value = (100.0 * current as f64 / total as f64).round();
    value.min(100.0) as u8
}

/// Sending half of a job's event stream.
///
/// Events are dropped silently once the receiver is gone; a job keeps running even if
/// nobody is listening.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

pub type EventStream = mpsc::UnboundedReceiver<ProgressEvent>;

impl EventSink {
    pub fn channel() -> (Self, EventStream) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    #[inline]
    pub fn send(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            trace!("Progress event dropped; receiver closed.");
        }
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(ProgressEvent::Error {
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn percent_rounds_and_saturates() {
        assert_eq!(percent(0, 10), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(15, 10), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn events_serialize_with_type_tag_and_camel_case_keys() {
        let event = ProgressEvent::Complete {
            best_score: -135.2,
            best_model: "complex_input_full_0003".to_string(),
            pdb_path: None,
            index: Some(3),
            all_models: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "complete",
                "bestScore": -135.2,
                "bestModel": "complex_input_full_0003",
                "pdbPath": null,
                "index": 3,
                "allModels": [],
            })
        );
        let progress = ProgressEvent::Progress {
            current: 2,
            total: 4,
            percent: 50,
        };
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            json!({"type": "progress", "current": 2, "total": 4, "percent": 50})
        );
    }

    #[test]
    fn only_complete_and_error_are_terminal() {
        assert!(ProgressEvent::Error { message: "x".into() }.is_terminal());
        assert!(
            !ProgressEvent::Start {
                total: 1,
                message: String::new()
            }
            .is_terminal()
        );
    }

    #[tokio::test]
    async fn sink_delivers_in_order_and_ignores_closed_receiver() {
        let (sink, mut stream) = EventSink::channel();
        sink.error("first");
        sink.error("second");
        assert_eq!(
            stream.recv().await,
            Some(ProgressEvent::Error {
                message: "first".into()
            })
        );
        assert!(matches!(stream.recv().await, Some(ProgressEvent::Error { .. })));
        drop(stream);
        sink.error("nobody listening");
    }
}
