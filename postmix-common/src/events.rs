//! Status events reported to the webhook
//!
//! One `start` and one terminal event (`end` or `error`) per job.

use serde::{Deserialize, Serialize};

/// Stage name identifying this worker in every event
pub const STAGE: &str = "matchering";

/// Lifecycle step reported by a status event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Job accepted, assets about to be staged
    Start,
    /// Result uploaded
    End,
    /// Job aborted
    Error,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::End => "end",
            Action::Error => "error",
        }
    }

    /// True for `end` and `error`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Action::Start)
    }
}

/// Webhook payload
///
/// Absent `fileName`/`errMsg` serialize as `null`, never omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(rename = "songID")]
    pub song_id: i64,
    pub stage: String,
    pub action: Action,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
    #[serde(rename = "errMsg")]
    pub err_msg: Option<String>,
}

impl StatusEvent {
    pub fn start(song_id: i64) -> Self {
        Self::new(song_id, Action::Start, None, None)
    }

    pub fn end(song_id: i64, file_name: impl Into<String>) -> Self {
        Self::new(song_id, Action::End, Some(file_name.into()), None)
    }

    pub fn error(song_id: i64, err_msg: impl Into<String>) -> Self {
        Self::new(song_id, Action::Error, None, Some(err_msg.into()))
    }

    fn new(
        song_id: i64,
        action: Action,
        file_name: Option<String>,
        err_msg: Option<String>,
    ) -> Self {
        Self {
            song_id,
            stage: STAGE.to_string(),
            action,
            file_name,
            err_msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_event_serializes_nulls() {
        let value = serde_json::to_value(StatusEvent::start(7)).unwrap();
        assert_eq!(
            value,
            json!({
                "songID": 7,
                "stage": "matchering",
                "action": "start",
                "fileName": null,
                "errMsg": null
            })
        );
    }

    #[test]
    fn test_end_and_error_payloads() {
        let end = serde_json::to_value(StatusEvent::end(42, "final_song_42_2.wav")).unwrap();
        assert_eq!(end["action"], "end");
        assert_eq!(end["fileName"], "final_song_42_2.wav");
        assert!(end["errMsg"].is_null());

        let err = serde_json::to_value(StatusEvent::error(42, "boom")).unwrap();
        assert_eq!(err["action"], "error");
        assert_eq!(err["errMsg"], "boom");
        assert!(err["fileName"].is_null());
    }

    #[test]
    fn test_terminal_actions() {
        assert!(!Action::Start.is_terminal());
        assert!(Action::End.is_terminal());
        assert!(Action::Error.is_terminal());
    }
}
