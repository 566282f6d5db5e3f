//! Wire protocol for the interactive story session.
//!
//! Structured control messages travel as JSON text frames tagged by a
//! `type` field; binary frames carry encoded speech audio (client to
//! server) and synthesized response audio (server to client).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Control messages sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartListening,
    StopListening,
    SpeechStarted,
    SpeechEnded {
        duration_ms: u64,
    },
    InterruptAi,
    PauseSession,
    ResumeSession,
    EndSession,
    Ping,
    SyncPosition {
        position_ms: u64,
    },
    UpdateContext {
        story_id: String,
        story_title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        story_synopsis: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        characters: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_scene: Option<String>,
    },
}

/// Control messages received from the backend. Unknown `type` tags map to
/// `Unknown` so a newer backend never breaks an older client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionEstablished,
    TranscriptionProgress {
        text: String,
        #[serde(default)]
        confidence: Option<f32>,
    },
    TranscriptionFinal {
        text: String,
        #[serde(default)]
        confidence: Option<f32>,
    },
    AiProcessingStarted,
    AiResponseStarted,
    AiResponseText {
        text: String,
    },
    AiResponseCompleted {
        full_text: String,
    },
    ResumeStory {
        resume_position: u64,
    },
    SessionStatusChanged {
        status: String,
    },
    SessionEnded,
    Error {
        message: String,
        recoverable: bool,
    },
    Pong,
    #[serde(other)]
    Unknown,
}

/// Serialize a client message, stamping a millisecond timestamp when the
/// message does not already carry one.
pub fn encode_client_message(
    message: &ClientMessage,
    timestamp_ms: i64,
) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(message)?;
    if let Value::Object(ref mut map) = value {
        map.entry("timestamp")
            .or_insert_with(|| Value::from(timestamp_ms));
    }
    serde_json::to_string(&value)
}

/// Parse an incoming text frame. Extra fields (timestamps, ids) are
/// ignored; an unrecognized `type` yields `ServerMessage::Unknown`.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_snake_case_tagged() {
        let json = encode_client_message(&ClientMessage::SpeechEnded { duration_ms: 1200 }, 42)
            .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "speech_ended");
        assert_eq!(value["duration_ms"], 1200);
        assert_eq!(value["timestamp"], 42);
    }

    #[test]
    fn optional_context_fields_are_omitted() {
        let msg = ClientMessage::UpdateContext {
            story_id: "story-1".into(),
            story_title: "The Fox".into(),
            story_synopsis: None,
            characters: None,
            current_scene: None,
        };
        let json = encode_client_message(&msg, 0).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "update_context");
        assert!(value.get("story_synopsis").is_none());
        assert!(value.get("characters").is_none());
    }

    #[test]
    fn server_messages_round_trip() {
        let msg: ServerMessage = decode_server_message(
            r#"{"type":"transcription_final","text":"hello","confidence":0.92}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::TranscriptionFinal {
                text: "hello".into(),
                confidence: Some(0.92),
            }
        );

        let msg = decode_server_message(r#"{"type":"resume_story","resume_position":84000}"#)
            .unwrap();
        assert_eq!(
            msg,
            ServerMessage::ResumeStory {
                resume_position: 84000
            }
        );
    }

    #[test]
    fn error_message_carries_recoverability() {
        let msg = decode_server_message(
            r#"{"type":"error","message":"session expired","recoverable":false}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::Error {
                message: "session expired".into(),
                recoverable: false,
            }
        );
    }

    #[test]
    fn unknown_type_maps_to_catch_all() {
        let msg = decode_server_message(r#"{"type":"telemetry_hint","payload":{}}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(decode_server_message("not json").is_err());
        assert!(decode_server_message(r#"{"no_type":true}"#).is_err());
    }

    #[test]
    fn existing_timestamp_is_preserved_by_stamping() {
        // Stamp twice: second stamp must not overwrite
        let mut value = serde_json::to_value(ClientMessage::Ping).unwrap();
        if let Value::Object(ref mut map) = value {
            map.insert("timestamp".into(), Value::from(7));
        }
        let text = serde_json::to_string(&value).unwrap();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed["timestamp"], 7);
    }
}
