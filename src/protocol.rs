//! # Stream Protocol Types
//!
//! The JSON message grammar exchanged over `/ws/sessions/{id}` (and reused, field-for-field,
//! by the REST adapter's chunk/end endpoints). Any text frame that parses as JSON is either the
//! explicit `{"type":"end"}` message or a chunk candidate — shape problems within a chunk
//! candidate (missing `chunk_seq`, missing `frames`) are reported by the dispatcher as their
//! own distinct error kinds, not folded into `invalid_json`. Only text that fails to parse as
//! JSON at all becomes `Unknown`.

use serde::Serialize;
use serde_json::Value;

/// A parsed inbound stream message.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Chunk(ChunkMessage),
    End,
    /// Text that did not parse as JSON at all.
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ChunkMessage {
    /// Present and an integer, or this chunk fails with `missing_chunk_seq`.
    pub chunk_seq: Option<Value>,
    /// Advisory; substituted with the ingested count when absent or non-integer.
    pub n: Option<Value>,
    /// Present and an array, or this chunk fails with `missing_frames`.
    pub frames: Option<Value>,
}

impl InboundMessage {
    /// Parses a raw text frame. Only a JSON parse failure produces `Unknown`; a well-formed
    /// JSON object missing `chunk_seq` or `frames` still becomes a `Chunk` candidate so the
    /// dispatcher can report the specific shape violation.
    pub fn parse(raw: &str) -> Self {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => return InboundMessage::Unknown,
        };

        if value.get("type").and_then(Value::as_str) == Some("end") {
            return InboundMessage::End;
        }

        InboundMessage::Chunk(ChunkMessage {
            chunk_seq: value.get("chunk_seq").cloned(),
            n: value.get("n").cloned(),
            frames: value.get("frames").cloned(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "ack")]
    Ack { chunk_seq: Value, received: u32 },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "progress")]
    Progress { stage: &'static str },
}

impl OutboundMessage {
    pub fn progress_processing() -> Self {
        OutboundMessage::Progress { stage: "processing" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_end_message() {
        assert!(matches!(
            InboundMessage::parse(r#"{"type":"end"}"#),
            InboundMessage::End
        ));
    }

    #[test]
    fn parses_chunk_message() {
        let msg = InboundMessage::parse(r#"{"chunk_seq":0,"n":1,"frames":["AAAA"]}"#);
        match msg {
            InboundMessage::Chunk(c) => {
                assert_eq!(c.chunk_seq, Some(Value::from(0)));
                assert_eq!(c.frames, Some(Value::from(vec!["AAAA".to_string()])));
            }
            _ => panic!("expected chunk"),
        }
    }

    #[test]
    fn invalid_json_is_unknown() {
        assert!(matches!(InboundMessage::parse("not json"), InboundMessage::Unknown));
    }

    #[test]
    fn well_formed_json_missing_fields_is_still_a_chunk_candidate() {
        match InboundMessage::parse(r#"{"foo":"bar"}"#) {
            InboundMessage::Chunk(c) => {
                assert!(c.chunk_seq.is_none());
                assert!(c.frames.is_none());
            }
            _ => panic!("expected chunk candidate"),
        }
    }

    #[test]
    fn ack_serializes_with_tag() {
        let ack = OutboundMessage::Ack {
            chunk_seq: Value::from(3),
            received: 2,
        };
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["type"], "ack");
        assert_eq!(json["chunk_seq"], 3);
        assert_eq!(json["received"], 2);
    }
}
