//! Server-Sent Events decoding for the backend's reply stream.
//!
//! The backend frames its reply as SSE with base64-encoded payloads. The
//! decoder works strictly line by line: an `event:` line updates the current
//! event name, and every `data:` line emits immediately under that name —
//! it does not wait for a blank-line terminator. Blank lines are separators
//! and are skipped; anything else is ignored.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

pub const EVENT_CONVERSATION_IDS: &str = "conversation-and-segment-id";
pub const EVENT_STEP_UPDATE: &str = "step-update";
pub const EVENT_RESPONSE_UPDATED: &str = "response-updated";

/// One decoded wire event. Produced by [`EventDecoder`], consumed immediately
/// by the turn driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Backend-assigned identifiers for the conversation and the segment the
    /// current turn is writing. Either may be absent.
    ConversationIds {
        conversation_id: Option<String>,
        segment_id: Option<String>,
    },
    /// Progress notice such as "Thinking".
    Status(String),
    /// Piece of assistant text, appended to what came before it.
    Chunk(String),
}

/// Stateful line decoder. Retains the most recently seen event name across
/// lines, so a run of `data:` lines all emit under the same name.
#[derive(Debug, Default)]
pub struct EventDecoder {
    current_event: Option<String>,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw line from the transport. Returns an event when the line
    /// is a `data:` line with a recognized current event name.
    pub fn decode_line(&mut self, line: &str) -> Option<StreamEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if let Some(name) = line.strip_prefix("event:") {
            self.current_event = Some(name.trim().to_string());
            return None;
        }
        if let Some(payload) = line.strip_prefix("data:") {
            // A data line before any event line has nothing to emit under.
            let name = self.current_event.as_deref()?;
            return classify(name, decode_payload(payload.trim()));
        }
        None
    }
}

/// Base64-decode a payload into UTF-8 text. Decoding failure is not fatal to
/// the stream: the raw payload passes through unchanged.
pub fn decode_payload(raw: &str) -> String {
    match STANDARD.decode(raw) {
        Ok(bytes) => String::from_utf8(bytes).unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct IdPayload {
    #[serde(rename = "ConversationId")]
    conversation_id: Option<String>,
    #[serde(rename = "ConversationSegmentId")]
    segment_id: Option<String>,
}

fn classify(name: &str, payload: String) -> Option<StreamEvent> {
    match name {
        EVENT_CONVERSATION_IDS => {
            // An unparsable id payload is skipped, not fatal.
            let ids = serde_json::from_str::<IdPayload>(&payload).ok()?;
            Some(StreamEvent::ConversationIds {
                conversation_id: ids.conversation_id,
                segment_id: ids.segment_id,
            })
        }
        EVENT_STEP_UPDATE => Some(StreamEvent::Status(payload)),
        EVENT_RESPONSE_UPDATED => Some(StreamEvent::Chunk(payload)),
        _ => None,
    }
}
