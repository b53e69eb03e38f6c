//! Wire request construction.
//!
//! The endpoint and body shape depend on whether the conversation is already
//! established. Building is pure: nothing here mutates [`ConversationState`];
//! the driver applies state changes only after the turn succeeds.

use serde::Serialize;

use crate::conversation::{ConversationPhase, ConversationState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    CreateConversation,
    AppendSegment { conversation_id: String },
}

impl Endpoint {
    pub fn path(&self, config_state_id: &str) -> String {
        match self {
            Endpoint::CreateConversation => {
                format!("/api/internal/configStates/{config_state_id}/conversations")
            }
            Endpoint::AppendSegment { conversation_id } => format!(
                "/api/internal/configStates/{config_state_id}/conversations/{conversation_id}/segments"
            ),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_identifier: String,
}

/// Body for the first turn of a conversation.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationBody {
    pub question: String,
    pub vision_image_ids: Vec<String>,
    pub attachment_ids: Vec<String>,
    pub session: SessionRef,
}

/// Body for a follow-up turn; `parent_id` points at the previous segment.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppendSegmentBody {
    pub question: String,
    pub parent_id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TurnBody {
    Create(CreateConversationBody),
    Append(AppendSegmentBody),
}

#[derive(Debug, PartialEq, Eq)]
pub struct TurnRequest {
    pub endpoint: Endpoint,
    pub body: TurnBody,
}

impl TurnRequest {
    pub fn build(state: &ConversationState, message: &str) -> Self {
        match state.phase() {
            ConversationPhase::Established {
                conversation_id,
                last_segment_id,
            } => TurnRequest {
                endpoint: Endpoint::AppendSegment {
                    conversation_id: conversation_id.clone(),
                },
                body: TurnBody::Append(AppendSegmentBody {
                    question: message.to_string(),
                    parent_id: last_segment_id.clone(),
                }),
            },
            ConversationPhase::Fresh => TurnRequest {
                endpoint: Endpoint::CreateConversation,
                body: TurnBody::Create(CreateConversationBody {
                    question: message.to_string(),
                    vision_image_ids: Vec::new(),
                    attachment_ids: Vec::new(),
                    session: SessionRef {
                        session_identifier: state.session_identifier().to_string(),
                    },
                }),
            },
        }
    }
}
