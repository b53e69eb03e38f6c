//! Request and response bodies for the HTTP surface.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub conversation_id: Option<String>,
}

/// Everything a completed turn produced, including metadata.
#[derive(Debug, Serialize)]
pub struct ChatFullResponse {
    pub response: String,
    pub status_updates: Vec<String>,
    pub conversation_id: Option<String>,
    pub segment_id: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewSessionRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}
