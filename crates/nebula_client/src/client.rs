//! The streaming session driver.
//!
//! One call to [`NebulaClient::send_turn`] runs a full turn: build the wire
//! request from the conversation's current phase, POST it with the caller's
//! credential, consume the SSE reply, and commit the observed identifiers
//! into the state once the stream closes normally. A turn that fails at any
//! point leaves the state exactly as it was, so the caller can retry the
//! identical turn without forking the conversation's parent chain.

use std::io;

use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::{header, Client};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::conversation::ConversationState;
use crate::error::{ClientError, Result};
use crate::request::TurnRequest;
use crate::turn::{consume_stream, TurnResult, TurnUpdate};

/// Client for the conversational backend.
///
/// Holds the shared HTTP transport and deployment coordinates. All
/// per-conversation state lives in the [`ConversationState`] passed to each
/// turn, so one client serves any number of concurrent conversations.
#[derive(Debug, Clone)]
pub struct NebulaClient {
    http: Client,
    base_url: String,
    config_state_id: String,
}

impl NebulaClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder().build().map_err(ClientError::Transport)?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config_state_id: config.config_state_id.clone(),
        })
    }

    /// Run one turn to completion and return the accumulated result.
    pub async fn send_turn(
        &self,
        credential: &str,
        state: &mut ConversationState,
        message: &str,
    ) -> Result<TurnResult> {
        self.run_turn(credential, state, message, None).await
    }

    /// Run one turn, forwarding status and chunk updates through `updates`
    /// as they arrive. The final result is still returned whole.
    pub async fn send_turn_streaming(
        &self,
        credential: &str,
        state: &mut ConversationState,
        message: &str,
        updates: mpsc::Sender<TurnUpdate>,
    ) -> Result<TurnResult> {
        self.run_turn(credential, state, message, Some(updates))
            .await
    }

    async fn run_turn(
        &self,
        credential: &str,
        state: &mut ConversationState,
        message: &str,
        updates: Option<mpsc::Sender<TurnUpdate>>,
    ) -> Result<TurnResult> {
        let request = TurnRequest::build(state, message);
        let url = format!(
            "{}{}",
            self.base_url,
            request.endpoint.path(&self.config_state_id)
        );
        debug!("sending turn to {url}");

        let response = self
            .http
            .post(&url)
            .bearer_auth(credential)
            .header(header::ACCEPT, "text/event-stream")
            .json(&request.body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("backend rejected turn with status {status}");
            return Err(ClientError::Status { status, body });
        }
        ensure_event_stream(&response)?;

        let byte_stream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(io::Error::other)),
        );
        let (result, ids) = consume_stream(byte_stream, updates.as_ref()).await?;

        // The stream closed normally; only now do the observed ids land.
        state.commit(ids);
        debug!(
            "turn completed with {} status updates and {} bytes of response text",
            result.status_updates.len(),
            result.response.len()
        );
        Ok(result)
    }
}

/// A 2xx response that is structurally not an event stream cannot be decoded
/// at all; that is a protocol failure, not a payload one.
fn ensure_event_stream(response: &reqwest::Response) -> Result<()> {
    let Some(content_type) = response.headers().get(header::CONTENT_TYPE) else {
        return Ok(());
    };
    let content_type = content_type.to_str().unwrap_or_default();
    if content_type.starts_with("text/event-stream") {
        Ok(())
    } else {
        Err(ClientError::Protocol(format!(
            "expected an event stream, got content type {content_type:?}"
        )))
    }
}
