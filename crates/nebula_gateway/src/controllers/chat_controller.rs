//! Chat endpoints: request/response, full-result, and SSE streaming.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_lab::{sse, util::InfallibleStream};
use log::{error, warn};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use nebula_client::TurnUpdate;
use session_registry::SessionEntry;

use crate::controllers::{require_api_key, resolve_entry};
use crate::dto::{ChatFullResponse, ChatRequest, ChatResponse};
use crate::error::{AppError, Result};
use crate::server::AppState;

fn required_message(body: &ChatRequest) -> Result<&str> {
    body.message
        .as_deref()
        .filter(|message| !message.is_empty())
        .ok_or(AppError::MissingField("message"))
}

async fn chat(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse> {
    require_api_key(&req, &state)?;
    let message = required_message(&body)?;
    let (entry, session_id) = resolve_entry(&req, &state, body.session_id.as_deref())?;

    let result = {
        // The guard is the per-session execution token: held for the whole
        // turn, so concurrent requests on one session run strictly in order.
        let mut conversation = entry.state().lock().await;
        state
            .client
            .send_turn(entry.credential(), &mut conversation, message)
            .await?
    };

    state.usage.record(&session_id, message, &result.response).await;

    Ok(HttpResponse::Ok().json(ChatResponse {
        response: result.response,
        session_id,
        conversation_id: result.conversation_id,
    }))
}

async fn chat_full(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse> {
    require_api_key(&req, &state)?;
    let message = required_message(&body)?;
    let (entry, session_id) = resolve_entry(&req, &state, body.session_id.as_deref())?;

    let result = {
        let mut conversation = entry.state().lock().await;
        state
            .client
            .send_turn(entry.credential(), &mut conversation, message)
            .await?
    };

    state.usage.record(&session_id, message, &result.response).await;

    Ok(HttpResponse::Ok().json(ChatFullResponse {
        response: result.response,
        status_updates: result.status_updates,
        conversation_id: result.conversation_id,
        segment_id: result.segment_id,
        session_id,
    }))
}

type SseResponse = sse::Sse<InfallibleStream<ReceiverStream<sse::Event>>>;

async fn chat_stream(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ChatRequest>,
) -> Result<SseResponse> {
    require_api_key(&req, &state)?;
    let message = required_message(&body)?.to_string();
    let (entry, session_id) = resolve_entry(&req, &state, body.session_id.as_deref())?;

    let (sse_tx, sse_rx) = mpsc::channel::<sse::Event>(32);
    tokio::spawn(stream_turn(state.clone(), entry, session_id, message, sse_tx));

    Ok(sse::Sse::from_infallible_receiver(sse_rx).with_keep_alive(Duration::from_secs(15)))
}

/// Drive one turn and fan its chunks out to the HTTP client, ending with a
/// `done` payload carrying the full response and session coordinates.
async fn stream_turn(
    state: web::Data<AppState>,
    entry: Arc<SessionEntry>,
    session_id: String,
    message: String,
    sse_tx: mpsc::Sender<sse::Event>,
) {
    let (update_tx, mut update_rx) = mpsc::channel::<TurnUpdate>(32);

    let turn = {
        let client = state.client.clone();
        let entry = Arc::clone(&entry);
        let message = message.clone();
        tokio::spawn(async move {
            let mut conversation = entry.state().lock().await;
            client
                .send_turn_streaming(entry.credential(), &mut conversation, &message, update_tx)
                .await
        })
    };

    while let Some(update) = update_rx.recv().await {
        let TurnUpdate::Chunk(chunk) = update else {
            continue;
        };
        let Ok(event) = sse::Data::new_json(json!({ "chunk": chunk })) else {
            continue;
        };
        if sse_tx.send(sse::Event::Data(event)).await.is_err() {
            // HTTP client went away; the turn still runs to completion so
            // the conversation state stays consistent.
            break;
        }
    }

    match turn.await {
        Ok(Ok(result)) => {
            state.usage.record(&session_id, &message, &result.response).await;
            let payload = json!({
                "done": true,
                "full_response": result.response,
                "session_id": session_id,
                "conversation_id": result.conversation_id,
            });
            if let Ok(event) = sse::Data::new_json(payload) {
                let _ = sse_tx.send(sse::Event::Data(event)).await;
            }
        }
        Ok(Err(err)) => {
            warn!("streaming turn for session {session_id} failed: {err}");
            if let Ok(event) = sse::Data::new_json(json!({ "error": err.to_string() })) {
                let _ = sse_tx.send(sse::Event::Data(event)).await;
            }
        }
        Err(err) => error!("streaming turn task for session {session_id} panicked: {err}"),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/chat").route(web::post().to(chat)))
        .service(web::resource("/chat/full").route(web::post().to(chat_full)))
        .service(web::resource("/chat/stream").route(web::post().to(chat_stream)));
}
