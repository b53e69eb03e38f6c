pub mod chat_controller;
pub mod session_controller;
pub mod system_controller;

use std::sync::Arc;

use actix_web::HttpRequest;
use session_registry::SessionEntry;

use crate::error::{AppError, Result};
use crate::server::AppState;

pub(crate) fn require_api_key(req: &HttpRequest, state: &AppState) -> Result<()> {
    let Some(expected) = &state.settings.api_key else {
        return Ok(());
    };
    let provided = req.headers().get("X-API-Key").and_then(|v| v.to_str().ok());
    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(AppError::InvalidApiKey)
    }
}

/// Resolve the registry entry for a request. A new session binds the
/// request's `X-Nebula-Token` header when present, else the configured
/// default token.
pub(crate) fn resolve_entry(
    req: &HttpRequest,
    state: &AppState,
    session_id: Option<&str>,
) -> Result<(Arc<SessionEntry>, String)> {
    let header_token = req
        .headers()
        .get("X-Nebula-Token")
        .and_then(|v| v.to_str().ok());
    let credential = header_token.or(state.settings.default_token.as_deref());
    Ok(state.registry.resolve(session_id, credential)?)
}
