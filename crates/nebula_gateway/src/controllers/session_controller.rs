use actix_web::{web, HttpRequest, HttpResponse};

use crate::controllers::{require_api_key, resolve_entry};
use crate::dto::{NewSessionRequest, NewSessionResponse};
use crate::error::Result;
use crate::server::AppState;

/// Start a new conversation for the session, creating the session first if
/// it does not exist yet.
async fn new_session(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: Option<web::Json<NewSessionRequest>>,
) -> Result<HttpResponse> {
    require_api_key(&req, &state)?;
    let body = body.map(web::Json::into_inner).unwrap_or_default();

    let (entry, session_id) = resolve_entry(&req, &state, body.session_id.as_deref())?;
    entry.reset().await;

    Ok(HttpResponse::Ok().json(NewSessionResponse {
        session_id,
        message: "New conversation started".to_string(),
    }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/session/new").route(web::post().to(new_session)));
}
