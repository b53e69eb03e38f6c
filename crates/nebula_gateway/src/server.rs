use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use log::info;
use nebula_client::{Config, NebulaClient};
use session_registry::SessionRegistry;

use crate::controllers::{chat_controller, session_controller, system_controller};
use crate::usage::UsageLog;

const USAGE_LOG_FILE: &str = "data_usage.csv";
const DEFAULT_WORKER_COUNT: usize = 10;

/// Gateway-level settings, separate from the backend connection config.
#[derive(Debug, Clone, Default)]
pub struct GatewaySettings {
    /// When set, every route except the health check requires a matching
    /// `X-API-Key` header.
    pub api_key: Option<String>,
    /// Credential bound to newly created sessions when the request does not
    /// carry its own `X-Nebula-Token` header.
    pub default_token: Option<String>,
}

pub struct AppState {
    pub client: NebulaClient,
    pub registry: SessionRegistry,
    pub settings: GatewaySettings,
    pub usage: UsageLog,
}

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.configure(system_controller::config)
        .configure(chat_controller::config)
        .configure(session_controller::config);
}

pub async fn run(port: u16) -> anyhow::Result<()> {
    let config = Config::new();
    let settings = GatewaySettings {
        api_key: std::env::var("API_KEY").ok().filter(|key| !key.is_empty()),
        default_token: config.auth_token.clone(),
    };

    if settings.default_token.is_none() {
        log::warn!(
            "NEBULA_AUTH_TOKEN not set; sessions can only be created with an X-Nebula-Token header"
        );
    }

    let app_state = web::Data::new(AppState {
        client: NebulaClient::new(&config)?,
        registry: SessionRegistry::new(),
        settings,
        usage: UsageLog::new(USAGE_LOG_FILE),
    });

    info!("starting gateway on http://0.0.0.0:{port}");
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .workers(DEFAULT_WORKER_COUNT)
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
