use env_logger::Env;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let port = std::env::var("APP_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8000);

    if let Err(e) = nebula_gateway::server::run(port).await {
        log::error!("failed to run gateway: {e}");
        std::process::exit(1);
    }
}
