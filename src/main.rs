use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use runbox_hub::ai::TextGenClient;
use runbox_hub::api;
use runbox_hub::config::Config;
use runbox_hub::exec::ExecClient;
use runbox_hub::hub::SessionGateway;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let gateway = SessionGateway::new();
    let exec = Arc::new(
        ExecClient::new(config.exec.clone()).expect("Failed to create execution client"),
    );

    let ai = match TextGenClient::from_config(&config.ai) {
        Some(Ok(client)) => Some(Arc::new(client)),
        Some(Err(e)) => {
            tracing::error!(error = %e, "Failed to initialize text-generation client");
            None
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, AI endpoints disabled");
            None
        }
    };

    let routes = api::routes::hub_routes(gateway, exec, ai, &config.server.frontend_origin);

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting Runbox session hub"
    );

    warp::serve(routes).run(config.bind_address()).await;
}
