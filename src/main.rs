use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use agent_conductor::agents::{AgentResult, Conductor};
use agent_conductor::api;
use agent_conductor::config::AppConfig;
use agent_conductor::llm::OpenRouterClient;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> AgentResult<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(model = %config.model, base_url = %config.base_url, budget = config.context_budget, "configuration loaded");

    let factory = OpenRouterClient::factory(config.base_url.clone());
    let conductor = Conductor::new(config.conductor_settings(), factory);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = api::router(conductor)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
