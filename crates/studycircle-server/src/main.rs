mod config;

use tracing::info;

use studycircle_api::router::build_router;
use studycircle_api::state::AppStateInner;
use studycircle_api::suggestions::SuggestionClient;
use studycircle_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studycircle=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    if config.suggestions.api_key.is_none() {
        info!("No STUDYCIRCLE_AI_API_KEY set; suggestions will report an upstream failure");
    }
    let suggestions = SuggestionClient::new(config.suggestions.clone())?;

    let state = AppStateInner::new(db, config.jwt_secret.clone(), suggestions);
    let app = build_router(state);

    let addr = config.addr()?;
    info!("StudyCircle server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
