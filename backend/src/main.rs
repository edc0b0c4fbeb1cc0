use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, Level};

use scoreboard_backend::config::Config;
use scoreboard_backend::db::DbConnection;
use scoreboard_backend::domain::{ChangeNotifier, EventHub, ScoreboardService};
use scoreboard_backend::rest::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let config = Config::from_env();

    info!("Setting up database at {}", config.database_url);
    let db = DbConnection::new(&config.database_url).await?;

    // The hub lives for the whole process; no teardown beyond exit
    let hub = Arc::new(EventHub::new());
    let notifier = ChangeNotifier::new(Arc::clone(&hub));
    let service = ScoreboardService::new(db, notifier);
    let state = AppState::new(service, hub, config.admin_token.clone());

    let app = rest::router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
