mod routes;
mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use duo_notify::FcmMessenger;
use duo_store::RoomStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duo=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("DUO_DB_PATH").unwrap_or_else(|_| "duo.db".into());
    let host = std::env::var("DUO_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("DUO_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let store = Arc::new(RoomStore::open(&PathBuf::from(&db_path))?);

    // The dispatcher only runs with a messaging key configured.
    match std::env::var("DUO_FCM_SERVER_KEY") {
        Ok(key) if !key.is_empty() => {
            let messenger = Arc::new(FcmMessenger::new(key));
            tokio::spawn(duo_notify::playlist::run_playlist_watcher(
                store.clone(),
                messenger.clone(),
            ));
            tokio::spawn(duo_notify::schedule::run_daily_unlock_job(
                store.clone(),
                messenger.clone(),
            ));
            tokio::spawn(duo_notify::schedule::run_j14_job(store.clone(), messenger));
            info!("notification dispatcher running");
        }
        _ => info!("DUO_FCM_SERVER_KEY unset, notifications disabled"),
    }

    let app = routes::router(store)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Duo server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
