//! Minimal HTTP endpoint so hosting platforms see the service as up.
//! Updates arrive over the bot's MTProto connection, this only answers probes.

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;

use crate::StringBotError;

/// Every path answers `200 ok`
pub fn router() -> Router {
    Router::new()
        .route("/", get(ok))
        .fallback(ok)
}

async fn ok() -> &'static str {
    "ok"
}

/// Listen on all interfaces
pub async fn bind(port: u16) -> Result<TcpListener, StringBotError> {
    Ok(TcpListener::bind(("0.0.0.0", port)).await?)
}

pub async fn serve(listener: TcpListener) -> Result<(), StringBotError> {
    info!("Health listener on {}", listener.local_addr()?);
    axum::serve(listener, router()).await?;
    Ok(())
}
