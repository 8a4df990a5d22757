//! Server wiring: binds the API Boundary Adapter's router to a listener and
//! drives it, with or without graceful shutdown.
//!
//! Grounded on the teacher's `server.rs` (`create_router`/`start_server`/`serve`/
//! `serve_with_graceful_shutdown` shape), rewired to the real [`AppConfig`] instead
//! of the teacher's dangling `crate::domain::config::AppConfig` reference.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::api::ApiState;
use crate::config::AppConfig;

/// Builds the application's Axum router.
#[must_use]
pub fn create_router(state: ApiState) -> Router {
    crate::api::create_app(state)
}

/// Binds a listener at the address named by `config.http_bind_address`.
///
/// # Errors
///
/// Returns an error if the address is malformed or cannot be bound.
pub async fn start_server(config: &AppConfig) -> Result<(TcpListener, SocketAddr), Box<dyn std::error::Error>> {
    let addr: SocketAddr = config.http_bind_address.parse()?;
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;
    Ok((listener, actual_addr))
}

/// Serves `router` on `listener` until the connection is closed or the process
/// is killed.
///
/// # Errors
///
/// Returns an error if the server fails while serving requests.
pub async fn serve(listener: TcpListener, router: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, router).await.map_err(std::io::Error::other)?;
    Ok(())
}

/// Serves `router` on `listener`, stopping once `shutdown_token` is cancelled.
///
/// # Errors
///
/// Returns an error if the server fails while serving requests.
pub async fn serve_with_graceful_shutdown(
    listener: TcpListener,
    router: Router,
    shutdown_token: tokio_util::sync::CancellationToken,
) -> Result<(), std::io::Error> {
    let shutdown_signal = async move {
        shutdown_token.cancelled().await;
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(std::io::Error::other)?;

    Ok(())
}
