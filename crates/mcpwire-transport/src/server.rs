//! Serving a transport router on a TCP listener.

use std::future::Future;
use std::io;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{ConfigError, ServerSettings};
use crate::streamable_http::StreamableHttpServerTransport;

/// Serve `router` until the listener fails.
pub async fn serve(listener: TcpListener, router: Router) -> io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "serving streamable HTTP");
    axum::serve(listener, router).await
}

/// Serve `router` until `signal` resolves, then drain open connections.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    router: Router,
    signal: F,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "serving streamable HTTP");
    axum::serve(listener, router)
        .with_graceful_shutdown(signal)
        .await?;
    info!(%addr, "streamable HTTP server stopped");
    Ok(())
}

/// Validate `settings`, build a transport from them and bind their address.
///
/// The transport is returned unstarted so it can be handed to a protocol
/// engine before [`serve`] is called with the listener and its router.
pub async fn bind(
    settings: &ServerSettings,
) -> Result<(StreamableHttpServerTransport, TcpListener), ConfigError> {
    settings.validate()?;
    let transport = StreamableHttpServerTransport::new(settings.to_server_config());
    let listener = TcpListener::bind(&settings.bind_address)
        .await
        .map_err(|source| ConfigError::Bind {
            address: settings.bind_address.clone(),
            source,
        })?;
    Ok((transport, listener))
}
