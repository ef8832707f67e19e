use std::net::SocketAddr;

use tokio::sync::watch;

use crate::router::build_router;
use crate::state::RpcState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Serve(#[from] std::io::Error),
}

/// Serves the HTTP surface until `stop` fires, then lets in-flight
/// requests drain before returning — the RPC half of the graceful
/// shutdown sequencing (the process-level signal handling itself lives in the
/// binary crate, matching the teacher's `SigintHandlerLayer` being owned
/// by the top-level wiring, not by `api_server`).
pub async fn run(addr: SocketAddr, state: RpcState, mut stop: watch::Receiver<bool>) -> Result<(), ServerError> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::info!(%addr, "RPC server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = stop.changed().await;
            tracing::info!("RPC server received stop signal, draining in-flight requests");
        })
        .await?;
    Ok(())
}
