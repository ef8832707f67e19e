use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use jsonrpsee::core::server::Methods;
use jsonrpsee::server::RpcModule;
use tower_http::trace::TraceLayer;

use crate::docs::docs;
use crate::health::health;
use crate::namespace::{AggregatorApiServer, AggregatorNamespace};
use crate::state::RpcState;

/// Bridges the `jsonrpsee` method dispatch table onto a plain `axum`
/// handler, the way a custom (non-HTTP-native) `jsonrpsee` transport
/// would: `Methods::raw_json_request` runs the full JSON-RPC 2.0
/// request/response cycle (method lookup, params validation, the
/// `#[method]` body) without needing `jsonrpsee`'s own hyper listener,
/// so `/` can sit next to the plain `axum` routes below.
async fn rpc_handler(State(methods): State<Methods>, body: String) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    match methods.raw_json_request(&body, usize::MAX).await {
        Ok((response, _subscription)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            response,
        ),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "application/json")],
            format!(r#"{{"jsonrpc":"2.0","error":{{"code":-32700,"message":"{err}"}},"id":null}}"#),
        ),
    }
}

/// Builds the full HTTP surface: JSON-RPC at `/`, `GET /health`,
/// `GET /docs`. `RpcState` is cloned into each route's state, cheaply —
/// every field is an `Arc`/`watch::Receiver`/plain value.
pub fn build_router(state: RpcState) -> Router {
    let rpc_module: RpcModule<AggregatorNamespace> = AggregatorNamespace::new(state.clone()).into_rpc();
    let methods: Methods = rpc_module.into();

    let rpc_routes = Router::new()
        .route("/", post(rpc_handler))
        .with_state(methods);

    let plain_routes = Router::new()
        .route("/health", get(health))
        .route("/docs", get(docs))
        .with_state(state);

    rpc_routes.merge(plain_routes).layer(TraceLayer::new_for_http())
}
