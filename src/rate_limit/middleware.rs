//! Admission middleware.
//!
//! Sits in front of the proxy handler: identifies the client, asks the
//! limiter for a token, and answers 401/429 itself on failure.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::http::client_key;
use crate::rate_limit::Limiter;

pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<Arc<Limiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(client_id) = client_key::extract(request.headers(), addr) else {
        tracing::info!("unable to identify client");
        return AppError::unauthorized().into_response();
    };

    if !limiter.allow(&client_id) {
        tracing::info!(client_id = %client_id, "rate limit exceeded");
        return AppError::too_many_requests().into_response();
    }

    next.run(request).await
}
