//! Axum server and proxy handler.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::uri::{Authority, PathAndQuery, Scheme, Uri},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::balancer::{AtomicBalancer, BalancerError};
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::rate_limit::{rate_limit_middleware, Limiter};

/// State injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub balancer: Arc<AtomicBalancer>,
    pub client: Client<HttpConnector, Body>,
}

/// The load balancer's HTTP front end.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Build the router. The rate-limit middleware is attached only when
    /// a limiter is supplied (i.e. rate limiting is enabled in config).
    pub fn new(
        balancer: Arc<AtomicBalancer>,
        limiter: Option<Arc<Limiter>>,
        config: &ServerConfig,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = AppState { balancer, client };

        let mut router = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler));

        if let Some(limiter) = limiter {
            router = router.layer(axum::middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ));
        }

        let router = router
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(config.write_timeout))
            .layer(TraceLayer::new_for_http());

        Self { router }
    }

    /// Serve until `shutdown` fires, then drain gracefully.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Readiness endpoint for the balancer itself.
async fn health_handler() -> StatusCode {
    StatusCode::OK
}

/// Select a backend and relay the request to it.
async fn proxy_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut request: Request<Body>,
) -> Response {
    let backend = match state.balancer.next() {
        Ok(backend) => backend,
        Err(BalancerError::NoHealthyBackends) => {
            tracing::error!("no backend available");
            return AppError::no_backend_available().into_response();
        }
    };

    tracing::debug!(backend = %backend, path = %request.uri().path(), "forwarding request");

    let Some(new_uri) = rewrite_uri(request.uri(), &backend) else {
        tracing::error!(backend = %backend, "invalid backend URL");
        return AppError::internal().into_response();
    };
    *request.uri_mut() = new_uri;

    match state.client.request(request).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(err) => {
            tracing::error!(backend = %backend, error = %err, "error proxying request");
            AppError::bad_gateway().into_response()
        }
    }
}

/// Point the request at the chosen backend, keeping its path and query.
fn rewrite_uri(original: &Uri, backend: &str) -> Option<Uri> {
    let trimmed = backend.trim_end_matches('/');
    let (scheme, authority) = match trimmed.split_once("://") {
        Some(("http", rest)) => (Scheme::HTTP, rest),
        Some(("https", rest)) => (Scheme::HTTPS, rest),
        Some(_) => return None,
        None => (Scheme::HTTP, trimmed),
    };

    let mut parts = original.clone().into_parts();
    parts.scheme = Some(scheme);
    parts.authority = Some(Authority::from_str(authority).ok()?);
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }

    Uri::from_parts(parts).ok()
}
