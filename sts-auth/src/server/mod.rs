use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use tower::{Layer, ServiceExt};
use tracing::{info, warn};

use crate::commands::ServerCommand;
use crate::common::config::ServerConfig;
use crate::common::AllowList;

pub mod handlers;
pub mod middleware;
pub mod verifier;

pub use middleware::{
    AssertionExtractor, AuthRejection, AuthenticationLayer, AuthenticationMiddleware,
    EndpointResolver, HeaderAssertionExtractor, IdentityAuthorizer, RegionalStsEndpoint,
};
pub use verifier::{IdentityVerifier, StsIdentityVerifier};

pub async fn run(args: ServerCommand) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(listen_addr) = args.listen_addr {
        config.listen_addr = listen_addr;
    }
    if let Some(sts_domain) = args.sts_domain {
        config.sts_domain = sts_domain;
    }
    config.allowed_arns.extend(args.allow_arns);

    // A malformed ARN stops startup before any request is served.
    let allow_list = AllowList::new(config.allowed_arns.iter().cloned())?;
    if allow_list.is_empty() {
        warn!("⚠️  Allow-list is empty, every authenticated caller will get 401");
    }

    info!("🚀 Starting STS-authenticated server");
    info!("🔐 Allowed identities: {}", allow_list.len());
    info!("🌍 STS domain: {}", config.sts_domain);

    let layer = AuthenticationLayer::new(allow_list)
        .with_endpoint_resolver(RegionalStsEndpoint::new(config.sts_domain.clone()));

    serve(config.listen_addr, layer, shutdown_signal()).await
}

/// Serve `/health` openly and everything else behind `layer` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    layer: AuthenticationLayer,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let layer = layer.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| route(layer.clone(), req))) }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!("🌐 HTTP server listening on {}", server.local_addr());

    server.with_graceful_shutdown(shutdown).await?;
    info!("Server stopped");
    Ok(())
}

async fn route(
    layer: AuthenticationLayer,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let is_health = *req.method() == Method::GET && req.uri().path() == "/health";
    if is_health {
        return handlers::health(req).await;
    }
    layer
        .layer(tower::service_fn(handlers::protected))
        .oneshot(req)
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
