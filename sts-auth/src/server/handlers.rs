use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;

/// Handler behind the authentication middleware
pub async fn protected(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain")
        .body(Body::from("Your handler is running!\n"))
        .unwrap_or_default())
}

/// Liveness probe, served without authentication
pub async fn health(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json")
        .body(Body::from("{\"status\":\"healthy\"}"))
        .unwrap_or_default())
}
