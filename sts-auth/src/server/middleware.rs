use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::warn;

use super::verifier::{IdentityVerifier, StsIdentityVerifier};
use crate::common::{is_valid_arn, AllowList, CallerIdentity, SignedAssertion, StsError};

/// Pulls a signed assertion out of an inbound request
pub trait AssertionExtractor: Send + Sync {
    fn extract(&self, req: &Request<Body>) -> Result<SignedAssertion, StsError>;
}

/// Decides whether a verified ARN may reach the wrapped handler
pub trait IdentityAuthorizer: Send + Sync {
    fn authorize(&self, arn: &str) -> bool;
}

/// Maps a region to the STS endpoint assertions are replayed against
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, region: &str) -> String;
}

/// Reads `x-amz-date`, `x-amz-security-token` and `authorization` headers
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderAssertionExtractor;

impl AssertionExtractor for HeaderAssertionExtractor {
    fn extract(&self, req: &Request<Body>) -> Result<SignedAssertion, StsError> {
        SignedAssertion::from_headers(req.headers())
    }
}

impl<F> AssertionExtractor for F
where
    F: Fn(&Request<Body>) -> Result<SignedAssertion, StsError> + Send + Sync,
{
    fn extract(&self, req: &Request<Body>) -> Result<SignedAssertion, StsError> {
        self(req)
    }
}

impl IdentityAuthorizer for AllowList {
    fn authorize(&self, arn: &str) -> bool {
        self.is_authorized(arn)
    }
}

impl<F> IdentityAuthorizer for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn authorize(&self, arn: &str) -> bool {
        self(arn)
    }
}

/// `https://sts.<region>.<domain>`
#[derive(Debug, Clone)]
pub struct RegionalStsEndpoint {
    domain: String,
}

impl RegionalStsEndpoint {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

impl Default for RegionalStsEndpoint {
    fn default() -> Self {
        Self::new("amazonaws.com")
    }
}

impl EndpointResolver for RegionalStsEndpoint {
    fn resolve(&self, region: &str) -> String {
        format!("https://sts.{}.{}", region, self.domain)
    }
}

impl<F> EndpointResolver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn resolve(&self, region: &str) -> String {
        self(region)
    }
}

/// Why a request was turned away before reaching the wrapped handler
#[derive(Error, Debug)]
pub enum AuthRejection {
    /// The request carried no usable assertion
    #[error("{0}")]
    BadRequest(StsError),

    /// STS could not be reached, refused the signature, or answered garbage
    #[error("{0}")]
    VerificationFailed(StsError),

    /// The signer is authentic but not on the allow-list
    #[error("unauthorized")]
    Unauthorized { arn: String },
}

impl AuthRejection {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthRejection::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthRejection::VerificationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthRejection::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.to_string()));
        *response.status_mut() = self.status_code();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

/// Builds [`AuthenticationMiddleware`] around a downstream service.
///
/// Holds only immutable, shareable strategies; every request is authenticated
/// independently.
#[derive(Clone)]
pub struct AuthenticationLayer {
    extractor: Arc<dyn AssertionExtractor>,
    authorizer: Arc<dyn IdentityAuthorizer>,
    verifier: Arc<dyn IdentityVerifier>,
    resolver: Arc<dyn EndpointResolver>,
}

impl AuthenticationLayer {
    /// Header extraction, the real STS endpoints and the given authorizer.
    pub fn new(authorizer: impl IdentityAuthorizer + 'static) -> Self {
        Self {
            extractor: Arc::new(HeaderAssertionExtractor),
            authorizer: Arc::new(authorizer),
            verifier: Arc::new(StsIdentityVerifier::default()),
            resolver: Arc::new(RegionalStsEndpoint::default()),
        }
    }

    pub fn with_extractor(mut self, extractor: impl AssertionExtractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_verifier(mut self, verifier: impl IdentityVerifier + 'static) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    pub fn with_endpoint_resolver(mut self, resolver: impl EndpointResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn extract(&self, req: &Request<Body>) -> Result<SignedAssertion, AuthRejection> {
        self.extractor.extract(req).map_err(|e| {
            warn!("Rejecting request without a usable assertion: {}", e);
            AuthRejection::BadRequest(e)
        })
    }

    pub async fn verify(
        &self,
        assertion: &SignedAssertion,
    ) -> Result<CallerIdentity, AuthRejection> {
        let endpoint = self.resolver.resolve(&assertion.region);
        self.verifier
            .get_caller_identity(
                &endpoint,
                &assertion.issued_at,
                &assertion.authorization,
                &assertion.security_token,
            )
            .await
            .map_err(|e| {
                warn!("Rejecting request, identity verification failed: {}", e);
                AuthRejection::VerificationFailed(e)
            })
    }

    /// A malformed ARN is never authorized, whatever the authorizer says.
    pub fn authorize(&self, identity: &CallerIdentity) -> Result<(), AuthRejection> {
        if is_valid_arn(&identity.arn) && self.authorizer.authorize(&identity.arn) {
            return Ok(());
        }
        warn!("Identity not allowed: {}", identity.arn);
        Err(AuthRejection::Unauthorized {
            arn: identity.arn.clone(),
        })
    }

    /// Run extract, verify and authorize for one request.
    pub async fn authenticate(&self, req: &Request<Body>) -> Result<CallerIdentity, AuthRejection> {
        let assertion = self.extract(req)?;
        let identity = self.verify(&assertion).await?;
        self.authorize(&identity)?;
        Ok(identity)
    }
}

impl<S> Layer<S> for AuthenticationLayer {
    type Service = AuthenticationMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthenticationMiddleware {
            inner,
            layer: self.clone(),
        }
    }
}

/// Lets a request through to `inner` only once STS vouches for its signer
#[derive(Clone)]
pub struct AuthenticationMiddleware<S> {
    inner: S,
    layer: AuthenticationLayer,
}

impl<S> Service<Request<Body>> for AuthenticationMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Keep the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let layer = self.layer.clone();

        Box::pin(async move {
            let assertion = match layer.extract(&req) {
                Ok(assertion) => assertion,
                Err(rejection) => return Ok(rejection.into_response()),
            };
            let identity = match layer.verify(&assertion).await {
                Ok(identity) => identity,
                Err(rejection) => return Ok(rejection.into_response()),
            };
            if let Err(rejection) = layer.authorize(&identity) {
                return Ok(rejection.into_response());
            }

            inner.call(req).await
        })
    }
}
