use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_sts::config::Region;
use aws_sdk_sts::Client as StsClient;
use chrono::{DateTime, Utc};
use hyper::header::{HeaderMap, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request};
use std::sync::Arc;
use tracing::{debug, info};

use super::credentials::{
    CredentialMode, CredentialSource, ProviderChainSource, SessionTokenSource,
};
use super::sigv4::{self, sha256_hex};
use crate::common::{
    SignedAssertion, StsError, StsResult, FORM_CONTENT_TYPE, GET_CALLER_IDENTITY_BODY, STS_SERVICE,
    X_AMZ_DATE, X_AMZ_SECURITY_TOKEN,
};

/// Produces signed `GetCallerIdentity` assertions for one region
#[derive(Clone)]
pub struct RequestSigner {
    region: String,
    endpoint: String,
    credentials: Arc<dyn CredentialSource>,
}

impl RequestSigner {
    /// Sign for `region` against `https://sts.<region>.amazonaws.com`.
    pub fn new(region: impl Into<String>, credentials: impl CredentialSource + 'static) -> Self {
        let region = region.into();
        Self {
            endpoint: format!("https://sts.{}.amazonaws.com", region),
            region,
            credentials: Arc::new(credentials),
        }
    }

    /// Build a signer from the AWS default configuration chain.
    ///
    /// `region` overrides the configured region; `us-east-1` is the last resort.
    pub async fn from_env(
        region: Option<String>,
        profile: Option<String>,
        mode: CredentialMode,
    ) -> StsResult<Self> {
        let region_provider = RegionProviderChain::first_try(region.map(Region::new))
            .or_default_provider()
            .or_else("us-east-1");
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        let region = config
            .region()
            .map(|r| r.as_ref().to_string())
            .unwrap_or_else(|| "us-east-1".to_string());
        info!("Signing STS assertions for region {}", region);

        let signer = match mode {
            CredentialMode::SessionToken => {
                Self::new(region, SessionTokenSource::new(StsClient::new(&config)))
            }
            CredentialMode::Ambient => {
                Self::new(region, ProviderChainSource::from_sdk_config(&config)?)
            }
        };
        Ok(signer)
    }

    /// Address the assertion at a different STS endpoint, e.g. a VPC endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn signed_assertion(&self) -> StsResult<SignedAssertion> {
        self.signed_assertion_at(Utc::now()).await
    }

    /// Fetch credentials and sign the verification request as of `timestamp`.
    pub async fn signed_assertion_at(
        &self,
        timestamp: DateTime<Utc>,
    ) -> StsResult<SignedAssertion> {
        let credentials = self.credentials.temporary_credentials().await?;
        self.sign_with(&credentials, timestamp)
    }

    /// Sign an assertion and attach its headers to `req`.
    pub async fn sign_request<B>(&self, req: &mut Request<B>) -> StsResult<()> {
        let assertion = self.signed_assertion().await?;
        assertion.apply_to(req.headers_mut())
    }

    fn sign_with(
        &self,
        credentials: &Credentials,
        timestamp: DateTime<Utc>,
    ) -> StsResult<SignedAssertion> {
        // Servers reject assertions without a session token, so long-term keys cannot sign.
        if credentials.session_token().map_or(true, str::is_empty) {
            return Err(StsError::credentials("credentials carry no session token"));
        }

        let mut request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.as_str())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(CONTENT_LENGTH, GET_CALLER_IDENTITY_BODY.len().to_string())
            .body(())?;

        sigv4::sign_request(
            credentials,
            &mut request,
            &sha256_hex(GET_CALLER_IDENTITY_BODY.as_bytes()),
            STS_SERVICE,
            &self.region,
            timestamp,
        )?;
        debug!("Signed GetCallerIdentity for {}", self.endpoint);

        let headers = request.headers();
        Ok(SignedAssertion {
            region: self.region.clone(),
            issued_at: header_string(headers, X_AMZ_DATE),
            authorization: header_string(headers, AUTHORIZATION.as_str()),
            security_token: header_string(headers, X_AMZ_SECURITY_TOKEN),
        })
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
