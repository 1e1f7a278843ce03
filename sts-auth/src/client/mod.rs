use anyhow::Result;
use hyper::{Body, Client as HttpClient, Method, Request};
use hyper_tls::HttpsConnector;
use tracing::{info, warn};

use crate::commands::{ClientCommand, SignerArgs, WhoamiCommand};
use crate::common::config::ClientConfig;
use crate::common::is_valid_arn;
use crate::server::verifier::{IdentityVerifier, StsIdentityVerifier};

pub mod credentials;
pub mod signer;
pub mod sigv4;

pub use credentials::{
    CredentialMode, CredentialSource, ProviderChainSource, SessionTokenSource,
    StaticCredentialSource,
};
pub use signer::RequestSigner;

/// Call a protected server with a freshly signed assertion attached.
pub async fn run(args: ClientCommand) -> Result<()> {
    let signer = build_signer(&args.signer).await?;

    let mut req = Request::builder()
        .method(Method::GET)
        .uri(args.url.as_str())
        .body(Body::empty())?;
    signer.sign_request(&mut req).await?;

    info!("📡 Calling {}", args.url);
    let http_client = HttpClient::builder().build::<_, Body>(HttpsConnector::new());
    let response = http_client.request(req).await?;

    let status = response.status();
    let body = hyper::body::to_bytes(response.into_body()).await?;
    println!("{}", status);
    println!("{}", String::from_utf8_lossy(&body));
    Ok(())
}

/// Sign an assertion and verify it directly against STS.
pub async fn whoami(args: WhoamiCommand) -> Result<()> {
    let mut signer = build_signer(&args.signer).await?;
    if let Some(endpoint) = args.endpoint {
        signer = signer.with_endpoint(endpoint);
    }

    let assertion = signer.signed_assertion().await?;
    let identity = StsIdentityVerifier::default()
        .get_caller_identity(
            signer.endpoint(),
            &assertion.issued_at,
            &assertion.authorization,
            &assertion.security_token,
        )
        .await?;

    if !is_valid_arn(&identity.arn) {
        warn!(
            "⚠️  {} is not an IAM user or role ARN, servers will reject it",
            identity.arn
        );
    }
    print!("{}", serde_yaml::to_string(&identity)?);
    Ok(())
}

async fn build_signer(args: &SignerArgs) -> Result<RequestSigner> {
    let config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    let mode = if args.ambient_credentials {
        CredentialMode::Ambient
    } else {
        CredentialMode::SessionToken
    };

    let signer = RequestSigner::from_env(
        args.region.clone().or(config.region),
        args.profile.clone().or(config.profile),
        mode,
    )
    .await?;
    Ok(signer)
}
