use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sdk_sts::Client as StsClient;
use tracing::debug;

use crate::common::{StsError, StsResult};

/// Where the signer gets temporary credentials from
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn temporary_credentials(&self) -> StsResult<Credentials>;
}

/// How a signer built from the environment obtains its credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialMode {
    /// Exchange long-lived credentials for a session via `GetSessionToken`
    #[default]
    SessionToken,
    /// Use whatever the default provider chain yields (instance or task role, SSO, ...)
    Ambient,
}

/// Issues fresh session credentials through STS `GetSessionToken`
#[derive(Clone)]
pub struct SessionTokenSource {
    sts_client: StsClient,
}

impl SessionTokenSource {
    pub fn new(sts_client: StsClient) -> Self {
        Self { sts_client }
    }
}

#[async_trait]
impl CredentialSource for SessionTokenSource {
    async fn temporary_credentials(&self) -> StsResult<Credentials> {
        let output = self
            .sts_client
            .get_session_token()
            .send()
            .await
            .map_err(StsError::credentials)?;

        let issued = output
            .credentials()
            .ok_or_else(|| StsError::credentials("GetSessionToken returned no credentials"))?;
        debug!("Obtained session credentials for {}", issued.access_key_id());

        Ok(Credentials::new(
            issued.access_key_id(),
            issued.secret_access_key(),
            Some(issued.session_token().to_string()),
            None,
            "GetSessionToken",
        ))
    }
}

/// Credentials straight from the SDK's default provider chain
#[derive(Debug, Clone)]
pub struct ProviderChainSource {
    provider: SharedCredentialsProvider,
}

impl ProviderChainSource {
    pub fn new(provider: SharedCredentialsProvider) -> Self {
        Self { provider }
    }

    pub fn from_sdk_config(config: &SdkConfig) -> StsResult<Self> {
        config
            .credentials_provider()
            .map(Self::new)
            .ok_or_else(|| StsError::credentials("No AWS credentials provider available"))
    }
}

#[async_trait]
impl CredentialSource for ProviderChainSource {
    async fn temporary_credentials(&self) -> StsResult<Credentials> {
        self.provider
            .provide_credentials()
            .await
            .map_err(StsError::credentials)
    }
}

/// Fixed credentials, for tests and pre-fetched sessions
#[derive(Debug, Clone)]
pub struct StaticCredentialSource {
    credentials: Credentials,
}

impl StaticCredentialSource {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn temporary_credentials(&self) -> StsResult<Credentials> {
        Ok(self.credentials.clone())
    }
}
