use hyper::StatusCode;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building, replaying or verifying a signed assertion
#[derive(Error, Debug)]
pub enum StsError {
    #[error("{message}")]
    InvalidParameter { message: String },

    #[error("failed to build STS request: {source}")]
    Request {
        #[from]
        source: hyper::http::Error,
    },

    #[error("STS call failed: {source}")]
    Transport {
        #[from]
        source: hyper::Error,
    },

    #[error("aws sts server response status: {status}")]
    Rejected { status: StatusCode },

    #[error("failed to decode STS response: {source}")]
    ResponseDecode {
        #[from]
        source: quick_xml::DeError,
    },

    #[error("temporary credentials unavailable: {source}")]
    Credentials { source: BoxError },
}

/// Discriminant of [`StsError`], for branching without matching on messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidParameter,
    RequestConstruction,
    Transport,
    ServerRejection,
    ResponseDecode,
    CredentialsUnavailable,
}

impl ErrorKind {
    /// Only transport failures may succeed on a plain retry.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transport)
    }
}

impl StsError {
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn credentials(source: impl Into<BoxError>) -> Self {
        Self::Credentials {
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StsError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            StsError::Request { .. } => ErrorKind::RequestConstruction,
            StsError::Transport { .. } => ErrorKind::Transport,
            StsError::Rejected { .. } => ErrorKind::ServerRejection,
            StsError::ResponseDecode { .. } => ErrorKind::ResponseDecode,
            StsError::Credentials { .. } => ErrorKind::CredentialsUnavailable,
        }
    }
}

impl From<hyper::header::InvalidHeaderValue> for StsError {
    fn from(e: hyper::header::InvalidHeaderValue) -> Self {
        Self::Request { source: e.into() }
    }
}

pub type StsResult<T> = Result<T, StsError>;

/// Errors that stop the process before it serves any request
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid AWS IAM ARN specified {arn}")]
    InvalidArn { arn: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    pub fn invalid_arn(arn: impl Into<String>) -> Self {
        Self::InvalidArn { arn: arn.into() }
    }
}
