use hyper::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{StsError, StsResult};
use super::region::extract_region;

/// Body of the STS request every assertion is signed over. It is replayed verbatim.
pub const GET_CALLER_IDENTITY_BODY: &str = "Action=GetCallerIdentity&Version=2011-06-15";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const STS_SERVICE: &str = "sts";

pub const X_AMZ_DATE: &str = "x-amz-date";
pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// Signed STS request parameters a client presents as proof of identity
#[derive(Clone, PartialEq, Eq)]
pub struct SignedAssertion {
    /// Region the signature was computed against
    pub region: String,

    /// `X-Amz-Date` timestamp, e.g. `20230730T101440Z`
    pub issued_at: String,

    /// SigV4 `Authorization` header value
    pub authorization: String,

    /// Session token of the temporary credentials
    pub security_token: String,
}

impl SignedAssertion {
    /// Read an assertion from `x-amz-date`, `x-amz-security-token` and `authorization`.
    ///
    /// The region is taken from the credential scope of the authorization header.
    pub fn from_headers(headers: &HeaderMap) -> StsResult<Self> {
        let issued_at = required_header(headers, X_AMZ_DATE)?;
        let security_token = required_header(headers, X_AMZ_SECURITY_TOKEN)?;
        let authorization = required_header(headers, AUTHORIZATION.as_str())?;
        let region = extract_region(&authorization)
            .ok_or_else(|| StsError::invalid_parameter("missing AWS IAM region"))?
            .to_string();

        Ok(Self {
            region,
            issued_at,
            authorization,
            security_token,
        })
    }

    /// Attach the assertion headers to an outbound request.
    pub fn apply_to(&self, headers: &mut HeaderMap) -> StsResult<()> {
        headers.insert(X_AMZ_DATE, HeaderValue::from_str(&self.issued_at)?);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&self.authorization)?);
        let mut token = HeaderValue::from_str(&self.security_token)?;
        token.set_sensitive(true);
        headers.insert(X_AMZ_SECURITY_TOKEN, token);
        Ok(())
    }
}

impl fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedAssertion")
            .field("region", &self.region)
            .field("issued_at", &self.issued_at)
            .field("authorization", &self.authorization)
            .field("security_token", &"<redacted>")
            .finish()
    }
}

fn required_header(headers: &HeaderMap, name: &str) -> StsResult<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StsError::invalid_parameter(format!("missing {} header", name)))
}

/// Identity STS reports for a valid signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// User or role ARN
    pub arn: String,

    /// Unique ID of the principal
    pub user_id: String,

    /// AWS account ID
    pub account: String,

    /// STS request ID, for correlating with CloudTrail
    pub request_id: String,
}
