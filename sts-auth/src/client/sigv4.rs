//! AWS Signature Version 4 header signing.
//!
//! Only what the assertion needs: sign every header present on the request
//! (plus `host`, `x-amz-date` and the session token) over a caller-supplied
//! payload hash.

use aws_credential_types::Credentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use hyper::header::{HeaderValue, AUTHORIZATION, HOST};
use hyper::Request;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::common::{StsError, StsResult, X_AMZ_DATE, X_AMZ_SECURITY_TOKEN};

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const TERMINATOR: &str = "aws4_request";

/// Everything except the RFC 3986 unreserved characters
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

type HmacSha256 = Hmac<Sha256>;

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take a key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, TERMINATOR.as_bytes())
}

/// Encode each segment of an already-encoded path once more, as non-S3 services expect.
fn canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, URI_ENCODE_SET).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(query: Option<&str>) -> String {
    let mut pairs: Vec<(&str, &str)> = query
        .unwrap_or_default()
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
        .collect();
    pairs.sort_unstable();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign `request` in place, setting `x-amz-date`, `x-amz-security-token` and `authorization`.
///
/// Deterministic for identical inputs and `timestamp`.
pub fn sign_request<B>(
    credentials: &Credentials,
    request: &mut Request<B>,
    payload_hash: &str,
    service: &str,
    region: &str,
    timestamp: DateTime<Utc>,
) -> StsResult<()> {
    let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = timestamp.format("%Y%m%d").to_string();

    if !request.headers().contains_key(HOST) {
        let host = request
            .uri()
            .authority()
            .map(|a| a.as_str().to_string())
            .ok_or_else(|| StsError::invalid_parameter("request uri has no host"))?;
        request.headers_mut().insert(HOST, HeaderValue::from_str(&host)?);
    }
    request.headers_mut().remove(AUTHORIZATION);
    request
        .headers_mut()
        .insert(X_AMZ_DATE, HeaderValue::from_str(&amz_date)?);
    if let Some(token) = credentials.session_token() {
        let mut value = HeaderValue::from_str(token)?;
        value.set_sensitive(true);
        request.headers_mut().insert(X_AMZ_SECURITY_TOKEN, value);
    }

    let mut headers: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, value) in request.headers() {
        let value = value.to_str().map_err(|_| {
            StsError::invalid_parameter(format!("header {} is not visible ASCII", name))
        })?;
        headers.entry(name.as_str()).or_default().push(value.trim());
    }
    let canonical_headers: String = headers
        .iter()
        .map(|(name, values)| format!("{}:{}\n", name, values.join(",")))
        .collect();
    let signed_headers = headers.keys().copied().collect::<Vec<_>>().join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method(),
        canonical_uri(request.uri().path()),
        canonical_query(request.uri().query()),
        canonical_headers,
        signed_headers,
        payload_hash
    );

    let scope = format!("{}/{}/{}/{}", date_stamp, region, service, TERMINATOR);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let signing_key =
        derive_signing_key(credentials.secret_access_key(), &date_stamp, region, service);
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM,
        credentials.access_key_id(),
        scope,
        signed_headers,
        signature
    );
    request
        .headers_mut()
        .insert(AUTHORIZATION, HeaderValue::from_str(&authorization)?);

    Ok(())
}
