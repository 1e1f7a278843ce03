use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HOST};
use hyper::{Body, Client as HttpClient, Method, Request, Uri};
use hyper_tls::HttpsConnector;
use quick_xml::events::Event;
use quick_xml::{DeError, Reader};
use serde::de::Error as _;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::common::{
    CallerIdentity, StsError, StsResult, FORM_CONTENT_TYPE, GET_CALLER_IDENTITY_BODY, X_AMZ_DATE,
    X_AMZ_SECURITY_TOKEN,
};

pub type HttpsClient = HttpClient<HttpsConnector<HttpConnector>>;

const RESPONSE_ROOT: &str = "GetCallerIdentityResponse";

/// Replays a signed assertion against STS and decodes who signed it
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Call `GetCallerIdentity` at `endpoint_url` with the client's signature.
    ///
    /// The returned ARN is not checked here; callers validate it before trusting it.
    async fn get_caller_identity(
        &self,
        endpoint_url: &str,
        issued_at: &str,
        authorization: &str,
        security_token: &str,
    ) -> StsResult<CallerIdentity>;
}

#[derive(Debug, Deserialize)]
struct GetCallerIdentityResponse {
    #[serde(rename = "GetCallerIdentityResult")]
    result: GetCallerIdentityResult,
    #[serde(rename = "ResponseMetadata")]
    metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCallerIdentityResult {
    arn: String,
    user_id: String,
    account: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseMetadata {
    request_id: String,
}

/// Default implementation of IdentityVerifier over a shared hyper client
#[derive(Clone)]
pub struct StsIdentityVerifier {
    http_client: HttpsClient,
}

impl StsIdentityVerifier {
    pub fn new(http_client: HttpsClient) -> Self {
        Self { http_client }
    }

    fn build_request(
        endpoint_url: &str,
        issued_at: &str,
        authorization: &str,
        security_token: &str,
    ) -> StsResult<Request<Body>> {
        let uri: Uri = endpoint_url.parse().map_err(hyper::http::Error::from)?;
        // The signature covers the host, so it must match the endpoint we post to.
        let host = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .ok_or_else(|| {
                StsError::invalid_parameter(format!("url has no host: {}", endpoint_url))
            })?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(X_AMZ_DATE, issued_at)
            .header(AUTHORIZATION, authorization)
            .header(X_AMZ_SECURITY_TOKEN, security_token)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(HOST, host)
            .header(CONTENT_LENGTH, GET_CALLER_IDENTITY_BODY.len().to_string())
            .body(Body::from(GET_CALLER_IDENTITY_BODY))?;
        Ok(request)
    }

    fn decode_response(body: &[u8]) -> StsResult<CallerIdentity> {
        // The serde decoder does not check the root tag.
        check_root(body)?;
        let response: GetCallerIdentityResponse = quick_xml::de::from_reader(body)?;
        Ok(CallerIdentity {
            arn: response.result.arn,
            user_id: response.result.user_id,
            account: response.result.account,
            request_id: response.metadata.request_id,
        })
    }
}

fn check_root(body: &[u8]) -> Result<(), DeError> {
    let mut reader = Reader::from_reader(body);
    loop {
        let event = reader
            .read_event()
            .map_err(|e| DeError::custom(format!("malformed STS response: {}", e)))?;
        match event {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.local_name();
                if name.as_ref() == RESPONSE_ROOT.as_bytes() {
                    return Ok(());
                }
                return Err(DeError::custom(format!(
                    "unexpected root element {}, expected {}",
                    String::from_utf8_lossy(name.as_ref()),
                    RESPONSE_ROOT
                )));
            }
            Event::Eof => return Err(DeError::custom("STS response has no root element")),
            _ => {}
        }
    }
}

impl Default for StsIdentityVerifier {
    fn default() -> Self {
        Self::new(HttpClient::builder().build(HttpsConnector::new()))
    }
}

#[async_trait]
impl IdentityVerifier for StsIdentityVerifier {
    #[instrument(skip(self, authorization, security_token))]
    async fn get_caller_identity(
        &self,
        endpoint_url: &str,
        issued_at: &str,
        authorization: &str,
        security_token: &str,
    ) -> StsResult<CallerIdentity> {
        let parameters = [
            ("url", endpoint_url),
            ("x-amz-date", issued_at),
            ("authorization", authorization),
            ("x-amz-security-token", security_token),
        ];
        for (name, value) in parameters {
            if value.is_empty() {
                return Err(StsError::invalid_parameter(format!("{} is empty", name)));
            }
        }

        let request = Self::build_request(endpoint_url, issued_at, authorization, security_token)?;
        let response = self.http_client.request(request).await.map_err(|e| {
            warn!("Failed STS GetCallerIdentity call: {}", e);
            StsError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("STS call returned non-success status: {}", status);
            return Err(StsError::Rejected { status });
        }

        let body = hyper::body::to_bytes(response.into_body()).await?;
        let identity = Self::decode_response(&body).map_err(|e| {
            warn!("Failed to parse STS identity from response: {}", e);
            e
        })?;

        debug!(arn = %identity.arn, request_id = %identity.request_id, "STS identity decoded");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;
    use crate::testutil::{caller_identity_xml, spawn_stub, status_response, xml_response};
    use hyper::StatusCode;

    const DATE: &str = "20230730T101440Z";
    const AUTHORIZATION_VALUE: &str = "AWS4-HMAC-SHA256 Credential=C/20230730/eu-central-1/sts/aws4_request, SignedHeaders=h, Signature=s";
    const TOKEN: &str = "thisIsSecurityToken";

    const MISSING_FIELDS_XML: &str = "<GetCallerIdentityResponse><GetCallerIdentityResult>\
        <Arn>x</Arn></GetCallerIdentityResult></GetCallerIdentityResponse>";

    const WRONG_ROOT_XML: &str = r#"
<ErrorResponse>
  <GetCallerIdentityResult>
    <Arn>arn:aws:iam::1234567890:user/username</Arn>
    <UserId>AKIATESTACCESSKEY</UserId>
    <Account>1234567890</Account>
  </GetCallerIdentityResult>
  <ResponseMetadata>
    <RequestId>7ae1ff87-8867-4b21-916b-4b44bef35345</RequestId>
  </ResponseMetadata>
</ErrorResponse>"#;

    fn stub_sts() -> crate::testutil::StubServer {
        spawn_stub(|req| {
            let case = req
                .uri()
                .query()
                .and_then(|q| q.strip_prefix("case="))
                .unwrap_or_default()
                .to_string();
            match case.as_str() {
                "notAcceptable" => status_response(StatusCode::NOT_ACCEPTABLE),
                "badResponse" => xml_response("this is not expected xml payload".to_string()),
                "missingFields" => xml_response(MISSING_FIELDS_XML.to_string()),
                "wrongRoot" => xml_response(WRONG_ROOT_XML.to_string()),
                "goodResponse" => {
                    xml_response(caller_identity_xml("arn:aws:iam::1234567890:user/username"))
                }
                _ => status_response(StatusCode::INTERNAL_SERVER_ERROR),
            }
        })
    }

    #[tokio::test]
    async fn test_empty_parameters_fail_before_network() {
        let stub = stub_sts();
        let verifier = StsIdentityVerifier::default();
        let url = format!("{}?case=goodResponse", stub.url);

        let cases = [
            ("", DATE, AUTHORIZATION_VALUE, TOKEN, "url is empty"),
            (url.as_str(), "", AUTHORIZATION_VALUE, TOKEN, "x-amz-date is empty"),
            (url.as_str(), DATE, "", TOKEN, "authorization is empty"),
            (url.as_str(), DATE, AUTHORIZATION_VALUE, "", "x-amz-security-token is empty"),
        ];

        for (endpoint, date, authorization, token, message) in cases {
            let err = verifier
                .get_caller_identity(endpoint, date, authorization, token)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter);
            assert_eq!(err.to_string(), message);
        }

        assert_eq!(stub.hits(), 0);
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejection() {
        let stub = stub_sts();
        let verifier = StsIdentityVerifier::default();

        let err = verifier
            .get_caller_identity(
                &format!("{}?case=notAcceptable", stub.url),
                DATE,
                AUTHORIZATION_VALUE,
                TOKEN,
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ServerRejection);
        assert!(matches!(
            err,
            StsError::Rejected { status } if status == StatusCode::NOT_ACCEPTABLE
        ));
        assert_eq!(stub.hits(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_body_is_decode_error() {
        let stub = stub_sts();
        let verifier = StsIdentityVerifier::default();

        for case in ["badResponse", "missingFields", "wrongRoot"] {
            let url = format!("{}?case={}", stub.url, case);
            let err = verifier
                .get_caller_identity(&url, DATE, AUTHORIZATION_VALUE, TOKEN)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ResponseDecode, "case: {}", case);
        }
    }

    #[test]
    fn test_decode_requires_response_root() {
        let err = StsIdentityVerifier::decode_response(WRONG_ROOT_XML.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseDecode);
        assert!(err.to_string().contains("unexpected root element ErrorResponse"));

        let err = StsIdentityVerifier::decode_response(b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseDecode);

        let xml = caller_identity_xml("arn:aws:iam::1234567890:role/deployer");
        let identity = StsIdentityVerifier::decode_response(xml.as_bytes()).unwrap();
        assert_eq!(identity.arn, "arn:aws:iam::1234567890:role/deployer");
    }

    #[tokio::test]
    async fn test_good_response_decodes_identity() {
        let stub = stub_sts();
        let verifier = StsIdentityVerifier::default();

        let identity = verifier
            .get_caller_identity(
                &format!("{}?case=goodResponse", stub.url),
                DATE,
                AUTHORIZATION_VALUE,
                TOKEN,
            )
            .await
            .unwrap();

        assert_eq!(identity.arn, "arn:aws:iam::1234567890:user/username");
        assert_eq!(identity.user_id, "AKIATESTACCESSKEY");
        assert_eq!(identity.account, "1234567890");
        assert_eq!(identity.request_id, "7ae1ff87-8867-4b21-916b-4b44bef35345");
    }

    #[tokio::test]
    async fn test_repeated_verification_is_stable() {
        let stub = stub_sts();
        let verifier = StsIdentityVerifier::default();
        let url = format!("{}?case=goodResponse", stub.url);

        let first = verifier
            .get_caller_identity(&url, DATE, AUTHORIZATION_VALUE, TOKEN)
            .await
            .unwrap();
        for _ in 0..3 {
            let again = verifier
                .get_caller_identity(&url, DATE, AUTHORIZATION_VALUE, TOKEN)
                .await
                .unwrap();
            assert_eq!(again, first);
        }
        assert_eq!(stub.hits(), 4);
    }

    #[tokio::test]
    async fn test_sends_signed_headers_and_body() {
        let stub = spawn_stub(|req| {
            let headers = req.headers();
            let expected_host = headers
                .get(HOST)
                .and_then(|h| h.to_str().ok())
                .map(|h| h.starts_with("127.0.0.1:"))
                .unwrap_or(false);
            let ok = *req.method() == Method::POST
                && expected_host
                && headers.get(X_AMZ_DATE).map(|v| v == DATE).unwrap_or(false)
                && headers.get(AUTHORIZATION).map(|v| v == AUTHORIZATION_VALUE).unwrap_or(false)
                && headers.get(X_AMZ_SECURITY_TOKEN).map(|v| v == TOKEN).unwrap_or(false)
                && headers.get(CONTENT_TYPE).map(|v| v == FORM_CONTENT_TYPE).unwrap_or(false)
                && headers.get(CONTENT_LENGTH).map(|v| v == "43").unwrap_or(false);
            if ok {
                xml_response(caller_identity_xml("arn:aws:iam::1234567890:role/checked"))
            } else {
                status_response(StatusCode::BAD_REQUEST)
            }
        });

        let identity = StsIdentityVerifier::default()
            .get_caller_identity(&stub.url, DATE, AUTHORIZATION_VALUE, TOKEN)
            .await
            .unwrap();
        assert_eq!(identity.arn, "arn:aws:iam::1234567890:role/checked");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Reserve a port and release it so nothing is listening there.
        let url = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };

        let err = StsIdentityVerifier::default()
            .get_caller_identity(&url, DATE, AUTHORIZATION_VALUE, TOKEN)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn test_malformed_url_is_request_error() {
        let err = StsIdentityVerifier::build_request("not a url", DATE, AUTHORIZATION_VALUE, TOKEN)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestConstruction);
    }
}
