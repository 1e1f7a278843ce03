//! In-process stand-ins for the STS endpoint, shared by the unit tests.

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub(crate) struct StubServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Number of requests the stub has answered
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serve `handler` on an ephemeral localhost port until the stub is dropped.
pub(crate) fn spawn_stub<F>(handler: F) -> StubServer
where
    F: Fn(Request<Body>) -> Response<Body> + Send + Sync + 'static,
{
    let hits = Arc::new(AtomicUsize::new(0));
    let handler = Arc::new(handler);

    let counter = hits.clone();
    let make_svc = make_service_fn(move |_conn| {
        let handler = handler.clone();
        let counter = counter.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                counter.fetch_add(1, Ordering::SeqCst);
                let response = handler.as_ref()(req);
                async move { Ok::<_, Infallible>(response) }
            }))
        }
    });

    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let url = format!("http://{}", server.local_addr());
    let handle = tokio::spawn(async move {
        let _ = server.await;
    });

    StubServer { url, hits, handle }
}

pub(crate) fn caller_identity_xml(arn: &str) -> String {
    format!(
        r#"
<GetCallerIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <GetCallerIdentityResult>
    <Arn>{}</Arn>
    <UserId>AKIATESTACCESSKEY</UserId>
    <Account>1234567890</Account>
  </GetCallerIdentityResult>
  <ResponseMetadata>
    <RequestId>7ae1ff87-8867-4b21-916b-4b44bef35345</RequestId>
  </ResponseMetadata>
</GetCallerIdentityResponse>"#,
        arn
    )
}

pub(crate) fn xml_response(body: String) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/xml")
        .body(Body::from(body))
        .unwrap()
}

pub(crate) fn status_response(status: StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .unwrap()
}
