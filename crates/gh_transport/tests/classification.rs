use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use gh_transport::{ApiRequest, GithubTransport, HttpExec, Transport, TransportFailure};
use http::{header, Request, Response, StatusCode};
use serde_json::json;
use url::Url;

struct StubExec {
    status: StatusCode,
    body: Vec<u8>,
    seen: Mutex<Vec<Request<Vec<u8>>>>,
}

impl StubExec {
    fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HttpExec for StubExec {
    async fn execute(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        self.seen.lock().unwrap().push(req);
        Ok(Response::builder()
            .status(self.status)
            .body(self.body.clone())
            .unwrap())
    }
}

struct BrokenExec;

#[async_trait]
impl HttpExec for BrokenExec {
    async fn execute(&self, _req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        Err(anyhow!("connection reset by peer"))
    }
}

fn issues_request() -> ApiRequest {
    ApiRequest::get(Url::parse("https://api.github.com/repos/octo/demo/issues?page=1").unwrap())
}

async fn send_with(status: StatusCode) -> Result<gh_transport::ApiResponse, TransportFailure> {
    let exec = Arc::new(StubExec::new(status, "{}"));
    let transport = GithubTransport::new(exec, "secret-token", "test-agent").unwrap();
    transport.send(issues_request()).await
}

#[tokio::test]
async fn success_attaches_credential_and_headers() {
    let exec = Arc::new(StubExec::new(StatusCode::OK, "[]"));
    let transport = GithubTransport::new(exec.clone(), "secret-token", "test-agent").unwrap();
    let response = transport.send(issues_request()).await.expect("ok");
    assert_eq!(response.status, StatusCode::OK);

    let seen = exec.seen.lock().unwrap();
    let req = &seen[0];
    assert_eq!(
        req.headers().get(header::AUTHORIZATION).unwrap(),
        "Bearer secret-token"
    );
    assert_eq!(req.headers().get(header::USER_AGENT).unwrap(), "test-agent");
    assert_eq!(
        req.uri().to_string(),
        "https://api.github.com/repos/octo/demo/issues?page=1"
    );
}

#[tokio::test]
async fn forbidden_and_too_many_requests_are_rate_limits() {
    for status in [StatusCode::FORBIDDEN, StatusCode::TOO_MANY_REQUESTS] {
        match send_with(status).await {
            Err(TransportFailure::RateLimited { status: got, .. }) => assert_eq!(got, status),
            other => panic!("expected RateLimited for {status}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn five_hundreds_are_server_errors() {
    match send_with(StatusCode::BAD_GATEWAY).await {
        Err(TransportFailure::ServerError { status, endpoint }) => {
            assert_eq!(status, StatusCode::BAD_GATEWAY);
            assert_eq!(endpoint, "repos/octo/demo/issues?page=1");
        }
        other => panic!("expected ServerError, got {other:?}"),
    }
}

#[tokio::test]
async fn other_client_errors_are_not_retryable() {
    let failure = send_with(StatusCode::UNAUTHORIZED).await.unwrap_err();
    assert!(matches!(failure, TransportFailure::ClientError { .. }));
    assert!(failure.is_auth_rejection());

    let failure = send_with(StatusCode::NOT_FOUND).await.unwrap_err();
    assert!(!failure.is_auth_rejection());
    assert_eq!(failure.status(), Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn executor_errors_are_network_errors() {
    let transport = GithubTransport::new(Arc::new(BrokenExec), "t", "ua").unwrap();
    let failure = transport.send(issues_request()).await.unwrap_err();
    assert!(matches!(failure, TransportFailure::NetworkError { .. }));
    assert_eq!(failure.class(), "network_error");
}

#[tokio::test]
async fn graphql_rate_limit_payload_is_classified() {
    let body = json!({"errors": [{"type": "RATE_LIMITED", "message": "API rate limit exceeded"}]});
    let exec = Arc::new(StubExec::new(StatusCode::OK, body.to_string()));
    let transport = GithubTransport::new(exec.clone(), "t", "ua").unwrap();
    let request = ApiRequest::post_json(
        Url::parse("https://api.github.com/graphql").unwrap(),
        json!({"query": "{ viewer { login } }"}),
    );
    let failure = transport.send(request).await.unwrap_err();
    assert!(matches!(failure, TransportFailure::RateLimited { .. }));

    let seen = exec.seen.lock().unwrap();
    assert_eq!(
        seen[0].headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
}
