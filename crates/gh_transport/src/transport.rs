use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use http::{header, HeaderValue, Request, Response, StatusCode};
use tracing::{debug, instrument, warn};

use crate::error::TransportFailure;
use crate::metrics;
use crate::model::{graphql_rate_limited, parse_rate_limit, retry_advice, ApiRequest, ApiResponse};

const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait HttpExec: Send + Sync {
    async fn execute(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpExec for ReqwestExecutor {
    async fn execute(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let (parts, body) = req.into_parts();
        let mut builder = self.client.request(parts.method, parts.uri.to_string());
        builder = builder.headers(parts.headers);
        let resp = builder.body(body).send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await?;
        let mut response = Response::builder().status(status).body(bytes.to_vec())?;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Sends one request and classifies the outcome. Retrying is the caller's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportFailure>;
}

pub struct GithubTransport {
    http_exec: Arc<dyn HttpExec>,
    authorization: HeaderValue,
    user_agent: HeaderValue,
}

impl GithubTransport {
    pub fn new(http_exec: Arc<dyn HttpExec>, token: &str, user_agent: &str) -> Result<Self> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {token}"))?;
        authorization.set_sensitive(true);
        Ok(Self {
            http_exec,
            authorization,
            user_agent: HeaderValue::from_str(user_agent)?,
        })
    }

    fn build(&self, request: &ApiRequest) -> Result<Request<Vec<u8>>> {
        let body = match &request.body {
            Some(value) => serde_json::to_vec(value)?,
            None => Vec::new(),
        };
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(request.url.as_str())
            .header(header::AUTHORIZATION, self.authorization.clone())
            .header(header::USER_AGENT, self.user_agent.clone())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if request.body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        Ok(builder.body(body)?)
    }
}

#[async_trait]
impl Transport for GithubTransport {
    #[instrument(skip(self, request), fields(endpoint = %request.endpoint()))]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportFailure> {
        let endpoint = request.endpoint();
        let http_request = self
            .build(&request)
            .map_err(|err| TransportFailure::network(endpoint.clone(), err))?;

        debug!(method = %request.method, "dispatching GitHub request");
        let start = std::time::Instant::now();
        let result = self.http_exec.execute(http_request).await;
        metrics::LATENCY.observe(start.elapsed().as_secs_f64());

        let response = match result {
            Ok(resp) => resp,
            Err(err) => {
                metrics::REQUESTS_TOTAL
                    .with_label_values(&["network_error"])
                    .inc();
                return Err(TransportFailure::network(endpoint, err));
            }
        };

        let (parts, body) = response.into_parts();
        let response = ApiResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        };
        let outcome = classify(&request, endpoint, response);
        let label = match &outcome {
            Ok(_) => "success",
            Err(failure) => failure.class(),
        };
        metrics::REQUESTS_TOTAL.with_label_values(&[label]).inc();
        outcome
    }
}

/// Maps a completed HTTP exchange onto the failure taxonomy.
pub fn classify(
    request: &ApiRequest,
    endpoint: String,
    response: ApiResponse,
) -> Result<ApiResponse, TransportFailure> {
    let status = response.status;
    if status.is_success() {
        if request.is_graphql() && graphql_rate_limited(&response.body) {
            warn!(endpoint = %endpoint, "GraphQL reported rate limit");
            return Err(TransportFailure::RateLimited {
                status,
                endpoint,
                retry_after: retry_advice(&response.headers, Utc::now()),
            });
        }
        return Ok(response);
    }

    let request_id = response
        .header("x-github-request-id")
        .unwrap_or("-")
        .to_string();
    let rate_info = parse_rate_limit(&response.headers);

    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_advice(&response.headers, Utc::now());
        warn!(
            status = %status,
            endpoint = %endpoint,
            github_request_id = %request_id,
            retry_after_seconds = retry_after.map(|d| d.as_secs()),
            rate_limit_remaining = rate_info.as_ref().map(|data| data.remaining),
            "GitHub returned rate limit response"
        );
        return Err(TransportFailure::RateLimited {
            status,
            endpoint,
            retry_after,
        });
    }

    let preview = body_preview(&response.body);
    warn!(
        status = %status,
        endpoint = %endpoint,
        github_request_id = %request_id,
        body_preview = %preview,
        "GitHub returned error response"
    );
    if status.is_server_error() {
        Err(TransportFailure::ServerError { status, endpoint })
    } else {
        Err(TransportFailure::ClientError {
            status,
            endpoint,
            message: preview,
        })
    }
}

fn body_preview(body: &[u8]) -> String {
    if body.is_empty() {
        return String::new();
    }
    let text = String::from_utf8_lossy(body);
    truncate_str(&text, 256)
}

fn truncate_str(value: &str, limit: usize) -> String {
    let mut truncated: String = value.chars().take(limit).collect();
    if truncated.len() < value.len() {
        truncated.push('…');
    }
    truncated
}
