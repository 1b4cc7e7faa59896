#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::config::{HarvestConfig, Strategy};
use gh_transport::{ApiRequest, ApiResponse, Transport, TransportFailure};
use harvester::RepoTarget;
use http::StatusCode;
use serde_json::{json, Value};

/// Canned outcome for one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    RateLimited,
    Server,
    Client(StatusCode),
    Network,
    /// Never answers.
    Hang,
}

impl Reply {
    fn materialize(&self, endpoint: String) -> Result<ApiResponse, TransportFailure> {
        match self {
            Reply::Json(value) => Ok(ApiResponse::new(
                StatusCode::OK,
                value.to_string().into_bytes(),
            )),
            Reply::RateLimited => Err(TransportFailure::RateLimited {
                status: StatusCode::FORBIDDEN,
                endpoint,
                retry_after: None,
            }),
            Reply::Server => Err(TransportFailure::ServerError {
                status: StatusCode::BAD_GATEWAY,
                endpoint,
            }),
            Reply::Client(status) => Err(TransportFailure::ClientError {
                status: *status,
                endpoint,
                message: String::new(),
            }),
            Reply::Network | Reply::Hang => Err(TransportFailure::network(
                endpoint,
                anyhow::anyhow!("connection reset"),
            )),
        }
    }
}

/// Replies per request key, in order; the last reply for a key repeats.
/// Unscripted keys answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, key: impl Into<String>, replies: Vec<Reply>) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .insert(key.into(), replies.into_iter().collect());
        self
    }

    /// Request keys in the order they were sent.
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, key: &str) -> usize {
        self.requests().iter().filter(|k| k.as_str() == key).count()
    }
}

/// `graphql:issues:<after>` / `graphql:pulls:<after>` for GraphQL posts,
/// otherwise the endpoint path and query.
pub fn request_key(request: &ApiRequest) -> String {
    if !request.is_graphql() {
        return request.endpoint();
    }
    let body = request.body.clone().unwrap_or(Value::Null);
    let query = body["query"].as_str().unwrap_or_default();
    let which = if query.contains("pullRequests(") {
        "pulls"
    } else {
        "issues"
    };
    let after = body["variables"]["after"].as_str().unwrap_or("start");
    format!("graphql:{which}:{after}")
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportFailure> {
        let key = request_key(&request);
        self.log.lock().unwrap().push(key.clone());
        let reply = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        let reply = reply.unwrap_or(Reply::Client(StatusCode::NOT_FOUND));
        if matches!(reply, Reply::Hang) {
            std::future::pending::<()>().await;
        }
        reply.materialize(request.endpoint())
    }
}

pub fn target() -> RepoTarget {
    RepoTarget::new(
        "octo",
        "demo",
        "https://api.github.com/",
        "https://api.github.com/graphql",
    )
    .unwrap()
}

pub fn config(strategy: Strategy) -> HarvestConfig {
    HarvestConfig {
        strategy,
        cooldown_seconds: 60,
        request_spacing_seconds: 0.0,
        max_retries: 3,
        jitter_frac: 0.0,
        ..HarvestConfig::default()
    }
}

pub fn listing_key(page: u32) -> String {
    format!("repos/octo/demo/issues?state=all&per_page=100&page={page}")
}

pub fn rest_issue(number: i64) -> Value {
    json!({
        "id": 1000 + number,
        "number": number,
        "title": format!("Issue {number}"),
        "state": "open",
        "created_at": "2023-01-01T00:00:00Z",
        "updated_at": "2023-01-02T00:00:00Z",
        "comments": 1,
        "labels": [],
        "user": {"login": "reporter"},
        "assignees": [],
        "body": "text",
        "reactions": {"+1": 1},
        "locked": false,
        "html_url": format!("https://github.com/octo/demo/issues/{number}")
    })
}

pub fn rest_pull(number: i64, state: &str, merged_at: Option<&str>) -> Value {
    let closed_at = (state == "closed").then_some("2023-01-03T12:00:00Z");
    json!({
        "id": 2000 + number,
        "number": number,
        "title": format!("Pull {number}"),
        "state": state,
        "pull_request": {
            "url": format!("https://api.github.com/repos/octo/demo/pulls/{number}"),
            "html_url": format!("https://github.com/octo/demo/pull/{number}"),
            "merged_at": merged_at
        },
        "created_at": "2023-01-01T00:00:00Z",
        "closed_at": closed_at,
        "updated_at": "2023-01-03T12:00:00Z",
        "comments": 0,
        "labels": [{"name": "change"}],
        "user": {"login": "contributor"},
        "assignees": [],
        "body": null,
        "locked": false,
        "html_url": format!("https://github.com/octo/demo/pull/{number}")
    })
}

pub fn graph_issue(number: i64) -> Value {
    json!({
        "__typename": "Issue",
        "databaseId": 1000 + number,
        "number": number,
        "title": format!("Issue {number}"),
        "state": "OPEN",
        "createdAt": "2023-01-01T00:00:00Z",
        "updatedAt": "2023-01-02T00:00:00Z",
        "comments": {"totalCount": 1},
        "labels": {"nodes": []},
        "author": {"login": "reporter"},
        "assignees": {"nodes": []},
        "body": "text",
        "reactions": {"totalCount": 1},
        "locked": false,
        "url": format!("https://github.com/octo/demo/issues/{number}")
    })
}

pub fn graph_pull(number: i64, merged: bool) -> Value {
    let state = if merged { "MERGED" } else { "OPEN" };
    let merged_at = merged.then_some("2023-01-03T12:00:00Z");
    json!({
        "__typename": "PullRequest",
        "databaseId": 2000 + number,
        "number": number,
        "title": format!("Pull {number}"),
        "state": state,
        "createdAt": "2023-01-01T00:00:00Z",
        "closedAt": merged_at,
        "updatedAt": "2023-01-03T12:00:00Z",
        "merged": merged,
        "mergedAt": merged_at,
        "comments": {"totalCount": 0},
        "labels": {"nodes": [{"name": "change"}]},
        "author": {"login": "contributor"},
        "assignees": {"nodes": []},
        "body": null,
        "reactions": {"totalCount": 0},
        "locked": false,
        "url": format!("https://github.com/octo/demo/pull/{number}")
    })
}

pub fn graph_page(nodes: Vec<Value>, end_cursor: Option<&str>) -> Reply {
    Reply::Json(json!({"data": {"repository": {"items": {
        "pageInfo": {"hasNextPage": end_cursor.is_some(), "endCursor": end_cursor},
        "nodes": nodes
    }}}}))
}

pub fn shared(transport: ScriptedTransport) -> Arc<ScriptedTransport> {
    Arc::new(transport)
}

pub const COOLDOWN: Duration = Duration::from_secs(60);
