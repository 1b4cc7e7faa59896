use gh_transport::{ApiRequest, ApiResponse};
use normalizer::{GraphItemPayload, RawItem, RecordKind};
use serde_json::{json, Value};
use tracing::warn;

use crate::adapter::{Page, PageError, RepoTarget, ResourceAdapter};
use crate::cursor::{Cursor, PageMarker, Position};

const ISSUES_QUERY: &str = r#"
query RepoIssues($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    items: issues(
      first: $first,
      after: $after,
      orderBy: { field: CREATED_AT, direction: DESC }
    ) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        __typename
        id
        databaseId
        number
        title
        state
        createdAt
        closedAt
        updatedAt
        comments { totalCount }
        labels(first: 100) { nodes { name } }
        author { login }
        assignees(first: 100) { nodes { login } }
        milestone { title }
        body
        reactions { totalCount }
        locked
        url
      }
    }
  }
}
"#;

const PULL_REQUESTS_QUERY: &str = r#"
query RepoPullRequests($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    items: pullRequests(
      first: $first,
      after: $after,
      orderBy: { field: CREATED_AT, direction: DESC }
    ) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        __typename
        id
        databaseId
        number
        title
        state
        createdAt
        closedAt
        updatedAt
        merged
        mergedAt
        comments { totalCount }
        labels(first: 100) { nodes { name } }
        author { login }
        assignees(first: 100) { nodes { login } }
        milestone { title }
        body
        reactions { totalCount }
        locked
        url
      }
    }
  }
}
"#;

/// One query per stream against the `issues` or `pullRequests` connection.
pub struct GraphqlAdapter {
    target: RepoTarget,
    kind: RecordKind,
    page_size: u32,
}

impl GraphqlAdapter {
    pub fn new(target: RepoTarget, kind: RecordKind, page_size: u32) -> Self {
        Self {
            target,
            kind,
            page_size: page_size.clamp(1, 100),
        }
    }

    fn query(&self) -> &'static str {
        match self.kind {
            RecordKind::Issue => ISSUES_QUERY,
            RecordKind::PullRequest => PULL_REQUESTS_QUERY,
        }
    }
}

impl ResourceAdapter for GraphqlAdapter {
    fn kind(&self) -> RecordKind {
        self.kind
    }

    fn initial_cursor(&self) -> Cursor {
        Cursor::opaque()
    }

    fn build_request(&self, cursor: &Cursor) -> Result<ApiRequest, PageError> {
        let Position::After(after) = cursor.position() else {
            return Err(PageError::Cursor {
                adapter: "graphql",
                cursor: cursor.describe(),
            });
        };
        let payload = json!({
            "query": self.query(),
            "variables": {
                "owner": self.target.owner,
                "name": self.target.name,
                "first": self.page_size,
                "after": after,
            },
        });
        Ok(ApiRequest::post_json(self.target.graphql_url.clone(), payload))
    }

    fn parse_page(&self, response: &ApiResponse) -> Result<Page, PageError> {
        let value: Value = response.json()?;
        if let Some(errors) = value.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(map_graphql_errors(errors));
            }
        }

        let connection = value
            .get("data")
            .and_then(|data| data.get("repository"))
            .filter(|repo| !repo.is_null())
            .ok_or_else(|| PageError::Graphql("repository missing from response".into()))?
            .get("items")
            .ok_or_else(|| PageError::Graphql("connection missing from response".into()))?;

        let page_info = connection.get("pageInfo");
        let has_next_page = page_info
            .and_then(|info| info.get("hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let end_cursor = page_info
            .and_then(|info| info.get("endCursor"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut items = Vec::new();
        let mut skipped = 0;
        let nodes = connection
            .get("nodes")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for node in nodes.iter().filter(|node| !node.is_null()) {
            match serde_json::from_value::<GraphItemPayload>(node.clone()) {
                Ok(payload) if payload.resolved_id().is_some() => {
                    items.push(RawItem::Graph(Box::new(payload)));
                }
                Ok(payload) => {
                    skipped += 1;
                    warn!(
                        kind = self.kind.as_str(),
                        number = payload.number,
                        "skipping node without a resolvable id"
                    );
                }
                Err(err) => {
                    skipped += 1;
                    warn!(kind = self.kind.as_str(), error = %err, "skipping undecodable node");
                }
            }
        }

        Ok(Page {
            items,
            marker: PageMarker::Continuation {
                has_next_page,
                end_cursor,
            },
            skipped,
        })
    }
}

fn map_graphql_errors(errors: &[Value]) -> PageError {
    let Some(first) = errors.first() else {
        return PageError::Graphql("unknown GraphQL error".into());
    };
    let message = first
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown GraphQL error");
    let error_type = first
        .get("type")
        .or_else(|| first.get("extensions").and_then(|ext| ext.get("code")))
        .and_then(Value::as_str);
    match error_type {
        Some(kind) => PageError::Graphql(format!("{kind}: {message}")),
        None => PageError::Graphql(message.to_string()),
    }
}
