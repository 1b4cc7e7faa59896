use base64::{engine::general_purpose::STANDARD as BASE64_ENGINE, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::RecordKind;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UserRef {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LabelRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MilestoneRef {
    pub title: String,
}

/// Pull-request linkage embedded in a REST issue-listing item.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PullRequestLink {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    /// Filled in by enrichment; the listing itself never carries it.
    #[serde(default)]
    pub merged: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReactionsPayload {
    #[serde(rename = "+1", default)]
    pub plus_one: u64,
    #[serde(rename = "-1", default)]
    pub minus_one: u64,
    #[serde(default)]
    pub laugh: u64,
    #[serde(default)]
    pub hooray: u64,
    #[serde(default)]
    pub confused: u64,
    #[serde(default)]
    pub heart: u64,
    #[serde(default)]
    pub rocket: u64,
    #[serde(default)]
    pub eyes: u64,
}

impl ReactionsPayload {
    pub fn sum(&self) -> u64 {
        self.plus_one
            + self.minus_one
            + self.laugh
            + self.hooray
            + self.confused
            + self.heart
            + self.rocket
            + self.eyes
    }
}

/// One element of `GET /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RestItemPayload {
    pub id: i64,
    pub number: i64,
    #[serde(default)]
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub pull_request: Option<PullRequestLink>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub labels: Vec<LabelRef>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub assignees: Vec<UserRef>,
    #[serde(default)]
    pub milestone: Option<MilestoneRef>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub reactions: Option<ReactionsPayload>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub html_url: String,
}

/// Body of `GET /repos/{owner}/{repo}/pulls/{number}`, reduced to the merge fields.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PullMergePayload {
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TotalCount {
    #[serde(rename = "totalCount", default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Nodes<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<T> Nodes<T> {
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.nodes.iter().flatten()
    }
}

/// One node of the `issues` or `pullRequests` connection.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphItemPayload {
    #[serde(rename = "__typename", default)]
    pub typename: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub database_id: Option<i64>,
    pub number: i64,
    #[serde(default)]
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged: Option<bool>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: TotalCount,
    #[serde(default)]
    pub labels: Nodes<LabelRef>,
    #[serde(default)]
    pub author: Option<UserRef>,
    #[serde(default)]
    pub assignees: Nodes<UserRef>,
    #[serde(default)]
    pub milestone: Option<MilestoneRef>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub reactions: TotalCount,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub url: String,
}

impl GraphItemPayload {
    /// Numeric id: `databaseId` when selected, otherwise recovered from a
    /// legacy base64 global id such as `MDU6SXNzdWUxMjM=` (`05:Issue123`).
    pub fn resolved_id(&self) -> Option<i64> {
        self.database_id
            .or_else(|| self.id.as_deref().and_then(decode_global_id))
    }
}

pub fn decode_global_id(value: &str) -> Option<i64> {
    let decoded = BASE64_ENGINE.decode(value).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let digits_start = text
        .char_indices()
        .rev()
        .take_while(|(_, ch)| ch.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)?;
    text[digits_start..].parse().ok()
}

/// An issue or pull request as delivered by one acquisition strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum RawItem {
    Rest(Box<RestItemPayload>),
    Graph(Box<GraphItemPayload>),
}

impl RawItem {
    /// Kind as implied by the item's own pull-request linkage.
    pub fn kind(&self) -> RecordKind {
        let is_pull = match self {
            RawItem::Rest(item) => item.pull_request.is_some(),
            RawItem::Graph(node) => node.typename.as_deref() == Some("PullRequest"),
        };
        if is_pull {
            RecordKind::PullRequest
        } else {
            RecordKind::Issue
        }
    }

    pub fn number(&self) -> i64 {
        match self {
            RawItem::Rest(item) => item.number,
            RawItem::Graph(node) => node.number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rest_reactions_skip_url_and_total() {
        let reactions: ReactionsPayload = serde_json::from_value(json!({
            "url": "https://api.github.com/repos/o/r/issues/1/reactions",
            "total_count": 6,
            "+1": 3, "-1": 1, "laugh": 0, "hooray": 0,
            "confused": 0, "heart": 2, "rocket": 0, "eyes": 0
        }))
        .unwrap();
        assert_eq!(reactions.sum(), 6);
    }

    #[test]
    fn graph_nodes_tolerate_null_entries() {
        let labels: Nodes<LabelRef> =
            serde_json::from_value(json!({"nodes": [{"name": "bug"}, null, {"name": "ui"}]}))
                .unwrap();
        let names: Vec<_> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["bug", "ui"]);
    }

    #[test]
    fn global_id_decodes_trailing_digits() {
        let encoded = BASE64_ENGINE.encode("05:Issue123456");
        assert_eq!(decode_global_id(&encoded), Some(123456));
        assert_eq!(decode_global_id("I_kwDOAbc"), None);
    }

    #[test]
    fn kind_follows_linkage() {
        let item: RestItemPayload = serde_json::from_value(json!({
            "id": 1, "number": 2, "state": "open",
            "pull_request": {"url": "https://api.github.com/repos/o/r/pulls/2"}
        }))
        .unwrap();
        assert_eq!(RawItem::Rest(Box::new(item)).kind(), RecordKind::PullRequest);
    }
}
