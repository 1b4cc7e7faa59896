use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bumped whenever a field is added, removed, or changes meaning.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Issue,
    PullRequest,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Issue => "issue",
            RecordKind::PullRequest => "pull_request",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Open,
    Closed,
}

impl ItemState {
    /// Accepts REST (`open`) and GraphQL (`OPEN`, `MERGED`) spellings.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("open") {
            ItemState::Open
        } else {
            ItemState::Closed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Open => "open",
            ItemState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrStatus {
    None,
    Open,
    Merged,
    Rejected,
}

impl PrStatus {
    pub fn derive(
        kind: RecordKind,
        state: ItemState,
        merged_at: Option<DateTime<Utc>>,
    ) -> Self {
        match (kind, state, merged_at) {
            (RecordKind::Issue, _, _) => PrStatus::None,
            (RecordKind::PullRequest, _, Some(_)) => PrStatus::Merged,
            (RecordKind::PullRequest, ItemState::Closed, None) => PrStatus::Rejected,
            (RecordKind::PullRequest, ItemState::Open, None) => PrStatus::Open,
        }
    }

    /// Empty for issues so the flat file leaves the cell blank.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrStatus::None => "",
            PrStatus::Open => "open",
            PrStatus::Merged => "merged",
            PrStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalRecord {
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub kind: RecordKind,
    pub state: ItemState,
    pub pr_status: PrStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub comment_count: u64,
    pub labels: Vec<String>,
    pub author: Option<String>,
    pub assignees: Vec<String>,
    pub milestone: Option<String>,
    pub body_length: u64,
    pub reaction_count: u64,
    pub time_to_close_days: Option<i64>,
    /// Always 0: the listing APIs do not expose linked pull requests.
    pub linked_prs: u64,
    pub is_locked: bool,
    /// Mirrors `comment_count`; not a distinct-participant count.
    pub participant_count: u64,
    pub url: String,
}
