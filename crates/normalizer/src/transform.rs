use chrono::{DateTime, Utc};
use common::text::{char_length, sanitize_title};

use crate::models::{CanonicalRecord, ItemState, PrStatus, RecordKind};
use crate::payloads::{GraphItemPayload, RawItem, RestItemPayload};

/// Maps one raw item onto the canonical schema. `kind` is normally
/// `raw.kind()`; the derivation rules do not depend on the acquisition strategy.
pub fn normalize(raw: &RawItem, kind: RecordKind) -> CanonicalRecord {
    match raw {
        RawItem::Rest(item) => normalize_rest(item, kind),
        RawItem::Graph(node) => normalize_graph(node, kind),
    }
}

fn normalize_rest(item: &RestItemPayload, kind: RecordKind) -> CanonicalRecord {
    let state = ItemState::parse(&item.state);
    let merged_at = item.pull_request.as_ref().and_then(|link| link.merged_at);
    let reactions = item.reactions.as_ref().map(|r| r.sum()).unwrap_or(0);

    CanonicalRecord {
        id: item.id,
        number: item.number,
        title: sanitize_title(&item.title),
        kind,
        state,
        pr_status: PrStatus::derive(kind, state, merged_at),
        created_at: item.created_at,
        closed_at: item.closed_at,
        updated_at: item.updated_at,
        comment_count: item.comments,
        labels: item.labels.iter().map(|l| l.name.clone()).collect(),
        author: item.user.as_ref().map(|u| u.login.clone()),
        assignees: item.assignees.iter().map(|a| a.login.clone()).collect(),
        milestone: item.milestone.as_ref().map(|m| m.title.clone()),
        body_length: char_length(item.body.as_deref()),
        reaction_count: reactions,
        time_to_close_days: days_to_close(item.created_at, item.closed_at),
        linked_prs: 0,
        is_locked: item.locked,
        participant_count: item.comments,
        url: item.html_url.clone(),
    }
}

fn normalize_graph(node: &GraphItemPayload, kind: RecordKind) -> CanonicalRecord {
    let state = ItemState::parse(&node.state);
    let comments = node.comments.total_count;

    CanonicalRecord {
        id: node.resolved_id().unwrap_or_default(),
        number: node.number,
        title: sanitize_title(&node.title),
        kind,
        state,
        pr_status: PrStatus::derive(kind, state, node.merged_at),
        created_at: node.created_at,
        closed_at: node.closed_at,
        updated_at: node.updated_at,
        comment_count: comments,
        labels: node.labels.iter().map(|l| l.name.clone()).collect(),
        author: node.author.as_ref().map(|a| a.login.clone()),
        assignees: node.assignees.iter().map(|a| a.login.clone()).collect(),
        milestone: node.milestone.as_ref().map(|m| m.title.clone()),
        body_length: char_length(node.body.as_deref()),
        reaction_count: node.reactions.total_count,
        time_to_close_days: days_to_close(node.created_at, node.closed_at),
        linked_prs: 0,
        is_locked: node.locked,
        participant_count: comments,
        url: node.url.clone(),
    }
}

/// Whole days between creation and closing, truncated toward zero.
pub fn days_to_close(
    created_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
) -> Option<i64> {
    match (created_at, closed_at) {
        (Some(created), Some(closed)) => Some((closed - created).num_days()),
        _ => None,
    }
}
