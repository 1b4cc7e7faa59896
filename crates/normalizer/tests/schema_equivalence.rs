use normalizer::{
    normalize, GraphItemPayload, ItemState, PrStatus, RawItem, RecordKind, RestItemPayload,
};
use serde_json::json;

fn rest_pull(merged_at: Option<&str>) -> RestItemPayload {
    serde_json::from_value(json!({
        "id": 9001,
        "number": 31,
        "title": "Speed up, the parser",
        "state": "closed",
        "pull_request": {
            "url": "https://api.github.com/repos/o/r/pulls/31",
            "html_url": "https://github.com/o/r/pull/31",
            "merged_at": merged_at
        },
        "created_at": "2023-03-01T08:00:00Z",
        "closed_at": "2023-03-05T07:59:59Z",
        "updated_at": "2023-03-05T07:59:59Z",
        "comments": 2,
        "labels": [{"name": "perf"}],
        "user": {"login": "erin"},
        "assignees": [{"login": "frank"}],
        "milestone": null,
        "body": "makes it fast",
        "reactions": {"+1": 1, "rocket": 2},
        "locked": false,
        "html_url": "https://github.com/o/r/pull/31"
    }))
    .unwrap()
}

fn graph_pull() -> GraphItemPayload {
    serde_json::from_value(json!({
        "__typename": "PullRequest",
        "databaseId": 9001,
        "number": 31,
        "title": "Speed up, the parser",
        "state": "MERGED",
        "createdAt": "2023-03-01T08:00:00Z",
        "closedAt": "2023-03-05T07:59:59Z",
        "updatedAt": "2023-03-05T07:59:59Z",
        "merged": true,
        "mergedAt": "2023-03-05T07:59:59Z",
        "comments": {"totalCount": 2},
        "labels": {"nodes": [{"name": "perf"}]},
        "author": {"login": "erin"},
        "assignees": {"nodes": [{"login": "frank"}]},
        "milestone": null,
        "body": "makes it fast",
        "reactions": {"totalCount": 3},
        "locked": false,
        "url": "https://github.com/o/r/pull/31"
    }))
    .unwrap()
}

#[test]
fn every_strategy_yields_the_same_record() {
    let plain = RawItem::Rest(Box::new(rest_pull(Some("2023-03-05T07:59:59Z"))));

    let mut enriched_item = rest_pull(None);
    if let Some(link) = enriched_item.pull_request.as_mut() {
        link.merged = Some(true);
        link.merged_at = Some("2023-03-05T07:59:59Z".parse().unwrap());
    }
    let enriched = RawItem::Rest(Box::new(enriched_item));
    let graph = RawItem::Graph(Box::new(graph_pull()));

    let from_plain = normalize(&plain, plain.kind());
    let from_enriched = normalize(&enriched, enriched.kind());
    let from_graph = normalize(&graph, graph.kind());

    assert_eq!(from_plain, from_enriched);
    assert_eq!(from_plain, from_graph);
    assert_eq!(from_plain.kind, RecordKind::PullRequest);
    assert_eq!(from_plain.state, ItemState::Closed);
    assert_eq!(from_plain.pr_status, PrStatus::Merged);
    assert_eq!(from_plain.title, "Speed up  the parser");
    assert_eq!(from_plain.time_to_close_days, Some(3));
    assert_eq!(from_plain.csv_line(), from_graph.csv_line());
}

#[test]
fn pull_requests_never_have_none_status() {
    for (state, merged_at, expected) in [
        ("open", None, PrStatus::Open),
        ("closed", None, PrStatus::Rejected),
        ("closed", Some("2023-03-05T07:59:59Z"), PrStatus::Merged),
    ] {
        let mut item = rest_pull(merged_at);
        item.state = state.into();
        let raw = RawItem::Rest(Box::new(item));
        let record = normalize(&raw, raw.kind());
        assert_eq!(record.pr_status, expected, "state={state}");
    }
}
