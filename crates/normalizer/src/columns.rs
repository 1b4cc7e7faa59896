//! Flat-file layout of [`CanonicalRecord`]. Column names are the ones the
//! downstream analysis scripts read, so they differ from the field names.

use chrono::{DateTime, SecondsFormat, Utc};
use common::text::quote_cell;

use crate::models::CanonicalRecord;

pub const COLUMNS: [&str; 21] = [
    "id",
    "number",
    "title",
    "type",
    "state",
    "pr_status",
    "created_at",
    "closed_at",
    "updated_at",
    "comments",
    "labels",
    "author",
    "assignees",
    "milestone",
    "body_length",
    "reactions",
    "time_to_close_days",
    "linked_prs",
    "is_locked",
    "participants_count",
    "url",
];

pub fn header_line() -> String {
    COLUMNS.join(",")
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

impl CanonicalRecord {
    /// Unquoted cell values in [`COLUMNS`] order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.number.to_string(),
            self.title.clone(),
            self.kind.as_str().to_string(),
            self.state.as_str().to_string(),
            self.pr_status.as_str().to_string(),
            timestamp(self.created_at),
            timestamp(self.closed_at),
            timestamp(self.updated_at),
            self.comment_count.to_string(),
            self.labels.join(","),
            self.author.clone().unwrap_or_default(),
            self.assignees.join(","),
            self.milestone.clone().unwrap_or_default(),
            self.body_length.to_string(),
            self.reaction_count.to_string(),
            self.time_to_close_days
                .map(|days| days.to_string())
                .unwrap_or_default(),
            self.linked_prs.to_string(),
            self.is_locked.to_string(),
            self.participant_count.to_string(),
            self.url.clone(),
        ]
    }

    /// One RFC 4180 line without the trailing newline.
    pub fn csv_line(&self) -> String {
        self.to_row()
            .iter()
            .map(|cell| quote_cell(cell))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemState, PrStatus, RecordKind};
    use chrono::TimeZone;

    fn record() -> CanonicalRecord {
        CanonicalRecord {
            id: 42,
            number: 7,
            title: "Crash on start".into(),
            kind: RecordKind::PullRequest,
            state: ItemState::Closed,
            pr_status: PrStatus::Rejected,
            created_at: Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()),
            closed_at: Some(Utc.with_ymd_and_hms(2023, 1, 3, 12, 0, 0).unwrap()),
            updated_at: None,
            comment_count: 3,
            labels: vec!["bug".into(), "help wanted".into()],
            author: None,
            assignees: vec![],
            milestone: Some("v1".into()),
            body_length: 10,
            reaction_count: 1,
            time_to_close_days: Some(2),
            linked_prs: 0,
            is_locked: false,
            participant_count: 3,
            url: "https://github.com/o/r/pull/7".into(),
        }
    }

    #[test]
    fn row_matches_column_count() {
        assert_eq!(record().to_row().len(), COLUMNS.len());
    }

    #[test]
    fn csv_line_renders_and_quotes() {
        let line = record().csv_line();
        assert_eq!(
            line,
            "42,7,Crash on start,pull_request,closed,rejected,\
             2023-01-01T00:00:00Z,2023-01-03T12:00:00Z,,3,\"bug,help wanted\",,,v1,\
             10,1,2,0,false,3,https://github.com/o/r/pull/7"
        );
    }

    #[test]
    fn header_uses_historical_names() {
        let header = header_line();
        assert!(header.starts_with("id,number,title,type,state,pr_status"));
        assert!(header.ends_with("participants_count,url"));
    }
}
