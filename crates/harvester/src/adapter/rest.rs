use gh_transport::{ApiRequest, ApiResponse};
use normalizer::{RawItem, RecordKind, RestItemPayload};
use serde_json::Value;
use tracing::warn;

use crate::adapter::{Page, PageError, RepoTarget, ResourceAdapter};
use crate::cursor::{Cursor, PageMarker, Position};

/// Pages `GET /repos/{owner}/{repo}/issues?state=all`. The listing mixes
/// issues and pull requests; each stream keeps only its own kind.
pub struct RestListingAdapter {
    target: RepoTarget,
    kind: RecordKind,
    page_size: u32,
}

impl RestListingAdapter {
    pub fn new(target: RepoTarget, kind: RecordKind, page_size: u32) -> Self {
        Self {
            target,
            kind,
            page_size: page_size.clamp(1, 100),
        }
    }
}

impl ResourceAdapter for RestListingAdapter {
    fn kind(&self) -> RecordKind {
        self.kind
    }

    fn initial_cursor(&self) -> Cursor {
        Cursor::page_number()
    }

    fn build_request(&self, cursor: &Cursor) -> Result<ApiRequest, PageError> {
        let Position::Page(page) = cursor.position() else {
            return Err(PageError::Cursor {
                adapter: "rest",
                cursor: cursor.describe(),
            });
        };
        let mut url = self.target.api_base.join(&format!(
            "repos/{}/{}/issues",
            self.target.owner, self.target.name
        ))?;
        url.query_pairs_mut()
            .append_pair("state", "all")
            .append_pair("per_page", &self.page_size.to_string())
            .append_pair("page", &page.to_string());
        Ok(ApiRequest::get(url))
    }

    fn parse_page(&self, response: &ApiResponse) -> Result<Page, PageError> {
        let values: Vec<Value> = response.json()?;
        let raw_items = values.len();
        let mut items = Vec::new();
        let mut skipped = 0;
        for value in values {
            match serde_json::from_value::<RestItemPayload>(value) {
                Ok(payload) => {
                    let item = RawItem::Rest(Box::new(payload));
                    if item.kind() == self.kind {
                        items.push(item);
                    }
                }
                Err(err) => {
                    skipped += 1;
                    warn!(kind = self.kind.as_str(), error = %err, "skipping undecodable item");
                }
            }
        }
        Ok(Page {
            items,
            marker: PageMarker::Counted { raw_items },
            skipped,
        })
    }
}
