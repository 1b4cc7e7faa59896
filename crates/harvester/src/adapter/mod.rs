use std::sync::Arc;

use common::config::{GithubConfig, RepositoryConfig, Strategy};
use gh_transport::{ApiRequest, ApiResponse};
use normalizer::{RawItem, RecordKind};
use thiserror::Error;
use url::Url;

use crate::cursor::{Cursor, PageMarker};

pub mod graphql;
pub mod rest;

pub use graphql::GraphqlAdapter;
pub use rest::RestListingAdapter;

/// Items of one page, in the order the server returned them.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<RawItem>,
    pub marker: PageMarker,
    /// Items dropped because they could not be decoded.
    pub skipped: usize,
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("cursor {cursor} does not fit a {adapter} request")]
    Cursor {
        adapter: &'static str,
        cursor: String,
    },
    #[error("failed to build request url: {0}")]
    Url(#[from] url::ParseError),
    #[error("undecodable page: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("GraphQL error: {0}")]
    Graphql(String),
}

/// Knows how one acquisition strategy asks for and reads a page of one
/// resource kind. Paging, retries and pacing live in the stream fetcher.
pub trait ResourceAdapter: Send + Sync {
    fn kind(&self) -> RecordKind;

    fn initial_cursor(&self) -> Cursor;

    fn build_request(&self, cursor: &Cursor) -> Result<ApiRequest, PageError>;

    fn parse_page(&self, response: &ApiResponse) -> Result<Page, PageError>;
}

pub type SharedAdapter = Arc<dyn ResourceAdapter>;

/// Repository plus the endpoints it is reached through.
#[derive(Debug, Clone)]
pub struct RepoTarget {
    pub owner: String,
    pub name: String,
    pub api_base: Url,
    pub graphql_url: Url,
}

impl RepoTarget {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        api_base: &str,
        graphql_url: &str,
    ) -> Result<Self, url::ParseError> {
        // `Url::join` drops the last segment unless the base ends in '/'.
        let api_base = if api_base.ends_with('/') {
            Url::parse(api_base)?
        } else {
            Url::parse(&format!("{api_base}/"))?
        };
        Ok(Self {
            owner: owner.into(),
            name: name.into(),
            api_base,
            graphql_url: Url::parse(graphql_url)?,
        })
    }

    pub fn from_config(
        github: &GithubConfig,
        repository: &RepositoryConfig,
    ) -> Result<Self, url::ParseError> {
        Self::new(
            repository.owner.clone(),
            repository.name.clone(),
            &github.api_base,
            &github.graphql_url,
        )
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Issue and pull-request adapters for `strategy`, in that order.
pub fn build_adapters(
    strategy: Strategy,
    target: &RepoTarget,
    page_size: u32,
) -> [SharedAdapter; 2] {
    let kinds = [RecordKind::Issue, RecordKind::PullRequest];
    match strategy {
        Strategy::Rest | Strategy::RestEnriched => kinds.map(|kind| {
            Arc::new(RestListingAdapter::new(target.clone(), kind, page_size)) as SharedAdapter
        }),
        Strategy::Graphql => kinds.map(|kind| {
            Arc::new(GraphqlAdapter::new(target.clone(), kind, page_size)) as SharedAdapter
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_gains_trailing_slash() {
        let target = RepoTarget::new(
            "octo",
            "demo",
            "https://ghe.example.com/api/v3",
            "https://ghe.example.com/api/graphql",
        )
        .unwrap();
        assert_eq!(target.api_base.as_str(), "https://ghe.example.com/api/v3/");
        assert_eq!(target.full_name(), "octo/demo");
    }

    #[test]
    fn adapters_come_in_issue_then_pull_order() {
        let target = RepoTarget::new(
            "octo",
            "demo",
            "https://api.github.com/",
            "https://api.github.com/graphql",
        )
        .unwrap();
        for strategy in [Strategy::Rest, Strategy::RestEnriched, Strategy::Graphql] {
            let [issues, pulls] = build_adapters(strategy, &target, 100);
            assert_eq!(issues.kind(), RecordKind::Issue);
            assert_eq!(pulls.kind(), RecordKind::PullRequest);
        }
    }
}
