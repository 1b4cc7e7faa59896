use std::sync::Arc;

use gh_transport::{ApiRequest, Decision, Governor, Transport, TransportFailure};
use normalizer::{PullMergePayload, RawItem};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::metrics;
use crate::shutdown::or_cancelled;

#[derive(Debug, Error)]
pub enum EnrichmentFailure {
    #[error("pull request #{number} carries no resource url")]
    MissingUrl { number: i64 },
    #[error("pull request #{number} has an invalid resource url: {source}")]
    InvalidUrl {
        number: i64,
        #[source]
        source: url::ParseError,
    },
    #[error("merge lookup for #{number} failed: {source}")]
    Transport {
        number: i64,
        #[source]
        source: TransportFailure,
    },
    #[error("merge payload for #{number} is undecodable: {source}")]
    Decode {
        number: i64,
        #[source]
        source: serde_json::Error,
    },
    #[error("cancelled")]
    Cancelled,
}

/// Fills in `merged` and `merged_at` for REST pull-request items with one
/// lookup of the item's own pull-request resource.
pub struct Enricher {
    transport: Arc<dyn Transport>,
    governor: Arc<Governor>,
}

impl Enricher {
    pub fn new(transport: Arc<dyn Transport>, governor: Arc<Governor>) -> Self {
        Self {
            transport,
            governor,
        }
    }

    /// Returns the item with merge details applied. When the lookup fails the
    /// listing's own `merged_at` is kept. `None` only when the run was
    /// cancelled before the lookup finished.
    pub async fn enrich(
        &self,
        item: RawItem,
        cancel: &mut watch::Receiver<bool>,
    ) -> Option<RawItem> {
        let mut payload = match item {
            RawItem::Rest(payload) if payload.pull_request.is_some() => payload,
            other => return Some(other),
        };
        let number = payload.number;
        let url = payload
            .pull_request
            .as_ref()
            .and_then(|link| link.url.clone());

        let lookup = match self.lookup(number, url.as_deref(), cancel).await {
            Err(EnrichmentFailure::Cancelled) => return None,
            other => other,
        };
        if let Some(link) = payload.pull_request.as_mut() {
            match lookup {
                Ok(merge) => {
                    debug!(number, merged = merge.merged, "merge status resolved");
                    link.merged = Some(merge.merged);
                    link.merged_at = merge.merged_at;
                }
                Err(err) => {
                    metrics::ENRICHMENT_FAILURES_TOTAL.inc();
                    warn!(number, error = %err, "enrichment failed, keeping listing merge data");
                    // The listing's merged_at still decides the status.
                    link.merged = Some(link.merged_at.is_some());
                }
            }
        }
        Some(RawItem::Rest(payload))
    }

    async fn lookup(
        &self,
        number: i64,
        url: Option<&str>,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<PullMergePayload, EnrichmentFailure> {
        let url = url.ok_or(EnrichmentFailure::MissingUrl { number })?;
        let url =
            Url::parse(url).map_err(|source| EnrichmentFailure::InvalidUrl { number, source })?;
        let request = ApiRequest::get(url);

        let mut attempt = 0u32;
        let mut transient = 0u32;
        loop {
            attempt += 1;
            let outcome = or_cancelled(cancel, self.transport.send(request.clone()))
                .await
                .ok_or(EnrichmentFailure::Cancelled)?;
            let failure = match outcome {
                Ok(response) => {
                    return response
                        .json::<PullMergePayload>()
                        .map_err(|source| EnrichmentFailure::Decode { number, source });
                }
                Err(failure) => failure,
            };
            if !matches!(failure, TransportFailure::RateLimited { .. }) {
                transient += 1;
            }
            match self.governor.decide(Some(&failure), transient.max(1)) {
                Decision::WaitThen(wait) => {
                    debug!(
                        number,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "retrying merge lookup"
                    );
                    or_cancelled(cancel, sleep(wait))
                        .await
                        .ok_or(EnrichmentFailure::Cancelled)?;
                }
                Decision::Abort | Decision::Proceed => {
                    return Err(EnrichmentFailure::Transport {
                        number,
                        source: failure,
                    });
                }
            }
        }
    }
}
