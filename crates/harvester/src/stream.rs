use std::sync::Arc;

use gh_transport::{Decision, Governor, Transport, TransportFailure};
use normalizer::{RawItem, RecordKind};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::adapter::{Page, PageError, SharedAdapter};
use crate::cursor::{Cursor, StreamState};
use crate::metrics;
use crate::shutdown::{is_cancelled, or_cancelled};
use crate::sink::SinkError;

#[derive(Debug, Error)]
pub enum StreamAbort {
    #[error("gave up on {cursor} after {attempts} attempt(s): {failure}")]
    Transport {
        cursor: String,
        attempts: u32,
        #[source]
        failure: TransportFailure,
    },
    #[error("page at {cursor} rejected: {source}")]
    Page {
        cursor: String,
        #[source]
        source: PageError,
    },
    #[error("output channel closed")]
    OutputClosed,
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("stream task failed: {0}")]
    Task(String),
}

#[derive(Debug)]
pub enum StreamEnd {
    Exhausted,
    CeilingReached,
    Cancelled,
    Aborted(StreamAbort),
}

impl StreamEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamEnd::Exhausted => "exhausted",
            StreamEnd::CeilingReached => "ceiling_reached",
            StreamEnd::Cancelled => "cancelled",
            StreamEnd::Aborted(_) => "aborted",
        }
    }

    pub fn abort(&self) -> Option<&StreamAbort> {
        match self {
            StreamEnd::Aborted(abort) => Some(abort),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct StreamReport {
    pub kind: RecordKind,
    /// Items forwarded downstream.
    pub items: usize,
    pub pages: usize,
    pub skipped: usize,
    pub retries: u32,
    pub rate_limit_waits: u32,
    pub end: StreamEnd,
}

impl StreamReport {
    fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            items: 0,
            pages: 0,
            skipped: 0,
            retries: 0,
            rate_limit_waits: 0,
            end: StreamEnd::Exhausted,
        }
    }

    pub(crate) fn aborted(kind: RecordKind, abort: StreamAbort) -> Self {
        Self {
            end: StreamEnd::Aborted(abort),
            ..Self::new(kind)
        }
    }

    /// True when the credential was refused on the stream's very first request.
    pub fn auth_rejected_at_start(&self) -> bool {
        matches!(
            &self.end,
            StreamEnd::Aborted(StreamAbort::Transport { attempts: 1, failure, .. })
                if self.pages == 0 && failure.is_auth_rejection()
        )
    }
}

enum Interrupt {
    Cancelled,
    Abort(StreamAbort),
}

/// Drives one resource stream page by page, in order, until it runs out,
/// reaches the ceiling, is cancelled, or has to give up.
pub struct StreamFetcher {
    adapter: SharedAdapter,
    transport: Arc<dyn Transport>,
    governor: Arc<Governor>,
    item_ceiling: usize,
}

impl StreamFetcher {
    pub fn new(
        adapter: SharedAdapter,
        transport: Arc<dyn Transport>,
        governor: Arc<Governor>,
        item_ceiling: usize,
    ) -> Self {
        Self {
            adapter,
            transport,
            governor,
            item_ceiling,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.adapter.kind()
    }

    #[instrument(skip_all, fields(kind = self.adapter.kind().as_str()))]
    pub async fn run(
        &self,
        tx: mpsc::Sender<RawItem>,
        mut cancel: watch::Receiver<bool>,
    ) -> StreamReport {
        let kind = self.adapter.kind();
        let mut state = StreamState::new(kind, self.adapter.initial_cursor());
        let mut report = StreamReport::new(kind);

        let end = loop {
            if is_cancelled(&cancel) {
                break StreamEnd::Cancelled;
            }
            if state.items_fetched >= self.item_ceiling {
                break StreamEnd::CeilingReached;
            }
            if !state.has_more() {
                break StreamEnd::Exhausted;
            }

            let Page {
                mut items,
                marker,
                skipped,
            } = match self.fetch_page(&state.cursor, &mut report, &mut cancel).await {
                Ok(page) => page,
                Err(Interrupt::Cancelled) => break StreamEnd::Cancelled,
                Err(Interrupt::Abort(abort)) => break StreamEnd::Aborted(abort),
            };
            report.pages += 1;
            report.skipped += skipped;
            metrics::PAGES_TOTAL.with_label_values(&[kind.as_str()]).inc();
            if skipped > 0 {
                metrics::ITEMS_SKIPPED_TOTAL
                    .with_label_values(&[kind.as_str()])
                    .inc_by(skipped as u64);
            }

            let remaining = self.item_ceiling - state.items_fetched;
            if items.len() > remaining {
                debug!(
                    dropped = items.len() - remaining,
                    ceiling = self.item_ceiling,
                    "truncating page at item ceiling"
                );
                items.truncate(remaining);
            }

            let mut closed = false;
            for item in items {
                if tx.send(item).await.is_err() {
                    closed = true;
                    break;
                }
                state.items_fetched += 1;
            }
            if closed {
                break StreamEnd::Aborted(StreamAbort::OutputClosed);
            }

            state.cursor.advance(marker);
            debug!(
                pages = report.pages,
                items = state.items_fetched,
                next = %state.cursor.describe(),
                "page processed"
            );
        };

        report.items = state.items_fetched;
        report.end = end;
        metrics::STREAM_OUTCOMES_TOTAL
            .with_label_values(&[kind.as_str(), report.end.as_str()])
            .inc();
        match report.end.abort() {
            Some(abort) => warn!(
                items = report.items,
                pages = report.pages,
                error = %abort,
                "stream aborted"
            ),
            None => info!(
                items = report.items,
                pages = report.pages,
                retries = report.retries,
                end = report.end.as_str(),
                "stream finished"
            ),
        }
        report
    }

    /// Fetches the page at `cursor`, retrying the identical request as the
    /// governor allows. The attempt count starts over for every page.
    async fn fetch_page(
        &self,
        cursor: &Cursor,
        report: &mut StreamReport,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Page, Interrupt> {
        let request = self.adapter.build_request(cursor).map_err(|source| {
            Interrupt::Abort(StreamAbort::Page {
                cursor: cursor.describe(),
                source,
            })
        })?;

        or_cancelled(cancel, self.governor.pace())
            .await
            .ok_or(Interrupt::Cancelled)?;

        let mut attempt = 0u32;
        // Only server and network failures count against the retry budget.
        let mut transient = 0u32;
        loop {
            attempt += 1;
            let outcome = or_cancelled(cancel, self.transport.send(request.clone()))
                .await
                .ok_or(Interrupt::Cancelled)?;

            let failure = match outcome {
                Ok(response) => {
                    return self.adapter.parse_page(&response).map_err(|source| {
                        Interrupt::Abort(StreamAbort::Page {
                            cursor: cursor.describe(),
                            source,
                        })
                    });
                }
                Err(failure) => failure,
            };

            if !matches!(failure, TransportFailure::RateLimited { .. }) {
                transient += 1;
            }
            match self.governor.decide(Some(&failure), transient.max(1)) {
                Decision::WaitThen(wait) => {
                    report.retries += 1;
                    if matches!(failure, TransportFailure::RateLimited { .. }) {
                        report.rate_limit_waits += 1;
                    }
                    warn!(
                        cursor = %cursor.describe(),
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %failure,
                        "page request failed, waiting before retry"
                    );
                    or_cancelled(cancel, sleep(wait))
                        .await
                        .ok_or(Interrupt::Cancelled)?;
                }
                Decision::Abort | Decision::Proceed => {
                    return Err(Interrupt::Abort(StreamAbort::Transport {
                        cursor: cursor.describe(),
                        attempts: attempt,
                        failure,
                    }));
                }
            }
        }
    }
}
