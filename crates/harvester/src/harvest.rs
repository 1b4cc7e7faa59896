use std::sync::Arc;

use common::config::HarvestConfig;
use futures::StreamExt;
use gh_transport::{Governor, RetryPolicy, Transport};
use normalizer::normalize;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, instrument, warn};

use crate::adapter::{build_adapters, RepoTarget};
use crate::enricher::Enricher;
use crate::metrics;
use crate::sink::{SharedSink, SinkError};
use crate::stream::{StreamAbort, StreamEnd, StreamFetcher, StreamReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestStatus {
    Completed(usize),
    PartiallyCompleted(usize, String),
    Failed(String),
}

impl HarvestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestStatus::Completed(_) => "completed",
            HarvestStatus::PartiallyCompleted(..) => "partially_completed",
            HarvestStatus::Failed(_) => "failed",
        }
    }
}

/// One stream's fetch report plus what made it to the sink.
#[derive(Debug)]
pub struct StreamOutcome {
    pub report: StreamReport,
    pub written: usize,
    /// Items dropped because cancellation interrupted their enrichment.
    pub dropped: usize,
}

#[derive(Debug)]
pub struct HarvestReport {
    pub status: HarvestStatus,
    pub streams: Vec<StreamOutcome>,
}

impl HarvestReport {
    pub fn total(&self) -> usize {
        self.streams.iter().map(|s| s.written).sum()
    }
}

pub fn retry_policy(config: &HarvestConfig) -> RetryPolicy {
    RetryPolicy {
        cooldown: config.cooldown(),
        request_spacing: config.request_spacing(),
        max_retries: config.max_retries,
        backoff_base: config.backoff_base(),
        backoff_max: config.backoff_max(),
        jitter_frac: config.jitter_frac,
    }
}

/// Runs the issue and pull-request streams of one repository side by side
/// and writes every record to a shared sink.
pub struct Harvester {
    config: HarvestConfig,
    target: RepoTarget,
    transport: Arc<dyn Transport>,
    sink: SharedSink,
    governor: Arc<Governor>,
}

impl Harvester {
    pub fn new(
        config: HarvestConfig,
        target: RepoTarget,
        transport: Arc<dyn Transport>,
        sink: SharedSink,
    ) -> Self {
        let governor = Arc::new(Governor::new(retry_policy(&config)));
        Self {
            config,
            target,
            transport,
            sink,
            governor,
        }
    }

    #[instrument(
        skip_all,
        fields(repository = %self.target.full_name(), strategy = self.config.strategy.as_str())
    )]
    pub async fn run(&self, cancel: watch::Receiver<bool>) -> HarvestReport {
        let _timer = metrics::RUN_DURATION.start_timer();
        let [issues, pulls] =
            build_adapters(self.config.strategy, &self.target, self.config.page_size);
        let enricher = self
            .config
            .strategy
            .needs_enrichment()
            .then(|| Arc::new(Enricher::new(self.transport.clone(), self.governor.clone())));
        info!(ceiling = self.config.item_ceiling, "harvest starting");

        let mut handles = Vec::with_capacity(2);
        for (adapter, enricher) in [(issues, None), (pulls, enricher)] {
            let kind = adapter.kind();
            let fetcher = StreamFetcher::new(
                adapter,
                self.transport.clone(),
                self.governor.clone(),
                self.config.item_ceiling,
            );
            let pipeline = Pipeline {
                fetcher,
                enricher,
                concurrency: self.config.enrichment_concurrency.max(1),
                channel_capacity: self.config.page_size.max(1) as usize,
                sink: self.sink.clone(),
            };
            handles.push((kind, tokio::spawn(pipeline.run(cancel.clone()))));
        }

        let mut streams = Vec::with_capacity(handles.len());
        for (kind, handle) in handles {
            match handle.await {
                Ok(outcome) => streams.push(outcome),
                Err(err) => {
                    error!(kind = kind.as_str(), error = %err, "stream task failed");
                    streams.push(StreamOutcome {
                        report: StreamReport::aborted(kind, StreamAbort::Task(err.to_string())),
                        written: 0,
                        dropped: 0,
                    });
                }
            }
        }

        let flushed = self.sink.flush().await;
        let status = summarize(&streams, flushed);
        metrics::RUNS_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();

        let report = HarvestReport { status, streams };
        match &report.status {
            HarvestStatus::Completed(total) => info!(total, "harvest completed"),
            HarvestStatus::PartiallyCompleted(total, reason) => {
                warn!(total, reason = %reason, "harvest partially completed")
            }
            HarvestStatus::Failed(reason) => error!(reason = %reason, "harvest failed"),
        }
        report
    }
}

/// fetcher -> bounded channel -> optional enrichment -> normalize -> sink.
struct Pipeline {
    fetcher: StreamFetcher,
    enricher: Option<Arc<Enricher>>,
    concurrency: usize,
    channel_capacity: usize,
    sink: SharedSink,
}

impl Pipeline {
    async fn run(self, cancel: watch::Receiver<bool>) -> StreamOutcome {
        let Pipeline {
            fetcher,
            enricher,
            concurrency,
            channel_capacity,
            sink,
        } = self;
        let kind = fetcher.kind();
        let (tx, rx) = mpsc::channel(channel_capacity);
        let produce = fetcher.run(tx, cancel.clone());

        let consume = async move {
            let mut written = 0usize;
            let mut dropped = 0usize;
            let mut items = ReceiverStream::new(rx)
                .map(|item| {
                    let enricher = enricher.clone();
                    let mut cancel = cancel.clone();
                    async move {
                        match enricher {
                            Some(enricher) => enricher.enrich(item, &mut cancel).await,
                            None => Some(item),
                        }
                    }
                })
                .buffered(concurrency);

            while let Some(item) = items.next().await {
                let Some(item) = item else {
                    dropped += 1;
                    continue;
                };
                let record = normalize(&item, kind);
                if let Err(err) = sink.write(&record).await {
                    return (written, dropped, Some(err));
                }
                written += 1;
                metrics::RECORDS_WRITTEN_TOTAL
                    .with_label_values(&[kind.as_str()])
                    .inc();
            }
            (written, dropped, None::<SinkError>)
        };

        let (mut report, (written, dropped, sink_error)) = tokio::join!(produce, consume);
        if let Some(err) = sink_error {
            warn!(kind = kind.as_str(), error = %err, "sink rejected record");
            report.end = StreamEnd::Aborted(StreamAbort::Sink(err));
        }
        StreamOutcome {
            report,
            written,
            dropped,
        }
    }
}

fn summarize(streams: &[StreamOutcome], flushed: Result<(), SinkError>) -> HarvestStatus {
    let total: usize = streams.iter().map(|s| s.written).sum();

    if let Some(stream) = streams.iter().find(|s| s.report.auth_rejected_at_start()) {
        let detail = stream
            .report
            .end
            .abort()
            .map(|abort| abort.to_string())
            .unwrap_or_default();
        return HarvestStatus::Failed(format!(
            "credential rejected on first {} request: {detail}",
            stream.report.kind.as_str()
        ));
    }
    if let Err(err) = flushed {
        return HarvestStatus::Failed(format!("failed to flush output: {err}"));
    }

    let aborts: Vec<String> = streams
        .iter()
        .filter_map(|s| {
            s.report
                .end
                .abort()
                .map(|abort| format!("{} stream: {abort}", s.report.kind.as_str()))
        })
        .collect();
    let cancelled = streams
        .iter()
        .any(|s| matches!(s.report.end, StreamEnd::Cancelled) || s.dropped > 0);

    if !aborts.is_empty() && aborts.len() == streams.len() && total == 0 {
        HarvestStatus::Failed(aborts.join("; "))
    } else if !aborts.is_empty() {
        HarvestStatus::PartiallyCompleted(total, aborts.join("; "))
    } else if cancelled {
        HarvestStatus::PartiallyCompleted(total, "cancelled".to_string())
    } else {
        HarvestStatus::Completed(total)
    }
}
