use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "harvester_runs_total",
        "Harvest runs grouped by terminal status",
        &["status"]
    )
    .expect("harvester runs total")
});

pub static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "harvester_run_duration_seconds",
        "Duration of harvest runs in seconds",
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]
    )
    .expect("harvester run duration histogram")
});

pub static PAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "harvester_pages_total",
        "Pages fetched and parsed grouped by resource kind",
        &["kind"]
    )
    .expect("harvester pages total")
});

pub static ITEMS_SKIPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "harvester_items_skipped_total",
        "Raw items dropped because they could not be decoded",
        &["kind"]
    )
    .expect("harvester items skipped total")
});

pub static RECORDS_WRITTEN_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "harvester_records_written_total",
        "Canonical records handed to the sink grouped by resource kind",
        &["kind"]
    )
    .expect("harvester records written total")
});

pub static STREAM_OUTCOMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "harvester_stream_outcomes_total",
        "How resource streams ended grouped by kind and outcome",
        &["kind", "outcome"]
    )
    .expect("harvester stream outcomes total")
});

pub static ENRICHMENT_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "harvester_enrichment_failures_total",
        "Pull requests emitted without merge details because the lookup failed"
    )
    .expect("harvester enrichment failures total")
});
