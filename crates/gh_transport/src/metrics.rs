use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter_vec, CounterVec, Histogram,
    IntCounterVec,
};

pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gh_transport_requests_total",
        "Requests sent to GitHub grouped by classified outcome",
        &["outcome"]
    )
    .expect("requests total")
});

pub static LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "gh_transport_latency_seconds",
        "Round-trip latency of GitHub requests"
    )
    .expect("latency")
});

pub static RETRIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gh_transport_retries_total",
        "Retry decisions taken by the governor grouped by failure class",
        &["reason"]
    )
    .expect("retries")
});

pub static ABORTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gh_transport_aborts_total",
        "Abort decisions taken by the governor grouped by failure class",
        &["reason"]
    )
    .expect("aborts")
});

pub static SLEEP_SECONDS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gh_transport_sleep_seconds_total",
        "Seconds spent waiting grouped by reason",
        &["reason"]
    )
    .expect("sleep seconds")
});
