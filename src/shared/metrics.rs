//! Prometheus Metrics Module
//!
//! Counters and histograms for the dispatcher and the book lanes. Everything is
//! registered in the default registry; `gather_text()` renders the text exposition
//! format for whoever wants to scrape or print it.
//!
//! ## Usage
//! ```rust,ignore
//! use matching_engine::shared::metrics::METRICS;
//!
//! METRICS.requests_total.with_label_values(&["submit"]).inc();
//! let timer = METRICS.request_duration.with_label_values(&["submit"]).start_timer();
//! // ... run the request on the book ...
//! timer.observe_duration();
//! ```

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    /// Global metrics instance
    pub static ref METRICS: Metrics = Metrics::new();
}

/// Engine metrics
pub struct Metrics {
    /// Requests accepted by the dispatcher (by kind)
    pub requests_total: IntCounterVec,

    /// Requests rejected synchronously (by reason)
    pub rejections_total: IntCounterVec,

    /// Actions forwarded onto the merged stream (by kind)
    pub actions_total: IntCounterVec,

    /// Books whose lane is running
    pub books_active: IntGauge,

    /// Time a lane spends applying one request to its book
    pub request_duration: HistogramVec,
}

impl Metrics {
    fn new() -> Self {
        Self {
            requests_total: register_int_counter_vec!(
                "matching_engine_requests_total",
                "Requests accepted by the dispatcher",
                &["kind"]
            )
            .expect("register matching_engine_requests_total"),

            rejections_total: register_int_counter_vec!(
                "matching_engine_rejections_total",
                "Requests rejected by the dispatcher or by a book",
                &["reason"]
            )
            .expect("register matching_engine_rejections_total"),

            actions_total: register_int_counter_vec!(
                "matching_engine_actions_total",
                "Actions emitted by order books",
                &["kind"]
            )
            .expect("register matching_engine_actions_total"),

            books_active: register_int_gauge!(
                "matching_engine_books_active",
                "Order books with a running execution lane"
            )
            .expect("register matching_engine_books_active"),

            request_duration: register_histogram_vec!(
                "matching_engine_request_duration_seconds",
                "Time spent applying a request to an order book",
                &["kind"],
                vec![1e-7, 5e-7, 1e-6, 5e-6, 1e-5, 5e-5, 1e-4, 1e-3]
            )
            .expect("register matching_engine_request_duration_seconds"),
        }
    }
}

/// Renders every registered metric in the Prometheus text format.
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
