// Prometheus metrics for executed jobs

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Duration;

lazy_static! {
    static ref JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "coderun_jobs_total",
        "Jobs handled, by language and outcome",
        &["language", "outcome"]
    )
    .expect("coderun_jobs_total can be registered");

    static ref JOB_DURATION: HistogramVec = register_histogram_vec!(
        "coderun_job_duration_seconds",
        "Wall-clock time from request to response",
        &["language"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0]
    )
    .expect("coderun_job_duration_seconds can be registered");
}

pub fn observe_job(language: &str, outcome: &str, elapsed: Duration) {
    JOBS_TOTAL.with_label_values(&[language, outcome]).inc();
    JOB_DURATION
        .with_label_values(&[language])
        .observe(elapsed.as_secs_f64());
}

pub fn render() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics are not valid UTF-8")
}
