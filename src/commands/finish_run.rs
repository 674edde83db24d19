use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::ports::metrics::{Metric, MetricsPort};
use chrono::{DateTime, Utc};
use tower::Service;

use super::{Error, MetricsReporter};

/// Marks the end of the run
pub struct FinishRun {
    pub finished_at: DateTime<Utc>,
}

impl FinishRun {
    pub fn now() -> Self {
        Self {
            finished_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub total_scenarios: u64,
    pub passed_scenarios: u64,
    pub failed_scenarios: u64,
    pub skipped_scenarios: u64,
    /// Scenarios that ended with any other status
    pub other_scenarios: u64,
    /// Run duration in seconds
    pub duration_s: f64,
    pub label_counts: BTreeMap<String, u64>,
}

impl<M> Service<FinishRun> for MetricsReporter<M>
where
    M: MetricsPort + 'static,
{
    type Response = RunSummary;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: FinishRun) -> Self::Future {
        let reporter = self.clone();
        Box::pin(async move {
            let stats = reporter.stats()?.clone();
            if req.finished_at < stats.started_at {
                return Err(Error::InvalidState(
                    format!(
                        "run finished at {} before it started at {}",
                        req.finished_at, stats.started_at
                    )
                    .into(),
                ));
            }
            let elapsed = req.finished_at - stats.started_at;
            let duration_s = elapsed
                .num_microseconds()
                .map(|micros| micros as f64 / 1_000_000.0)
                .unwrap_or(elapsed.num_seconds() as f64);

            let summary = RunSummary {
                total_scenarios: stats.scenarios,
                passed_scenarios: stats.passed,
                failed_scenarios: stats.failed,
                skipped_scenarios: stats.skipped,
                other_scenarios: stats.other,
                duration_s,
                label_counts: stats.labels,
            };

            let config = &reporter.config;
            let gauges = [
                ("run.total_scenarios", summary.total_scenarios as f64),
                ("run.passed_scenarios", summary.passed_scenarios as f64),
                ("run.failed_scenarios", summary.failed_scenarios as f64),
                ("run.skipped_scenarios", summary.skipped_scenarios as f64),
                ("run.duration", summary.duration_s),
            ];
            for (suffix, value) in gauges {
                reporter
                    .metrics
                    .record(Metric::gauge(
                        config.metric_name(suffix),
                        value,
                        config.default_tags.clone(),
                    ))
                    .await?;
            }
            for (label, count) in &summary.label_counts {
                reporter
                    .metrics
                    .record(Metric::gauge(
                        config.metric_name(&format!("run.tag.{label}.count")),
                        *count as f64,
                        config.default_tags.clone(),
                    ))
                    .await?;
            }

            // Ensure all buffered metrics are sent
            reporter.metrics.flush().await?;
            tracing::info!(
                total = summary.total_scenarios,
                passed = summary.passed_scenarios,
                failed = summary.failed_scenarios,
                skipped = summary.skipped_scenarios,
                duration_s = summary.duration_s,
                "scenario run finished"
            );

            Ok(summary)
        })
    }
}
