use crate::ports::metrics::{Error, Metric, MetricKind, MetricsPort};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics sink that writes every metric as a `tracing` event
#[derive(Debug, Default)]
pub struct LogMetrics {
    pending: AtomicUsize,
}

#[async_trait::async_trait]
impl MetricsPort for LogMetrics {
    async fn record(&self, metric: Metric) -> Result<(), Error> {
        let (kind, value) = match metric.kind {
            MetricKind::Counter(value) => ("counter", value as f64),
            MetricKind::Gauge(value) => ("gauge", value),
            MetricKind::Distribution(value) => ("distribution", value),
        };
        tracing::info!(metric = %metric.name, kind, value, tags = ?metric.tags, "metric");
        self.pending.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        let flushed = self.pending.swap(0, Ordering::Relaxed);
        tracing::debug!(flushed, "metrics flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speculoos::prelude::*;

    #[tokio::test]
    async fn test_record_flush() {
        let metrics = LogMetrics::default();

        let res = metrics
            .record(Metric::gauge("loyalty.run.total_scenarios", 3.0, Vec::new()))
            .await;
        assert_that!(res).is_ok();
        assert_that!(metrics.pending.load(Ordering::Relaxed)).is_equal_to(1);

        let res = metrics.flush().await;
        assert_that!(res).is_ok();
        assert_that!(metrics.pending.load(Ordering::Relaxed)).is_equal_to(0);
    }
}
