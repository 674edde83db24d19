use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use crate::ports::metrics::{Metric, MetricsPort};
use chrono::{DateTime, Utc};
use tower::Service;

use super::{Error, MetricsReporter};

/// Outcome of a single scenario run
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    pub feature: String,
    pub name: String,
    /// Free-form labels attached to the scenario
    pub labels: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: ScenarioStatus,
}

impl ScenarioReport {
    /// Wall-clock duration in milliseconds
    pub fn duration_ms(&self) -> Result<f64, Error> {
        if self.finished_at < self.started_at {
            return Err(Error::InvalidState(
                format!(
                    "scenario '{}' finished before it started ({} < {})",
                    self.name, self.finished_at, self.started_at
                )
                .into(),
            ));
        }

        let elapsed = self.finished_at - self.started_at;
        Ok(elapsed
            .num_microseconds()
            .map(|micros| micros as f64 / 1_000.0)
            .unwrap_or(elapsed.num_milliseconds() as f64))
    }

    fn tags(&self, default_tags: &[String]) -> Vec<String> {
        let mut tags = vec![
            format!("feature:{}", self.feature),
            format!("scenario:{}", self.name),
        ];
        tags.extend(self.labels.iter().map(|label| format!("tag:{label}")));
        tags.extend_from_slice(default_tags);
        tags
    }
}

/// Records the start of a scenario until its status is known
#[derive(Clone, Debug)]
pub struct ScenarioTimer {
    feature: String,
    name: String,
    labels: Vec<String>,
    started_at: DateTime<Utc>,
}

impl ScenarioTimer {
    pub fn start(feature: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            name: name.into(),
            labels: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn finish(self, status: ScenarioStatus) -> ScenarioReport {
        ScenarioReport {
            feature: self.feature,
            name: self.name,
            labels: self.labels,
            started_at: self.started_at,
            finished_at: Utc::now(),
            status,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
    /// Any other terminal status reported by the harness, e.g. "untested"
    Other(String),
}

impl ScenarioStatus {
    fn metric_suffix(&self) -> &'static str {
        match self {
            ScenarioStatus::Passed => "scenario.passed",
            ScenarioStatus::Failed => "scenario.failed",
            ScenarioStatus::Skipped => "scenario.skipped",
            ScenarioStatus::Other(_) => "scenario.other",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct ReportScenarioResponse {
    /// Number of scenarios reported in this run so far
    pub scenario_count: u64,
    pub duration_ms: f64,
}

impl<M> Service<ScenarioReport> for MetricsReporter<M>
where
    M: MetricsPort + 'static,
{
    type Response = ReportScenarioResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScenarioReport) -> Self::Future {
        let reporter = self.clone();
        Box::pin(async move {
            let duration_ms = req.duration_ms()?;
            let tags = req.tags(&reporter.config.default_tags);

            tracing::debug!(
                feature = %req.feature,
                scenario = %req.name,
                status = ?req.status,
                duration_ms,
                "scenario finished"
            );

            let config = &reporter.config;
            reporter
                .metrics
                .record(Metric::distribution(
                    config.metric_name("scenario.duration"),
                    duration_ms,
                    tags.clone(),
                ))
                .await?;
            reporter
                .metrics
                .record(Metric::counter(
                    config.metric_name(req.status.metric_suffix()),
                    1,
                    tags,
                ))
                .await?;

            // Run stats only count scenarios the sink accepted
            let scenario_count = {
                let mut stats = reporter.stats()?;
                stats.scenarios += 1;
                match req.status {
                    ScenarioStatus::Passed => stats.passed += 1,
                    ScenarioStatus::Failed => stats.failed += 1,
                    ScenarioStatus::Skipped => stats.skipped += 1,
                    ScenarioStatus::Other(_) => stats.other += 1,
                }
                for label in &req.labels {
                    *stats.labels.entry(label.clone()).or_default() += 1;
                }
                stats.scenarios
            };

            Ok(ReportScenarioResponse {
                scenario_count,
                duration_ms,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::metrics::memory::MemoryMetrics,
        config::ReporterConfig,
        ports::metrics::{MetricKind, MockMetricsPort},
    };
    use chrono::Duration;
    use rstest::*;
    use speculoos::prelude::*;
    use std::sync::Arc;
    use tower::BoxError;

    #[fixture]
    fn started_at() -> DateTime<Utc> {
        Utc::now()
    }

    fn report(started_at: DateTime<Utc>, status: ScenarioStatus) -> ScenarioReport {
        ScenarioReport {
            feature: "Loyalty program".to_string(),
            name: "Redeem points".to_string(),
            labels: vec!["redeem".to_string(), "smoke".to_string()],
            started_at,
            finished_at: started_at + Duration::milliseconds(250),
            status,
        }
    }

    #[rstest]
    #[case(ScenarioStatus::Passed, "behave.scenario.passed")]
    #[case(ScenarioStatus::Failed, "behave.scenario.failed")]
    #[case(ScenarioStatus::Skipped, "behave.scenario.skipped")]
    #[case(ScenarioStatus::Other("untested".to_string()), "behave.scenario.other")]
    #[tokio::test]
    async fn test_status_counter(
        started_at: DateTime<Utc>,
        #[case] status: ScenarioStatus,
        #[case] expected: &str,
    ) -> Result<(), BoxError> {
        // GIVEN a reporter writing to an in-memory sink
        let metrics = Arc::new(MemoryMetrics::default());
        let mut reporter = MetricsReporter::new(
            metrics.clone(),
            ReporterConfig::with_namespace("behave"),
        );

        // WHEN reporting a scenario
        let res = reporter.report(report(started_at, status)).await?;

        // THEN
        // * the duration is sent as a distribution
        // * the status counter is incremented
        assert_that!(res).is_equal_to(ReportScenarioResponse {
            scenario_count: 1,
            duration_ms: 250.0,
        });
        let buffered = metrics.buffered();
        assert_that!(buffered).has_length(2);
        assert_that!(buffered[0].name).is_equal_to("behave.scenario.duration".to_string());
        assert_that!(buffered[0].kind).is_equal_to(MetricKind::Distribution(250.0));
        assert_that!(buffered[1].name).is_equal_to(expected.to_string());
        assert_that!(buffered[1].kind).is_equal_to(MetricKind::Counter(1));

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_tags(started_at: DateTime<Utc>) -> Result<(), BoxError> {
        // GIVEN a reporter with default tags
        let mut metrics = MockMetricsPort::new();
        metrics
            .expect_record()
            .times(2)
            .withf(|metric| {
                metric.tags
                    == vec![
                        "feature:Loyalty program".to_string(),
                        "scenario:Redeem points".to_string(),
                        "tag:redeem".to_string(),
                        "tag:smoke".to_string(),
                        "branch:main".to_string(),
                    ]
            })
            .returning(|_| Ok(()));
        let config = ReporterConfig {
            namespace: "behave".to_string(),
            default_tags: vec!["branch:main".to_string()],
        };
        let mut reporter = MetricsReporter::new(Arc::new(metrics), config);

        // WHEN reporting a scenario
        let res = reporter.report(report(started_at, ScenarioStatus::Passed)).await;

        // THEN every metric carries the scenario and default tags
        assert_that!(res).is_ok();
        Arc::into_inner(reporter.metrics).unwrap().checkpoint();

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_finished_before_started(started_at: DateTime<Utc>) -> Result<(), BoxError> {
        // GIVEN a scenario whose end precedes its start
        let mut metrics = MockMetricsPort::new();
        metrics.expect_record().never();
        let mut reporter =
            MetricsReporter::new(Arc::new(metrics), ReporterConfig::default());
        let mut req = report(started_at, ScenarioStatus::Passed);
        req.finished_at = started_at - Duration::seconds(1);

        // WHEN reporting it
        let res = reporter.report(req).await;

        // THEN it is rejected without touching the run counters
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::InvalidState(_)));
        assert_that!(reporter.stats()?.scenarios).is_equal_to(0);

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_sink_error(started_at: DateTime<Utc>) -> Result<(), BoxError> {
        // GIVEN a sink that rejects every metric
        let mut metrics = MockMetricsPort::new();
        metrics.expect_record().times(2).returning(|metric| {
            Err(crate::ports::metrics::Error::Rejected {
                name: metric.name,
                reason: "agent unreachable".to_string(),
            })
        });
        let mut reporter =
            MetricsReporter::new(Arc::new(metrics), ReporterConfig::default());
        let req = report(started_at, ScenarioStatus::Failed);

        // WHEN reporting the same scenario twice
        let first = reporter.report(req.clone()).await;
        let retry = reporter.report(req).await;

        // THEN
        // * both reports fail with the sink error
        // * the scenario is never counted
        assert_that!(first)
            .is_err()
            .matches(|err| matches!(err, Error::Metrics(_)));
        assert_that!(retry)
            .is_err()
            .matches(|err| matches!(err, Error::Metrics(_)));
        assert_that!(reporter.stats()?.scenarios).is_equal_to(0);
        assert_that!(reporter.stats()?.labels.is_empty()).is_true();

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_retry_after_sink_error(started_at: DateTime<Utc>) -> Result<(), BoxError> {
        // GIVEN a sink that rejects the first metric only
        let mut metrics = MockMetricsPort::new();
        let mut seq = mockall::Sequence::new();
        metrics
            .expect_record()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|metric| {
                Err(crate::ports::metrics::Error::Rejected {
                    name: metric.name,
                    reason: "agent unreachable".to_string(),
                })
            });
        metrics
            .expect_record()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let mut reporter =
            MetricsReporter::new(Arc::new(metrics), ReporterConfig::default());
        let req = report(started_at, ScenarioStatus::Passed);

        // WHEN the failed report is retried
        let failed = reporter.report(req.clone()).await;
        assert_that!(failed).is_err();
        let res = reporter.report(req).await?;

        // THEN the scenario is counted exactly once
        assert_that!(res.scenario_count).is_equal_to(1);
        assert_that!(reporter.stats()?.passed).is_equal_to(1);

        Ok(())
    }

    #[test]
    fn test_timer() {
        let report = ScenarioTimer::start("Loyalty program", "Add a member")
            .with_labels(["enroll"])
            .finish(ScenarioStatus::Skipped);

        assert_that!(report.labels).is_equal_to(vec!["enroll".to_string()]);
        assert_that!(report.finished_at).is_greater_than_or_equal_to(report.started_at);
        assert_that!(report.duration_ms()).is_ok();
    }
}
