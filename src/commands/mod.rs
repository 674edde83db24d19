use crate::{config::ReporterConfig, ports::metrics::MetricsPort};
use chrono::{DateTime, Utc};
use std::{
    borrow::Cow,
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tower::{Service, ServiceExt};

pub mod finish_run;
pub mod report_scenario;

pub use finish_run::{FinishRun, RunSummary};
pub use report_scenario::{ReportScenarioResponse, ScenarioReport, ScenarioStatus, ScenarioTimer};

/// Observes scenario runs and forwards their outcome to a metrics sink
///
/// Each request type is handled through its own [`tower::Service`] implementation.
pub struct MetricsReporter<M> {
    metrics: Arc<M>,
    config: Arc<ReporterConfig>,
    stats: Arc<Mutex<RunStats>>,
}

impl<M> MetricsReporter<M> {
    /// Create a reporter for a run starting now
    pub fn new(metrics: Arc<M>, config: ReporterConfig) -> Self {
        Self::starting_at(metrics, config, Utc::now())
    }

    pub fn starting_at(metrics: Arc<M>, config: ReporterConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            metrics,
            config: Arc::new(config),
            stats: Arc::new(Mutex::new(RunStats::new(started_at))),
        }
    }

    fn stats(&self) -> Result<MutexGuard<'_, RunStats>, Error> {
        self.stats
            .lock()
            .map_err(|err| Error::InvalidState(format!("run stats poisoned: {err}").into()))
    }
}

impl<M> MetricsReporter<M>
where
    M: MetricsPort + 'static,
{
    /// Report a finished scenario
    pub async fn report(&mut self, req: ScenarioReport) -> Result<ReportScenarioResponse, Error> {
        let service = ServiceExt::<ScenarioReport>::ready(self).await?;
        Service::<ScenarioReport>::call(service, req).await
    }

    /// Send the run aggregates and flush the sink
    pub async fn finish(&mut self, req: FinishRun) -> Result<RunSummary, Error> {
        let service = ServiceExt::<FinishRun>::ready(self).await?;
        Service::<FinishRun>::call(service, req).await
    }
}

impl<M> Clone for MetricsReporter<M> {
    fn clone(&self) -> Self {
        Self {
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Aggregate counts for the current run
#[derive(Clone, Debug, PartialEq)]
struct RunStats {
    started_at: DateTime<Utc>,
    scenarios: u64,
    passed: u64,
    failed: u64,
    skipped: u64,
    other: u64,
    /// Number of scenarios carrying each label
    labels: BTreeMap<String, u64>,
}

impl RunStats {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            scenarios: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            other: 0,
            labels: BTreeMap::new(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("metrics port error: {0:?}")]
    Metrics(#[from] crate::ports::metrics::Error),

    #[error("invalid state: {0}")]
    InvalidState(Cow<'static, str>),
}
