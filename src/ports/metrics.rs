#[mockall::automock]
#[async_trait::async_trait]
pub trait MetricsPort {
    async fn record(&self, metric: Metric) -> Result<(), Error>;
    /// Send everything recorded so far to the monitoring backend
    async fn flush(&self) -> Result<(), Error>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    pub name: String,
    pub kind: MetricKind,
    /// Tags in `key:value` form
    pub tags: Vec<String>,
}

impl Metric {
    pub fn counter(name: impl Into<String>, value: i64, tags: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Counter(value),
            tags,
        }
    }

    pub fn gauge(name: impl Into<String>, value: f64, tags: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Gauge(value),
            tags,
        }
    }

    pub fn distribution(name: impl Into<String>, value: f64, tags: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Distribution(value),
            tags,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricKind {
    /// Increment by the given amount
    Counter(i64),
    /// Last value wins
    Gauge(f64),
    /// Sample aggregated by the backend
    Distribution(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The sink refused the metric
    #[error("metric {name} rejected: {reason}")]
    Rejected { name: String, reason: String },

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
