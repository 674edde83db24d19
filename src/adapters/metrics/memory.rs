use crate::ports::metrics::{Error, Metric, MetricsPort};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Metrics sink that keeps everything in memory
///
/// Recorded metrics are buffered until [`MetricsPort::flush`] moves them to the flushed list,
/// the same way a StatsD client batches packets.
#[derive(Clone, Debug, Default)]
pub struct MemoryMetrics {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    buffered: Vec<Metric>,
    flushed: Vec<Metric>,
    flushes: usize,
}

impl MemoryMetrics {
    /// Metrics recorded since the last flush
    pub fn buffered(&self) -> Vec<Metric> {
        self.lock().buffered.clone()
    }

    /// Metrics sent by previous flushes, in recording order
    pub fn flushed(&self) -> Vec<Metric> {
        self.lock().flushed.clone()
    }

    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    /// First flushed metric with the given name
    pub fn find(&self, name: &str) -> Option<Metric> {
        self.flushed().into_iter().find(|metric| metric.name == name)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // Every update is a single push or move, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl MetricsPort for MemoryMetrics {
    async fn record(&self, metric: Metric) -> Result<(), Error> {
        if metric.name.is_empty() {
            return Err(Error::Rejected {
                name: metric.name,
                reason: "empty metric name".to_string(),
            });
        }

        self.lock().buffered.push(metric);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        let mut state = self.lock();
        let buffered = std::mem::take(&mut state.buffered);
        state.flushed.extend(buffered);
        state.flushes += 1;
        Ok(())
    }
}
