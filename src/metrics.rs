use std::time::Instant;

use prometheus::{histogram_opts, opts, Histogram, IntCounter, IntCounterVec, Registry};

use crate::Error;

#[derive(Clone)]
pub struct Metrics {
    pub clones: IntCounter,
    pub clone_failures: IntCounterVec,
    pub clone_duration: Histogram,
    pub mutations: IntCounterVec,
    pub mutation_failures: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        let clones =
            IntCounter::new("ns_cloner_clones_total", "Namespace clones attempted").unwrap();
        let clone_failures = IntCounterVec::new(
            opts!("ns_cloner_clone_failures_total", "Namespace clones that failed"),
            &["error"],
        )
        .unwrap();
        let clone_duration = Histogram::with_opts(
            histogram_opts!(
                "ns_cloner_clone_duration_seconds",
                "The duration of a namespace clone in seconds"
            )
            .buckets(vec![1., 5., 15., 30., 60., 120., 300., 600.]),
        )
        .unwrap();
        let mutations = IntCounterVec::new(
            opts!("ns_cloner_mutations_total", "Mutations attempted on cloned objects"),
            &["operation"],
        )
        .unwrap();
        let mutation_failures = IntCounterVec::new(
            opts!("ns_cloner_mutation_failures_total", "Mutations that failed"),
            &["operation", "error"],
        )
        .unwrap();
        Self {
            clones,
            clone_failures,
            clone_duration,
            mutations,
            mutation_failures,
        }
    }
}

impl Metrics {
    /// Register API metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.clones.clone()))?;
        registry.register(Box::new(self.clone_failures.clone()))?;
        registry.register(Box::new(self.clone_duration.clone()))?;
        registry.register(Box::new(self.mutations.clone()))?;
        registry.register(Box::new(self.mutation_failures.clone()))?;
        Ok(self)
    }

    pub fn clone_failure(&self, error: &Error) {
        self.clone_failures
            .with_label_values(&[error.metric_label()])
            .inc();
    }

    pub fn mutation(&self, operation: &str) {
        self.mutations.with_label_values(&[operation]).inc();
    }

    pub fn mutation_failure(&self, operation: &str, error: &Error) {
        self.mutation_failures
            .with_label_values(&[operation, error.metric_label()])
            .inc();
    }

    /// Counts a clone attempt and measures its duration for as long as the
    /// returned guard lives.
    pub fn count_and_measure(&self) -> CloneTimer {
        self.clones.inc();
        CloneTimer {
            start: Instant::now(),
            metric: self.clone_duration.clone(),
        }
    }
}

pub struct CloneTimer {
    start: Instant,
    metric: Histogram,
}

impl Drop for CloneTimer {
    fn drop(&mut self) {
        self.metric.observe(self.start.elapsed().as_secs_f64());
    }
}
