use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info};

use crate::model::MaxentModel;

/// Decides whether training should stop given the change of a training
/// measure between two iterations
pub trait StopCriterion: fmt::Debug + Send + Sync {
    fn test(&self, delta: f64) -> bool;

    /// Message recorded when the criterion stops training
    fn message(&self) -> String;
}

/// Stop when the log-likelihood gain drops below a threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogLikelihoodThreshold {
    threshold: f64,
}

impl LogLikelihoodThreshold {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl StopCriterion for LogLikelihoodThreshold {
    fn test(&self, delta: f64) -> bool {
        delta < self.threshold
    }

    fn message(&self) -> String {
        format!(
            "Stopping: change in training set log-likelihood less than {}",
            self.threshold
        )
    }
}

/// Stop when training accuracy changes by less than a tolerance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyTolerance {
    tolerance: f64,
}

impl AccuracyTolerance {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

impl StopCriterion for AccuracyTolerance {
    fn test(&self, delta: f64) -> bool {
        delta.abs() < self.tolerance
    }

    fn message(&self) -> String {
        format!(
            "Stopping: change in training set accuracy less than {}",
            self.tolerance
        )
    }
}

/// Quantity reported for an iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainingMeasure {
    LogLikelihood(f64),
    Accuracy(f64),
}

impl fmt::Display for TrainingMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogLikelihood(ll) => write!(f, "loglikelihood={:.6}", ll),
            Self::Accuracy(acc) => write!(f, "accuracy={:.5}", acc),
        }
    }
}

/// Progress of a single training iteration
#[derive(Debug, Clone, PartialEq)]
pub struct IterationStats {
    pub iteration: usize,
    pub num_correct: u64,
    pub num_events: u64,
    pub measure: TrainingMeasure,
}

impl IterationStats {
    /// Fraction of events predicted correctly
    pub fn accuracy(&self) -> f64 {
        if self.num_events == 0 {
            0.0
        } else {
            self.num_correct as f64 / self.num_events as f64
        }
    }
}

/// How a training run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The stop criterion was satisfied
    Converged,
    /// The log-likelihood decreased; the last computed weights are kept
    Diverged,
    /// The iteration budget ran out
    Exhausted,
    /// A single-pass algorithm finished
    Completed,
}

/// Statistics collected while training
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingStats {
    iterations: Vec<IterationStats>,
    termination: Termination,
    message: Option<String>,
    manifest: BTreeMap<String, String>,
}

impl TrainingStats {
    /// Every iteration, in order
    pub fn iterations(&self) -> &[IterationStats] {
        &self.iterations
    }

    pub fn last_iteration(&self) -> Option<&IterationStats> {
        self.iterations.last()
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Stop message, if training ended early
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Key-value description of the training run
    pub fn manifest(&self) -> &BTreeMap<String, String> {
        &self.manifest
    }
}

/// A trained model together with the statistics of its training run
#[derive(Debug, Clone)]
pub struct TrainingResult {
    pub model: MaxentModel,
    pub stats: TrainingStats,
}

/// Collects iteration statistics and reports progress through `tracing`
///
/// Progress lines are emitted at `info` level in verbose mode and at `debug`
/// level otherwise.
#[derive(Debug)]
pub struct ProgressMonitor {
    verbose: bool,
    iterations: Vec<IterationStats>,
    termination: Option<(Termination, Option<String>)>,
    manifest: BTreeMap<String, String>,
}

impl ProgressMonitor {
    pub(crate) fn new(verbose: bool) -> Self {
        Self {
            verbose,
            iterations: Vec::new(),
            termination: None,
            manifest: BTreeMap::new(),
        }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Add an entry to the training manifest
    pub fn set_manifest<V: ToString>(&mut self, key: &str, value: V) {
        self.manifest.insert(key.to_string(), value.to_string());
    }

    /// Record an iteration, reporting it when `display` is set
    pub fn finished_iteration(&mut self, stats: IterationStats, display: bool) {
        if display {
            if self.verbose {
                info!(
                    iteration = stats.iteration,
                    correct = stats.num_correct,
                    events = stats.num_events,
                    "{}",
                    stats.measure
                );
            } else {
                debug!(
                    iteration = stats.iteration,
                    correct = stats.num_correct,
                    events = stats.num_events,
                    "{}",
                    stats.measure
                );
            }
        }
        self.iterations.push(stats);
    }

    /// Mark training as finished; only the first call takes effect
    pub fn finished_training(&mut self, termination: Termination, message: Option<String>) {
        if self.termination.is_some() {
            return;
        }
        if let Some(message) = &message {
            if self.verbose {
                info!("{}", message);
            } else {
                debug!("{}", message);
            }
        }
        self.termination = Some((termination, message));
    }

    pub fn is_training_finished(&self) -> bool {
        self.termination.is_some()
    }

    pub(crate) fn into_stats(self) -> TrainingStats {
        let (termination, message) = self.termination.unwrap_or((Termination::Exhausted, None));
        TrainingStats {
            iterations: self.iterations,
            termination,
            message,
            manifest: self.manifest,
        }
    }
}
