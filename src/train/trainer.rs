use std::fmt;
use std::io;
use std::str::FromStr;

use tracing::info;

use super::indexer::DataIndexer;
use super::monitor::{ProgressMonitor, StopCriterion, TrainingResult};
use crate::dataset::DataIndex;
use crate::event::Event;
use crate::model::MaxentModel;
use crate::prior::Prior;

mod gis;
mod naive_bayes;
mod perceptron;

pub use self::gis::GisParams;
pub use self::naive_bayes::NaiveBayesParams;
pub use self::perceptron::PerceptronParams;

/// Parse a string-valued training parameter
pub(crate) fn parse_value<T: FromStr>(key: &str, value: &str) -> io::Result<T> {
    value.trim().parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid value for {}: {}", key, value),
        )
    })
}

/// Parse a boolean training parameter, accepting `true` and `false` in any case
pub(crate) fn parse_bool(key: &str, value: &str) -> io::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid value for {}: {}", key, value),
        )),
    }
}

pub(crate) fn unknown_parameter(key: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("unknown parameter: {}", key),
    )
}

/// Training algorithm marker for Generalized Iterative Scaling.
#[derive(Debug, Clone, Copy)]
pub struct Gis;

/// Training algorithm marker for the Perceptron.
#[derive(Debug, Clone, Copy)]
pub struct Perceptron;

/// Training algorithm marker for Naive Bayes.
#[derive(Debug, Clone, Copy)]
pub struct NaiveBayes;

/// Training algorithm interface.
pub trait TrainingAlgorithm {
    type Params: Default + Clone + fmt::Debug;

    /// Name accepted by the `Algorithm` parameter
    const NAME: &'static str;

    /// Whether identical events are merged into multiplicities when indexing
    const SORT_AND_MERGE: bool;

    fn set_param(params: &mut Self::Params, key: &str, value: &str) -> io::Result<()>;

    fn train(
        trainer: &Trainer<Self>,
        index: &DataIndex,
        monitor: &mut ProgressMonitor,
    ) -> io::Result<MaxentModel>
    where
        Self: Sized;
}

/// Maxent model trainer
#[derive(Debug)]
pub struct Trainer<A: TrainingAlgorithm> {
    /// Training events
    events: Vec<Event>,
    /// Minimum number of occurrences for a predicate to be kept
    cutoff: u32,
    /// Enable verbose output
    verbose: bool,
    /// Training parameters
    params: A::Params,
    /// Overrides the algorithm's default stop criterion
    stop_criterion: Option<Box<dyn StopCriterion>>,
}

impl<A: TrainingAlgorithm> Trainer<A> {
    /// Create a new trainer
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            cutoff: 0,
            verbose: false,
            params: A::Params::default(),
            stop_criterion: None,
        }
    }

    /// Create a trainer with the given parameters
    pub fn with_params(params: A::Params) -> Self {
        Self {
            params,
            ..Self::new()
        }
    }

    /// Enable or disable verbose output
    pub fn verbose(&mut self, enabled: bool) -> &mut Self {
        self.verbose = enabled;
        self
    }

    /// Get training parameters
    pub fn params(&self) -> &A::Params {
        &self.params
    }

    /// Get training parameters for mutation
    pub fn params_mut(&mut self) -> &mut A::Params {
        &mut self.params
    }

    pub fn cutoff(&self) -> u32 {
        self.cutoff
    }

    /// Set the minimum predicate frequency
    pub fn set_cutoff(&mut self, cutoff: u32) {
        self.cutoff = cutoff;
    }

    /// Set a training parameter by name
    pub fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        match key {
            "Algorithm" => {
                if value.trim() != A::NAME {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("algorithm name must be {}", A::NAME),
                    ));
                }
                Ok(())
            }
            "Cutoff" => {
                self.cutoff = parse_value(key, value)?;
                Ok(())
            }
            _ => A::set_param(&mut self.params, key, value),
        }
    }

    /// Replace the default stop criterion
    pub fn set_stop_criterion<C: StopCriterion + 'static>(&mut self, criterion: C) {
        self.stop_criterion = Some(Box::new(criterion));
    }

    pub fn stop_criterion(&self) -> Option<&dyn StopCriterion> {
        self.stop_criterion.as_deref()
    }

    /// Append a training event
    pub fn append(&mut self, event: Event) -> io::Result<()> {
        if let Some(values) = &event.values {
            if values.len() != event.context.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "context and values must have the same length",
                ));
            }
        }
        self.events.push(event);
        Ok(())
    }

    /// Append every event of an iterator
    pub fn append_all<I>(&mut self, events: I) -> io::Result<()>
    where
        I: IntoIterator<Item = Event>,
    {
        for event in events {
            self.append(event)?;
        }
        Ok(())
    }

    /// Number of appended events
    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    /// Clear all training data
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Index the appended events and train a model
    pub fn train(&self) -> io::Result<TrainingResult> {
        if self.events.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no training data",
            ));
        }
        let index = DataIndexer::new(self.cutoff, A::SORT_AND_MERGE).index(&self.events)?;
        self.train_index(&index)
    }

    /// Train a model on an already indexed event set
    pub fn train_index(&self, index: &DataIndex) -> io::Result<TrainingResult> {
        if index.num_unique_events() == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no training data",
            ));
        }
        let mut monitor = ProgressMonitor::new(self.verbose);
        monitor.set_manifest("Algorithm", A::NAME);
        monitor.set_manifest("Cutoff", self.cutoff);

        let model = A::train(self, index, &mut monitor)?;
        if self.verbose {
            info!(algorithm = A::NAME, "training completed");
        }
        Ok(TrainingResult {
            model,
            stats: monitor.into_stats(),
        })
    }
}

impl Trainer<Gis> {
    /// Create a new GIS trainer
    pub fn gis() -> Self {
        Self::new()
    }

    /// Set maximum iterations (builder pattern)
    pub fn with_iterations(mut self, iterations: usize) -> io::Result<Self> {
        self.params.set_max_iterations(iterations)?;
        Ok(self)
    }

    /// Set number of worker threads (builder pattern)
    pub fn with_threads(mut self, threads: usize) -> io::Result<Self> {
        self.params.set_threads(threads)?;
        Ok(self)
    }

    /// Set log-likelihood stop threshold (builder pattern)
    pub fn with_ll_threshold(mut self, threshold: f64) -> io::Result<Self> {
        self.params.set_ll_threshold(threshold)?;
        Ok(self)
    }

    /// Enable simple smoothing with the given pseudo-count (builder pattern)
    pub fn with_smoothing(mut self, observation: f64) -> io::Result<Self> {
        self.params.set_smoothing_observation(observation)?;
        self.params.set_smoothing(true)?;
        Ok(self)
    }

    /// Enable Gaussian smoothing with the given sigma (builder pattern)
    pub fn with_gaussian_smoothing(mut self, sigma: f64) -> io::Result<Self> {
        self.params.set_sigma(sigma)?;
        self.params.set_gaussian_smoothing(true)?;
        Ok(self)
    }

    /// Set the prior (builder pattern)
    pub fn with_prior<P: Prior + 'static>(mut self, prior: P) -> Self {
        self.params.set_prior(Box::new(prior));
        self
    }

    /// Set minimum predicate frequency (builder pattern)
    pub fn with_cutoff(mut self, cutoff: u32) -> Self {
        self.cutoff = cutoff;
        self
    }
}

impl Trainer<Perceptron> {
    /// Create a new Perceptron trainer
    pub fn perceptron() -> Self {
        Self::new()
    }

    /// Set maximum iterations (builder pattern)
    pub fn with_iterations(mut self, iterations: usize) -> io::Result<Self> {
        self.params.set_max_iterations(iterations)?;
        Ok(self)
    }

    /// Set weight averaging (builder pattern)
    pub fn with_averaging(mut self, enabled: bool) -> Self {
        self.params.set_use_average(enabled);
        self
    }

    /// Set skipped averaging (builder pattern)
    pub fn with_skipped_averaging(mut self, enabled: bool) -> Self {
        self.params.set_skipped_averaging(enabled);
        self
    }

    /// Set step size decrease (builder pattern)
    pub fn with_step_size_decrease(mut self, decrease: f64) -> io::Result<Self> {
        self.params.set_step_size_decrease(Some(decrease))?;
        Ok(self)
    }

    /// Set accuracy tolerance (builder pattern)
    pub fn with_tolerance(mut self, tolerance: f64) -> io::Result<Self> {
        self.params.set_tolerance(tolerance)?;
        Ok(self)
    }

    /// Set minimum predicate frequency (builder pattern)
    pub fn with_cutoff(mut self, cutoff: u32) -> Self {
        self.cutoff = cutoff;
        self
    }
}

impl Trainer<NaiveBayes> {
    /// Create a new Naive Bayes trainer
    pub fn naive_bayes() -> Self {
        Self::new()
    }

    /// Set minimum predicate frequency (builder pattern)
    pub fn with_cutoff(mut self, cutoff: u32) -> Self {
        self.cutoff = cutoff;
        self
    }
}

impl<A: TrainingAlgorithm> Default for Trainer<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Supported training algorithms with their parameters
#[derive(Debug, Clone)]
pub enum Algorithm {
    /// Maximum entropy model trained with GIS
    Maxent(GisParams),
    /// Perceptron
    Perceptron(PerceptronParams),
    /// Naive Bayes
    NaiveBayes(NaiveBayesParams),
}

impl Algorithm {
    /// Select an algorithm by name with default parameters
    pub fn from_name(name: &str) -> io::Result<Self> {
        match name.trim() {
            "MAXENT" => Ok(Self::Maxent(GisParams::default())),
            "PERCEPTRON" => Ok(Self::Perceptron(PerceptronParams::default())),
            "NAIVEBAYES" => Ok(Self::NaiveBayes(NaiveBayesParams::default())),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown algorithm: {}", other),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Maxent(_) => Gis::NAME,
            Self::Perceptron(_) => Perceptron::NAME,
            Self::NaiveBayes(_) => NaiveBayes::NAME,
        }
    }

    /// Set a training parameter by name
    ///
    /// `Cutoff` belongs to indexing rather than to an algorithm: pass it to
    /// [`Algorithm::train_events`] or set it on a [`Trainer`].
    pub fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        match key {
            "Algorithm" => {
                if value.trim() != self.name() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("algorithm name must be {}", self.name()),
                    ));
                }
                return Ok(());
            }
            "Cutoff" => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cutoff is an indexing parameter, pass it to train_events",
                ));
            }
            _ => {}
        }
        match self {
            Self::Maxent(params) => Gis::set_param(params, key, value),
            Self::Perceptron(params) => Perceptron::set_param(params, key, value),
            Self::NaiveBayes(params) => NaiveBayes::set_param(params, key, value),
        }
    }

    /// Train a model on an indexed event set
    pub fn train(&self, index: &DataIndex) -> io::Result<TrainingResult> {
        match self {
            Self::Maxent(params) => Trainer::<Gis>::with_params(params.clone()).train_index(index),
            Self::Perceptron(params) => {
                Trainer::<Perceptron>::with_params(params.clone()).train_index(index)
            }
            Self::NaiveBayes(params) => {
                Trainer::<NaiveBayes>::with_params(params.clone()).train_index(index)
            }
        }
    }

    /// Index raw events with the algorithm's indexing policy and train a model
    pub fn train_events(&self, events: &[Event], cutoff: u32) -> io::Result<TrainingResult> {
        let sort_and_merge = match self {
            Self::Maxent(_) => Gis::SORT_AND_MERGE,
            Self::Perceptron(_) => Perceptron::SORT_AND_MERGE,
            Self::NaiveBayes(_) => NaiveBayes::SORT_AND_MERGE,
        };
        if events.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no training data",
            ));
        }
        let index = DataIndexer::new(cutoff, sort_and_merge).index(events)?;
        self.train(&index)
    }
}

impl FromStr for Algorithm {
    type Err = io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}
