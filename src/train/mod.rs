//! Training module for maxent models
//!
//! This module contains everything needed to go from raw events to a trained
//! model: one-pass indexing, the GIS, Perceptron and Naive Bayes trainers,
//! training statistics and model serialization.

mod dictionary;
mod indexer;
mod model_writer;
mod monitor;
mod trainer;

// Re-export public types
pub use self::indexer::DataIndexer;
pub use self::model_writer::ModelWriter;
pub use self::monitor::{
    AccuracyTolerance, IterationStats, LogLikelihoodThreshold, ProgressMonitor, StopCriterion,
    Termination, TrainingMeasure, TrainingResult, TrainingStats,
};
pub use self::trainer::{
    Algorithm, Gis, GisParams, NaiveBayes, NaiveBayesParams, Perceptron, PerceptronParams,
    Trainer, TrainingAlgorithm,
};
