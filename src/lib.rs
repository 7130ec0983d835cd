//! Pure Rust maximum entropy model training
//!
//! This library trains classifiers over sparse, labeled events with
//! Generalized Iterative Scaling (optionally in parallel), the Perceptron or
//! Naive Bayes, and evaluates the trained models.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use maxent::train::{ModelWriter, Trainer};
//! use maxent::Event;
//!
//! let mut trainer = Trainer::gis().with_iterations(100)?.with_threads(4)?;
//! trainer.append(Event::new("A", ["dog", "cat", "mouse"]))?;
//! trainer.append(Event::new("B", ["text", "print", "mouse"]))?;
//!
//! trainer.set("LLThreshold", "0.0001")?;
//! let result = trainer.train()?;
//! ModelWriter::write("model.bin".as_ref(), &result.model)?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! ## Prediction
//!
//! ```no_run
//! use maxent::MaxentModel;
//!
//! let model_data = std::fs::read("model.bin")?;
//! let model = MaxentModel::from_bytes(&model_data)?;
//!
//! let dist = model.eval(&["dog", "cat"]);
//! println!("{} ({})", model.best_outcome(&dist), model.all_outcomes(&dist));
//! # Ok::<(), std::io::Error>(())
//! ```

mod context;
mod dataset;
pub mod eval;
mod event;
mod model;
mod prior;

/// Training module containing all components for training maxent models
pub mod train;

// Re-export main types
pub use self::context::{Context, EvalParameters};
pub use self::dataset::DataIndex;
pub use self::event::Event;
pub use self::model::{MaxentModel, ModelType};
pub use self::prior::{Prior, UniformPrior};

// Re-export training types for convenience
pub use self::train::{Algorithm, Trainer};
