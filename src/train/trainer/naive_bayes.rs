use std::io;

use tracing::info;

use super::{unknown_parameter, NaiveBayes, Trainer, TrainingAlgorithm};
use crate::context::{all_outcomes_pattern, Context, EvalParameters};
use crate::dataset::DataIndex;
use crate::eval;
use crate::model::{MaxentModel, ModelType};
use crate::train::monitor::{IterationStats, ProgressMonitor, Termination, TrainingMeasure};

/// Naive Bayes training parameters.
///
/// Naive Bayes is trained in a single counting pass and has no tunable
/// parameters besides the cutoff held by the trainer.
#[derive(Debug, Clone, Default)]
pub struct NaiveBayesParams {
    _private: (),
}

impl NaiveBayesParams {
    /// Set a parameter by name
    pub fn set(&mut self, key: &str, _value: &str) -> io::Result<()> {
        Err(unknown_parameter(key))
    }
}

impl TrainingAlgorithm for NaiveBayes {
    type Params = NaiveBayesParams;

    const NAME: &'static str = "NAIVEBAYES";
    const SORT_AND_MERGE: bool = false;

    fn set_param(params: &mut NaiveBayesParams, key: &str, value: &str) -> io::Result<()> {
        params.set(key, value)
    }

    fn train(
        trainer: &Trainer<Self>,
        index: &DataIndex,
        monitor: &mut ProgressMonitor,
    ) -> io::Result<MaxentModel> {
        trainer.train_naive_bayes(index, monitor)
    }
}

fn outcome_totals(params: &[Context], num_outcomes: usize) -> Vec<f64> {
    let mut totals = vec![0.0; num_outcomes];
    for context in params {
        for (&oid, &count) in context.outcomes().iter().zip(context.parameters()) {
            totals[oid] += count;
        }
    }
    totals
}

impl Trainer<NaiveBayes> {
    /// Count (predicate, outcome) co-occurrences
    pub(super) fn train_naive_bayes(
        &self,
        index: &DataIndex,
        monitor: &mut ProgressMonitor,
    ) -> io::Result<MaxentModel> {
        let num_preds = index.num_preds();
        let num_outcomes = index.num_outcomes();
        let num_events = index.num_events();

        info!(
            events = num_events,
            unique_events = index.num_unique_events(),
            outcomes = num_outcomes,
            predicates = num_preds,
            "training with Naive Bayes"
        );

        let pattern = all_outcomes_pattern(num_outcomes);
        let mut params: Vec<Context> = (0..num_preds)
            .map(|_| Context::zeroed(pattern.clone()))
            .collect();

        for ei in 0..index.num_unique_events() {
            let target = index.outcome_list()[ei];
            let seen = f64::from(index.num_times_seen()[ei]);
            let values = index.values(ei);
            for (ci, &pid) in index.context(ei).iter().enumerate() {
                let value = values.map_or(1.0, |v| f64::from(v[ci]));
                params[pid].update_parameter(target, seen * value);
            }
        }

        // Training accuracy of the counted model
        let totals = outcome_totals(&params, num_outcomes);
        let eval_params = EvalParameters::new(&params, num_outcomes);
        let mut dist = vec![0.0; num_outcomes];
        let mut num_correct = 0u64;
        for ei in 0..index.num_unique_events() {
            eval::eval_naive_bayes(
                eval::active_features(index.context(ei), index.values(ei), &eval_params),
                &totals,
                num_preds as f64,
                &mut dist,
            );
            if eval::argmax(&dist) == index.outcome_list()[ei] {
                num_correct += u64::from(index.num_times_seen()[ei]);
            }
        }
        let accuracy = num_correct as f64 / num_events as f64;
        monitor.finished_iteration(
            IterationStats {
                iteration: 1,
                num_correct,
                num_events,
                measure: TrainingMeasure::Accuracy(accuracy),
            },
            true,
        );
        monitor.finished_training(Termination::Completed, None);

        Ok(MaxentModel::new(
            ModelType::NaiveBayes,
            params,
            index.pred_labels().to_vec(),
            index.outcome_labels().to_vec(),
        ))
    }
}
