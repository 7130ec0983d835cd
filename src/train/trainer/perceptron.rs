use std::collections::VecDeque;
use std::io;

use tracing::info;

use super::{parse_bool, parse_value, unknown_parameter, Perceptron, Trainer, TrainingAlgorithm};
use crate::context::{all_outcomes_pattern, Context, EvalParameters};
use crate::dataset::DataIndex;
use crate::eval;
use crate::model::{MaxentModel, ModelType};
use crate::train::monitor::{
    AccuracyTolerance, IterationStats, ProgressMonitor, StopCriterion, Termination,
    TrainingMeasure,
};

/// Iterations always included in skipped averaging
const SKIPPED_AVERAGING_WARMUP: usize = 20;
/// Number of trailing accuracies compared against the current one
const ACCURACY_WINDOW: usize = 3;

/// Perceptron training parameters.
#[derive(Debug, Clone)]
pub struct PerceptronParams {
    max_iterations: usize,
    use_average: bool,
    skipped_averaging: bool,
    step_size_decrease: Option<f64>,
    tolerance: f64,
}

impl Default for PerceptronParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            use_average: true,
            skipped_averaging: false,
            step_size_decrease: None,
            tolerance: 1e-5,
        }
    }
}

impl PerceptronParams {
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> io::Result<()> {
        if max_iterations < 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "max_iterations must be at least 1",
            ));
        }
        self.max_iterations = max_iterations;
        Ok(())
    }

    pub fn use_average(&self) -> bool {
        self.use_average
    }

    pub fn set_use_average(&mut self, enabled: bool) {
        self.use_average = enabled;
    }

    pub fn skipped_averaging(&self) -> bool {
        self.skipped_averaging
    }

    /// Only average the first iterations and those whose index is a perfect
    /// square
    pub fn set_skipped_averaging(&mut self, enabled: bool) {
        self.skipped_averaging = enabled;
    }

    pub fn step_size_decrease(&self) -> Option<f64> {
        self.step_size_decrease
    }

    /// Step size is multiplied by `1 - decrease` before every iteration
    pub fn set_step_size_decrease(&mut self, decrease: Option<f64>) -> io::Result<()> {
        if let Some(decrease) = decrease {
            if !(0.0..=100.0).contains(&decrease) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "step_size_decrease must be between 0 and 100",
                ));
            }
        }
        self.step_size_decrease = decrease;
        Ok(())
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f64) -> io::Result<()> {
        if !(tolerance >= 0.0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "tolerance must be non-negative",
            ));
        }
        self.tolerance = tolerance;
        Ok(())
    }

    /// Set a parameter by name
    pub fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        match key {
            "Iterations" => self.set_max_iterations(parse_value(key, value)?),
            "UseAverage" => {
                self.set_use_average(parse_bool(key, value)?);
                Ok(())
            }
            "UseSkippedAveraging" => {
                self.set_skipped_averaging(parse_bool(key, value)?);
                Ok(())
            }
            "StepSizeDecrease" => self.set_step_size_decrease(Some(parse_value(key, value)?)),
            "Tolerance" => self.set_tolerance(parse_value(key, value)?),
            _ => Err(unknown_parameter(key)),
        }
    }
}

impl TrainingAlgorithm for Perceptron {
    type Params = PerceptronParams;

    const NAME: &'static str = "PERCEPTRON";
    const SORT_AND_MERGE: bool = false;

    fn set_param(params: &mut PerceptronParams, key: &str, value: &str) -> io::Result<()> {
        params.set(key, value)
    }

    fn train(
        trainer: &Trainer<Self>,
        index: &DataIndex,
        monitor: &mut ProgressMonitor,
    ) -> io::Result<MaxentModel> {
        trainer.train_perceptron(index, monitor)
    }
}

fn is_perfect_square(n: usize) -> bool {
    let root = (n as f64).sqrt() as usize;
    root * root == n
}

/// Unnormalized perceptron scores of a context
fn score(context: &[usize], values: Option<&[f32]>, scores: &mut [f64], params: &EvalParameters<'_>) {
    scores.iter_mut().for_each(|s| *s = 0.0);
    eval::sum_features(eval::active_features(context, values, params), scores);
}

/// Number of events, counting multiplicities, predicted correctly
fn count_correct(index: &DataIndex, params: &[Context]) -> u64 {
    let eval_params = EvalParameters::new(params, index.num_outcomes());
    let mut scores = vec![0.0; index.num_outcomes()];
    let mut num_correct = 0;
    for ei in 0..index.num_unique_events() {
        score(index.context(ei), index.values(ei), &mut scores, &eval_params);
        if eval::argmax(&scores) == index.outcome_list()[ei] {
            num_correct += u64::from(index.num_times_seen()[ei]);
        }
    }
    num_correct
}

impl Trainer<Perceptron> {
    /// Train using the mistake-driven perceptron update
    pub(super) fn train_perceptron(
        &self,
        index: &DataIndex,
        monitor: &mut ProgressMonitor,
    ) -> io::Result<MaxentModel> {
        let num_preds = index.num_preds();
        let num_outcomes = index.num_outcomes();
        let num_events = index.num_events();
        let max_iterations = self.params.max_iterations;
        let use_average = self.params.use_average;
        monitor.set_manifest("Iterations", max_iterations);

        info!(
            events = num_events,
            unique_events = index.num_unique_events(),
            outcomes = num_outcomes,
            predicates = num_preds,
            "training with Perceptron"
        );

        let pattern = all_outcomes_pattern(num_outcomes);
        let mut params: Vec<Context> = (0..num_preds)
            .map(|_| Context::zeroed(pattern.clone()))
            .collect();
        let mut summed: Vec<Context> = if use_average {
            params.clone()
        } else {
            Vec::new()
        };
        let mut num_times_summed = 0u32;

        let default_criterion = AccuracyTolerance::new(self.params.tolerance);
        let criterion: &dyn StopCriterion = match self.stop_criterion() {
            Some(criterion) => criterion,
            None => &default_criterion,
        };
        let mut prev_accuracies: VecDeque<f64> = VecDeque::with_capacity(ACCURACY_WINDOW);

        let mut scores = vec![0.0; num_outcomes];
        let mut step_size = 1.0;
        for iteration in 1..=max_iterations {
            if let Some(decrease) = self.params.step_size_decrease {
                step_size *= 1.0 - decrease;
            }

            let mut num_correct = 0u64;
            for ei in 0..index.num_unique_events() {
                let context = index.context(ei);
                let values = index.values(ei);
                let target = index.outcome_list()[ei];

                for _ in 0..index.num_times_seen()[ei] {
                    let predicted = {
                        let eval_params = EvalParameters::new(&params, num_outcomes);
                        score(context, values, &mut scores, &eval_params);
                        eval::argmax(&scores)
                    };

                    if predicted == target {
                        num_correct += 1;
                        continue;
                    }
                    for (ci, &pid) in context.iter().enumerate() {
                        let value = values.map_or(1.0, |v| f64::from(v[ci]));
                        params[pid].update_parameter(target, step_size * value);
                        params[pid].update_parameter(predicted, -step_size * value);
                    }
                }
            }

            let accuracy = num_correct as f64 / num_events as f64;
            monitor.finished_iteration(
                IterationStats {
                    iteration,
                    num_correct,
                    num_events,
                    measure: TrainingMeasure::Accuracy(accuracy),
                },
                iteration < 10 || iteration % 10 == 0,
            );

            let do_averaging = use_average
                && (!self.params.skipped_averaging
                    || iteration < SKIPPED_AVERAGING_WARMUP
                    || is_perfect_square(iteration));
            if do_averaging {
                num_times_summed += 1;
                for (sum, ctx) in summed.iter_mut().zip(&params) {
                    sum.accumulate(ctx);
                }
            }

            if prev_accuracies.len() == ACCURACY_WINDOW
                && prev_accuracies
                    .iter()
                    .all(|&prev| criterion.test(prev - accuracy))
            {
                monitor.finished_training(Termination::Converged, Some(criterion.message()));
                break;
            }
            if prev_accuracies.len() == ACCURACY_WINDOW {
                prev_accuracies.pop_front();
            }
            prev_accuracies.push_back(accuracy);
        }
        monitor.finished_training(Termination::Exhausted, None);

        let num_correct = count_correct(index, &params);
        info!(
            correct = num_correct,
            events = num_events,
            accuracy = num_correct as f64 / num_events as f64,
            "training stats"
        );

        let weights = if use_average && num_times_summed > 0 {
            let divisor = f64::from(num_times_summed);
            for sum in summed.iter_mut() {
                for ai in 0..sum.len() {
                    let averaged = sum.parameters()[ai] / divisor;
                    sum.set_parameter(ai, averaged);
                }
            }
            summed
        } else {
            params
        };

        Ok(MaxentModel::new(
            ModelType::Perceptron,
            weights,
            index.pred_labels().to_vec(),
            index.outcome_labels().to_vec(),
        ))
    }
}
