use std::io;
use std::ops::Range;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{info, warn};

use super::{parse_bool, parse_value, unknown_parameter, Gis, Trainer, TrainingAlgorithm};
use crate::context::{all_outcomes_pattern, Context, EvalParameters};
use crate::dataset::DataIndex;
use crate::eval;
use crate::event::Event;
use crate::model::{MaxentModel, ModelType};
use crate::prior::{Prior, UniformPrior};
use crate::train::monitor::{
    IterationStats, LogLikelihoodThreshold, ProgressMonitor, StopCriterion, Termination,
    TrainingMeasure, TrainingResult,
};

/// Newton iterations of the Gaussian smoothing update
const NEWTON_ITERATIONS: usize = 50;
/// Step size below which the Newton solver stops early
const NEWTON_EPSILON: f64 = 1e-6;

/// GIS training parameters.
#[derive(Debug, Clone)]
pub struct GisParams {
    max_iterations: usize,
    threads: usize,
    ll_threshold: f64,
    smoothing: bool,
    smoothing_observation: f64,
    gaussian_smoothing: bool,
    sigma: f64,
    prior: Box<dyn Prior>,
}

impl Default for GisParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            threads: 1,
            ll_threshold: 1e-4,
            smoothing: false,
            smoothing_observation: 0.1,
            gaussian_smoothing: false,
            sigma: 2.0,
            prior: Box::new(UniformPrior::new()),
        }
    }
}

impl GisParams {
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

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn set_threads(&mut self, threads: usize) -> io::Result<()> {
        if threads < 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "threads must be at least 1",
            ));
        }
        self.threads = threads;
        Ok(())
    }

    pub fn ll_threshold(&self) -> f64 {
        self.ll_threshold
    }

    pub fn set_ll_threshold(&mut self, threshold: f64) -> io::Result<()> {
        if !threshold.is_finite() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "ll_threshold must be finite",
            ));
        }
        self.ll_threshold = threshold;
        Ok(())
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    /// Enable simple smoothing, which makes every outcome active for every
    /// predicate
    pub fn set_smoothing(&mut self, enabled: bool) -> io::Result<()> {
        if enabled && self.gaussian_smoothing {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot enable both simple and gaussian smoothing",
            ));
        }
        self.smoothing = enabled;
        Ok(())
    }

    pub fn smoothing_observation(&self) -> f64 {
        self.smoothing_observation
    }

    pub fn set_smoothing_observation(&mut self, observation: f64) -> io::Result<()> {
        if !(observation > 0.0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "smoothing_observation must be positive",
            ));
        }
        self.smoothing_observation = observation;
        Ok(())
    }

    pub fn gaussian_smoothing(&self) -> bool {
        self.gaussian_smoothing
    }

    pub fn set_gaussian_smoothing(&mut self, enabled: bool) -> io::Result<()> {
        if enabled && self.smoothing {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot enable both simple and gaussian smoothing",
            ));
        }
        self.gaussian_smoothing = enabled;
        Ok(())
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn set_sigma(&mut self, sigma: f64) -> io::Result<()> {
        if !(sigma > 0.0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "sigma must be positive",
            ));
        }
        self.sigma = sigma;
        Ok(())
    }

    pub fn prior(&self) -> &dyn Prior {
        self.prior.as_ref()
    }

    pub fn set_prior(&mut self, prior: Box<dyn Prior>) {
        self.prior = prior;
    }

    /// Set a parameter by name
    pub fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        match key {
            "Iterations" => self.set_max_iterations(parse_value(key, value)?),
            "Threads" => self.set_threads(parse_value(key, value)?),
            "LLThreshold" => self.set_ll_threshold(parse_value(key, value)?),
            "Smoothing" => self.set_smoothing(parse_bool(key, value)?),
            "SmoothingObservation" => self.set_smoothing_observation(parse_value(key, value)?),
            "GaussianSmoothing" => self.set_gaussian_smoothing(parse_bool(key, value)?),
            "GaussianSmoothingSigma" => self.set_sigma(parse_value(key, value)?),
            _ => Err(unknown_parameter(key)),
        }
    }
}

impl TrainingAlgorithm for Gis {
    type Params = GisParams;

    const NAME: &'static str = "MAXENT";
    const SORT_AND_MERGE: bool = true;

    fn set_param(params: &mut GisParams, key: &str, value: &str) -> io::Result<()> {
        params.set(key, value)
    }

    fn train(
        trainer: &Trainer<Self>,
        index: &DataIndex,
        monitor: &mut ProgressMonitor,
    ) -> io::Result<MaxentModel> {
        trainer.train_gis(index, monitor)
    }
}

/// Split `num_events` events into `threads` contiguous chunks; the first
/// `num_events % threads` chunks hold one extra event
fn partition(num_events: usize, threads: usize) -> Vec<Range<usize>> {
    let task_size = num_events / threads;
    let leftover = num_events % threads;
    (0..threads)
        .map(|i| {
            if i < leftover {
                let start = i * task_size + i;
                start..start + task_size + 1
            } else {
                let start = i * task_size + leftover;
                start..start + task_size
            }
        })
        .collect()
}

/// Largest total feature value over all events
fn correction_constant(index: &DataIndex) -> f64 {
    let mut constant = 0.0f64;
    for ei in 0..index.num_unique_events() {
        let total = match index.values(ei) {
            Some(values) => f64::from(values.iter().sum::<f32>()),
            None => index.context(ei).len() as f64,
        };
        constant = constant.max(total);
    }
    constant
}

/// Solve `model * exp(c * x) + (param + x) / sigma = observed` for `x` with
/// Newton's method
///
/// Returns the solution and whether the step size fell below the tolerance
/// within the iteration budget.
fn newton_solve(param: f64, observed: f64, model: f64, correction_constant: f64, sigma: f64) -> (f64, bool) {
    // Start at the unsmoothed update when it is defined
    let mut x0 = if observed > 0.0 && model > 0.0 {
        (observed.ln() - model.ln()) / correction_constant
    } else {
        0.0
    };
    for _ in 0..NEWTON_ITERATIONS {
        let tmp = model * (correction_constant * x0).exp();
        let f = tmp + (param + x0) / sigma - observed;
        let fp = tmp * correction_constant + 1.0 / sigma;
        if fp == 0.0 {
            break;
        }
        let x = x0 - f / fp;
        if (x - x0).abs() < NEWTON_EPSILON {
            return (x, true);
        }
        x0 = x;
    }
    (x0, false)
}

fn gaussian_update(param: f64, observed: f64, model: f64, correction_constant: f64, sigma: f64) -> f64 {
    newton_solve(param, observed, model, correction_constant, sigma).0
}

/// Accumulate model expectations of a range of events into `expects`
///
/// Returns the log-likelihood and the number of correctly predicted events of
/// the range.
fn compute_expectations(
    index: &DataIndex,
    range: Range<usize>,
    eval_params: EvalParameters<'_>,
    prior: &dyn Prior,
    expects: &mut [Context],
) -> (f64, u64) {
    let params = eval_params.params();
    let mut dist = vec![0.0; eval_params.num_outcomes()];
    let mut log_likelihood = 0.0;
    let mut num_correct = 0u64;

    for ei in range {
        let context = index.context(ei);
        let values = index.values(ei);
        let seen = index.num_times_seen()[ei];
        let outcome = index.outcome_list()[ei];

        prior.log_prior(&mut dist, context, values);
        eval::eval(context, values, &mut dist, &eval_params);

        for (ci, &pid) in context.iter().enumerate() {
            let value = values.map_or(1.0, |v| f64::from(v[ci]));
            let weight = f64::from(seen) * value;
            let expect = &mut expects[pid];
            for (ai, &oid) in params[pid].outcomes().iter().enumerate() {
                expect.update_parameter(ai, dist[oid] * weight);
            }
        }

        log_likelihood += dist[outcome].ln() * f64::from(seen);
        if eval::argmax(&dist) == outcome {
            num_correct += u64::from(seen);
        }
    }
    (log_likelihood, num_correct)
}

/// Drive GIS iterations until the criterion holds, the log-likelihood
/// decreases or `max_iterations` is reached
///
/// `next_iteration` runs one update and returns the log-likelihood and number
/// of correct predictions of the weights it started from. On divergence the
/// update of the diverging iteration is kept.
fn run_iterations<F>(
    max_iterations: usize,
    num_events: u64,
    criterion: &dyn StopCriterion,
    monitor: &mut ProgressMonitor,
    mut next_iteration: F,
) where
    F: FnMut() -> (f64, u64),
{
    let mut prev_ll = 0.0;
    for iteration in 1..=max_iterations {
        let (log_likelihood, num_correct) = next_iteration();
        monitor.finished_iteration(
            IterationStats {
                iteration,
                num_correct,
                num_events,
                measure: TrainingMeasure::LogLikelihood(log_likelihood),
            },
            true,
        );

        if iteration > 1 {
            if prev_ll > log_likelihood {
                warn!(
                    previous = prev_ll,
                    current = log_likelihood,
                    "model diverging: log-likelihood decreased"
                );
                monitor.finished_training(
                    Termination::Diverged,
                    Some(format!(
                        "Stopping: log-likelihood decreased from {} to {}",
                        prev_ll, log_likelihood
                    )),
                );
                return;
            }
            if criterion.test(log_likelihood - prev_ll) {
                monitor.finished_training(Termination::Converged, Some(criterion.message()));
                return;
            }
        }
        prev_ll = log_likelihood;
    }
    monitor.finished_training(Termination::Exhausted, None);
}

/// Weight tables owned by a GIS training run
struct GisState {
    correction_constant: f64,
    /// Prior with its labels set, shared by training and the trained model
    prior: Box<dyn Prior>,
    /// Current weights
    params: Vec<Context>,
    /// Empirical feature expectations, fixed for the whole run
    observed: Vec<Context>,
    /// Per-worker model expectation accumulators
    model_expects: Vec<Vec<Context>>,
}

impl GisState {
    fn new(index: &DataIndex, params: &GisParams) -> io::Result<Self> {
        let num_preds = index.num_preds();
        let num_outcomes = index.num_outcomes();

        let correction_constant = correction_constant(index);
        if !(correction_constant > 0.0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "correction constant must be positive",
            ));
        }

        // Empirical (predicate, outcome) counts
        let mut pred_count = vec![0.0f64; num_preds * num_outcomes];
        for ei in 0..index.num_unique_events() {
            let seen = f64::from(index.num_times_seen()[ei]);
            let outcome = index.outcome_list()[ei];
            let values = index.values(ei);
            for (ci, &pid) in index.context(ei).iter().enumerate() {
                let value = values.map_or(1.0, |v| f64::from(v[ci]));
                pred_count[pid * num_outcomes + outcome] += seen * value;
            }
        }

        let all_outcomes = all_outcomes_pattern(num_outcomes);
        let mut weights = Vec::with_capacity(num_preds);
        let mut observed = Vec::with_capacity(num_preds);
        for pid in 0..num_preds {
            let counts = &pred_count[pid * num_outcomes..(pid + 1) * num_outcomes];
            let pattern = if params.smoothing {
                all_outcomes.clone()
            } else {
                counts
                    .iter()
                    .enumerate()
                    .filter(|(_, &count)| count > 0.0)
                    .map(|(oid, _)| oid)
                    .collect::<Vec<_>>()
                    .into()
            };
            let expected = pattern
                .iter()
                .map(|&oid| {
                    if counts[oid] > 0.0 {
                        counts[oid]
                    } else {
                        params.smoothing_observation
                    }
                })
                .collect();
            observed.push(Context::new(pattern.clone(), expected));
            weights.push(Context::zeroed(pattern));
        }

        let model_expects = (0..params.threads)
            .map(|_| {
                weights
                    .iter()
                    .map(|ctx| Context::zeroed(ctx.pattern().clone()))
                    .collect()
            })
            .collect();

        let mut prior = params.prior.clone();
        prior.set_labels(index.outcome_labels(), index.pred_labels());

        Ok(Self {
            correction_constant,
            prior,
            params: weights,
            observed,
            model_expects,
        })
    }

    /// Run one GIS iteration and return the log-likelihood and number of
    /// correct predictions of the weights it started from
    fn next_iteration(
        &mut self,
        pool: &ThreadPool,
        index: &DataIndex,
        config: &GisParams,
    ) -> (f64, u64) {
        let threads = config.threads;
        let eval_params = EvalParameters::new(&self.params, index.num_outcomes());
        let prior = self.prior.as_ref();
        let mut partials = vec![(0.0f64, 0u64); threads];

        // Each worker owns its accumulator and result slot, params are read-only
        pool.scope(|s| {
            for ((range, expects), slot) in partition(index.num_unique_events(), threads)
                .into_iter()
                .zip(self.model_expects.iter_mut())
                .zip(partials.iter_mut())
            {
                s.spawn(move |_| {
                    *slot = compute_expectations(index, range, eval_params, prior, expects);
                });
            }
        });

        let (head, tail) = self.model_expects.split_at_mut(1);
        let merged = &mut head[0];
        for other in tail.iter() {
            for (ctx, part) in merged.iter_mut().zip(other) {
                ctx.accumulate(part);
            }
        }

        for (pid, context) in self.params.iter_mut().enumerate() {
            let observed = self.observed[pid].parameters();
            let model = merged[pid].parameters();
            for (ai, &oid) in context.pattern().clone().iter().enumerate() {
                let delta = if config.gaussian_smoothing {
                    gaussian_update(
                        context.parameters()[ai],
                        observed[ai],
                        model[ai],
                        self.correction_constant,
                        config.sigma,
                    )
                } else {
                    if model[ai] == 0.0 {
                        warn!(
                            predicate = %index.pred_labels()[pid],
                            outcome = %index.outcome_labels()[oid],
                            "model expectation is zero"
                        );
                    }
                    (observed[ai].ln() - model[ai].ln()) / self.correction_constant
                };
                context.update_parameter(ai, delta);
            }
        }

        for expects in self.model_expects.iter_mut() {
            expects.iter_mut().for_each(Context::clear);
        }

        partials
            .into_iter()
            .fold((0.0, 0), |(ll, correct), (l, c)| (ll + l, correct + c))
    }
}

impl Trainer<Gis> {
    /// Train using Generalized Iterative Scaling
    pub(super) fn train_gis(
        &self,
        index: &DataIndex,
        monitor: &mut ProgressMonitor,
    ) -> io::Result<MaxentModel> {
        let config = &self.params;
        let max_iterations = config.max_iterations;
        let num_events = index.num_events();
        monitor.set_manifest("Iterations", max_iterations);

        let mut state = GisState::new(index, config)?;
        info!(
            events = num_events,
            unique_events = index.num_unique_events(),
            outcomes = index.num_outcomes(),
            predicates = index.num_preds(),
            correction_constant = state.correction_constant,
            threads = config.threads,
            "training with GIS"
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("gis-worker-{}", i))
            .build()
            .map_err(io::Error::other)?;

        let default_criterion = LogLikelihoodThreshold::new(config.ll_threshold);
        let criterion: &dyn StopCriterion = match self.stop_criterion() {
            Some(criterion) => criterion,
            None => &default_criterion,
        };

        run_iterations(max_iterations, num_events, criterion, monitor, || {
            state.next_iteration(&pool, index, config)
        });

        Ok(MaxentModel::with_prior(
            ModelType::Maxent,
            state.params,
            index.pred_labels().to_vec(),
            index.outcome_labels().to_vec(),
            state.prior,
        ))
    }

    /// Index raw events with the given cutoff and train for `iterations`
    /// iterations with default parameters
    pub fn train_events(events: &[Event], iterations: usize, cutoff: u32) -> io::Result<TrainingResult> {
        let mut trainer = Self::gis().with_iterations(iterations)?.with_cutoff(cutoff);
        trainer.append_all(events.iter().cloned())?;
        trainer.train()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::monitor::TrainingStats;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_partition() {
        assert_eq!(partition(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(partition(4, 4), vec![0..1, 1..2, 2..3, 3..4]);
        assert_eq!(partition(2, 4), vec![0..1, 1..2, 2..2, 2..2]);
        assert_eq!(partition(7, 1), vec![0..7]);

        for (n, t) in [(0, 3), (17, 5), (100, 8)] {
            let chunks = partition(n, t);
            assert_eq!(chunks.len(), t);
            assert_eq!(chunks.iter().map(|r| r.len()).sum::<usize>(), n);
            for pair in chunks.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
        }
    }

    #[test]
    fn test_correction_constant() {
        let labels = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut index = DataIndex::new(labels(&["a", "b", "c"]), labels(&["X"]));
        index.push_event(vec![0, 1], None, 0, 1).unwrap();
        index.push_event(vec![0, 1, 2], None, 0, 3).unwrap();
        assert_eq!(correction_constant(&index), 3.0);

        index.push_event(vec![0, 2], Some(vec![2.5, 1.0]), 0, 1).unwrap();
        assert_eq!(correction_constant(&index), 3.5);
    }

    #[test]
    fn test_newton_solver_converges() {
        let mut rng = StdRng::seed_from_u64(42);
        let sigma = 2.0;
        for _ in 0..1000 {
            let model: f64 = rng.gen_range(0.1..50.0);
            let ratio: f64 = 10f64.powf(rng.gen_range(-2.0..2.0));
            let observed = model * ratio;
            let param: f64 = rng.gen_range(-1.0..1.0);
            let correction_constant: f64 = rng.gen_range(1.0..4.0);

            let (x, converged) = newton_solve(param, observed, model, correction_constant, sigma);
            assert!(
                converged,
                "no convergence for model={} observed={} param={} c={}",
                model, observed, param, correction_constant
            );
            let residual = model * (correction_constant * x).exp() + (param + x) / sigma - observed;
            assert!(residual.abs() < 1e-4 * observed.max(1.0), "residual {}", residual);
        }
    }

    fn run_with(lls: &[f64], criterion: &dyn StopCriterion) -> (TrainingStats, usize) {
        let mut monitor = ProgressMonitor::new(false);
        let mut calls = 0;
        run_iterations(lls.len(), 4, criterion, &mut monitor, || {
            calls += 1;
            (lls[calls - 1], 2)
        });
        (monitor.into_stats(), calls)
    }

    #[test]
    fn test_iterations_stop_on_decreasing_log_likelihood() {
        let criterion = LogLikelihoodThreshold::new(0.0);
        let (stats, calls) = run_with(&[-10.0, -8.0, -9.0, -7.0, -6.0], &criterion);

        // The diverging iteration's update ran, nothing after it
        assert_eq!(calls, 3);
        assert_eq!(stats.termination(), Termination::Diverged);
        assert_eq!(stats.iterations().len(), 3);
        assert_eq!(
            stats.last_iteration().map(|it| it.measure),
            Some(TrainingMeasure::LogLikelihood(-9.0))
        );
        assert!(stats.message().unwrap().contains("decreased"));
    }

    #[test]
    fn test_iterations_converge_and_exhaust() {
        let criterion = LogLikelihoodThreshold::new(0.5);
        let (stats, calls) = run_with(&[-10.0, -8.0, -7.9, -7.0], &criterion);
        assert_eq!(calls, 3);
        assert_eq!(stats.termination(), Termination::Converged);

        let (stats, calls) = run_with(&[-10.0, -8.0, -6.0, -4.0], &criterion);
        assert_eq!(calls, 4);
        assert_eq!(stats.termination(), Termination::Exhausted);
        assert_eq!(stats.message(), None);
    }

    #[test]
    fn test_gaussian_update_without_model_mass() {
        // With no model expectation the equation is linear in x
        let x = gaussian_update(0.5, 1.0, 0.0, 2.0, 2.0);
        assert!((x - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_params_validation() {
        let mut params = GisParams::default();
        assert_eq!(params.max_iterations(), 100);
        assert_eq!(params.threads(), 1);
        assert_eq!(params.ll_threshold(), 1e-4);
        assert_eq!(params.smoothing_observation(), 0.1);
        assert_eq!(params.sigma(), 2.0);

        assert!(params.set_threads(0).is_err());
        assert!(params.set_max_iterations(0).is_err());
        assert!(params.set_sigma(0.0).is_err());
        assert!(params.set_smoothing_observation(-1.0).is_err());

        params.set_smoothing(true).unwrap();
        let err = params.set_gaussian_smoothing(true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        params.set_smoothing(false).unwrap();
        params.set_gaussian_smoothing(true).unwrap();
        assert!(params.set_smoothing(true).is_err());

        params.set("Threads", "4").unwrap();
        params.set("GaussianSmoothingSigma", "0.5").unwrap();
        assert_eq!(params.threads(), 4);
        assert_eq!(params.sigma(), 0.5);
        assert!(params.set("Threads", "many").is_err());
        assert!(params.set("Tolerance", "0.1").is_err());
    }
}
