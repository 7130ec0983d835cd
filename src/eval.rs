//! Outcome distribution computation shared by training and prediction

use crate::context::{Context, EvalParameters};

/// Additive smoothing constant of naive Bayes likelihoods
const NAIVE_BAYES_DELTA: f64 = 0.05;

/// Add `weight * value` of every active outcome into `out_sums`
pub fn sum_features<'a, I>(features: I, out_sums: &mut [f64])
where
    I: IntoIterator<Item = (&'a Context, f64)>,
{
    for (context, value) in features {
        for (&oid, &weight) in context.outcomes().iter().zip(context.parameters()) {
            out_sums[oid] += weight * value;
        }
    }
}

/// Pair each predicate id of `context` with its context vector and value
pub fn active_features<'a>(
    context: &'a [usize],
    values: Option<&'a [f32]>,
    params: &EvalParameters<'a>,
) -> impl Iterator<Item = (&'a Context, f64)> + 'a {
    let table = params.params();
    context.iter().enumerate().map(move |(i, &pid)| {
        let value = values.map_or(1.0, |v| f64::from(v[i]));
        (&table[pid], value)
    })
}

/// Compute the normalized outcome distribution of a context
///
/// `out_sums` must already hold the log prior of each outcome. Feature weights
/// are summed on top of it and the result is exponentiated and normalized in
/// place. There is no overflow guard: the computation matches the plain
/// softmax bit for bit.
pub fn eval(context: &[usize], values: Option<&[f32]>, out_sums: &mut [f64], params: &EvalParameters<'_>) {
    sum_features(active_features(context, values, params), out_sums);
    normalize(&mut out_sums[..params.num_outcomes()]);
}

/// Exponentiate and normalize log scores in place
pub fn normalize(out_sums: &mut [f64]) {
    let mut normal = 0.0;
    for sum in out_sums.iter_mut() {
        *sum = sum.exp();
        normal += *sum;
    }
    for sum in out_sums.iter_mut() {
        *sum /= normal;
    }
}

/// Softmax over perceptron scores scaled by the largest magnitude
///
/// Scores are divided by `max(|score|, 1)` before exponentiation so large
/// perceptron weights still yield a usable distribution.
pub fn normalize_scaled(out_sums: &mut [f64]) {
    let max_score = out_sums.iter().fold(1.0f64, |acc, s| acc.max(s.abs()));
    let mut normal = 0.0;
    for sum in out_sums.iter_mut() {
        *sum = (*sum / max_score).exp();
        normal += *sum;
    }
    for sum in out_sums.iter_mut() {
        *sum /= normal;
    }
}

/// Naive Bayes posterior over outcomes
///
/// Every table holds raw (predicate, outcome) counts over all outcomes.
/// Likelihoods are add-delta smoothed with `vocabulary` as the number of
/// predicates; outcome priors come from `outcome_totals`.
pub fn eval_naive_bayes<'a, I>(features: I, outcome_totals: &[f64], vocabulary: f64, out: &mut [f64])
where
    I: IntoIterator<Item = (&'a Context, f64)>,
{
    out.iter_mut().for_each(|o| *o = 0.0);
    for (context, value) in features {
        for (oid, log_prob) in out.iter_mut().enumerate() {
            let numerator = context
                .index_of(oid)
                .map_or(0.0, |ai| context.parameters()[ai] * value);
            let probability = (numerator + NAIVE_BAYES_DELTA)
                / (outcome_totals[oid] + NAIVE_BAYES_DELTA * vocabulary);
            *log_prob += probability.ln();
        }
    }

    let total: f64 = outcome_totals.iter().sum();
    for (oid, log_prob) in out.iter_mut().enumerate() {
        *log_prob += (outcome_totals[oid] / total).ln();
    }

    // Normalize in log space
    let max_log = out.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_log.is_finite() {
        out.iter_mut().for_each(|o| *o -= max_log);
    }
    normalize(out);
}

/// Index of the first maximum entry
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::all_outcomes_pattern;
    use std::sync::Arc;

    fn table() -> Vec<Context> {
        vec![
            Context::new(vec![0usize, 1].into(), vec![1.0, -1.0]),
            Context::new(vec![1usize].into(), vec![2.0]),
            Context::new(vec![0usize, 1, 2].into(), vec![0.5, 0.5, 0.5]),
        ]
    }

    #[test]
    fn test_sum_features() {
        let params = table();
        let eval_params = EvalParameters::new(&params, 3);
        let mut sums = vec![0.0; 3];
        let values = [2.0f32, 0.5];
        sum_features(active_features(&[0, 1], Some(&values[..]), &eval_params), &mut sums);
        assert_eq!(sums, vec![2.0, -1.0, 0.0]);
    }

    #[test]
    fn test_eval_is_distribution() {
        let params = table();
        let eval_params = EvalParameters::new(&params, 3);
        for context in [&[0usize][..], &[1][..], &[0, 1, 2][..], &[2, 2][..]] {
            let mut dist = vec![(1.0f64 / 3.0).ln(); 3];
            eval(context, None, &mut dist, &eval_params);
            let total: f64 = dist.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
            assert!(dist.iter().all(|&p| p >= 0.0));
        }
    }

    #[test]
    fn test_eval_softmax_values() {
        let params = table();
        let eval_params = EvalParameters::new(&params, 3);
        let mut dist = vec![0.0; 3];
        eval(&[1], None, &mut dist, &eval_params);
        let z = 1.0 + 2.0f64.exp() + 1.0;
        assert!((dist[0] - 1.0 / z).abs() < 1e-12);
        assert!((dist[1] - 2.0f64.exp() / z).abs() < 1e-12);
        assert_eq!(argmax(&dist), 1);
    }

    #[test]
    fn test_normalize_scaled() {
        let mut scores = vec![10.0, -10.0, 0.0];
        normalize_scaled(&mut scores);
        let total: f64 = scores.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((scores[0] - 1.0f64.exp() / (1.0f64.exp() + (-1.0f64).exp() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_naive_bayes_prefers_counted_outcome() {
        let pattern: Arc<[usize]> = all_outcomes_pattern(2);
        let params = vec![
            Context::new(pattern.clone(), vec![3.0, 0.0]),
            Context::new(pattern, vec![0.0, 3.0]),
        ];
        let totals = vec![3.0, 3.0];
        let mut dist = vec![0.0; 2];
        eval_naive_bayes([(&params[0], 1.0)], &totals, 2.0, &mut dist);
        assert!(dist[0] > dist[1]);
        assert!((dist.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_argmax_first_maximum() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[1.0]), 0);
    }
}
