use std::fmt;

/// Initial log-probability contributor
///
/// A prior fills the outcome buffer with log-probabilities before feature
/// weights are summed into it. Implementations must return identical results
/// for identical inputs, since the same prior is used during training and
/// evaluation.
pub trait Prior: fmt::Debug + Send + Sync {
    /// Called once with the label tables of the model
    fn set_labels(&mut self, outcome_labels: &[String], pred_labels: &[String]);

    /// Overwrite `dist` with the log prior of each outcome for `context`
    fn log_prior(&self, dist: &mut [f64], context: &[usize], values: Option<&[f32]>);

    fn clone_box(&self) -> Box<dyn Prior>;
}

impl Clone for Box<dyn Prior> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Uniform distribution over all outcomes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformPrior {
    log_uniform: f64,
}

impl UniformPrior {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Prior for UniformPrior {
    fn set_labels(&mut self, outcome_labels: &[String], _pred_labels: &[String]) {
        if !outcome_labels.is_empty() {
            self.log_uniform = (1.0 / outcome_labels.len() as f64).ln();
        }
    }

    fn log_prior(&self, dist: &mut [f64], _context: &[usize], _values: Option<&[f32]>) {
        dist.iter_mut().for_each(|d| *d = self.log_uniform);
    }

    fn clone_box(&self) -> Box<dyn Prior> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_prior() {
        let mut prior = UniformPrior::new();
        let outcomes = vec!["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()];
        prior.set_labels(&outcomes, &[]);

        let mut dist = vec![7.0; 4];
        prior.log_prior(&mut dist, &[0, 1], None);
        for d in &dist {
            assert!((d - 0.25f64.ln()).abs() < 1e-12);
        }

        let boxed: Box<dyn Prior> = Box::new(prior);
        let cloned = boxed.clone();
        let mut other = vec![0.0; 4];
        cloned.log_prior(&mut other, &[], None);
        assert_eq!(dist, other);
    }
}
