use std::sync::Arc;

/// Sparse weight vector of a single predicate
///
/// `outcomes` lists the active outcome ids of the predicate in ascending order
/// and is shared between every table built over the same sparsity pattern.
/// Only `parameters` is ever mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    outcomes: Arc<[usize]>,
    parameters: Vec<f64>,
}

impl Context {
    /// Create a context from an outcome pattern and its parameters
    ///
    /// # Panics
    ///
    /// Panics if `outcomes` and `parameters` differ in length.
    pub fn new(outcomes: Arc<[usize]>, parameters: Vec<f64>) -> Self {
        assert_eq!(
            outcomes.len(),
            parameters.len(),
            "outcomes length ({}) must equal parameters length ({})",
            outcomes.len(),
            parameters.len()
        );
        Self {
            outcomes,
            parameters,
        }
    }

    /// Create a context whose parameters are all zero
    pub fn zeroed(outcomes: Arc<[usize]>) -> Self {
        let parameters = vec![0.0; outcomes.len()];
        Self {
            outcomes,
            parameters,
        }
    }

    /// Active outcome ids
    pub fn outcomes(&self) -> &[usize] {
        &self.outcomes
    }

    /// Shared handle to the outcome pattern
    pub fn pattern(&self) -> &Arc<[usize]> {
        &self.outcomes
    }

    /// Parameter of each active outcome, parallel to `outcomes()`
    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    /// Number of active outcomes
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Position of `outcome` in the active outcome list
    pub fn index_of(&self, outcome: usize) -> Option<usize> {
        self.outcomes.binary_search(&outcome).ok()
    }

    pub fn set_parameter(&mut self, index: usize, value: f64) {
        self.parameters[index] = value;
    }

    pub fn update_parameter(&mut self, index: usize, delta: f64) {
        self.parameters[index] += delta;
    }

    /// Add `other`'s parameters into this context
    ///
    /// Both contexts must share the same outcome pattern.
    pub fn accumulate(&mut self, other: &Context) {
        debug_assert_eq!(self.outcomes, other.outcomes);
        for (param, value) in self.parameters.iter_mut().zip(&other.parameters) {
            *param += value;
        }
    }

    /// Reset every parameter to zero
    pub fn clear(&mut self) {
        self.parameters.iter_mut().for_each(|p| *p = 0.0);
    }
}

/// Read-only view over a parameter table
#[derive(Debug, Clone, Copy)]
pub struct EvalParameters<'a> {
    params: &'a [Context],
    num_outcomes: usize,
}

impl<'a> EvalParameters<'a> {
    pub fn new(params: &'a [Context], num_outcomes: usize) -> Self {
        Self {
            params,
            num_outcomes,
        }
    }

    /// Context of each predicate id
    pub fn params(&self) -> &'a [Context] {
        self.params
    }

    pub fn num_outcomes(&self) -> usize {
        self.num_outcomes
    }
}

/// Outcome pattern covering every outcome
pub(crate) fn all_outcomes_pattern(num_outcomes: usize) -> Arc<[usize]> {
    (0..num_outcomes).collect::<Vec<_>>().into()
}
