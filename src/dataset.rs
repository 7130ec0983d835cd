use std::io;

/// A compacted, deduplicated set of training events
///
/// Events are stored as parallel tables indexed by unique event id. Predicate
/// and outcome ids are dense indices into `pred_labels` and `outcome_labels`.
#[derive(Debug, Clone, Default)]
pub struct DataIndex {
    /// Predicate ids active in each unique event
    contexts: Vec<Vec<usize>>,
    /// Optional predicate values of each unique event
    values: Vec<Option<Vec<f32>>>,
    /// Outcome id of each unique event
    outcome_list: Vec<usize>,
    /// Multiplicity of each unique event after deduplication
    num_times_seen: Vec<u32>,
    /// Predicate labels
    pred_labels: Vec<String>,
    /// Outcome labels
    outcome_labels: Vec<String>,
    /// Weighted number of occurrences of each predicate
    pred_counts: Vec<u32>,
    /// Total number of events, counting multiplicities
    num_events: u64,
}

impl DataIndex {
    /// Create an empty index over the given label tables
    pub fn new(pred_labels: Vec<String>, outcome_labels: Vec<String>) -> Self {
        let num_preds = pred_labels.len();
        Self {
            pred_labels,
            outcome_labels,
            pred_counts: vec![0; num_preds],
            ..Default::default()
        }
    }

    /// Append a unique event
    pub fn push_event(
        &mut self,
        context: Vec<usize>,
        values: Option<Vec<f32>>,
        outcome: usize,
        times_seen: u32,
    ) -> io::Result<()> {
        if times_seen == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "event multiplicity must be at least 1",
            ));
        }
        if outcome >= self.outcome_labels.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("outcome id {} out of range", outcome),
            ));
        }
        if let Some(&pid) = context.iter().find(|&&pid| pid >= self.pred_labels.len()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("predicate id {} out of range", pid),
            ));
        }
        if let Some(values) = &values {
            if values.len() != context.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "context and values must have the same length",
                ));
            }
        }

        for &pid in &context {
            self.pred_counts[pid] += times_seen;
        }
        self.contexts.push(context);
        self.values.push(values);
        self.outcome_list.push(outcome);
        self.num_times_seen.push(times_seen);
        self.num_events += u64::from(times_seen);
        Ok(())
    }

    /// Number of unique events
    pub fn num_unique_events(&self) -> usize {
        self.contexts.len()
    }

    /// Number of events, counting each unique event by its multiplicity
    pub fn num_events(&self) -> u64 {
        self.num_events
    }

    pub fn num_preds(&self) -> usize {
        self.pred_labels.len()
    }

    pub fn num_outcomes(&self) -> usize {
        self.outcome_labels.len()
    }

    pub fn contexts(&self) -> &[Vec<usize>] {
        &self.contexts
    }

    /// Predicate ids of unique event `index`
    pub fn context(&self, index: usize) -> &[usize] {
        &self.contexts[index]
    }

    /// Predicate values of unique event `index`, `None` means all `1.0`
    pub fn values(&self, index: usize) -> Option<&[f32]> {
        self.values[index].as_deref()
    }

    /// Returns `true` if any event carries real values
    pub fn has_values(&self) -> bool {
        self.values.iter().any(Option::is_some)
    }

    pub fn outcome_list(&self) -> &[usize] {
        &self.outcome_list
    }

    pub fn num_times_seen(&self) -> &[u32] {
        &self.num_times_seen
    }

    pub fn pred_labels(&self) -> &[String] {
        &self.pred_labels
    }

    pub fn outcome_labels(&self) -> &[String] {
        &self.outcome_labels
    }

    pub fn pred_counts(&self) -> &[u32] {
        &self.pred_counts
    }
}
