use std::io;

/// A single labeled training example
///
/// An event pairs an outcome with the predicates active in its context.
/// Predicates may optionally carry real values; without values every
/// predicate counts as `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Outcome label
    pub outcome: String,
    /// Active predicate labels, in order
    pub context: Vec<String>,
    /// Optional value per predicate, parallel to `context`
    pub values: Option<Vec<f32>>,
}

impl Event {
    /// Create an event whose predicates all have the implicit value `1.0`
    pub fn new<O, I, S>(outcome: O, context: I) -> Self
    where
        O: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outcome: outcome.into(),
            context: context.into_iter().map(Into::into).collect(),
            values: None,
        }
    }

    /// Create an event with a real value for every predicate
    pub fn with_values<O, I, S>(outcome: O, context: I, values: Vec<f32>) -> io::Result<Self>
    where
        O: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut event = Self::new(outcome, context);
        if event.context.len() != values.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "context and values must have the same length",
            ));
        }
        event.values = Some(values);
        Ok(event)
    }

    /// Value of the predicate at `index`, `1.0` when the event has no values
    pub fn value(&self, index: usize) -> f32 {
        self.values.as_ref().map_or(1.0, |values| values[index])
    }
}

impl<O: Into<String>> From<(O, &[&str])> for Event {
    fn from((outcome, context): (O, &[&str])) -> Self {
        Self::new(outcome, context.iter().copied())
    }
}
