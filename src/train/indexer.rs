use std::cmp::Ordering;
use std::collections::HashMap;
use std::io;

use tracing::{debug, info};

use super::dictionary::Dictionary;
use crate::dataset::DataIndex;
use crate::event::Event;

/// Event after predicate and outcome ids have been assigned
#[derive(Debug, Clone)]
struct IndexedEvent {
    outcome: usize,
    preds: Vec<usize>,
    values: Option<Vec<f32>>,
    seen: u32,
}

impl IndexedEvent {
    fn compare(&self, other: &Self) -> Ordering {
        self.outcome
            .cmp(&other.outcome)
            .then_with(|| self.preds.cmp(&other.preds))
            .then_with(|| match (&self.values, &other.values) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| x.total_cmp(y))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or_else(|| a.len().cmp(&b.len())),
            })
    }
}

/// One-pass in-memory indexer turning events into a [`DataIndex`]
///
/// Predicates occurring fewer than `cutoff` times are removed, and events left
/// without any predicate are dropped. Predicate ids follow the sorted order of
/// their labels; outcome ids follow first appearance in the stream.
#[derive(Debug, Clone)]
pub struct DataIndexer {
    cutoff: u32,
    sort_and_merge: bool,
}

impl DataIndexer {
    pub fn new(cutoff: u32, sort_and_merge: bool) -> Self {
        Self {
            cutoff,
            sort_and_merge,
        }
    }

    pub fn cutoff(&self) -> u32 {
        self.cutoff
    }

    pub fn sort_and_merge(&self) -> bool {
        self.sort_and_merge
    }

    /// Index a batch of events
    pub fn index(&self, events: &[Event]) -> io::Result<DataIndex> {
        info!(cutoff = self.cutoff, "indexing events");

        if let Some(event) = events
            .iter()
            .find(|e| e.values.as_ref().map_or(false, |v| v.len() != e.context.len()))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "event with outcome {} has {} predicates but {} values",
                    event.outcome,
                    event.context.len(),
                    event.values.as_ref().map_or(0, Vec::len)
                ),
            ));
        }

        // Count predicate occurrences
        let mut counter: HashMap<&str, u32> = HashMap::new();
        for event in events {
            for pred in &event.context {
                *counter.entry(pred.as_str()).or_insert(0) += 1;
            }
        }
        let mut kept: Vec<&str> = counter
            .iter()
            .filter(|(_, &count)| count >= self.cutoff)
            .map(|(&pred, _)| pred)
            .collect();
        kept.sort_unstable();
        let preds = Dictionary::from_labels(&kept);

        let mut outcomes = Dictionary::new();
        let mut indexed = Vec::with_capacity(events.len());
        for event in events {
            let outcome = outcomes.get_or_insert(&event.outcome);
            let mut pred_ids = Vec::with_capacity(event.context.len());
            let mut values = event.values.as_ref().map(|_| Vec::with_capacity(event.context.len()));
            for (i, pred) in event.context.iter().enumerate() {
                if let Some(pid) = preds.get(pred) {
                    pred_ids.push(pid);
                    if let Some(values) = values.as_mut() {
                        values.push(event.value(i));
                    }
                }
            }
            if pred_ids.is_empty() {
                debug!(outcome = %event.outcome, "dropped event without predicates above cutoff");
                continue;
            }
            indexed.push(IndexedEvent {
                outcome,
                preds: pred_ids,
                values,
                seen: 1,
            });
        }

        let unique = if self.sort_and_merge {
            Self::merge(indexed)
        } else {
            indexed
        };

        let mut index = DataIndex::new(preds.into_labels(), outcomes.into_labels());
        for event in unique {
            index.push_event(event.preds, event.values, event.outcome, event.seen)?;
        }

        info!(
            events = events.len(),
            unique_events = index.num_unique_events(),
            predicates = index.num_preds(),
            outcomes = index.num_outcomes(),
            "done indexing"
        );
        Ok(index)
    }

    /// Sort events and collapse identical neighbours into multiplicities
    fn merge(mut events: Vec<IndexedEvent>) -> Vec<IndexedEvent> {
        events.sort_by(IndexedEvent::compare);
        let mut merged: Vec<IndexedEvent> = Vec::with_capacity(events.len());
        for event in events {
            match merged.last_mut() {
                Some(last) if last.compare(&event) == Ordering::Equal => last.seen += event.seen,
                _ => merged.push(event),
            }
        }
        merged
    }
}

impl Default for DataIndexer {
    fn default() -> Self {
        Self::new(0, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> Vec<Event> {
        vec![
            Event::new("A", ["dog", "cat", "mouse"]),
            Event::new("B", ["text", "print", "mouse"]),
            Event::new("A", ["dog", "cat", "mouse"]),
            Event::new("C", ["rare"]),
        ]
    }

    #[test]
    fn test_index_merges_duplicates() {
        let index = DataIndexer::new(1, true).index(&events()).unwrap();
        assert_eq!(index.num_unique_events(), 3);
        assert_eq!(index.num_events(), 4);
        assert_eq!(index.outcome_labels(), &["A", "B", "C"]);
        assert_eq!(
            index.pred_labels(),
            &["cat", "dog", "mouse", "print", "rare", "text"]
        );
        let seen: u32 = index.num_times_seen().iter().sum();
        assert_eq!(seen, 4);
        assert!(index.num_times_seen().contains(&2));
    }

    #[test]
    fn test_index_without_merge_keeps_order() {
        let index = DataIndexer::new(0, false).index(&events()).unwrap();
        assert_eq!(index.num_unique_events(), 4);
        assert_eq!(index.outcome_list(), &[0, 1, 0, 2]);
        assert!(index.num_times_seen().iter().all(|&n| n == 1));
    }

    #[test]
    fn test_cutoff_drops_events() {
        let index = DataIndexer::new(2, true).index(&events()).unwrap();
        // "rare" and the single-occurrence predicates fall below the cutoff
        assert_eq!(index.pred_labels(), &["cat", "dog", "mouse"]);
        assert_eq!(index.num_events(), 3);
        // Outcome of the dropped event keeps its id
        assert_eq!(index.outcome_labels(), &["A", "B", "C"]);
        assert_eq!(index.pred_counts(), &[2, 2, 3]);
    }

    #[test]
    fn test_values_follow_kept_predicates() {
        let events = vec![
            Event::with_values("A", ["x", "y"], vec![0.5, 2.0]).unwrap(),
            Event::with_values("A", ["y"], vec![3.0]).unwrap(),
        ];
        let index = DataIndexer::new(2, false).index(&events).unwrap();
        assert_eq!(index.pred_labels(), &["y"]);
        assert_eq!(index.values(0), Some(&[2.0f32][..]));
        assert_eq!(index.values(1), Some(&[3.0f32][..]));
    }

    #[test]
    fn test_distinct_values_not_merged() {
        let events = vec![
            Event::with_values("A", ["x"], vec![0.5]).unwrap(),
            Event::with_values("A", ["x"], vec![1.5]).unwrap(),
            Event::with_values("A", ["x"], vec![0.5]).unwrap(),
        ];
        let index = DataIndexer::default().index(&events).unwrap();
        assert_eq!(index.num_unique_events(), 2);
        assert_eq!(index.num_times_seen(), &[2, 1]);
    }
}
