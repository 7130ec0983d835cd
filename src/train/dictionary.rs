use std::collections::HashMap;

/// Label table assigning dense ids in insertion order
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    ids: HashMap<String, usize>,
    labels: Vec<String>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dictionary from labels, keeping their order
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dict = Self::new();
        for label in labels {
            dict.get_or_insert(label.as_ref());
        }
        dict
    }

    /// Id of `label`, inserting it at the end if unseen
    pub fn get_or_insert(&mut self, label: &str) -> usize {
        if let Some(&id) = self.ids.get(label) {
            return id;
        }
        let id = self.labels.len();
        self.ids.insert(label.to_string(), id);
        self.labels.push(label.to_string());
        id
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    /// Labels ordered by id
    pub fn into_labels(self) -> Vec<String> {
        self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_basic() {
        let mut dict = Dictionary::new();
        assert_eq!(dict.get_or_insert("B"), 0);
        assert_eq!(dict.get_or_insert("A"), 1);
        assert_eq!(dict.get_or_insert("B"), 0);
        assert_eq!(dict.get("A"), Some(1));
        assert_eq!(dict.get("C"), None);
        assert_eq!(dict.into_labels(), vec!["B", "A"]);
    }

    #[test]
    fn test_dictionary_from_labels() {
        let dict = Dictionary::from_labels(["x", "y", "x"]);
        assert_eq!(dict.get("y"), Some(1));
        assert_eq!(dict.into_labels(), vec!["x", "y"]);
    }
}
