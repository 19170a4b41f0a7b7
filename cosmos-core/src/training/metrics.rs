//! Per-epoch metric values.

/// Named scalar metrics reported for one epoch, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpochMetrics {
    entries: Vec<(String, f64)>,
}

impl EpochMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a metric. Re-inserting a name replaces its value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for EpochMetrics {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut metrics = Self::new();
        for (name, value) in iter {
            metrics.insert(name, value);
        }
        metrics
    }
}

/// One row of the metric log.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    /// 1-based row index, never supplied by the caller.
    pub epoch: u64,
    /// Unix timestamp (seconds) of the append.
    pub time: i64,
    /// Metrics present in this row. Absent names are empty cells.
    pub metrics: EpochMetrics,
}
