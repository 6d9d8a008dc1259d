use std::collections::HashMap;

/// Occurrence count per key for one query dimension.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: HashMap<String, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, key: &str) {
        // Most keys repeat, so look up before allocating an owned key
        if let Some(count) = self.counts.get_mut(key) {
            *count += 1;
        } else {
            self.counts.insert(key.to_string(), 1);
        }
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(key, count)| (key.as_str(), *count))
    }

    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.counts.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Everything one scan produces; owned by the scan loop until ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// Lines that passed the line-type and subject filters.
    pub matched: u64,
    /// Matched lines too short to contribute keys.
    pub malformed: u64,
    pub primary: FrequencyTable,
    /// One table per related dimension, in plan order.
    pub related: Vec<FrequencyTable>,
}

impl Aggregation {
    pub fn new(related_tables: usize) -> Self {
        Self {
            matched: 0,
            malformed: 0,
            primary: FrequencyTable::new(),
            related: vec![FrequencyTable::new(); related_tables],
        }
    }

    pub fn record_malformed(&mut self) {
        self.matched += 1;
        self.malformed += 1;
    }
}
