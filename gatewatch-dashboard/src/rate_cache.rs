// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Rolling per-key history of cumulative counters
//!
//! The statistics table polls absolute "completed" totals per service every
//! few seconds. Keeping the last minute of totals lets us answer "how many
//! requests completed in the last minute" without a server-side rate.
//!
//! Counters are assumed monotonic. A reset (gateway restart) shows up as a
//! negative delta and is summed as-is.

use gatewatch_core::{CoreError, Result};
use std::collections::{HashMap, VecDeque};

/// Length of the rolling window in seconds
pub const RATE_WINDOW_SECS: u64 = 60;

/// Bounded FIFO history of cumulative counts, keyed by identity string
#[derive(Debug, Clone)]
pub struct RollingRateCache {
    capacity: usize,
    histories: HashMap<String, VecDeque<i64>>,
}

impl RollingRateCache {
    /// Cache for counters polled every `interval_secs` seconds.
    ///
    /// Each key keeps `60 / interval_secs + 1` entries, enough to span one
    /// window with both endpoints.
    pub fn new(interval_secs: u64) -> Result<Self> {
        if interval_secs == 0 {
            return Err(CoreError::InvalidInterval(interval_secs));
        }
        Ok(Self {
            capacity: (RATE_WINDOW_SECS / interval_secs) as usize + 1,
            histories: HashMap::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a cumulative count, dropping the oldest entry when full
    pub fn record(&mut self, key: &str, cumulative_count: i64) {
        let capacity = self.capacity;
        let history = self
            .histories
            .entry(key.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));

        if history.len() >= capacity {
            history.pop_front();
        }
        history.push_back(cumulative_count);
    }

    /// Sum of successive deltas across the retained history, 0 for unknown keys
    pub fn windowed_delta(&self, key: &str) -> i64 {
        match self.histories.get(key) {
            Some(history) if history.len() >= 2 => history
                .iter()
                .zip(history.iter().skip(1))
                .map(|(older, newer)| newer - older)
                .sum(),
            _ => 0,
        }
    }

    pub fn history(&self, key: &str) -> Option<&VecDeque<i64>> {
        self.histories.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.histories.contains_key(key)
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    pub fn remove(&mut self, key: &str) -> Option<VecDeque<i64>> {
        self.histories.remove(key)
    }

    /// Forget keys that no longer exist (e.g. deleted services)
    pub fn retain_keys<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.histories.retain(|key, _| keep(key));
    }

    pub fn clear(&mut self) {
        self.histories.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_from_interval() {
        assert_eq!(RollingRateCache::new(5).unwrap().capacity(), 13);
        assert_eq!(RollingRateCache::new(7).unwrap().capacity(), 9);
        assert_eq!(RollingRateCache::new(120).unwrap().capacity(), 1);
        assert!(matches!(
            RollingRateCache::new(0),
            Err(CoreError::InvalidInterval(0))
        ));
    }

    #[test]
    fn test_windowed_delta() {
        let mut cache = RollingRateCache::new(5).unwrap();
        for count in [10, 15, 22, 30] {
            cache.record("svcA", count);
        }
        assert_eq!(cache.windowed_delta("svcA"), 20);
    }

    #[test]
    fn test_single_entry_and_unknown_key() {
        let mut cache = RollingRateCache::new(5).unwrap();
        cache.record("svcA", 42);
        assert_eq!(cache.windowed_delta("svcA"), 0);
        assert_eq!(cache.windowed_delta("unknown-key"), 0);
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut cache = RollingRateCache::new(5).unwrap();
        for count in 0..20 {
            cache.record("svc", count * 10);
        }
        let history = cache.history("svc").unwrap();
        assert_eq!(history.len(), 13);
        assert_eq!(history.front(), Some(&70));
        assert_eq!(history.back(), Some(&190));
        assert_eq!(cache.windowed_delta("svc"), 120);
    }

    #[test]
    fn test_counter_reset_goes_negative() {
        let mut cache = RollingRateCache::new(5).unwrap();
        cache.record("svc", 500);
        cache.record("svc", 510);
        cache.record("svc", 3);
        assert_eq!(cache.windowed_delta("svc"), -497);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut cache = RollingRateCache::new(30).unwrap();
        cache.record("a", 1);
        cache.record("b", 100);
        cache.record("a", 4);
        cache.record("b", 150);
        assert_eq!(cache.windowed_delta("a"), 3);
        assert_eq!(cache.windowed_delta("b"), 50);

        cache.retain_keys(|k| k == "b");
        assert!(!cache.contains_key("a"));
        assert_eq!(cache.len(), 1);
    }
}
