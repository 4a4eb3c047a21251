// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::collections::VecDeque;
use std::path::Path;

use crate::bloom::BloomFilter;
use crate::bloom::expanding::read_sub_filters;
use crate::bloom::expanding::write_sub_filters;
use crate::bloom::filter::BloomParams;
use crate::codec::read_file;
use crate::codec::write_file;
use crate::error::Error;
use crate::hash::Fnv1aHasher;
use crate::hash::KeyHasher;

/// A bounded ring of Bloom sub-filters with age-based eviction.
///
/// New keys land in the newest sub-filter; when it saturates the ring
/// rotates: a fresh filter is appended and, once the ring exceeds
/// `max_queue`, the oldest is dropped — taking its keys' memory with it.
/// Useful for "seen recently" membership where old entries should expire.
#[derive(Debug, Clone)]
pub struct RotatingBloomFilter<H = Fnv1aHasher> {
    filters: VecDeque<BloomFilter<H>>,
    params: BloomParams,
    max_queue: usize,
    hasher: H,
}

impl RotatingBloomFilter {
    pub fn new(
        est_elements: u64,
        false_positive_rate: f32,
        max_queue: usize,
    ) -> Result<Self, Error> {
        Self::with_hasher(est_elements, false_positive_rate, max_queue, Fnv1aHasher)
    }

    /// Restores a ring from exported bytes. `max_queue` is not part of the
    /// wire format and must be supplied again.
    pub fn from_bytes(bytes: &[u8], max_queue: usize) -> Result<Self, Error> {
        Self::from_bytes_with_hasher(bytes, max_queue, Fnv1aHasher)
    }

    pub fn from_path(path: impl AsRef<Path>, max_queue: usize) -> Result<Self, Error> {
        let bytes = read_file(path.as_ref())?;
        Self::from_bytes(&bytes, max_queue)
    }
}

impl<H: KeyHasher + Clone> RotatingBloomFilter<H> {
    pub fn with_hasher(
        est_elements: u64,
        false_positive_rate: f32,
        max_queue: usize,
        hasher: H,
    ) -> Result<Self, Error> {
        if max_queue == 0 {
            return Err(Error::invalid_argument("max_queue must be at least 1"));
        }
        let params = BloomParams::new(est_elements, false_positive_rate)?;
        let mut filters = VecDeque::with_capacity(max_queue);
        filters.push_back(BloomFilter::from_params(params, hasher.clone()));
        Ok(Self {
            filters,
            params,
            max_queue,
            hasher,
        })
    }

    pub fn from_bytes_with_hasher(
        bytes: &[u8],
        max_queue: usize,
        hasher: H,
    ) -> Result<Self, Error> {
        if max_queue == 0 {
            return Err(Error::invalid_argument("max_queue must be at least 1"));
        }
        let (params, filters) = read_sub_filters(bytes, hasher.clone())?;
        if filters.len() > max_queue {
            return Err(Error::invalid_argument(format!(
                "file holds {} sub-filters but max_queue is {max_queue}",
                filters.len()
            )));
        }
        Ok(Self {
            filters: filters.into(),
            params,
            max_queue,
            hasher,
        })
    }

    /// Inserts a key, rotating first if the newest sub-filter is at its
    /// estimated capacity. Returns the live insertion count (keys held by
    /// the current ring).
    pub fn add(&mut self, key: impl AsRef<[u8]>) -> u64 {
        if self.active_is_full() {
            self.rotate();
        }
        let active = self
            .filters
            .back_mut()
            .expect("a rotating filter always holds at least one sub-filter");
        active.add(key);
        self.elements_added()
    }

    /// True iff any live sub-filter reports the key.
    pub fn check(&self, key: impl AsRef<[u8]>) -> bool {
        let key = key.as_ref();
        self.filters.iter().any(|filter| filter.check(key))
    }

    /// Appends a fresh active sub-filter and drops the oldest once the
    /// ring runs past `max_queue`.
    pub fn rotate(&mut self) {
        self.push();
        if self.filters.len() > self.max_queue {
            let _ = self.filters.pop_front();
        }
    }

    /// Appends a fresh active sub-filter without evicting.
    pub fn push(&mut self) {
        self.filters
            .push_back(BloomFilter::from_params(self.params, self.hasher.clone()));
    }

    /// Drops the oldest sub-filter. The ring never empties.
    pub fn pop(&mut self) -> Result<(), Error> {
        if self.filters.len() == 1 {
            return Err(Error::invalid_argument(
                "cannot pop the only remaining sub-filter",
            ));
        }
        let _ = self.filters.pop_front();
        Ok(())
    }

    pub fn current_queue_size(&self) -> usize {
        self.filters.len()
    }

    pub fn max_queue(&self) -> usize {
        self.max_queue
    }

    /// Keys held by the current ring (evicted sub-filters no longer
    /// count).
    pub fn elements_added(&self) -> u64 {
        self.filters.iter().map(BloomFilter::elements_added).sum()
    }

    pub fn est_elements(&self) -> u64 {
        self.params.est_elements
    }

    pub fn false_positive_rate(&self) -> f32 {
        self.params.false_positive_rate
    }

    /// Same wire format as the expanding filter: sub-filter records plus a
    /// trailing count.
    pub fn to_bytes(&self) -> Vec<u8> {
        let filters: Vec<_> = self.filters.iter().cloned().collect();
        write_sub_filters(&filters)
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        write_file(path.as_ref(), &self.to_bytes())
    }

    fn active_is_full(&self) -> bool {
        self.filters
            .back()
            .is_some_and(|active| active.elements_added() >= self.params.est_elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_and_evicts_oldest() {
        let mut filter = RotatingBloomFilter::new(10, 0.01, 2).unwrap();
        for i in 0..10u32 {
            filter.add(format!("old-{i}"));
        }
        assert!(filter.check("old-0"));

        // Second generation: ring grows to its bound.
        for i in 0..10u32 {
            filter.add(format!("mid-{i}"));
        }
        assert_eq!(filter.current_queue_size(), 2);
        assert!(filter.check("old-0"));

        // Third generation: the first falls off the ring.
        filter.add("new-0");
        assert_eq!(filter.current_queue_size(), 2);
        assert!(!filter.check("old-0"));
        assert!(filter.check("mid-0"));
        assert!(filter.check("new-0"));
    }

    #[test]
    fn explicit_push_and_pop() {
        let mut filter = RotatingBloomFilter::new(10, 0.01, 3).unwrap();
        filter.add("keep");
        filter.push();
        assert_eq!(filter.current_queue_size(), 2);

        filter.pop().unwrap();
        assert_eq!(filter.current_queue_size(), 1);
        assert!(!filter.check("keep"));

        assert!(filter.pop().is_err());
    }

    #[test]
    fn elements_added_reflects_live_ring_only() {
        let mut filter = RotatingBloomFilter::new(5, 0.01, 2).unwrap();
        for i in 0..11u32 {
            filter.add(format!("key-{i}"));
        }
        // Ring holds generations two and three: 5 + 1 keys.
        assert_eq!(filter.current_queue_size(), 2);
        assert_eq!(filter.elements_added(), 6);
    }

    #[test]
    fn round_trip_preserves_rotation_state() {
        let mut filter = RotatingBloomFilter::new(5, 0.01, 3).unwrap();
        for i in 0..12u32 {
            filter.add(format!("key-{i}"));
        }

        let restored = RotatingBloomFilter::from_bytes(&filter.to_bytes(), 3).unwrap();
        assert_eq!(restored.current_queue_size(), filter.current_queue_size());
        assert_eq!(restored.elements_added(), filter.elements_added());
        assert_eq!(restored.to_bytes(), filter.to_bytes());

        // Restored counters keep driving rotation.
        let mut restored = restored;
        for i in 12..16u32 {
            restored.add(format!("key-{i}"));
        }
        assert!(!restored.check("key-0"));
    }

    #[test]
    fn load_rejects_oversized_ring() {
        let mut filter = RotatingBloomFilter::new(5, 0.01, 3).unwrap();
        for i in 0..12u32 {
            filter.add(format!("key-{i}"));
        }
        assert_eq!(filter.current_queue_size(), 3);
        assert!(RotatingBloomFilter::from_bytes(&filter.to_bytes(), 2).is_err());
    }
}
