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

use std::collections::HashMap;
use std::path::Path;

use crate::countmin::CountMinSketch;
use crate::error::Error;
use crate::hash::Fnv1aHasher;
use crate::hash::KeyHasher;

/// Count-Min sketch that tracks the top-K keys seen so far.
///
/// Alongside the sketch it keeps a bounded map of the `num_hitters`
/// largest estimates. A new key displaces the current smallest entry only
/// when its estimate is strictly larger, so the map stabilizes on the
/// stream's heavy hitters (approximately — sketch noise can promote a
/// colliding key).
#[derive(Debug, Clone)]
pub struct HeavyHitters<H = Fnv1aHasher> {
    sketch: CountMinSketch<H>,
    heavy: HashMap<Vec<u8>, i32>,
    num_hitters: usize,
}

impl HeavyHitters {
    pub fn new(num_hitters: usize, width: u32, depth: u32) -> Result<Self, Error> {
        Self::with_sketch(num_hitters, CountMinSketch::new(width, depth)?)
    }

    /// Restores the underlying sketch from exported bytes. The heavy map
    /// is not part of the wire format and starts out empty.
    pub fn from_bytes(bytes: &[u8], num_hitters: usize) -> Result<Self, Error> {
        Self::with_sketch(num_hitters, CountMinSketch::from_bytes(bytes)?)
    }

    pub fn from_path(path: impl AsRef<Path>, num_hitters: usize) -> Result<Self, Error> {
        Self::with_sketch(num_hitters, CountMinSketch::from_path(path)?)
    }
}

impl<H: KeyHasher> HeavyHitters<H> {
    /// Wraps an existing sketch (useful for a non-default hash family).
    pub fn with_sketch(num_hitters: usize, sketch: CountMinSketch<H>) -> Result<Self, Error> {
        if num_hitters == 0 {
            return Err(Error::invalid_argument("num_hitters must be at least 1"));
        }
        Ok(Self {
            sketch,
            heavy: HashMap::with_capacity(num_hitters),
            num_hitters,
        })
    }

    /// Adds one occurrence and reconsiders the key for the heavy map.
    /// Returns the post-update estimate.
    pub fn add(&mut self, key: impl AsRef<[u8]>) -> i32 {
        self.add_count(key, 1)
    }

    pub fn add_count(&mut self, key: impl AsRef<[u8]>, count: i32) -> i32 {
        let key = key.as_ref();
        let estimate = self.sketch.add_count(key, count);

        if let Some(entry) = self.heavy.get_mut(key) {
            *entry = estimate;
        } else if self.heavy.len() < self.num_hitters {
            self.heavy.insert(key.to_vec(), estimate);
        } else if let Some((weakest, weakest_estimate)) = self.weakest_entry() {
            if estimate > weakest_estimate {
                self.heavy.remove(&weakest);
                self.heavy.insert(key.to_vec(), estimate);
            }
        }
        estimate
    }

    /// Removal would leave the heavy map unrepairable (an evicted key's
    /// history is gone), so it is not supported.
    pub fn remove(&mut self, _key: impl AsRef<[u8]>) -> Result<i32, Error> {
        Err(Error::not_supported(
            "cannot remove elements from a heavy-hitters sketch",
        ))
    }

    /// Current estimate for a key, heavy or not.
    pub fn query(&self, key: impl AsRef<[u8]>) -> i32 {
        self.sketch.query(key)
    }

    /// A copy of the current top-K map.
    pub fn heavy_hitters(&self) -> HashMap<Vec<u8>, i32> {
        self.heavy.clone()
    }

    pub fn num_hitters(&self) -> usize {
        self.num_hitters
    }

    pub fn elements_added(&self) -> i64 {
        self.sketch.elements_added()
    }

    /// The underlying sketch.
    pub fn sketch(&self) -> &CountMinSketch<H> {
        &self.sketch
    }

    /// Persists the underlying sketch (the heavy map is recomputed by
    /// future streams, not stored).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.sketch.to_bytes()
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.sketch.export(path)
    }

    fn weakest_entry(&self) -> Option<(Vec<u8>, i32)> {
        self.heavy
            .iter()
            .min_by_key(|&(_, &estimate)| estimate)
            .map(|(key, &estimate)| (key.clone(), estimate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn tracks_top_k_with_eviction() {
        let mut hh = HeavyHitters::new(2, 1000, 5).unwrap();
        for _ in 0..10 {
            hh.add("A");
        }
        for _ in 0..20 {
            hh.add("B");
        }
        for _ in 0..5 {
            hh.add("C");
        }

        // A and B filled the map; C is too small to displace anything.
        let heavy = hh.heavy_hitters();
        assert_eq!(heavy.len(), 2);
        assert_eq!(heavy[b"A".as_slice()], 10);
        assert_eq!(heavy[b"B".as_slice()], 20);

        // Ten more Cs: its 15th insert pushes it past A.
        for _ in 0..10 {
            hh.add("C");
        }
        let heavy = hh.heavy_hitters();
        assert_eq!(heavy.len(), 2);
        assert!(!heavy.contains_key(b"A".as_slice()));
        assert_eq!(heavy[b"B".as_slice()], 20);
        assert_eq!(heavy[b"C".as_slice()], 15);
    }

    #[test]
    fn map_never_exceeds_bound() {
        let mut hh = HeavyHitters::new(3, 1000, 5).unwrap();
        for i in 0..50u32 {
            hh.add(format!("key-{i}"));
            assert!(hh.heavy_hitters().len() <= 3);
        }
    }

    #[test]
    fn equal_estimate_does_not_evict() {
        let mut hh = HeavyHitters::new(1, 1000, 5).unwrap();
        hh.add("first");
        hh.add("second");
        // "second" only ties the weakest entry, so "first" stays.
        let heavy = hh.heavy_hitters();
        assert_eq!(heavy.len(), 1);
        assert!(heavy.contains_key(b"first".as_slice()));
    }

    #[test]
    fn remove_is_not_supported() {
        let mut hh = HeavyHitters::new(2, 1000, 5).unwrap();
        hh.add("A");
        assert_eq!(
            hh.remove("A").unwrap_err().kind(),
            ErrorKind::NotSupported
        );
        assert_eq!(hh.query("A"), 1);
    }

    #[test]
    fn zero_hitters_is_invalid() {
        assert_eq!(
            HeavyHitters::new(0, 1000, 5).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn round_trip_restores_sketch_with_empty_map() {
        let mut hh = HeavyHitters::new(2, 1000, 5).unwrap();
        for _ in 0..7 {
            hh.add("A");
        }

        let restored = HeavyHitters::from_bytes(&hh.to_bytes(), 2).unwrap();
        assert_eq!(restored.query("A"), 7);
        assert!(restored.heavy_hitters().is_empty());
    }
}
