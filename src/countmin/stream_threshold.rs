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

/// Count-Min sketch that surfaces every key whose estimate has reached a
/// fixed threshold.
///
/// Unlike [`HeavyHitters`](crate::countmin::HeavyHitters) the tracked map
/// is unbounded: any key crossing `threshold` enters it, and `remove` can
/// demote a key back out.
#[derive(Debug, Clone)]
pub struct StreamThreshold<H = Fnv1aHasher> {
    sketch: CountMinSketch<H>,
    tracked: HashMap<Vec<u8>, i32>,
    threshold: i32,
}

impl StreamThreshold {
    pub fn new(threshold: i32, width: u32, depth: u32) -> Result<Self, Error> {
        Self::with_sketch(threshold, CountMinSketch::new(width, depth)?)
    }

    /// Restores the underlying sketch from exported bytes. The tracked map
    /// is not part of the wire format and starts out empty.
    pub fn from_bytes(bytes: &[u8], threshold: i32) -> Result<Self, Error> {
        Self::with_sketch(threshold, CountMinSketch::from_bytes(bytes)?)
    }

    pub fn from_path(path: impl AsRef<Path>, threshold: i32) -> Result<Self, Error> {
        Self::with_sketch(threshold, CountMinSketch::from_path(path)?)
    }
}

impl<H: KeyHasher> StreamThreshold<H> {
    pub fn with_sketch(threshold: i32, sketch: CountMinSketch<H>) -> Result<Self, Error> {
        if threshold <= 0 {
            return Err(Error::invalid_argument("threshold must be positive"));
        }
        Ok(Self {
            sketch,
            tracked: HashMap::new(),
            threshold,
        })
    }

    /// Adds one occurrence; the key is tracked as soon as its estimate
    /// reaches the threshold. Returns the post-update estimate.
    pub fn add(&mut self, key: impl AsRef<[u8]>) -> i32 {
        self.add_count(key, 1)
    }

    pub fn add_count(&mut self, key: impl AsRef<[u8]>, count: i32) -> i32 {
        let key = key.as_ref();
        let estimate = self.sketch.add_count(key, count);
        if estimate >= self.threshold {
            self.tracked.insert(key.to_vec(), estimate);
        }
        estimate
    }

    /// Removes one occurrence; a tracked key falling below the threshold
    /// is untracked. Returns the post-update estimate.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> i32 {
        self.remove_count(key, 1)
    }

    pub fn remove_count(&mut self, key: impl AsRef<[u8]>, count: i32) -> i32 {
        let key = key.as_ref();
        let estimate = self.sketch.remove_count(key, count);
        if estimate < self.threshold {
            self.tracked.remove(key);
        } else if let Some(entry) = self.tracked.get_mut(key) {
            *entry = estimate;
        }
        estimate
    }

    pub fn query(&self, key: impl AsRef<[u8]>) -> i32 {
        self.sketch.query(key)
    }

    /// A copy of the keys currently at or above the threshold.
    pub fn tracked(&self) -> HashMap<Vec<u8>, i32> {
        self.tracked.clone()
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn elements_added(&self) -> i64 {
        self.sketch.elements_added()
    }

    pub fn sketch(&self) -> &CountMinSketch<H> {
        &self.sketch
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.sketch.to_bytes()
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.sketch.export(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn tracks_keys_crossing_threshold() {
        let mut st = StreamThreshold::new(3, 1000, 5).unwrap();
        st.add("k");
        st.add("k");
        assert!(st.tracked().is_empty());

        st.add("k");
        let tracked = st.tracked();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[b"k".as_slice()], 3);
    }

    #[test]
    fn tracked_value_follows_estimate() {
        let mut st = StreamThreshold::new(3, 1000, 5).unwrap();
        st.add_count("k", 10);
        assert_eq!(st.tracked()[b"k".as_slice()], 10);

        st.remove_count("k", 4);
        assert_eq!(st.tracked()[b"k".as_slice()], 6);
    }

    #[test]
    fn remove_untracks_below_threshold() {
        let mut st = StreamThreshold::new(3, 1000, 5).unwrap();
        st.add_count("k", 4);
        assert_eq!(st.tracked().len(), 1);

        st.remove_count("k", 2);
        assert!(st.tracked().is_empty());
        assert_eq!(st.query("k"), 2);
    }

    #[test]
    fn nonpositive_threshold_is_invalid() {
        assert_eq!(
            StreamThreshold::new(0, 1000, 5).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn round_trip_restores_sketch_with_empty_map() {
        let mut st = StreamThreshold::new(3, 1000, 5).unwrap();
        st.add_count("k", 9);

        let restored = StreamThreshold::from_bytes(&st.to_bytes(), 3).unwrap();
        assert_eq!(restored.query("k"), 9);
        assert!(restored.tracked().is_empty());
    }
}
