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

use std::path::Path;

use crate::bloom::BloomFilter;
use crate::bloom::filter::BloomParams;
use crate::codec::ByteReader;
use crate::codec::ByteWriter;
use crate::codec::read_file;
use crate::codec::write_file;
use crate::error::Error;
use crate::hash::Fnv1aHasher;
use crate::hash::KeyHasher;

/// A Bloom filter that grows instead of degrading.
///
/// Keys land in the newest (`active`) sub-filter; when its insertion count
/// reaches the estimated capacity a fresh sub-filter is appended and the
/// previous ones are frozen. Membership checks consult every sub-filter,
/// so the false-positive rate rises slowly with the number of expansions
/// while never developing false negatives.
#[derive(Debug, Clone)]
pub struct ExpandingBloomFilter<H = Fnv1aHasher> {
    filters: Vec<BloomFilter<H>>,
    params: BloomParams,
    hasher: H,
}

impl ExpandingBloomFilter {
    pub fn new(est_elements: u64, false_positive_rate: f32) -> Result<Self, Error> {
        Self::with_hasher(est_elements, false_positive_rate, Fnv1aHasher)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Self::from_bytes_with_hasher(bytes, Fnv1aHasher)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let bytes = read_file(path.as_ref())?;
        Self::from_bytes(&bytes)
    }
}

impl<H: KeyHasher + Clone> ExpandingBloomFilter<H> {
    pub fn with_hasher(
        est_elements: u64,
        false_positive_rate: f32,
        hasher: H,
    ) -> Result<Self, Error> {
        let params = BloomParams::new(est_elements, false_positive_rate)?;
        Ok(Self {
            filters: vec![BloomFilter::from_params(params, hasher.clone())],
            params,
            hasher,
        })
    }

    pub fn from_bytes_with_hasher(bytes: &[u8], hasher: H) -> Result<Self, Error> {
        let (params, filters) = read_sub_filters(bytes, hasher.clone())?;
        Ok(Self {
            filters,
            params,
            hasher,
        })
    }

    /// Inserts a key into the active sub-filter, appending a fresh one
    /// first if the active filter has reached its estimated capacity.
    /// Returns the total insertion count across all sub-filters.
    pub fn add(&mut self, key: impl AsRef<[u8]>) -> u64 {
        if self.active_is_full() {
            self.push();
        }
        let active = self
            .filters
            .last_mut()
            .expect("an expanding filter always holds at least one sub-filter");
        active.add(key);
        self.elements_added()
    }

    /// True iff any sub-filter reports the key.
    pub fn check(&self, key: impl AsRef<[u8]>) -> bool {
        let key = key.as_ref();
        self.filters.iter().any(|filter| filter.check(key))
    }

    /// Appends a fresh active sub-filter unconditionally.
    pub fn push(&mut self) {
        self.filters
            .push(BloomFilter::from_params(self.params, self.hasher.clone()));
    }

    /// Number of sub-filters currently held.
    pub fn expansions(&self) -> usize {
        self.filters.len()
    }

    /// Total keys inserted across all sub-filters.
    pub fn elements_added(&self) -> u64 {
        self.filters.iter().map(BloomFilter::elements_added).sum()
    }

    pub fn est_elements(&self) -> u64 {
        self.params.est_elements
    }

    pub fn false_positive_rate(&self) -> f32 {
        self.params.false_positive_rate
    }

    /// Concatenated standard sub-filter records plus a trailing sub-filter
    /// count (u64). Per-filter insertion counters travel with each record,
    /// so a reloaded filter keeps expanding where it left off.
    pub fn to_bytes(&self) -> Vec<u8> {
        write_sub_filters(&self.filters)
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        write_file(path.as_ref(), &self.to_bytes())
    }

    fn active_is_full(&self) -> bool {
        self.filters
            .last()
            .is_some_and(|active| active.elements_added() >= self.params.est_elements)
    }
}

pub(super) fn write_sub_filters<H: KeyHasher>(filters: &[BloomFilter<H>]) -> Vec<u8> {
    let mut writer = ByteWriter::with_capacity(filters.len() * 64 + 8);
    for filter in filters {
        writer.write(&filter.to_bytes());
    }
    writer.write_u64(filters.len() as u64);
    writer.into_bytes()
}

pub(super) fn read_sub_filters<H: KeyHasher + Clone>(
    bytes: &[u8],
    hasher: H,
) -> Result<(BloomParams, Vec<BloomFilter<H>>), Error> {
    if bytes.len() < 8 {
        return Err(Error::insufficient_data("sub-filter count"));
    }
    let payload_len = bytes.len() - 8;
    let mut reader = ByteReader::new(&bytes[payload_len..]);
    let count = reader
        .read_u64()
        .map_err(|_| Error::insufficient_data("sub-filter count"))?;

    if count == 0 {
        return Err(Error::persisted("sub-filter count is zero"));
    }
    if payload_len as u64 % count != 0 {
        return Err(Error::persisted(format!(
            "payload of {payload_len} bytes does not divide into {count} sub-filters"
        )));
    }

    let record_len = (payload_len as u64 / count) as usize;
    if record_len == 0 {
        return Err(Error::persisted("sub-filter records are empty"));
    }
    let mut filters = Vec::with_capacity(count as usize);
    for record in bytes[..payload_len].chunks_exact(record_len) {
        filters.push(BloomFilter::from_bytes_with_hasher(record, hasher.clone())?);
    }

    let params = filters[0].params;
    if filters.iter().any(|filter| filter.params != params) {
        return Err(Error::persisted("sub-filters disagree on parameters"));
    }
    Ok((params, filters))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_at_capacity() {
        let mut filter = ExpandingBloomFilter::new(5, 0.05).unwrap();
        assert_eq!(filter.expansions(), 1);

        for i in 0..5u32 {
            filter.add(format!("key-{i}"));
        }
        assert_eq!(filter.expansions(), 1);

        filter.add("key-5");
        assert_eq!(filter.expansions(), 2);
        assert_eq!(filter.elements_added(), 6);
    }

    #[test]
    fn frozen_filters_still_answer() {
        let mut filter = ExpandingBloomFilter::new(5, 0.05).unwrap();
        for i in 0..23u32 {
            filter.add(format!("key-{i}"));
        }
        assert!(filter.expansions() > 1);
        for i in 0..23u32 {
            assert!(filter.check(format!("key-{i}")), "lost key-{i}");
        }
    }

    #[test]
    fn push_is_explicit_expansion() {
        let mut filter = ExpandingBloomFilter::new(100, 0.05).unwrap();
        filter.push();
        assert_eq!(filter.expansions(), 2);
        assert_eq!(filter.elements_added(), 0);
    }

    #[test]
    fn round_trip_preserves_per_filter_counters() {
        let mut filter = ExpandingBloomFilter::new(5, 0.05).unwrap();
        for i in 0..8u32 {
            filter.add(format!("key-{i}"));
        }
        assert_eq!(filter.expansions(), 2);

        let restored = ExpandingBloomFilter::from_bytes(&filter.to_bytes()).unwrap();
        assert_eq!(restored.expansions(), 2);
        assert_eq!(restored.elements_added(), 8);
        assert_eq!(restored.to_bytes(), filter.to_bytes());

        // The restored active filter knows how full it is: filling it to
        // capacity and adding once more must trigger the next expansion,
        // exactly as it would have without the round trip.
        let mut restored = restored;
        restored.add("key-8");
        restored.add("key-9");
        assert_eq!(restored.expansions(), 2);
        restored.add("key-10");
        assert_eq!(restored.expansions(), 3);
    }

    #[test]
    fn zero_count_record_is_rejected() {
        let bytes = 0u64.to_le_bytes().to_vec();
        assert!(ExpandingBloomFilter::from_bytes(&bytes).is_err());
    }
}
