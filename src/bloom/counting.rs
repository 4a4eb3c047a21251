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

use crate::bloom::filter::BloomParams;
use crate::bloom::serialization::FOOTER_BYTES;
use crate::bloom::serialization::read_footer;
use crate::bloom::serialization::write_footer;
use crate::codec::ByteReader;
use crate::codec::ByteWriter;
use crate::codec::read_file;
use crate::codec::write_file;
use crate::error::Error;
use crate::hash::Fnv1aHasher;
use crate::hash::KeyHasher;

/// Bloom filter over 32-bit counters instead of bits, which buys `remove`.
///
/// Sizing follows the classical Bloom formulas; each of the `m` cells is a
/// saturating `u32`. A key's estimated multiplicity is the minimum counter
/// across its `k` positions.
#[derive(Debug, Clone)]
pub struct CountingBloomFilter<H = Fnv1aHasher> {
    params: BloomParams,
    counts: Vec<u32>,
    elements_added: u64,
    hasher: H,
}

impl CountingBloomFilter {
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

impl<H: KeyHasher> CountingBloomFilter<H> {
    pub fn with_hasher(
        est_elements: u64,
        false_positive_rate: f32,
        hasher: H,
    ) -> Result<Self, Error> {
        let params = BloomParams::new(est_elements, false_positive_rate)?;
        Ok(Self {
            counts: vec![0u32; params.num_bits as usize],
            elements_added: 0,
            params,
            hasher,
        })
    }

    pub fn from_bytes_with_hasher(bytes: &[u8], hasher: H) -> Result<Self, Error> {
        let (params, elements_added) = read_footer(bytes)?;
        let expected = params.num_bits as usize * 4 + FOOTER_BYTES;
        if bytes.len() != expected {
            return Err(Error::size_mismatch(expected, bytes.len()));
        }

        let mut reader = ByteReader::new(bytes);
        let mut counts = Vec::with_capacity(params.num_bits as usize);
        for _ in 0..params.num_bits {
            let count = reader
                .read_u32()
                .map_err(|_| Error::insufficient_data("counter array"))?;
            counts.push(count);
        }

        Ok(Self {
            counts,
            elements_added,
            params,
            hasher,
        })
    }

    /// Increments the key's `k` counters (saturating) and returns the
    /// minimum counter after the increment.
    pub fn add(&mut self, key: impl AsRef<[u8]>) -> u32 {
        let hashes = self.hash(key.as_ref());
        self.add_hashes(&hashes)
    }

    pub fn add_hashes(&mut self, hashes: &[u64]) -> u32 {
        for index in self.positions(hashes) {
            self.counts[index] = self.counts[index].saturating_add(1);
        }
        self.elements_added += 1;
        self.min_count(hashes)
    }

    /// Decrements the key's counters (floored at zero) and returns the
    /// minimum counter after the decrement.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> u32 {
        let hashes = self.hash(key.as_ref());
        self.remove_hashes(&hashes)
    }

    pub fn remove_hashes(&mut self, hashes: &[u64]) -> u32 {
        for index in self.positions(hashes) {
            self.counts[index] = self.counts[index].saturating_sub(1);
        }
        self.elements_added = self.elements_added.saturating_sub(1);
        self.min_count(hashes)
    }

    /// Estimated multiplicity: the minimum counter across the key's
    /// positions. Zero means definitely absent.
    pub fn check(&self, key: impl AsRef<[u8]>) -> u32 {
        let hashes = self.hash(key.as_ref());
        self.check_hashes(&hashes)
    }

    pub fn check_hashes(&self, hashes: &[u64]) -> u32 {
        self.min_count(hashes)
    }

    pub fn hash(&self, key: &[u8]) -> Vec<u64> {
        self.hasher.hash_many(key, self.params.num_hashes as usize)
    }

    /// Cell-wise saturating sum of two shape-compatible filters.
    pub fn union(&self, other: &Self) -> Result<Self, Error>
    where
        H: Clone,
    {
        self.params.check_compatible(&other.params, "union")?;
        let counts = self
            .counts
            .iter()
            .zip(&other.counts)
            .map(|(a, b)| a.saturating_add(*b))
            .collect();
        Ok(Self {
            params: self.params,
            counts,
            elements_added: (self.elements_added + other.elements_added)
                .min(self.params.est_elements),
            hasher: self.hasher.clone(),
        })
    }

    /// Cell-wise minimum of two shape-compatible filters.
    pub fn intersection(&self, other: &Self) -> Result<Self, Error>
    where
        H: Clone,
    {
        self.params.check_compatible(&other.params, "intersection")?;
        let counts = self
            .counts
            .iter()
            .zip(&other.counts)
            .map(|(a, b)| *a.min(b))
            .collect();
        Ok(Self {
            params: self.params,
            counts,
            elements_added: self.elements_added.min(other.elements_added),
            hasher: self.hasher.clone(),
        })
    }

    /// Bloom estimator applied over the nonzero-cell count.
    pub fn estimate_elements(&self) -> u64 {
        let nonzero = self.counts.iter().filter(|&&c| c > 0).count() as u64;
        self.params.estimate_elements(nonzero, self.elements_added)
    }

    pub fn elements_added(&self) -> u64 {
        self.elements_added
    }

    pub fn est_elements(&self) -> u64 {
        self.params.est_elements
    }

    pub fn false_positive_rate(&self) -> f32 {
        self.params.false_positive_rate
    }

    pub fn num_counters(&self) -> u64 {
        self.params.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.params.num_hashes
    }

    /// `[m u32 counters][footer]`, little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.counts.len() * 4 + FOOTER_BYTES);
        for &count in &self.counts {
            writer.write_u32(count);
        }
        write_footer(&mut writer, &self.params, self.elements_added);
        writer.into_bytes()
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        write_file(path.as_ref(), &self.to_bytes())
    }

    fn positions(&self, hashes: &[u64]) -> Vec<usize> {
        assert!(
            hashes.len() >= self.params.num_hashes as usize,
            "hash vector shorter than number of hashes"
        );
        hashes[..self.params.num_hashes as usize]
            .iter()
            .map(|&hash| (hash % self.params.num_bits) as usize)
            .collect()
    }

    fn min_count(&self, hashes: &[u64]) -> u32 {
        self.positions(hashes)
            .into_iter()
            .map(|index| self.counts[index])
            .min()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn add_reports_min_counter() {
        let mut filter = CountingBloomFilter::new(100, 0.05).unwrap();
        assert_eq!(filter.check("dns.lookup"), 0);
        assert_eq!(filter.add("dns.lookup"), 1);
        assert_eq!(filter.add("dns.lookup"), 2);
        assert_eq!(filter.check("dns.lookup"), 2);
    }

    #[test]
    fn remove_restores_zero() {
        let mut filter = CountingBloomFilter::new(100, 0.05).unwrap();
        filter.add("a");
        filter.add("a");
        assert_eq!(filter.remove("a"), 1);
        assert_eq!(filter.remove("a"), 0);
        assert_eq!(filter.check("a"), 0);
        assert_eq!(filter.elements_added(), 0);
    }

    #[test]
    fn remove_on_absent_key_floors_at_zero() {
        let mut filter = CountingBloomFilter::new(100, 0.05).unwrap();
        assert_eq!(filter.remove("never added"), 0);
    }

    #[test]
    fn union_sums_and_intersection_takes_min() {
        let mut a = CountingBloomFilter::new(100, 0.05).unwrap();
        let mut b = CountingBloomFilter::new(100, 0.05).unwrap();
        a.add("k");
        a.add("k");
        b.add("k");

        assert_eq!(a.union(&b).unwrap().check("k"), 3);
        assert_eq!(a.intersection(&b).unwrap().check("k"), 1);
    }

    #[test]
    fn mismatched_shapes_are_incompatible() {
        let a = CountingBloomFilter::new(100, 0.05).unwrap();
        let b = CountingBloomFilter::new(200, 0.05).unwrap();
        assert_eq!(
            a.union(&b).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn estimate_counts_distinct_keys() {
        let mut filter = CountingBloomFilter::new(500, 0.01).unwrap();
        for i in 0..100u32 {
            filter.add(format!("key-{i}"));
        }
        let estimate = filter.estimate_elements() as f64;
        assert!((estimate - 100.0).abs() <= 10.0, "estimate {estimate}");
    }

    #[test]
    fn bytes_round_trip() {
        let mut filter = CountingBloomFilter::new(50, 0.05).unwrap();
        filter.add("x");
        filter.add("x");
        filter.add("y");

        let bytes = filter.to_bytes();
        assert_eq!(bytes.len(), filter.num_counters() as usize * 4 + 20);

        let restored = CountingBloomFilter::from_bytes(&bytes).unwrap();
        assert_eq!(restored.check("x"), 2);
        assert_eq!(restored.check("y"), 1);
        assert_eq!(restored.elements_added(), 3);
        assert_eq!(restored.to_bytes(), bytes);
    }

    #[test]
    fn saturated_counter_survives_round_trip() {
        let mut filter = CountingBloomFilter::new(10, 0.05).unwrap();
        filter.add("sat");
        let mut bytes = filter.to_bytes();

        // Force every touched counter to the ceiling in the persisted form.
        for cell in bytes[..filter.num_counters() as usize * 4].chunks_exact_mut(4) {
            if cell != [0, 0, 0, 0] {
                cell.copy_from_slice(&u32::MAX.to_le_bytes());
            }
        }

        let mut restored = CountingBloomFilter::from_bytes(&bytes).unwrap();
        assert_eq!(restored.check("sat"), u32::MAX);
        // Saturating add is idempotent at the ceiling.
        assert_eq!(restored.add("sat"), u32::MAX);
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let filter = CountingBloomFilter::new(50, 0.05).unwrap();
        let bytes = filter.to_bytes();
        let err = CountingBloomFilter::from_bytes(&bytes[4..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPersistedData);
    }
}
