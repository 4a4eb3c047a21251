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

use std::fmt::Write as _;
use std::path::Path;

use crate::bloom::serialization::FOOTER_BYTES;
use crate::bloom::serialization::read_footer;
use crate::bloom::serialization::write_footer;
use crate::codec;
use crate::codec::ByteWriter;
use crate::codec::read_file;
use crate::codec::write_file;
use crate::common::BitArray;
use crate::common::BitStore;
use crate::error::Error;
use crate::hash::Fnv1aHasher;
use crate::hash::KeyHasher;

/// Shared sizing and math for the Bloom family.
///
/// `(m, k)` always derive from `(est_elements, false_positive_rate)` via the
/// classical formulas, so two filters built from equal inputs are shape-
/// compatible, and the on-disk footer only needs to carry the inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct BloomParams {
    pub est_elements: u64,
    pub false_positive_rate: f32,
    pub num_bits: u64,
    pub num_hashes: u32,
}

impl BloomParams {
    /// Derives `m = ceil(-n ln p / ln2^2)` and `k = ceil((m/n) ln 2)`,
    /// both clamped to at least 1.
    pub fn new(est_elements: u64, false_positive_rate: f32) -> Result<Self, Error> {
        if est_elements == 0 {
            return Err(Error::invalid_argument(
                "estimated elements must be greater than 0",
            ));
        }
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0)
            || !false_positive_rate.is_finite()
        {
            return Err(
                Error::invalid_argument("false positive rate must be in (0, 1)")
                    .with_context("fpr", false_positive_rate),
            );
        }

        let n = est_elements as f64;
        let p = f64::from(false_positive_rate);
        let ln2 = std::f64::consts::LN_2;

        let num_bits = ((-n * p.ln()) / (ln2 * ln2)).ceil().max(1.0) as u64;
        let num_hashes = ((num_bits as f64 / n) * ln2).ceil().max(1.0) as u32;

        Ok(Self {
            est_elements,
            false_positive_rate,
            num_bits,
            num_hashes,
        })
    }

    /// Bytes a packed bit array of `m` bits occupies on disk.
    pub fn byte_length(&self) -> usize {
        self.num_bits.div_ceil(8) as usize
    }

    pub fn check_compatible(&self, other: &Self, operation: &'static str) -> Result<(), Error> {
        if self.num_bits != other.num_bits || self.num_hashes != other.num_hashes {
            return Err(Error::incompatible(
                operation,
                format!(
                    "({} bits, {} hashes) vs ({} bits, {} hashes)",
                    self.num_bits, self.num_hashes, other.num_bits, other.num_hashes
                ),
            ));
        }
        Ok(())
    }

    /// Sets the `k` addressed bits. `hashes` must hold at least `k` values.
    pub fn set_positions<S: BitStore>(&self, store: &mut S, hashes: &[u64]) {
        assert!(
            hashes.len() >= self.num_hashes as usize,
            "hash vector shorter than number of hashes"
        );
        for &hash in &hashes[..self.num_hashes as usize] {
            store.set_bit(hash % self.num_bits);
        }
    }

    /// True iff all `k` addressed bits are set.
    pub fn all_positions_set<S: BitStore>(&self, store: &S, hashes: &[u64]) -> bool {
        assert!(
            hashes.len() >= self.num_hashes as usize,
            "hash vector shorter than number of hashes"
        );
        hashes[..self.num_hashes as usize]
            .iter()
            .all(|&hash| store.get_bit(hash % self.num_bits))
    }

    /// `(1 - (1 - 1/m)^(k*n))^k` for `n` insertions.
    pub fn false_positive_rate_for(&self, elements_added: u64) -> f64 {
        let m = self.num_bits as f64;
        let k = f64::from(self.num_hashes);
        let exponent = k * elements_added as f64;
        (1.0 - (1.0 - 1.0 / m).powf(exponent)).powf(k)
    }

    /// `-(m/k) ln(1 - X/m)` over `set_bits` = X; a fully saturated array
    /// falls back to `elements_added` instead of a domain error.
    pub fn estimate_elements(&self, set_bits: u64, elements_added: u64) -> u64 {
        if set_bits >= self.num_bits {
            return elements_added;
        }
        let m = self.num_bits as f64;
        let k = f64::from(self.num_hashes);
        let fraction = set_bits as f64 / m;
        (-(m / k) * (1.0 - fraction).ln()).round() as u64
    }
}

/// The classical Bloom filter: approximate set membership with zero false
/// negatives and a tunable false-positive rate.
///
/// Keys are hashed through the filter's [`KeyHasher`] (FNV-1a-seeded by
/// default). Anything that dereferences to bytes is a key; `&str` hashes
/// through its UTF-8 bytes.
///
/// # Examples
///
/// ```
/// use probables::bloom::BloomFilter;
///
/// let mut filter = BloomFilter::new(10, 0.05).unwrap();
/// filter.add("google.com");
///
/// assert!(filter.check("google.com"));
/// assert!(!filter.check("facebook.com"));
/// ```
#[derive(Debug, Clone)]
pub struct BloomFilter<H = Fnv1aHasher> {
    pub(super) params: BloomParams,
    bits: BitArray,
    elements_added: u64,
    hasher: H,
}

impl BloomFilter {
    /// Creates a filter sized for `est_elements` keys at the target
    /// `false_positive_rate`, hashing with the default FNV-1a family.
    pub fn new(est_elements: u64, false_positive_rate: f32) -> Result<Self, Error> {
        Self::with_hasher(est_elements, false_positive_rate, Fnv1aHasher)
    }

    /// Restores a filter from exported bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Self::from_bytes_with_hasher(bytes, Fnv1aHasher)
    }

    /// Restores a filter from a file in the export layout.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_path_with_hasher(path, Fnv1aHasher)
    }

    /// Restores a filter from an uppercase-hex export.
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        Self::from_bytes(&codec::decode_hex(hex)?)
    }
}

impl<H: KeyHasher> BloomFilter<H> {
    /// Creates a filter using a caller-provided hash family.
    ///
    /// Filters only interoperate (set operations, persisted form) with
    /// filters using the same family.
    pub fn with_hasher(
        est_elements: u64,
        false_positive_rate: f32,
        hasher: H,
    ) -> Result<Self, Error> {
        let params = BloomParams::new(est_elements, false_positive_rate)?;
        Ok(Self {
            bits: BitArray::new(params.num_bits),
            elements_added: 0,
            params,
            hasher,
        })
    }

    pub fn from_bytes_with_hasher(bytes: &[u8], hasher: H) -> Result<Self, Error> {
        let (params, elements_added) = read_footer(bytes)?;
        let payload = bytes.len() - FOOTER_BYTES;
        if payload != params.byte_length() {
            return Err(Error::size_mismatch(
                params.byte_length() + FOOTER_BYTES,
                bytes.len(),
            ));
        }

        Ok(Self {
            bits: BitArray::from_bytes(bytes[..payload].to_vec(), params.num_bits),
            elements_added,
            params,
            hasher,
        })
    }

    pub fn from_path_with_hasher(path: impl AsRef<Path>, hasher: H) -> Result<Self, Error> {
        let bytes = read_file(path.as_ref())?;
        Self::from_bytes_with_hasher(&bytes, hasher)
    }

    /// Fresh empty filter over already-validated parameters; the expanding
    /// and rotating wrappers mint their sub-filters through this.
    pub(super) fn from_params(params: BloomParams, hasher: H) -> Self {
        Self {
            bits: BitArray::new(params.num_bits),
            elements_added: 0,
            params,
            hasher,
        }
    }

    // ========================================================================
    // Updates and queries
    // ========================================================================

    /// Inserts a key and returns the updated insertion counter.
    ///
    /// The counter increments unconditionally; it may exceed the estimated
    /// capacity, at which point the false-positive rate degrades.
    pub fn add(&mut self, key: impl AsRef<[u8]>) -> u64 {
        let hashes = self.hash(key.as_ref());
        self.add_hashes(&hashes)
    }

    /// [`add`](Self::add) over a precomputed hash vector (length >= k).
    pub fn add_hashes(&mut self, hashes: &[u64]) -> u64 {
        self.params.set_positions(&mut self.bits, hashes);
        self.elements_added += 1;
        self.elements_added
    }

    /// Tests membership: false means definitely absent.
    pub fn check(&self, key: impl AsRef<[u8]>) -> bool {
        let hashes = self.hash(key.as_ref());
        self.check_hashes(&hashes)
    }

    /// [`check`](Self::check) over a precomputed hash vector (length >= k).
    pub fn check_hashes(&self, hashes: &[u64]) -> bool {
        self.params.all_positions_set(&self.bits, hashes)
    }

    /// Hashes a key to this filter's depth, for the `_hashes` entry points.
    pub fn hash(&self, key: &[u8]) -> Vec<u64> {
        self.hasher.hash_many(key, self.params.num_hashes as usize)
    }

    // ========================================================================
    // Set operations
    // ========================================================================

    /// Returns the union of two shape-compatible filters; neither operand
    /// is mutated. The insertion counter saturates at the estimated
    /// capacity.
    pub fn union(&self, other: &Self) -> Result<Self, Error>
    where
        H: Clone,
    {
        self.params.check_compatible(&other.params, "union")?;
        Ok(Self {
            params: self.params,
            bits: self.bits.or(&other.bits),
            elements_added: (self.elements_added + other.elements_added)
                .min(self.params.est_elements),
            hasher: self.hasher.clone(),
        })
    }

    /// Returns the intersection of two shape-compatible filters.
    pub fn intersection(&self, other: &Self) -> Result<Self, Error>
    where
        H: Clone,
    {
        self.params.check_compatible(&other.params, "intersection")?;
        Ok(Self {
            params: self.params,
            bits: self.bits.and(&other.bits),
            elements_added: self.elements_added.min(other.elements_added),
            hasher: self.hasher.clone(),
        })
    }

    /// `|A AND B| / |A OR B|` over set bits; 1.0 when both filters are
    /// empty.
    pub fn jaccard_index(&self, other: &Self) -> Result<f64, Error> {
        self.params.check_compatible(&other.params, "jaccard_index")?;
        let union = self.bits.or(&other.bits).popcount();
        if union == 0 {
            return Ok(1.0);
        }
        let intersection = self.bits.and(&other.bits).popcount();
        Ok(intersection as f64 / union as f64)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Estimates the number of distinct keys inserted, from the set-bit
    /// count.
    pub fn estimate_elements(&self) -> u64 {
        self.params
            .estimate_elements(self.bits.popcount(), self.elements_added)
    }

    /// False-positive probability at the current insertion count.
    pub fn current_false_positive_rate(&self) -> f64 {
        self.params.false_positive_rate_for(self.elements_added)
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

    /// Total bits `m`.
    pub fn num_bits(&self) -> u64 {
        self.params.num_bits
    }

    /// Hash count `k`.
    pub fn num_hashes(&self) -> u32 {
        self.params.num_hashes
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Serializes to the export layout:
    /// `[bit array, ceil(m/8) bytes][est_elements u64][fpr f32][n u64]`,
    /// little-endian throughout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.params.byte_length() + FOOTER_BYTES);
        writer.write(self.bits.as_bytes());
        write_footer(&mut writer, &self.params, self.elements_added);
        writer.into_bytes()
    }

    /// Writes the export bytes to `path`.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        write_file(path.as_ref(), &self.to_bytes())
    }

    /// Uppercase hex of the export bytes, no separators.
    pub fn export_hex(&self) -> String {
        codec::encode_hex(&self.to_bytes())
    }

    /// Writes a C header holding the bit array as an `unsigned char`
    /// literal plus `#define`s for the footer fields.
    pub fn export_c_header(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let mut out = String::new();
        let _ = writeln!(out, "/* exported Bloom filter */");
        let _ = writeln!(out, "#define EST_ELEMENTS {}", self.params.est_elements);
        let _ = writeln!(out, "#define FPR {}f", self.params.false_positive_rate);
        let _ = writeln!(out, "#define ELEMENTS_ADDED {}", self.elements_added);
        let _ = writeln!(out, "const unsigned char bloom[] = {{");
        for chunk in self.bits.as_bytes().chunks(12) {
            let line = chunk
                .iter()
                .map(|b| format!("0x{b:02X}"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "    {line},");
        }
        let _ = writeln!(out, "}};");
        write_file(path.as_ref(), out.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn derives_classical_parameters() {
        let filter = BloomFilter::new(10, 0.05).unwrap();
        // m = ceil(-10 ln 0.05 / ln2^2) = 63, k = ceil((63/10) ln 2) = 5
        assert_eq!(filter.num_bits(), 63);
        assert_eq!(filter.num_hashes(), 5);
        assert_eq!(filter.elements_added(), 0);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(
            BloomFilter::new(0, 0.05).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            BloomFilter::new(10, 0.0).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            BloomFilter::new(10, 1.0).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn add_then_check() {
        let mut filter = BloomFilter::new(10, 0.05).unwrap();
        assert_eq!(filter.add("google.com"), 1);
        assert!(filter.check("google.com"));
        assert!(!filter.check("facebook.com"));
    }

    #[test]
    fn counter_increments_unconditionally() {
        let mut filter = BloomFilter::new(10, 0.05).unwrap();
        filter.add("dup");
        filter.add("dup");
        assert_eq!(filter.elements_added(), 2);
    }

    #[test]
    fn precomputed_hashes_match_keyed_path() {
        let mut a = BloomFilter::new(100, 0.01).unwrap();
        let mut b = BloomFilter::new(100, 0.01).unwrap();

        let hashes = a.hash(b"example.org");
        a.add("example.org");
        b.add_hashes(&hashes);

        assert!(b.check_hashes(&hashes));
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn union_sees_both_sides() {
        let mut a = BloomFilter::new(100, 0.01).unwrap();
        let mut b = BloomFilter::new(100, 0.01).unwrap();
        a.add("left");
        b.add("right");

        let union = a.union(&b).unwrap();
        assert!(union.check("left"));
        assert!(union.check("right"));
        assert_eq!(union.elements_added(), 2);
        // Operands untouched.
        assert!(!a.check("right"));
        assert_eq!(a.elements_added(), 1);
    }

    #[test]
    fn union_counter_saturates_at_capacity() {
        let mut a = BloomFilter::new(3, 0.05).unwrap();
        let mut b = BloomFilter::new(3, 0.05).unwrap();
        for key in ["a", "b", "c"] {
            a.add(key);
            b.add(key);
        }
        assert_eq!(a.union(&b).unwrap().elements_added(), 3);
    }

    #[test]
    fn intersection_keeps_common_keys() {
        let mut a = BloomFilter::new(100, 0.01).unwrap();
        let mut b = BloomFilter::new(100, 0.01).unwrap();
        a.add("both");
        a.add("only-a");
        b.add("both");

        let inter = a.intersection(&b).unwrap();
        assert!(inter.check("both"));
        assert!(!inter.check("only-a"));
        assert_eq!(inter.elements_added(), 1);
    }

    #[test]
    fn mismatched_shapes_are_incompatible() {
        let a = BloomFilter::new(100, 0.01).unwrap();
        let b = BloomFilter::new(500, 0.01).unwrap();
        assert_eq!(
            a.union(&b).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            a.intersection(&b).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            a.jaccard_index(&b).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn jaccard_extremes() {
        let mut filter = BloomFilter::new(100, 0.01).unwrap();
        let empty = BloomFilter::new(100, 0.01).unwrap();

        assert_eq!(empty.jaccard_index(&empty).unwrap(), 1.0);

        for i in 0..20u32 {
            filter.add(format!("key-{i}"));
        }
        assert_eq!(filter.jaccard_index(&filter).unwrap(), 1.0);
        assert_eq!(filter.jaccard_index(&empty).unwrap(), 0.0);
    }

    #[test]
    fn estimate_tracks_insertions() {
        let mut filter = BloomFilter::new(1000, 0.01).unwrap();
        for i in 0..500u32 {
            filter.add(format!("key-{i}"));
        }
        let estimate = filter.estimate_elements() as f64;
        assert!((estimate - 500.0).abs() <= 50.0, "estimate {estimate}");
    }

    #[test]
    fn saturated_estimate_falls_back_to_counter() {
        // est 1 at fpr 0.99 gives a single-bit array.
        let mut filter = BloomFilter::new(1, 0.99).unwrap();
        assert_eq!(filter.num_bits(), 1);
        filter.add("a");
        filter.add("b");
        assert_eq!(filter.estimate_elements(), 2);
    }

    #[test]
    fn false_positive_rate_grows_with_load() {
        let mut filter = BloomFilter::new(100, 0.05).unwrap();
        assert_eq!(filter.current_false_positive_rate(), 0.0);

        for i in 0..100u32 {
            filter.add(format!("key-{i}"));
        }
        let at_capacity = filter.current_false_positive_rate();
        assert!(at_capacity > 0.0 && at_capacity < 0.1);

        for i in 100..400u32 {
            filter.add(format!("key-{i}"));
        }
        assert!(filter.current_false_positive_rate() > at_capacity);
    }

    #[test]
    fn export_length_matches_contract() {
        let mut filter = BloomFilter::new(1000, 0.05).unwrap();
        filter.add("x");
        let bytes = filter.to_bytes();
        assert_eq!(bytes.len(), filter.num_bits().div_ceil(8) as usize + 20);
    }

    #[test]
    fn bytes_round_trip_bit_exactly() {
        let mut filter = BloomFilter::new(200, 0.02).unwrap();
        for i in 0..50u32 {
            filter.add(format!("key-{i}"));
        }

        let restored = BloomFilter::from_bytes(&filter.to_bytes()).unwrap();
        assert_eq!(restored.num_bits(), filter.num_bits());
        assert_eq!(restored.num_hashes(), filter.num_hashes());
        assert_eq!(restored.elements_added(), filter.elements_added());
        assert_eq!(restored.to_bytes(), filter.to_bytes());
    }

    #[test]
    fn hex_round_trip() {
        let mut filter = BloomFilter::new(50, 0.05).unwrap();
        filter.add("hex me");

        let hex = filter.export_hex();
        assert!(hex.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)));

        let restored = BloomFilter::from_hex(&hex).unwrap();
        assert!(restored.check("hex me"));
        assert_eq!(restored.export_hex(), hex);
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let filter = BloomFilter::new(100, 0.05).unwrap();
        let bytes = filter.to_bytes();
        let err = BloomFilter::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPersistedData);
    }
}
