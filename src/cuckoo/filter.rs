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

use crate::codec::ByteReader;
use crate::codec::ByteWriter;
use crate::codec::read_file;
use crate::codec::write_file;
use crate::common::Xorshift;
use crate::error::Error;
use crate::hash::FNV_OFFSET_BASIS;
use crate::hash::Fnv1aHasher;
use crate::hash::KeyHasher;
use crate::hash::fnv_1a;

pub(super) const HEADER_BYTES: usize = 28;

/// Cuckoo filter geometry and insertion policy.
///
/// Fingerprints are 1-4 bytes, zero reserved for empty slots. A
/// fingerprint's two candidate buckets both derive from the fingerprint
/// itself: `i1 = fp mod num_buckets` and
/// `i2 = (i1 XOR fnv_1a(fp_le_bytes)) mod num_buckets`. Because
/// `num_buckets` is a power of two the XOR makes the pair reciprocal, and
/// because no key material is involved the table can re-bucket every
/// stored fingerprint when it grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct CuckooParams {
    pub num_buckets: u32,
    pub bucket_size: u32,
    pub max_swaps: u32,
    pub expansion_rate: u32,
    pub auto_expand: bool,
    pub fingerprint_size: u32,
}

impl CuckooParams {
    pub fn num_slots(&self) -> usize {
        self.num_buckets as usize * self.bucket_size as usize
    }

    /// `max(1, h mod 2^(8 * fingerprint_size))`; zero is remapped because
    /// it marks an empty slot.
    pub fn fingerprint_from_hash(&self, hash: u64) -> u32 {
        let modulus = 1u64 << (8 * self.fingerprint_size);
        let fingerprint = hash % modulus;
        if fingerprint == 0 { 1 } else { fingerprint as u32 }
    }

    pub fn candidate_indices(&self, fingerprint: u32) -> (usize, usize) {
        let first = (u64::from(fingerprint) % u64::from(self.num_buckets)) as usize;
        (first, self.alternate_index(first, fingerprint))
    }

    /// The other candidate bucket; involutive for power-of-two
    /// `num_buckets`.
    pub fn alternate_index(&self, index: usize, fingerprint: u32) -> usize {
        let tag = fnv_1a(self.fingerprint_bytes(fingerprint).as_slice(), FNV_OFFSET_BASIS);
        ((index as u64 ^ tag) % u64::from(self.num_buckets)) as usize
    }

    pub fn fingerprint_bytes(&self, fingerprint: u32) -> Vec<u8> {
        fingerprint.to_le_bytes()[..self.fingerprint_size as usize].to_vec()
    }

    pub fn grown(&self) -> CuckooParams {
        let mut params = *self;
        let grown = u64::from(self.num_buckets) * u64::from(1 + self.expansion_rate);
        params.num_buckets = grown.next_power_of_two().min(1 << 31) as u32;
        params
    }
}

/// Builder for [`CuckooFilter`] and
/// [`CountingCuckooFilter`](crate::cuckoo::CountingCuckooFilter).
///
/// Defaults: capacity 10 000, bucket size 4, 500 swaps, expansion rate 2,
/// auto-expansion on, 4-byte fingerprints. Setting
/// [`error_rate`](Self::error_rate) derives the fingerprint size instead.
#[derive(Debug, Clone)]
pub struct CuckooFilterBuilder {
    capacity: u32,
    bucket_size: u32,
    max_swaps: u32,
    expansion_rate: u32,
    auto_expand: bool,
    fingerprint_size: u32,
    error_rate: Option<f32>,
    seed: Option<u64>,
}

impl Default for CuckooFilterBuilder {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            bucket_size: 4,
            max_swaps: 500,
            expansion_rate: 2,
            auto_expand: true,
            fingerprint_size: 4,
            error_rate: None,
            seed: None,
        }
    }
}

impl CuckooFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Approximate number of keys the table should hold before expanding.
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Slots per bucket; one of 1, 2, 4, or 8.
    pub fn bucket_size(mut self, bucket_size: u32) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    /// Eviction chain budget per insert.
    pub fn max_swaps(mut self, max_swaps: u32) -> Self {
        self.max_swaps = max_swaps;
        self
    }

    /// Growth factor: an expansion multiplies the bucket count by
    /// `1 + expansion_rate` (rounded up to a power of two).
    pub fn expansion_rate(mut self, expansion_rate: u32) -> Self {
        self.expansion_rate = expansion_rate;
        self
    }

    /// Whether a failed insert triggers expansion instead of an error.
    pub fn auto_expand(mut self, auto_expand: bool) -> Self {
        self.auto_expand = auto_expand;
        self
    }

    /// Fingerprint width in bytes, 1 through 4.
    pub fn fingerprint_size(mut self, fingerprint_size: u32) -> Self {
        self.fingerprint_size = fingerprint_size;
        self
    }

    /// Derives the fingerprint width from a target false-positive rate:
    /// `ceil((log2(1/rate) + log2(2 * bucket_size)) / 8)` bytes.
    pub fn error_rate(mut self, error_rate: f32) -> Self {
        self.error_rate = Some(error_rate);
        self
    }

    /// Seeds the eviction RNG for reproducible insertion order.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<CuckooFilter, Error> {
        self.build_with_hasher(Fnv1aHasher)
    }

    pub fn build_with_hasher<H: KeyHasher>(self, hasher: H) -> Result<CuckooFilter<H>, Error> {
        let rng = self.rng();
        let params = self.validated_params()?;
        Ok(CuckooFilter {
            slots: vec![0u32; params.num_slots()],
            elements_added: 0,
            params,
            rng,
            hasher,
        })
    }

    pub(super) fn rng(&self) -> Xorshift {
        match self.seed {
            Some(seed) => Xorshift::from_seed(seed),
            None => Xorshift::from_entropy(),
        }
    }

    pub(super) fn validated_params(&self) -> Result<CuckooParams, Error> {
        if self.capacity == 0 {
            return Err(Error::invalid_argument("capacity must be greater than 0"));
        }
        if ![1, 2, 4, 8].contains(&self.bucket_size) {
            return Err(Error::invalid_argument("bucket size must be 1, 2, 4, or 8")
                .with_context("bucket_size", self.bucket_size));
        }
        if self.max_swaps == 0 {
            return Err(Error::invalid_argument("max swaps must be greater than 0"));
        }
        if self.expansion_rate == 0 {
            return Err(Error::invalid_argument(
                "expansion rate must be greater than 0",
            ));
        }

        let fingerprint_size = match self.error_rate {
            None => self.fingerprint_size,
            Some(rate) => {
                if !(rate > 0.0 && rate < 1.0) {
                    return Err(Error::invalid_argument("error rate must be in (0, 1)")
                        .with_context("error_rate", rate));
                }
                let bits =
                    (1.0 / f64::from(rate)).log2() + (2.0 * f64::from(self.bucket_size)).log2();
                ((bits / 8.0).ceil() as u32).clamp(1, 4)
            }
        };
        if !(1..=4).contains(&fingerprint_size) {
            return Err(
                Error::invalid_argument("fingerprint size must be between 1 and 4 bytes")
                    .with_context("fingerprint_size", fingerprint_size),
            );
        }

        let num_buckets = self
            .capacity
            .div_ceil(self.bucket_size)
            .next_power_of_two()
            .max(1);

        Ok(CuckooParams {
            num_buckets,
            bucket_size: self.bucket_size,
            max_swaps: self.max_swaps,
            expansion_rate: self.expansion_rate,
            auto_expand: self.auto_expand,
            fingerprint_size,
        })
    }
}

/// Cuckoo filter: approximate membership with deletion support.
///
/// Stores short fingerprints in a bucket table; every fingerprint has two
/// candidate buckets, and inserts displace existing entries along a
/// bounded random eviction chain when both are full. A failed chain rolls
/// back completely and either grows the table (auto-expansion) or reports
/// [`FilterFull`](crate::error::ErrorKind::FilterFull).
///
/// # Examples
///
/// ```
/// use probables::cuckoo::CuckooFilter;
///
/// let mut filter = CuckooFilter::builder().capacity(100).build().unwrap();
/// filter.add("alpha").unwrap();
///
/// assert!(filter.check("alpha"));
/// assert!(filter.remove("alpha"));
/// assert!(!filter.check("alpha"));
/// ```
#[derive(Debug, Clone)]
pub struct CuckooFilter<H = Fnv1aHasher> {
    pub(super) params: CuckooParams,
    slots: Vec<u32>,
    elements_added: u32,
    rng: Xorshift,
    hasher: H,
}

impl CuckooFilter {
    pub fn builder() -> CuckooFilterBuilder {
        CuckooFilterBuilder::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Self::from_bytes_with_hasher(bytes, Fnv1aHasher)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let bytes = read_file(path.as_ref())?;
        Self::from_bytes(&bytes)
    }
}

impl<H: KeyHasher> CuckooFilter<H> {
    pub fn from_bytes_with_hasher(bytes: &[u8], hasher: H) -> Result<Self, Error> {
        let (params, elements_added, mut reader) = read_header(bytes, 0)?;

        let mut slots = Vec::with_capacity(params.num_slots());
        for _ in 0..params.num_slots() {
            let mut fp_buf = [0u8; 4];
            reader
                .read_exact(&mut fp_buf[..params.fingerprint_size as usize])
                .map_err(|_| Error::insufficient_data("bucket array"))?;
            slots.push(u32::from_le_bytes(fp_buf));
        }

        Ok(Self {
            params,
            slots,
            elements_added,
            rng: Xorshift::from_entropy(),
            hasher,
        })
    }

    /// Inserts a key. A key already present in a candidate bucket is a
    /// no-op; a full table fails with `FilterFull` unless auto-expansion
    /// is enabled.
    pub fn add(&mut self, key: impl AsRef<[u8]>) -> Result<(), Error> {
        let fingerprint = self.fingerprint(key.as_ref());
        let (first, second) = self.params.candidate_indices(fingerprint);
        if self.bucket_contains(first, fingerprint) || self.bucket_contains(second, fingerprint) {
            return Ok(());
        }

        loop {
            if self.place(fingerprint) {
                self.elements_added += 1;
                return Ok(());
            }
            if !self.params.auto_expand {
                return Err(Error::filter_full("insert exhausted the swap budget")
                    .with_context("max_swaps", self.params.max_swaps)
                    .with_context("num_buckets", self.params.num_buckets));
            }
            self.expand()?;
        }
    }

    /// True iff the key's fingerprint sits in either candidate bucket.
    pub fn check(&self, key: impl AsRef<[u8]>) -> bool {
        let fingerprint = self.fingerprint(key.as_ref());
        let (first, second) = self.params.candidate_indices(fingerprint);
        self.bucket_contains(first, fingerprint) || self.bucket_contains(second, fingerprint)
    }

    /// Clears one matching slot; false when the key was not present.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> bool {
        let fingerprint = self.fingerprint(key.as_ref());
        let (first, second) = self.params.candidate_indices(fingerprint);
        for bucket in [first, second] {
            if let Some(slot) = self.slot_holding(bucket, fingerprint) {
                self.slots[slot] = 0;
                self.elements_added = self.elements_added.saturating_sub(1);
                return true;
            }
        }
        false
    }

    /// Grows the table to `num_buckets * (1 + expansion_rate)` buckets
    /// (next power of two) and re-buckets every stored fingerprint. Keys
    /// are not rehashed. A placement failure rolls the expansion back.
    pub fn expand(&mut self) -> Result<(), Error> {
        let old_params = self.params;
        if old_params.grown().num_buckets == old_params.num_buckets {
            return Err(Error::filter_full("table is already at its maximum size"));
        }
        let old_slots = std::mem::take(&mut self.slots);

        self.params = self.params.grown();
        self.slots = vec![0u32; self.params.num_slots()];

        for &fingerprint in old_slots.iter().filter(|&&fp| fp != 0) {
            if !self.place(fingerprint) {
                self.params = old_params;
                self.slots = old_slots;
                return Err(Error::filter_full(
                    "expansion could not re-place every fingerprint",
                ));
            }
        }

        log::debug!(
            "cuckoo filter expanded from {} to {} buckets",
            old_params.num_buckets,
            self.params.num_buckets
        );
        Ok(())
    }

    pub fn elements_added(&self) -> u32 {
        self.elements_added
    }

    pub fn num_buckets(&self) -> u32 {
        self.params.num_buckets
    }

    pub fn bucket_size(&self) -> u32 {
        self.params.bucket_size
    }

    pub fn fingerprint_size(&self) -> u32 {
        self.params.fingerprint_size
    }

    pub fn max_swaps(&self) -> u32 {
        self.params.max_swaps
    }

    /// Fraction of slots in use.
    pub fn load_factor(&self) -> f64 {
        self.elements_added as f64 / self.params.num_slots() as f64
    }

    /// Header of seven u32 fields followed by the bucket array, each slot
    /// as `fingerprint_size` little-endian bytes (all-zero when empty).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = write_header(&self.params, self.elements_added);
        for &fingerprint in &self.slots {
            writer.write(&self.params.fingerprint_bytes(fingerprint));
        }
        writer.into_bytes()
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        write_file(path.as_ref(), &self.to_bytes())
    }

    fn fingerprint(&self, key: &[u8]) -> u32 {
        let hash = self.hasher.hash_many(key, 1)[0];
        self.params.fingerprint_from_hash(hash)
    }

    /// Places a fingerprint, evicting along a random chain when needed.
    /// On failure the table is restored and false returned.
    fn place(&mut self, fingerprint: u32) -> bool {
        let (first, second) = self.params.candidate_indices(fingerprint);
        for bucket in [first, second] {
            if let Some(slot) = self.slot_holding(bucket, 0) {
                self.slots[slot] = fingerprint;
                return true;
            }
        }

        let mut bucket = if self.rng.pick(2) == 0 { first } else { second };
        let mut hand = fingerprint;
        let mut history = Vec::with_capacity(self.params.max_swaps as usize);

        for _ in 0..self.params.max_swaps {
            let slot = bucket * self.params.bucket_size as usize
                + self.rng.pick(u64::from(self.params.bucket_size)) as usize;
            std::mem::swap(&mut hand, &mut self.slots[slot]);
            history.push(slot);

            bucket = self.params.alternate_index(bucket, hand);
            if let Some(empty) = self.slot_holding(bucket, 0) {
                self.slots[empty] = hand;
                return true;
            }
        }

        // Undo the whole chain in reverse; `hand` ends as the original
        // fingerprint and the table as it was.
        for &slot in history.iter().rev() {
            std::mem::swap(&mut hand, &mut self.slots[slot]);
        }
        debug_assert_eq!(hand, fingerprint);
        false
    }

    fn bucket_contains(&self, bucket: usize, fingerprint: u32) -> bool {
        self.slot_holding(bucket, fingerprint).is_some()
    }

    fn slot_holding(&self, bucket: usize, fingerprint: u32) -> Option<usize> {
        let start = bucket * self.params.bucket_size as usize;
        (start..start + self.params.bucket_size as usize)
            .find(|&slot| self.slots[slot] == fingerprint)
    }
}

pub(super) fn write_header(params: &CuckooParams, num_elements: u32) -> ByteWriter {
    let mut writer = ByteWriter::with_capacity(HEADER_BYTES + params.num_slots() * 4);
    writer.write_u32(params.bucket_size);
    writer.write_u32(params.max_swaps);
    writer.write_u32(params.expansion_rate);
    writer.write_u32(u32::from(params.auto_expand));
    writer.write_u32(params.fingerprint_size);
    writer.write_u32(params.num_buckets);
    writer.write_u32(num_elements);
    writer
}

/// Reads the shared cuckoo header and verifies the total length implied by
/// `slot_extra` (zero for the base filter, four count bytes per slot for
/// the counting variant).
pub(super) fn read_header(
    bytes: &[u8],
    slot_extra: usize,
) -> Result<(CuckooParams, u32, ByteReader<'_>), Error> {
    if bytes.len() < HEADER_BYTES {
        return Err(Error::insufficient_data("cuckoo header"));
    }

    let mut reader = ByteReader::new(bytes);
    let bucket_size = reader
        .read_u32()
        .map_err(|_| Error::insufficient_data("bucket_size"))?;
    let max_swaps = reader
        .read_u32()
        .map_err(|_| Error::insufficient_data("max_swaps"))?;
    let expansion_rate = reader
        .read_u32()
        .map_err(|_| Error::insufficient_data("expansion_rate"))?;
    let auto_expand = reader
        .read_u32()
        .map_err(|_| Error::insufficient_data("auto_expand"))?;
    let fingerprint_size = reader
        .read_u32()
        .map_err(|_| Error::insufficient_data("fingerprint_size"))?;
    let num_buckets = reader
        .read_u32()
        .map_err(|_| Error::insufficient_data("num_buckets"))?;
    let num_elements = reader
        .read_u32()
        .map_err(|_| Error::insufficient_data("num_elements"))?;

    if ![1, 2, 4, 8].contains(&bucket_size) {
        return Err(Error::persisted(format!(
            "header declares invalid bucket size {bucket_size}"
        )));
    }
    if !(1..=4).contains(&fingerprint_size) {
        return Err(Error::persisted(format!(
            "header declares invalid fingerprint size {fingerprint_size}"
        )));
    }
    if num_buckets == 0 || max_swaps == 0 {
        return Err(Error::persisted("header declares an empty table"));
    }

    let params = CuckooParams {
        num_buckets,
        bucket_size,
        max_swaps,
        expansion_rate,
        auto_expand: auto_expand != 0,
        fingerprint_size,
    };

    let expected =
        HEADER_BYTES + params.num_slots() * (params.fingerprint_size as usize + slot_extra);
    if bytes.len() != expected {
        return Err(Error::size_mismatch(expected, bytes.len()));
    }
    Ok((params, num_elements, reader))
}
