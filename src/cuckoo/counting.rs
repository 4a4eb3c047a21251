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

use crate::codec::read_file;
use crate::codec::write_file;
use crate::common::Xorshift;
use crate::cuckoo::filter::CuckooFilterBuilder;
use crate::cuckoo::filter::CuckooParams;
use crate::cuckoo::filter::read_header;
use crate::cuckoo::filter::write_header;
use crate::error::Error;
use crate::hash::Fnv1aHasher;
use crate::hash::KeyHasher;

/// One bucket slot: a fingerprint with its multiplicity. `count == 0`
/// marks the slot empty, so the pair round-trips through the wire format
/// without a separate occupancy bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Slot {
    fingerprint: u32,
    count: u32,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Cuckoo filter whose slots carry `(fingerprint, count)` pairs.
///
/// Re-adding a present key increments its count instead of occupying a
/// second slot; `remove` decrements and vacates at zero. Eviction chains
/// move the whole pair.
#[derive(Debug, Clone)]
pub struct CountingCuckooFilter<H = Fnv1aHasher> {
    params: CuckooParams,
    slots: Vec<Slot>,
    elements_added: u32,
    unique_elements: u32,
    rng: Xorshift,
    hasher: H,
}

impl CountingCuckooFilter {
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

impl CuckooFilterBuilder {
    pub fn build_counting(self) -> Result<CountingCuckooFilter, Error> {
        self.build_counting_with_hasher(Fnv1aHasher)
    }

    pub fn build_counting_with_hasher<H: KeyHasher>(
        self,
        hasher: H,
    ) -> Result<CountingCuckooFilter<H>, Error> {
        let rng = self.rng();
        let params = self.validated_params()?;
        Ok(CountingCuckooFilter {
            slots: vec![Slot::default(); params.num_slots()],
            elements_added: 0,
            unique_elements: 0,
            params,
            rng,
            hasher,
        })
    }
}

impl<H: KeyHasher> CountingCuckooFilter<H> {
    pub fn from_bytes_with_hasher(bytes: &[u8], hasher: H) -> Result<Self, Error> {
        let (params, elements_added, mut reader) = read_header(bytes, 4)?;

        let mut slots = Vec::with_capacity(params.num_slots());
        let mut unique_elements = 0u32;
        for _ in 0..params.num_slots() {
            let mut fp_buf = [0u8; 4];
            reader
                .read_exact(&mut fp_buf[..params.fingerprint_size as usize])
                .map_err(|_| Error::insufficient_data("bucket array"))?;
            let mut count_buf = [0u8; 4];
            reader
                .read_exact(&mut count_buf)
                .map_err(|_| Error::insufficient_data("slot count"))?;

            let slot = Slot {
                fingerprint: u32::from_le_bytes(fp_buf),
                count: u32::from_le_bytes(count_buf),
            };
            if !slot.is_empty() {
                unique_elements += 1;
            }
            slots.push(slot);
        }

        Ok(Self {
            params,
            slots,
            elements_added,
            unique_elements,
            rng: Xorshift::from_entropy(),
            hasher,
        })
    }

    /// Inserts a key: a present fingerprint gains a count, a new one goes
    /// through regular cuckoo placement.
    pub fn add(&mut self, key: impl AsRef<[u8]>) -> Result<(), Error> {
        let fingerprint = self.fingerprint(key.as_ref());
        let (first, second) = self.params.candidate_indices(fingerprint);
        for bucket in [first, second] {
            if let Some(slot) = self.slot_holding(bucket, fingerprint) {
                self.slots[slot].count = self.slots[slot].count.saturating_add(1);
                self.elements_added = self.elements_added.saturating_add(1);
                return Ok(());
            }
        }

        loop {
            if self.place(Slot {
                fingerprint,
                count: 1,
            }) {
                self.elements_added = self.elements_added.saturating_add(1);
                self.unique_elements += 1;
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

    pub fn check(&self, key: impl AsRef<[u8]>) -> bool {
        self.count(key) > 0
    }

    /// Multiplicity of the key's fingerprint (zero when absent).
    pub fn count(&self, key: impl AsRef<[u8]>) -> u32 {
        let fingerprint = self.fingerprint(key.as_ref());
        let (first, second) = self.params.candidate_indices(fingerprint);
        for bucket in [first, second] {
            if let Some(slot) = self.slot_holding(bucket, fingerprint) {
                return self.slots[slot].count;
            }
        }
        0
    }

    /// Decrements the key's count, vacating the slot at zero; false when
    /// the key was not present.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> bool {
        let fingerprint = self.fingerprint(key.as_ref());
        let (first, second) = self.params.candidate_indices(fingerprint);
        for bucket in [first, second] {
            if let Some(slot) = self.slot_holding(bucket, fingerprint) {
                self.slots[slot].count -= 1;
                if self.slots[slot].is_empty() {
                    self.slots[slot] = Slot::default();
                    self.unique_elements = self.unique_elements.saturating_sub(1);
                }
                self.elements_added = self.elements_added.saturating_sub(1);
                return true;
            }
        }
        false
    }

    /// Grows the table and re-buckets every stored pair; counts are
    /// preserved. A placement failure rolls the expansion back.
    pub fn expand(&mut self) -> Result<(), Error> {
        let old_params = self.params;
        if old_params.grown().num_buckets == old_params.num_buckets {
            return Err(Error::filter_full("table is already at its maximum size"));
        }
        let old_slots = std::mem::take(&mut self.slots);

        self.params = self.params.grown();
        self.slots = vec![Slot::default(); self.params.num_slots()];

        for &slot in old_slots.iter().filter(|slot| !slot.is_empty()) {
            if !self.place(slot) {
                self.params = old_params;
                self.slots = old_slots;
                return Err(Error::filter_full(
                    "expansion could not re-place every fingerprint",
                ));
            }
        }

        log::debug!(
            "counting cuckoo filter expanded from {} to {} buckets",
            old_params.num_buckets,
            self.params.num_buckets
        );
        Ok(())
    }

    /// Total insertions, duplicates included.
    pub fn elements_added(&self) -> u32 {
        self.elements_added
    }

    /// Distinct fingerprints currently stored.
    pub fn unique_elements(&self) -> u32 {
        self.unique_elements
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

    pub fn load_factor(&self) -> f64 {
        self.unique_elements as f64 / self.params.num_slots() as f64
    }

    /// Same header as the base filter; each slot is the fingerprint bytes
    /// followed by its count (u32). `count == 0` denotes empty.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = write_header(&self.params, self.elements_added);
        for slot in &self.slots {
            writer.write(&self.params.fingerprint_bytes(slot.fingerprint));
            writer.write_u32(slot.count);
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

    fn place(&mut self, incoming: Slot) -> bool {
        let (first, second) = self.params.candidate_indices(incoming.fingerprint);
        for bucket in [first, second] {
            if let Some(slot) = self.empty_slot(bucket) {
                self.slots[slot] = incoming;
                return true;
            }
        }

        let mut bucket = if self.rng.pick(2) == 0 { first } else { second };
        let mut hand = incoming;
        let mut history = Vec::with_capacity(self.params.max_swaps as usize);

        for _ in 0..self.params.max_swaps {
            let slot = bucket * self.params.bucket_size as usize
                + self.rng.pick(u64::from(self.params.bucket_size)) as usize;
            std::mem::swap(&mut hand, &mut self.slots[slot]);
            history.push(slot);

            bucket = self.params.alternate_index(bucket, hand.fingerprint);
            if let Some(empty) = self.empty_slot(bucket) {
                self.slots[empty] = hand;
                return true;
            }
        }

        for &slot in history.iter().rev() {
            std::mem::swap(&mut hand, &mut self.slots[slot]);
        }
        debug_assert_eq!(hand, incoming);
        false
    }

    fn slot_holding(&self, bucket: usize, fingerprint: u32) -> Option<usize> {
        let start = bucket * self.params.bucket_size as usize;
        (start..start + self.params.bucket_size as usize)
            .find(|&slot| !self.slots[slot].is_empty() && self.slots[slot].fingerprint == fingerprint)
    }

    fn empty_slot(&self, bucket: usize) -> Option<usize> {
        let start = bucket * self.params.bucket_size as usize;
        (start..start + self.params.bucket_size as usize)
            .find(|&slot| self.slots[slot].is_empty())
    }
}
