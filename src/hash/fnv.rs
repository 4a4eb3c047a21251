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

use crate::hash::KeyHasher;

/// FNV-1a 64-bit offset basis; also the initial seed of the depth chain.
pub const FNV_OFFSET_BASIS: u64 = 0xCBF2_9CE4_8422_2325;

/// FNV-1a 64-bit prime.
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Seeded FNV-1a over `key`: starting from `seed`, XOR each byte into the
/// running hash and multiply by the FNV prime (mod 2^64).
///
/// With `seed` = [`FNV_OFFSET_BASIS`] this is plain FNV-1a 64. The function
/// is part of the on-disk contract: cuckoo filters derive their second
/// candidate bucket by hashing fingerprint bytes through it.
pub fn fnv_1a(key: &[u8], seed: u64) -> u64 {
    let mut hash = seed;
    for &byte in key {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The default hash family: seed-chained FNV-1a.
///
/// Round `i` runs FNV-1a over the key seeded with the previous round's
/// output (`h_{-1}` being the offset basis), so any requested depth yields
/// a deterministic, platform-independent vector. Structures that do not
/// record a hash identity on disk assume this family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fnv1aHasher;

impl KeyHasher for Fnv1aHasher {
    fn hash_many(&self, key: &[u8], depth: usize) -> Vec<u64> {
        let mut hashes = Vec::with_capacity(depth);
        let mut seed = FNV_OFFSET_BASIS;
        for _ in 0..depth {
            let hash = fnv_1a(key, seed);
            hashes.push(hash);
            seed = hash;
        }
        hashes
    }
}
