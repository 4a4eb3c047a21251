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

//! The multi-depth hashing substrate shared by every sketch.
//!
//! A [`KeyHasher`] turns a key into an ordered vector of 64-bit hashes,
//! one per requested depth. The vector is deterministic in (key, depth)
//! and identical across platforms; string keys hash through their UTF-8
//! bytes, so equal byte content always yields equal hashes.
//!
//! Two families ship with the crate: [`Fnv1aHasher`] (the default, and the
//! family assumed by on-disk formats that carry no hash identity) and
//! [`Sha256Hasher`]. User hash functions are lifted into the multi-depth
//! contract with [`SeedChainHasher`] (for seeded scalar hashers) or
//! [`DigestHasher`] (for digest-style byte hashers).

mod fnv;
mod sha;

pub use self::fnv::FNV_OFFSET_BASIS;
pub use self::fnv::FNV_PRIME;
pub use self::fnv::Fnv1aHasher;
pub use self::fnv::fnv_1a;
pub use self::sha::Sha256Hasher;

/// Produces `depth` 64-bit hashes for a key.
pub trait KeyHasher {
    /// Returns an ordered vector of exactly `depth` hashes for `key`.
    fn hash_many(&self, key: &[u8], depth: usize) -> Vec<u64>;
}

/// Lifts a scalar seeded hasher `f(key, seed) -> u64` into the multi-depth
/// contract by threading each output as the next round's seed.
///
/// The initial seed is [`FNV_OFFSET_BASIS`]; with `f = `[`fnv_1a`] the
/// adapter reproduces [`Fnv1aHasher`] exactly.
#[derive(Debug, Clone)]
pub struct SeedChainHasher<F> {
    func: F,
}

impl<F> SeedChainHasher<F>
where
    F: Fn(&[u8], u64) -> u64,
{
    /// Wraps a scalar seeded hash function.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> KeyHasher for SeedChainHasher<F>
where
    F: Fn(&[u8], u64) -> u64,
{
    fn hash_many(&self, key: &[u8], depth: usize) -> Vec<u64> {
        let mut hashes = Vec::with_capacity(depth);
        let mut seed = FNV_OFFSET_BASIS;
        for _ in 0..depth {
            let hash = (self.func)(key, seed);
            hashes.push(hash);
            seed = hash;
        }
        hashes
    }
}

/// Lifts a digest-style hasher `f(key) -> bytes` into the multi-depth
/// contract.
///
/// Round `i` prepends the single byte `i` to the key, digests, and reads
/// the first eight digest bytes as a little-endian u64 (zero-padded when
/// the digest is shorter).
#[derive(Debug, Clone)]
pub struct DigestHasher<F> {
    func: F,
}

impl<F> DigestHasher<F>
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    /// Wraps a digest function.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> KeyHasher for DigestHasher<F>
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    fn hash_many(&self, key: &[u8], depth: usize) -> Vec<u64> {
        let mut hashes = Vec::with_capacity(depth);
        let mut buf = Vec::with_capacity(key.len() + 1);
        for i in 0..depth {
            buf.clear();
            buf.push(i as u8);
            buf.extend_from_slice(key);

            let digest = (self.func)(&buf);
            let mut low = [0u8; 8];
            let take = digest.len().min(8);
            low[..take].copy_from_slice(&digest[..take]);
            hashes.push(u64::from_le_bytes(low));
        }
        hashes
    }
}
