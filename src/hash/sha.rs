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

use sha2::Digest;
use sha2::Sha256;

use crate::hash::KeyHasher;

/// SHA-256-based hash family.
///
/// Round `i` digests the big-endian 8-byte encoding of `i` followed by the
/// key, and keeps the low 64 bits of the 256-bit digest (its last eight
/// bytes, big-endian). Slower than the FNV family but independent of it,
/// which is useful when two structures over the same keys must not share
/// collision patterns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sha256Hasher;

impl KeyHasher for Sha256Hasher {
    fn hash_many(&self, key: &[u8], depth: usize) -> Vec<u64> {
        let mut hashes = Vec::with_capacity(depth);
        for i in 0..depth {
            let mut digest = Sha256::new();
            digest.update((i as u64).to_be_bytes());
            digest.update(key);
            let out = digest.finalize();

            let mut low = [0u8; 8];
            low.copy_from_slice(&out[24..32]);
            hashes.push(u64::from_be_bytes(low));
        }
        hashes
    }
}
