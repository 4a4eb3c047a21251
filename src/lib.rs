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

//! Probabilistic set-membership and frequency-estimation sketches.
//!
//! The crate provides three sketch families over a shared hashing substrate:
//!
//! - [`bloom`]: the classical Bloom filter plus counting, expanding,
//!   rotating, and memory-mapped on-disk variants.
//! - [`countmin`]: the Count-Min sketch with min / mean / mean-min query
//!   policies, and the heavy-hitters and stream-threshold views built on it.
//! - [`cuckoo`]: the cuckoo filter and its counting variant.
//!
//! All structures hash keys through the [`hash::KeyHasher`] contract
//! (FNV-1a-seeded by default, SHA-256 available, user hashers liftable via
//! adapters) and serialize to compact little-endian formats that round-trip
//! bit-exactly through both byte buffers and files.
//!
//! # Usage
//!
//! ```rust
//! use probables::bloom::BloomFilter;
//!
//! let mut filter = BloomFilter::new(50, 0.05).unwrap();
//! filter.add("google.com");
//!
//! assert!(filter.check("google.com"));
//! assert!(!filter.check("facebook.com"));
//! ```

pub mod bloom;
pub mod common;
pub mod countmin;
pub mod cuckoo;
pub mod error;
pub mod hash;

pub(crate) mod codec;
