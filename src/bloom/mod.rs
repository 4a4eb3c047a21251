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

//! The Bloom filter family.
//!
//! [`BloomFilter`] is the classical bit-array membership sketch; the other
//! types trade space or freshness against extra capabilities:
//!
//! - [`CountingBloomFilter`] swaps bits for saturating 32-bit counters,
//!   which buys `remove` and multiplicity estimates.
//! - [`ExpandingBloomFilter`] appends sub-filters as it saturates, keeping
//!   the false-positive rate near target under unbounded insertion.
//! - [`RotatingBloomFilter`] is a bounded ring of sub-filters with
//!   age-based eviction.
//! - [`BloomFilterOnDisk`] keeps the bit array in a memory-mapped file,
//!   byte-compatible with [`BloomFilter`]'s export format.
//!
//! # Usage
//!
//! ```rust
//! use probables::bloom::BloomFilter;
//!
//! let mut filter = BloomFilter::new(1000, 0.01).unwrap();
//! filter.add("example.com");
//!
//! assert!(filter.check("example.com"));
//! assert_eq!(filter.elements_added(), 1);
//!
//! let restored = BloomFilter::from_bytes(&filter.to_bytes()).unwrap();
//! assert!(restored.check("example.com"));
//! ```

mod counting;
mod expanding;
mod filter;
mod ondisk;
mod rotating;
mod serialization;

pub use self::counting::CountingBloomFilter;
pub use self::expanding::ExpandingBloomFilter;
pub use self::filter::BloomFilter;
pub use self::ondisk::BloomFilterOnDisk;
pub use self::rotating::RotatingBloomFilter;
