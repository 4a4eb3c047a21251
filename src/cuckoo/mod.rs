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

//! Cuckoo filter family: membership with deletions.
//!
//! [`CuckooFilter`] stores short key fingerprints in a two-choice bucket
//! table with bounded random eviction; [`CountingCuckooFilter`] attaches a
//! multiplicity to each stored fingerprint. Both share
//! [`CuckooFilterBuilder`] and can grow in place when the table fills.
//!
//! # Usage
//!
//! ```rust
//! use probables::cuckoo::CuckooFilter;
//!
//! let mut filter = CuckooFilter::builder()
//!     .capacity(1000)
//!     .error_rate(0.01)
//!     .build()
//!     .unwrap();
//!
//! filter.add("tcp:443").unwrap();
//! assert!(filter.check("tcp:443"));
//!
//! filter.remove("tcp:443");
//! assert!(!filter.check("tcp:443"));
//! ```

mod counting;
mod filter;

pub use self::counting::CountingCuckooFilter;
pub use self::filter::CuckooFilter;
pub use self::filter::CuckooFilterBuilder;
