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

//! Count-Min sketch family for frequency estimation.
//!
//! [`CountMinSketch`] gives approximate occurrence counts for streaming
//! keys with configurable shape (or accuracy-derived shape) and a choice
//! of aggregation policy. Two views layer bookkeeping on top of it:
//! [`HeavyHitters`] maintains the top-K estimates, [`StreamThreshold`]
//! every key at or above a fixed count.
//!
//! # Usage
//!
//! ```rust
//! use probables::countmin::CountMinSketch;
//! use probables::countmin::QueryPolicy;
//!
//! let mut sketch = CountMinSketch::new(1000, 5)
//!     .unwrap()
//!     .with_policy(QueryPolicy::Min);
//!
//! sketch.add("apple");
//! sketch.add_count("banana", 3);
//!
//! assert!(sketch.query("banana") >= 3);
//! ```

mod serialization;

mod heavy_hitters;
mod sketch;
mod stream_threshold;

pub use self::heavy_hitters::HeavyHitters;
pub use self::sketch::CountMinSketch;
pub use self::sketch::QueryPolicy;
pub use self::stream_threshold::StreamThreshold;
