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
use std::str::FromStr;

use crate::codec::ByteReader;
use crate::codec::ByteWriter;
use crate::codec::read_file;
use crate::codec::write_file;
use crate::countmin::serialization::HEADER_BYTES;
use crate::countmin::serialization::expected_len;
use crate::error::Error;
use crate::hash::Fnv1aHasher;
use crate::hash::KeyHasher;

/// How a Count-Min query aggregates its `depth` candidate cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryPolicy {
    /// Minimum cell: the classical monotone overestimate.
    #[default]
    Min,
    /// Truncated arithmetic mean of the cells.
    Mean,
    /// Median of the cells after subtracting each one's estimated noise
    /// `(n - c) / (width - 1)`.
    MeanMin,
}

impl FromStr for QueryPolicy {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self, Error> {
        match tag {
            "min" => Ok(QueryPolicy::Min),
            "mean" => Ok(QueryPolicy::Mean),
            "mean-min" => Ok(QueryPolicy::MeanMin),
            other => Err(Error::unknown_policy(other)),
        }
    }
}

/// Count-Min sketch: approximate frequency counts over a stream.
///
/// A `depth x width` matrix of 32-bit counters; each key maps to one cell
/// per row through the multi-depth hash vector. Estimates never undercount
/// under the default [`Min`](QueryPolicy::Min) policy (collisions only
/// inflate cells).
///
/// # Usage
///
/// ```rust
/// use probables::countmin::CountMinSketch;
///
/// let mut sketch = CountMinSketch::new(1000, 5).unwrap();
///
/// assert_eq!(sketch.add("x"), 1);
/// assert_eq!(sketch.add_count("x", 24), 25);
/// assert_eq!(sketch.query("x"), 25);
/// ```
#[derive(Debug, Clone)]
pub struct CountMinSketch<H = Fnv1aHasher> {
    width: u32,
    depth: u32,
    policy: QueryPolicy,
    counts: Vec<i32>,
    elements_added: i64,
    hasher: H,
}

impl CountMinSketch {
    /// Creates a sketch with an explicit `width x depth` shape.
    pub fn new(width: u32, depth: u32) -> Result<Self, Error> {
        Self::with_hasher(width, depth, Fnv1aHasher)
    }

    /// Sizes the sketch from accuracy targets:
    /// `width = ceil(e / error_rate)`, `depth = ceil(ln(1 / (1 - confidence)))`.
    pub fn with_confidence(confidence: f64, error_rate: f64) -> Result<Self, Error> {
        if !(error_rate > 0.0 && error_rate < 1.0) {
            return Err(Error::invalid_argument("error rate must be in (0, 1)")
                .with_context("error_rate", error_rate));
        }
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(Error::invalid_argument("confidence must be in (0, 1)")
                .with_context("confidence", confidence));
        }

        let width = (std::f64::consts::E / error_rate).ceil() as u32;
        let depth = (1.0 / (1.0 - confidence)).ln().ceil().max(1.0) as u32;
        Self::new(width, depth)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Self::from_bytes_with_hasher(bytes, Fnv1aHasher)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let bytes = read_file(path.as_ref())?;
        Self::from_bytes(&bytes)
    }
}

impl<H: KeyHasher> CountMinSketch<H> {
    pub fn with_hasher(width: u32, depth: u32, hasher: H) -> Result<Self, Error> {
        if width == 0 {
            return Err(Error::invalid_argument("width must be greater than 0"));
        }
        if depth == 0 {
            return Err(Error::invalid_argument("depth must be greater than 0"));
        }
        Ok(Self {
            width,
            depth,
            policy: QueryPolicy::default(),
            counts: vec![0i32; width as usize * depth as usize],
            elements_added: 0,
            hasher,
        })
    }

    /// Sets the aggregation policy used by queries.
    pub fn with_policy(mut self, policy: QueryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The persisted form does not record a policy; a restored sketch
    /// queries with the default until [`with_policy`](Self::with_policy)
    /// says otherwise.
    pub fn from_bytes_with_hasher(bytes: &[u8], hasher: H) -> Result<Self, Error> {
        if bytes.len() < HEADER_BYTES {
            return Err(Error::insufficient_data("count-min header"));
        }

        let mut reader = ByteReader::new(bytes);
        let width = reader
            .read_u32()
            .map_err(|_| Error::insufficient_data("width"))?;
        let depth = reader
            .read_u32()
            .map_err(|_| Error::insufficient_data("depth"))?;
        if width == 0 || depth == 0 {
            return Err(Error::persisted("header declares an empty matrix"));
        }
        if bytes.len() != expected_len(width, depth) {
            return Err(Error::size_mismatch(expected_len(width, depth), bytes.len()));
        }

        let elements_added = reader
            .read_i64()
            .map_err(|_| Error::insufficient_data("elements_added"))?;
        let mut counts = Vec::with_capacity(width as usize * depth as usize);
        for _ in 0..width as usize * depth as usize {
            let cell = reader
                .read_i32()
                .map_err(|_| Error::insufficient_data("matrix"))?;
            counts.push(cell);
        }

        Ok(Self {
            width,
            depth,
            policy: QueryPolicy::default(),
            counts,
            elements_added,
            hasher,
        })
    }

    /// Adds one occurrence of the key; returns the post-update estimate.
    pub fn add(&mut self, key: impl AsRef<[u8]>) -> i32 {
        self.add_count(key, 1)
    }

    /// Adds `count` occurrences of the key; cells clamp to the `i32`
    /// range. Returns the post-update estimate under the current policy.
    pub fn add_count(&mut self, key: impl AsRef<[u8]>, count: i32) -> i32 {
        let hashes = self.hash(key.as_ref());
        self.add_count_hashes(&hashes, count)
    }

    pub fn add_count_hashes(&mut self, hashes: &[u64], count: i32) -> i32 {
        self.update(hashes, i64::from(count))
    }

    /// Removes one occurrence of the key; returns the post-update
    /// estimate.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> i32 {
        self.remove_count(key, 1)
    }

    pub fn remove_count(&mut self, key: impl AsRef<[u8]>, count: i32) -> i32 {
        let hashes = self.hash(key.as_ref());
        self.remove_count_hashes(&hashes, count)
    }

    pub fn remove_count_hashes(&mut self, hashes: &[u64], count: i32) -> i32 {
        self.update(hashes, -i64::from(count))
    }

    /// Estimated occurrence count under the configured policy.
    pub fn query(&self, key: impl AsRef<[u8]>) -> i32 {
        let hashes = self.hash(key.as_ref());
        self.query_hashes(&hashes)
    }

    pub fn query_hashes(&self, hashes: &[u64]) -> i32 {
        let cells = self.cells(hashes);
        match self.policy {
            QueryPolicy::Min => cells.iter().copied().min().unwrap_or(0),
            QueryPolicy::Mean => {
                let sum: i64 = cells.iter().map(|&c| i64::from(c)).sum();
                (sum / i64::from(self.depth)) as i32
            }
            QueryPolicy::MeanMin => self.mean_min(&cells),
        }
    }

    pub fn hash(&self, key: &[u8]) -> Vec<u64> {
        self.hasher.hash_many(key, self.depth as usize)
    }

    /// Cell-wise sum of two sketches of identical shape and hash family;
    /// produces a new sketch, operands untouched.
    pub fn join(&self, other: &Self) -> Result<Self, Error>
    where
        H: Clone,
    {
        if self.width != other.width || self.depth != other.depth {
            return Err(Error::incompatible(
                "join",
                format!(
                    "{}x{} vs {}x{}",
                    self.width, self.depth, other.width, other.depth
                ),
            ));
        }

        let counts = self
            .counts
            .iter()
            .zip(&other.counts)
            .map(|(a, b)| {
                (i64::from(*a) + i64::from(*b)).clamp(i64::from(i32::MIN), i64::from(i32::MAX))
                    as i32
            })
            .collect();

        Ok(Self {
            width: self.width,
            depth: self.depth,
            policy: self.policy,
            counts,
            elements_added: self.elements_added.saturating_add(other.elements_added),
            hasher: self.hasher.clone(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn policy(&self) -> QueryPolicy {
        self.policy
    }

    /// Net inserted weight (adds minus removes).
    pub fn elements_added(&self) -> i64 {
        self.elements_added
    }

    /// `[width u32][depth u32][elements_added i64][matrix]`, little-endian,
    /// matrix row-major by depth.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(expected_len(self.width, self.depth));
        writer.write_u32(self.width);
        writer.write_u32(self.depth);
        writer.write_i64(self.elements_added);
        for &cell in &self.counts {
            writer.write_i32(cell);
        }
        writer.into_bytes()
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        write_file(path.as_ref(), &self.to_bytes())
    }

    fn update(&mut self, hashes: &[u64], delta: i64) -> i32 {
        assert!(
            hashes.len() >= self.depth as usize,
            "hash vector shorter than depth"
        );
        for row in 0..self.depth as usize {
            let index = row * self.width as usize + (hashes[row] % u64::from(self.width)) as usize;
            let cell = i64::from(self.counts[index]) + delta;
            self.counts[index] =
                cell.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        }
        self.elements_added = self.elements_added.saturating_add(delta);
        self.query_hashes(hashes)
    }

    fn cells(&self, hashes: &[u64]) -> Vec<i32> {
        assert!(
            hashes.len() >= self.depth as usize,
            "hash vector shorter than depth"
        );
        (0..self.depth as usize)
            .map(|row| {
                self.counts[row * self.width as usize
                    + (hashes[row] % u64::from(self.width)) as usize]
            })
            .collect()
    }

    // Median of per-cell noise-corrected estimates. Noise for a cell is the
    // mass the other keys are expected to have spilled into it.
    fn mean_min(&self, cells: &[i32]) -> i32 {
        let denom = i64::from(self.width.max(2) - 1);
        let mut corrected: Vec<i64> = cells
            .iter()
            .map(|&c| {
                let noise = (self.elements_added - i64::from(c)).div_euclid(denom);
                i64::from(c) - noise
            })
            .collect();
        corrected.sort_unstable();

        let mid = corrected.len() / 2;
        let median = if corrected.len() % 2 == 0 {
            (corrected[mid - 1] + corrected[mid]).div_euclid(2)
        } else {
            corrected[mid]
        };
        median.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }
}
