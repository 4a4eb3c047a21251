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

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use byteorder::LittleEndian;
use byteorder::WriteBytesExt;
use memmap2::MmapMut;

use crate::bloom::filter::BloomParams;
use crate::bloom::serialization::FOOTER_BYTES;
use crate::bloom::serialization::read_footer;
use crate::common::BitStore;
use crate::error::Error;
use crate::hash::Fnv1aHasher;
use crate::hash::KeyHasher;

/// [`BitStore`] over a writable memory mapping of a filter file.
///
/// Only the leading `ceil(m/8)` bytes are bit-addressable; the trailing
/// footer is managed by the owning filter.
#[derive(Debug)]
struct MmapBitArray {
    mmap: MmapMut,
    byte_length: usize,
}

impl BitStore for MmapBitArray {
    fn get_bit(&self, index: u64) -> bool {
        let byte = self.mmap[(index / 8) as usize];
        (byte >> (index % 8)) & 1 != 0
    }

    fn set_bit(&mut self, index: u64) {
        self.mmap[(index / 8) as usize] |= 1 << (index % 8);
    }

    fn popcount(&self) -> u64 {
        self.mmap[..self.byte_length]
            .iter()
            .map(|b| u64::from(b.count_ones()))
            .sum()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.mmap.flush()
    }
}

/// A Bloom filter whose bit array lives in a memory-mapped file.
///
/// The file layout is exactly the in-memory export format (bit array then
/// footer), so a file written here loads with `BloomFilter::from_path` and
/// vice versa. Bit updates land in the mapping in place; the insertion
/// counter is rewritten into the trailing footer on every add, and the
/// mapping is flushed on [`sync`](Self::sync), [`close`](Self::close), and
/// drop.
#[derive(Debug)]
pub struct BloomFilterOnDisk<H = Fnv1aHasher> {
    params: BloomParams,
    bits: MmapBitArray,
    elements_added: u64,
    path: PathBuf,
    hasher: H,
}

impl BloomFilterOnDisk {
    /// Creates a fresh filter file at `path` and maps it.
    pub fn create(
        path: impl AsRef<Path>,
        est_elements: u64,
        false_positive_rate: f32,
    ) -> Result<Self, Error> {
        Self::create_with_hasher(path, est_elements, false_positive_rate, Fnv1aHasher)
    }

    /// Maps an existing filter file written by this type or exported by an
    /// in-memory filter.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with_hasher(path, Fnv1aHasher)
    }
}

impl<H: KeyHasher> BloomFilterOnDisk<H> {
    pub fn create_with_hasher(
        path: impl AsRef<Path>,
        est_elements: u64,
        false_positive_rate: f32,
        hasher: H,
    ) -> Result<Self, Error> {
        let params = BloomParams::new(est_elements, false_positive_rate)?;
        let path = path.as_ref().to_path_buf();

        let mut file = open_rw(&path, true)?;
        let write = |file: &mut File| -> io::Result<()> {
            file.write_all(&vec![0u8; params.byte_length()])?;
            file.write_u64::<LittleEndian>(params.est_elements)?;
            file.write_f32::<LittleEndian>(params.false_positive_rate)?;
            file.write_u64::<LittleEndian>(0)?;
            file.flush()
        };
        write(&mut file).map_err(|err| map_io("failed to initialize filter file", &path, err))?;

        let bits = map_file(&file, params.byte_length(), &path)?;
        Ok(Self {
            params,
            bits,
            elements_added: 0,
            path,
            hasher,
        })
    }

    pub fn open_with_hasher(path: impl AsRef<Path>, hasher: H) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = open_rw(&path, false)?;
        let len = file
            .metadata()
            .map_err(|err| map_io("failed to stat filter file", &path, err))?
            .len() as usize;

        if len < FOOTER_BYTES {
            return Err(Error::insufficient_data(format!(
                "file is {len} bytes, footer needs {FOOTER_BYTES}"
            )));
        }

        // Footer first: it declares the parameters the payload must match.
        let bits = map_file(&file, len - FOOTER_BYTES, &path)?;
        let (params, elements_added) = read_footer(&bits.mmap)?;
        if params.byte_length() != len - FOOTER_BYTES {
            return Err(Error::size_mismatch(
                params.byte_length() + FOOTER_BYTES,
                len,
            ));
        }

        Ok(Self {
            params,
            bits,
            elements_added,
            path,
            hasher,
        })
    }

    /// Inserts a key and returns the updated insertion counter. The bit
    /// and counter writes go straight into the mapping.
    pub fn add(&mut self, key: impl AsRef<[u8]>) -> u64 {
        let hashes = self.hash(key.as_ref());
        self.add_hashes(&hashes)
    }

    pub fn add_hashes(&mut self, hashes: &[u64]) -> u64 {
        self.params.set_positions(&mut self.bits, hashes);
        self.elements_added += 1;

        let offset = self.bits.byte_length + 12;
        self.bits.mmap[offset..offset + 8].copy_from_slice(&self.elements_added.to_le_bytes());
        self.elements_added
    }

    pub fn check(&self, key: impl AsRef<[u8]>) -> bool {
        let hashes = self.hash(key.as_ref());
        self.check_hashes(&hashes)
    }

    pub fn check_hashes(&self, hashes: &[u64]) -> bool {
        self.params.all_positions_set(&self.bits, hashes)
    }

    pub fn hash(&self, key: &[u8]) -> Vec<u64> {
        self.hasher.hash_many(key, self.params.num_hashes as usize)
    }

    pub fn estimate_elements(&self) -> u64 {
        self.params
            .estimate_elements(self.bits.popcount(), self.elements_added)
    }

    pub fn current_false_positive_rate(&self) -> f64 {
        self.params.false_positive_rate_for(self.elements_added)
    }

    pub fn elements_added(&self) -> u64 {
        self.elements_added
    }

    pub fn est_elements(&self) -> u64 {
        self.params.est_elements
    }

    pub fn false_positive_rate(&self) -> f32 {
        self.params.false_positive_rate
    }

    pub fn num_bits(&self) -> u64 {
        self.params.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.params.num_hashes
    }

    /// Flushes the mapping to the file.
    pub fn sync(&mut self) -> Result<(), Error> {
        self.bits
            .flush()
            .map_err(|err| map_io("failed to flush filter mapping", &self.path, err))
    }

    /// Flushes and unmaps. Dropping does the same, but only `close`
    /// reports a failed flush.
    pub fn close(mut self) -> Result<(), Error> {
        self.sync()
    }
}

impl<H> Drop for BloomFilterOnDisk<H> {
    fn drop(&mut self) {
        if let Err(err) = self.bits.flush() {
            log::error!(
                "failed to flush bloom filter mapping for {}: {err}",
                self.path.display()
            );
        }
    }
}

fn open_rw(path: &Path, create: bool) -> Result<File, Error> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(create)
        .truncate(create)
        .open(path)
        .map_err(|err| map_io("failed to open filter file", path, err))
}

fn map_file(file: &File, byte_length: usize, path: &Path) -> Result<MmapBitArray, Error> {
    // Mapping a file we just opened read-write; the mapping never outlives
    // the owning filter.
    #[allow(unsafe_code)]
    let mmap = unsafe { MmapMut::map_mut(file) }
        .map_err(|err| map_io("failed to map filter file", path, err))?;
    Ok(MmapBitArray { mmap, byte_length })
}

fn map_io(message: &'static str, path: &Path, err: io::Error) -> Error {
    Error::persisted(message)
        .with_context("path", path.display())
        .with_source(err)
}
