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

mod common;

use std::collections::HashMap;
use std::fs;

use common::corpus_words;
use googletest::assert_that;
use googletest::prelude::contains_substring;
use probables::countmin::CountMinSketch;
use probables::countmin::QueryPolicy;

#[test]
fn weighted_adds_accumulate() {
    let mut sketch = CountMinSketch::new(1000, 5).unwrap();
    assert_eq!(sketch.add_count("x", 1), 1);
    assert_eq!(sketch.add_count("x", 24), 25);
    assert_eq!(sketch.query("x"), 25);
}

#[test]
fn min_policy_upper_bounds_true_counts() {
    let mut sketch = CountMinSketch::new(64, 4).unwrap();
    let mut truth: HashMap<&str, i32> = HashMap::new();
    for (i, word) in corpus_words().into_iter().enumerate() {
        // Deterministic skewed weights.
        let weight = (i % 7 + 1) as i32;
        sketch.add_count(word, weight);
        *truth.entry(word).or_insert(0) += weight;
    }

    for (word, &count) in &truth {
        assert!(
            sketch.query(word) >= count,
            "undercounted {word}: {} < {count}",
            sketch.query(word)
        );
    }
}

#[test]
fn query_is_nondecreasing_under_add() {
    for policy in [QueryPolicy::Min, QueryPolicy::Mean, QueryPolicy::MeanMin] {
        let mut sketch = CountMinSketch::new(128, 5).unwrap().with_policy(policy);
        // Background traffic so the policies have noise to work with.
        for word in corpus_words() {
            sketch.add(word);
        }

        let mut previous = sketch.query("watched");
        for _ in 0..50 {
            sketch.add("watched");
            let current = sketch.query("watched");
            assert!(current >= previous, "{policy:?} regressed");
            previous = current;
        }
    }
}

#[test]
fn join_matches_sequential_stream() {
    let words = corpus_words();
    let (left_half, right_half) = words.split_at(words.len() / 2);

    let mut left = CountMinSketch::new(256, 5).unwrap();
    let mut right = CountMinSketch::new(256, 5).unwrap();
    let mut sequential = CountMinSketch::new(256, 5).unwrap();
    for word in left_half {
        left.add(word);
        sequential.add(word);
    }
    for word in right_half {
        right.add(word);
        sequential.add(word);
    }

    let joined = left.join(&right).unwrap();
    assert_eq!(joined.elements_added(), sequential.elements_added());
    assert_eq!(joined.to_bytes(), sequential.to_bytes());
}

#[test]
fn file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sketch.cms");

    let mut sketch = CountMinSketch::new(500, 4).unwrap();
    for word in corpus_words() {
        sketch.add(word);
    }
    sketch.export(&path).unwrap();

    let file_len = fs::metadata(&path).unwrap().len() as usize;
    assert_eq!(file_len, 16 + 500 * 4 * 4);

    let from_path = CountMinSketch::from_path(&path).unwrap();
    let from_bytes = CountMinSketch::from_bytes(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(from_path.to_bytes(), from_bytes.to_bytes());
    assert_eq!(from_path.query("truth"), sketch.query("truth"));
}

#[test]
fn short_file_reports_insufficient_data() {
    let err = CountMinSketch::from_bytes(&[1, 0, 0, 0]).unwrap_err();
    assert_that!(err.message(), contains_substring("insufficient data"));
}
