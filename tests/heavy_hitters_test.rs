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

use probables::countmin::HeavyHitters;
use probables::countmin::StreamThreshold;

#[test]
fn eviction_promotes_the_rising_key() {
    let mut hh = HeavyHitters::new(2, 1000, 5).unwrap();
    for _ in 0..10 {
        hh.add("A");
    }
    for _ in 0..20 {
        hh.add("B");
    }
    for _ in 0..15 {
        hh.add("C");
    }

    let heavy = hh.heavy_hitters();
    assert_eq!(heavy.len(), 2);
    assert!(!heavy.contains_key(b"A".as_slice()));
    assert_eq!(heavy[b"B".as_slice()], 20);
    assert_eq!(heavy[b"C".as_slice()], 15);
}

#[test]
fn bound_holds_under_churn() {
    let mut hh = HeavyHitters::new(4, 1000, 5).unwrap();
    for _round in 0..20u32 {
        for key in 0..30u32 {
            hh.add(format!("key-{key}"));
            assert!(hh.heavy_hitters().len() <= 4);
        }
    }
}

#[test]
fn dominant_key_always_surfaces() {
    let mut hh = HeavyHitters::new(2, 1000, 5).unwrap();
    // 29 light keys, then one key heavier than all of them combined.
    for key in 0..29u32 {
        hh.add(format!("light-{key}"));
    }
    for _ in 0..40 {
        hh.add("whale");
    }

    assert!(hh.heavy_hitters().contains_key(b"whale".as_slice()));
}

#[test]
fn threshold_tracking_follows_the_stream() {
    let mut st = StreamThreshold::new(5, 1000, 5).unwrap();
    for i in 0..4 {
        st.add("warm");
        assert!(st.tracked().is_empty(), "tracked too early at {i}");
    }
    st.add("warm");
    assert_eq!(st.tracked()[b"warm".as_slice()], 5);

    st.remove("warm");
    assert!(st.tracked().is_empty());
    assert_eq!(st.query("warm"), 4);
}

#[test]
fn views_persist_their_sketch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sketch.cms");

    let mut hh = HeavyHitters::new(2, 1000, 5).unwrap();
    for _ in 0..12 {
        hh.add("popular");
    }
    hh.export(&path).unwrap();

    let restored = HeavyHitters::from_path(&path, 2).unwrap();
    assert_eq!(restored.query("popular"), 12);
    assert!(restored.heavy_hitters().is_empty());

    let restored = StreamThreshold::from_path(&path, 10).unwrap();
    assert_eq!(restored.query("popular"), 12);
    assert!(restored.tracked().is_empty());
}
