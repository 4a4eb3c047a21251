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

const CORPUS: &str = "it is a truth universally acknowledged that a single \
man in possession of a good fortune must be in want of a wife however little \
known the feelings or views of such a man may be on his first entering a \
neighbourhood this truth is so well fixed in the minds of the surrounding \
families that he is considered as the rightful property of some one or other \
of their daughters my dear mr bennet said his lady to him one day have you \
heard that netherfield park is let at last";

/// Lower-case words of a fixed text corpus, duplicates included.
pub fn corpus_words() -> Vec<&'static str> {
    CORPUS.split_whitespace().collect()
}

/// Deterministic probe keys disjoint from the corpus.
pub fn probe_keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("probe-key-{i}")).collect()
}
