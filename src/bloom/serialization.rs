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

use crate::bloom::filter::BloomParams;
use crate::codec::ByteReader;
use crate::codec::ByteWriter;
use crate::error::Error;

// Footer trailing every Bloom-family payload:
// est_elements (u64) . false_positive_rate (f32) . elements_added (u64)
pub(super) const FOOTER_BYTES: usize = 20;

pub(super) fn write_footer(writer: &mut ByteWriter, params: &BloomParams, elements_added: u64) {
    writer.write_u64(params.est_elements);
    writer.write_f32(params.false_positive_rate);
    writer.write_u64(elements_added);
}

/// Reads the trailing footer and re-derives `(m, k)` from it.
///
/// The format is versionless: the parameters are authoritative and the
/// caller must verify the payload length they imply.
pub(super) fn read_footer(bytes: &[u8]) -> Result<(BloomParams, u64), Error> {
    if bytes.len() < FOOTER_BYTES {
        return Err(Error::insufficient_data(format!(
            "footer needs {FOOTER_BYTES} bytes, file has {}",
            bytes.len()
        )));
    }

    let mut reader = ByteReader::new(&bytes[bytes.len() - FOOTER_BYTES..]);
    let est_elements = reader
        .read_u64()
        .map_err(|_| Error::insufficient_data("est_elements"))?;
    let fpr = reader
        .read_f32()
        .map_err(|_| Error::insufficient_data("false_positive_rate"))?;
    let elements_added = reader
        .read_u64()
        .map_err(|_| Error::insufficient_data("elements_added"))?;

    let params = BloomParams::new(est_elements, fpr).map_err(|err| {
        Error::persisted(format!("footer carries invalid parameters: {err}"))
    })?;
    Ok((params, elements_added))
}
