// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Export driver: census, renumbering, one allocation, then encoding.

use bytes::Bytes;

use super::census::Census;
use super::cursor::DiskWriter;
use super::encode::Encoder;
use super::header::{DiskHeader, HEADER_BYTES};
use super::payload::PayloadWriter;
use super::renumber::Renumbering;
use super::ExportOptions;
use crate::error::{Error, Result};
use crate::kind::{ARRAY_HEADER_BYTES, DOUBLE_BYTES};
use crate::model::Model;

/// Encodes `model` into a freshly allocated buffer.
///
/// Every length in the model is multiplied by `options.local2mm` on the
/// way out. Records are written in descending subscript order; each lands
/// at its kind's body offset plus its index within the kind, so the result
/// does not depend on that order.
pub fn export_model(model: &Model, options: &ExportOptions) -> Result<Bytes> {
    let scale = options.local2mm;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::InvalidScale(scale));
    }

    let census = Census::take(model)?;
    let (renum, alloc) = Renumbering::assign(&census)?;
    let header = DiskHeader::new(renum.counts);

    let fixed = header.fixed_bytes();
    let tail = u64::from(census.arrays) * ARRAY_HEADER_BYTES as u64
        + census.doubles * DOUBLE_BYTES as u64;
    let total = usize::try_from(fixed + tail).map_err(|_| Error::Allocation { bytes: usize::MAX })?;
    let fixed = fixed as usize;

    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(total)
        .map_err(|_| Error::Allocation { bytes: total })?;
    buf.resize(total, 0);

    let (head, tail) = buf.split_at_mut(fixed);
    let (header_bytes, body) = head.split_at_mut(HEADER_BYTES);
    let mut w = DiskWriter::new(header_bytes, 0);
    header.write(&mut w)?;
    w.finish()?;

    let encoder = Encoder::new(model, &renum, scale)?;
    let mut payload = PayloadWriter::new(tail, fixed, alloc);
    for &node in renum.ordered.iter().rev() {
        let at = renum.record_offset(node)?;
        let size = node.kind().disk_size();
        let offset = HEADER_BYTES + at;
        let record = body
            .get_mut(at..at + size)
            .ok_or(Error::Truncated { offset, needed: size })?;
        encoder.encode(node, record, offset, &mut payload)?;
    }
    payload.finish()?;

    for (kind, count) in header.counts.iter().filter(|&(_, c)| c > 0) {
        tracing::trace!(kind = kind.name(), count, "exported records");
    }
    tracing::debug!(
        bytes = total,
        records = renum.max_fixed,
        arrays = census.arrays,
        scale,
        "exported model"
    );
    Ok(Bytes::from(buf))
}
