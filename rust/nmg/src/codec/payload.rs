// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Variable-length double arrays.
//!
//! ```text
//! magic[4]            = "Narr" (big-endian)
//! count[4]            = number of doubles (big-endian)
//! values[8] x count   = IEEE-754 doubles (big-endian)
//! ```
//!
//! Arrays are appended to the tail region in emission order and take the
//! next subscript from the shared allocator.

use super::cursor::{DiskReader, DiskWriter};
use super::renumber::SubscriptAllocator;
use crate::error::{Error, Result};
use crate::kind::{NodeKind, ARRAY_HEADER_BYTES, DISK_DOUBLE_ARRAY_MAGIC, DOUBLE_BYTES};
use crate::nurbs::{scale_points, PointType};

/// Bytes one array of `count` doubles occupies.
pub(crate) fn array_bytes(count: usize) -> usize {
    ARRAY_HEADER_BYTES + count * DOUBLE_BYTES
}

/// Appends arrays to the tail region of an export buffer.
pub(crate) struct PayloadWriter<'a> {
    tail: &'a mut [u8],
    tail_offset: usize,
    cursor: usize,
    alloc: SubscriptAllocator,
}

impl<'a> PayloadWriter<'a> {
    /// `tail_offset` is the absolute position of `tail` in the buffer.
    pub fn new(tail: &'a mut [u8], tail_offset: usize, alloc: SubscriptAllocator) -> Self {
        Self {
            tail,
            tail_offset,
            cursor: 0,
            alloc,
        }
    }

    /// Writes one array and returns its subscript.
    ///
    /// With a point type, every coordinate but a rational weight is
    /// multiplied by `scale`; without one, every value is.
    pub fn emit(&mut self, values: &[f64], pt_type: Option<PointType>, scale: f64) -> Result<u32> {
        let bytes = array_bytes(values.len());
        let count = u32::try_from(values.len()).map_err(|_| Error::Allocation { bytes })?;
        let subscript = self.alloc.next_subscript()?;
        let end = self.cursor + bytes;
        let offset = self.tail_offset + self.cursor;
        let region = self
            .tail
            .get_mut(self.cursor..end)
            .ok_or(Error::Truncated { offset, needed: bytes })?;

        let mut w = DiskWriter::new(region, offset);
        w.put_u32(DISK_DOUBLE_ARRAY_MAGIC)?;
        w.put_u32(count)?;
        match pt_type {
            Some(pt) => w.put_f64s(scale_points(values, pt, scale))?,
            None => w.put_f64s(values.iter().map(|v| v * scale))?,
        }
        w.finish()?;

        self.cursor = end;
        tracing::trace!(subscript, count, "emitted double array");
        Ok(subscript)
    }

    /// Checks the tail was filled exactly and every subscript issued.
    pub fn finish(self) -> Result<()> {
        if self.cursor != self.tail.len() || !self.alloc.is_exhausted() {
            return Err(Error::invariant(format!(
                "variable arrays filled {} of {} tail bytes, {} subscripts issued",
                self.cursor,
                self.tail.len(),
                self.alloc.issued()
            )));
        }
        Ok(())
    }
}

/// Reads every array from `reader` to the end of the buffer.
pub(crate) fn read_arrays(reader: &mut DiskReader<'_>) -> Result<Vec<Vec<f64>>> {
    let mut arrays = Vec::new();
    while reader.remaining() > 0 {
        reader.expect_magic(NodeKind::DoubleArray)?;
        let count = reader.get_u32()? as usize;
        arrays.push(reader.get_f64s(count)?);
    }
    Ok(arrays)
}
