// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounds-checked big-endian cursors over disk bytes.
//!
//! All multi-byte integers are big-endian `u32`, all floating values
//! big-endian IEEE-754 doubles. Every read and write checks the remaining
//! length first and reports [`Error::Truncated`] with the absolute offset.

use bytes::{Buf, BufMut};
use nalgebra::{Point3, Vector3};

use crate::error::{Error, Result};
use crate::kind::{NodeKind, DISK_INDEX_LISTHEAD, DISK_INDEX_NULL};

/// One `(forw, back)` list link as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    pub forw: u32,
    pub back: u32,
}

impl Link {
    /// Link of a node that is not on any list.
    pub const NULL: Link = Link {
        forw: DISK_INDEX_NULL,
        back: DISK_INDEX_NULL,
    };

    /// Head of an empty list: both ends point back at the head itself.
    pub const EMPTY_HEAD: Link = Link {
        forw: DISK_INDEX_LISTHEAD,
        back: DISK_INDEX_LISTHEAD,
    };
}

/// Writes one fixed-size region (a record or an array block).
pub(crate) struct DiskWriter<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> DiskWriter<'a> {
    /// `offset` is the absolute position of `buf` in the output, for errors.
    pub fn new(buf: &'a mut [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    fn reserve(&self, n: usize) -> Result<()> {
        if self.buf.remaining_mut() < n {
            return Err(Error::Truncated {
                offset: self.offset,
                needed: n,
            });
        }
        Ok(())
    }

    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        self.reserve(4)?;
        self.buf.put_u32(v);
        self.offset += 4;
        Ok(())
    }

    pub fn put_f64(&mut self, v: f64) -> Result<()> {
        self.reserve(8)?;
        self.buf.put_f64(v);
        self.offset += 8;
        Ok(())
    }

    pub fn put_link(&mut self, link: Link) -> Result<()> {
        self.put_u32(link.forw)?;
        self.put_u32(link.back)
    }

    pub fn put_f64s(&mut self, values: impl IntoIterator<Item = f64>) -> Result<()> {
        for v in values {
            self.put_f64(v)?;
        }
        Ok(())
    }

    pub fn put_point(&mut self, p: &Point3<f64>) -> Result<()> {
        self.put_f64s(p.coords.iter().copied())
    }

    pub fn put_vector(&mut self, v: &Vector3<f64>) -> Result<()> {
        self.put_f64s(v.iter().copied())
    }

    /// Checks that the region was filled exactly.
    pub fn finish(self) -> Result<()> {
        if self.buf.has_remaining_mut() {
            return Err(Error::invariant(format!(
                "{} bytes left unwritten at offset {}",
                self.buf.remaining_mut(),
                self.offset
            )));
        }
        Ok(())
    }
}

/// Reads from an immutable slice of disk bytes.
pub(crate) struct DiskReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> DiskReader<'a> {
    pub fn new(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::Truncated {
                offset: self.offset,
                needed: n,
            });
        }
        Ok(())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.need(4)?;
        self.offset += 4;
        Ok(self.buf.get_u32())
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        self.need(8)?;
        self.offset += 8;
        Ok(self.buf.get_f64())
    }

    pub fn get_link(&mut self) -> Result<Link> {
        let forw = self.get_u32()?;
        let back = self.get_u32()?;
        Ok(Link { forw, back })
    }

    pub fn get_point(&mut self) -> Result<Point3<f64>> {
        Ok(Point3::new(self.get_f64()?, self.get_f64()?, self.get_f64()?))
    }

    pub fn get_vector(&mut self) -> Result<Vector3<f64>> {
        Ok(Vector3::new(self.get_f64()?, self.get_f64()?, self.get_f64()?))
    }

    pub fn get_f64s(&mut self, count: usize) -> Result<Vec<f64>> {
        let bytes = count.checked_mul(8).ok_or(Error::Truncated {
            offset: self.offset,
            needed: usize::MAX,
        })?;
        self.need(bytes)?;
        (0..count).map(|_| self.get_f64()).collect()
    }

    /// Reads a magic number and checks it against `kind`.
    pub fn expect_magic(&mut self, kind: NodeKind) -> Result<()> {
        let offset = self.offset;
        let found = self.get_u32()?;
        if found != kind.disk_magic() {
            return Err(Error::BadMagic {
                kind,
                offset,
                found,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_big_endian() {
        let mut buf = [0u8; 12];
        let mut w = DiskWriter::new(&mut buf, 0);
        w.put_u32(0x0102_0304).unwrap();
        w.put_f64(1.0).unwrap();
        w.finish().unwrap();
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        assert_eq!(&buf[4..], &1.0f64.to_be_bytes());
    }

    #[test]
    fn writer_reports_overflow_and_underfill() {
        let mut buf = [0u8; 6];
        let mut w = DiskWriter::new(&mut buf, 100);
        w.put_u32(7).unwrap();
        assert!(matches!(
            w.put_u32(8),
            Err(Error::Truncated { offset: 104, needed: 4 })
        ));
        assert!(w.finish().is_err());
    }

    #[test]
    fn reader_round_trips_and_truncates() {
        let mut buf = [0u8; 16];
        let mut w = DiskWriter::new(&mut buf, 0);
        w.put_link(Link::EMPTY_HEAD).unwrap();
        w.put_f64(-2.5).unwrap();
        w.finish().unwrap();

        let mut r = DiskReader::new(&buf, 0);
        assert_eq!(r.get_link().unwrap(), Link::EMPTY_HEAD);
        assert_eq!(r.get_f64().unwrap(), -2.5);
        assert_eq!(r.remaining(), 0);
        assert!(matches!(r.get_u32(), Err(Error::Truncated { offset: 16, .. })));
    }

    #[test]
    fn magic_mismatch_is_reported() {
        let buf = NodeKind::Edge.disk_magic().to_be_bytes();
        let mut r = DiskReader::new(&buf, 40);
        assert!(matches!(
            r.expect_magic(NodeKind::Vertex),
            Err(Error::BadMagic { kind: NodeKind::Vertex, offset: 40, .. })
        ));
    }
}
