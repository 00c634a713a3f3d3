// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Portable binary form of a [`Model`](crate::Model).
//!
//! ## Layout
//!
//! ```text
//! header               version + one count per fixed kind (88 bytes)
//! bodies               count[k] records of disk_size(k) bytes, kind by kind
//! arrays               "Narr" blocks of big-endian doubles, to end of buffer
//! ```
//!
//! Every record and every array has a 1-based subscript. Fixed records are
//! numbered kind by kind in canonical order, arrays continue the sequence.
//! Pointer fields hold subscripts, with `0` for null and `0xFFFF_FFFF` for
//! "the list head inside the owning record".
//!
//! Export runs census, renumbering and encoding as separate passes. Import
//! recomputes the bounding boxes the format leaves out and, unless told
//! otherwise, verifies the rebuilt graph.

mod census;
mod cursor;
mod decode;
mod encode;
mod export;
mod header;
mod payload;
mod renumber;

use nalgebra::Matrix4;

pub use decode::import_model;
pub use export::export_model;
pub use header::{DiskHeader, HEADER_BYTES};
pub use renumber::SubscriptAllocator;

use crate::error::Result;

/// Options for [`export_model`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    /// Factor converting model units to millimetres.
    pub local2mm: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { local2mm: 1.0 }
    }
}

/// Options for [`import_model`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportOptions {
    /// Applied to every piece of geometry as it is read.
    pub matrix: Matrix4<f64>,
    /// Run [`Model::validate`](crate::Model::validate) on the result.
    pub verify: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            matrix: Matrix4::identity(),
            verify: true,
        }
    }
}

impl ImportOptions {
    /// Uniform scaling, e.g. `1.0 / 25.4` to read millimetres as inches.
    pub fn scaled(scale: f64) -> Self {
        Self {
            matrix: Matrix4::new_scaling(scale),
            ..Self::default()
        }
    }

    pub fn with_matrix(mut self, matrix: Matrix4<f64>) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

/// Reads only the header of an encoded model.
pub fn describe(buf: &[u8]) -> Result<DiskHeader> {
    DiskHeader::read(buf)
}
