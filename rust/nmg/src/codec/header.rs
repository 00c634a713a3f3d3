// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The fixed header at the front of every encoded model.
//!
//! ```text
//! version[4]          = DISK_MODEL_VERSION (big-endian)
//! count[4] x 21       = records per fixed kind, canonical order
//! ```
//!
//! The derived bounding-box kinds always count zero. The number of
//! variable-length arrays is not stored: they fill the buffer from the end
//! of the fixed bodies to its end.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::cursor::{DiskReader, DiskWriter};
use crate::error::{Error, Result};
use crate::kind::{KindCounts, NodeKind, DISK_MODEL_VERSION, FIXED_KINDS, FIXED_KIND_COUNT};

/// Bytes in the encoded header.
pub const HEADER_BYTES: usize = 4 + 4 * FIXED_KIND_COUNT;

/// Decoded header of an encoded model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskHeader {
    pub version: u32,
    pub counts: KindCounts,
}

impl DiskHeader {
    pub fn new(counts: KindCounts) -> Self {
        Self {
            version: DISK_MODEL_VERSION,
            counts,
        }
    }

    /// Parses and checks the header at the front of `buf`.
    pub fn read(buf: &[u8]) -> Result<Self> {
        let mut r = DiskReader::new(buf, 0);
        let version = r.get_u32()?;
        if version != DISK_MODEL_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let mut counts = KindCounts::default();
        for kind in FIXED_KINDS {
            counts.set(kind, r.get_u32()?);
        }
        let models = counts.get(NodeKind::Model);
        if models != 1 {
            return Err(Error::ModelCount(models));
        }
        if let Some((kind, count)) = counts.iter().find(|(k, c)| k.is_derived() && *c != 0) {
            return Err(Error::DerivedRecords { kind, count });
        }
        Ok(Self { version, counts })
    }

    pub(crate) fn write(&self, w: &mut DiskWriter<'_>) -> Result<()> {
        w.put_u32(self.version)?;
        for (_, count) in self.counts.iter() {
            w.put_u32(count)?;
        }
        Ok(())
    }

    /// Bytes from the start of the buffer to the end of the fixed bodies.
    pub fn fixed_bytes(&self) -> u64 {
        HEADER_BYTES as u64 + self.counts.body_bytes()
    }

    /// Number of subscripts taken by fixed-kind records.
    pub fn fixed_records(&self) -> u64 {
        self.counts.total()
    }

    /// Pretty JSON description: version plus a count per kind name.
    pub fn to_json(&self) -> Result<String> {
        let counts: serde_json::Map<String, serde_json::Value> = self
            .counts
            .iter()
            .map(|(k, c)| (k.name().to_string(), json!(c)))
            .collect();
        let value = json!({
            "version": self.version,
            "records": self.fixed_records(),
            "fixed_bytes": self.fixed_bytes(),
            "counts": counts,
        });
        Ok(serde_json::to_string_pretty(&value)?)
    }
}
