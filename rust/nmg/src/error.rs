// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for graph construction and the disk codec.

use crate::keys::{
    EdgeUseKey, FaceKey, FaceUseKey, LoopUseKey, NodeRef, RegionKey, ShellKey, VertexKey,
    VertexUseKey,
};
use crate::kind::NodeKind;

/// Result type alias for NMG operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad family an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A construction call named a missing node or built something degenerate.
    Topology,
    /// An encoded buffer is malformed.
    Format,
    /// The in-memory graph is internally inconsistent, or export options are unusable.
    Consistency,
    /// The output buffer could not be allocated.
    Allocation,
    /// A structural invariant of the graph does not hold.
    Invariant,
}

/// Errors that can occur while building, exporting or importing a model.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Topology ──────────────────────────────────────────────────────────
    #[error("region not found: {0:?}")]
    RegionNotFound(RegionKey),

    #[error("shell not found: {0:?}")]
    ShellNotFound(ShellKey),

    #[error("faceuse not found: {0:?}")]
    FaceUseNotFound(FaceUseKey),

    #[error("face not found: {0:?}")]
    FaceNotFound(FaceKey),

    #[error("loopuse not found: {0:?}")]
    LoopUseNotFound(LoopUseKey),

    #[error("edgeuse not found: {0:?}")]
    EdgeUseNotFound(EdgeUseKey),

    #[error("vertexuse not found: {0:?}")]
    VertexUseNotFound(VertexUseKey),

    #[error("vertex not found: {0:?}")]
    VertexNotFound(VertexKey),

    /// A loop needs at least three vertices.
    #[error("loop needs at least 3 vertices, got {0}")]
    DegenerateLoop(usize),

    /// Two consecutive loop vertices are the same vertex.
    #[error("loop repeats vertex {0:?} on consecutive positions")]
    RepeatedVertex(VertexKey),

    /// The face has no geometry to share or evaluate.
    #[error("face {0:?} has no geometry")]
    MissingGeometry(FaceKey),

    /// The shell already holds a lone vertexuse.
    #[error("shell {0:?} already has a lone vertexuse")]
    ShellVertexOccupied(ShellKey),

    /// Knot vector or control grid sizes do not agree with the order.
    #[error("invalid NURBS definition: {0}")]
    InvalidNurbs(String),

    // ── Format ────────────────────────────────────────────────────────────
    #[error("unsupported disk model version {0}")]
    UnsupportedVersion(u32),

    #[error("buffer truncated: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("bad magic for {kind} record at offset {offset}: 0x{found:08x}")]
    BadMagic {
        kind: NodeKind,
        offset: usize,
        found: u32,
    },

    #[error("subscript {subscript} out of range (max {max})")]
    SubscriptOutOfRange { subscript: u32, max: u32 },

    #[error("field {field} expects {expected}, subscript {subscript} is a {found}")]
    KindMismatch {
        field: &'static str,
        expected: &'static str,
        subscript: u32,
        found: NodeKind,
    },

    #[error("{kind} record has a null {field}")]
    MissingReference { kind: NodeKind, field: &'static str },

    #[error("header lists {count} {kind} records, which are never written")]
    DerivedRecords { kind: NodeKind, count: u32 },

    #[error("list head marker in non-list field {field} of a {kind} record")]
    UnexpectedListHead { kind: NodeKind, field: &'static str },

    #[error("array {subscript} holds {found} doubles, record expects {expected}")]
    ArrayLengthMismatch {
        subscript: u32,
        expected: usize,
        found: usize,
    },

    #[error("{kind} record declares a {field} array too large to address")]
    ArrayTooLarge { kind: NodeKind, field: &'static str },

    #[error("{kind} record has unknown orientation code {code}")]
    BadOrientation { kind: NodeKind, code: u32 },

    #[error("unsupported NURBS point type 0x{0:x}")]
    UnsupportedPointType(u32),

    #[error("disk model must hold exactly one model record, header says {0}")]
    ModelCount(u32),

    #[error("broken {kind} list at subscript {subscript}")]
    BrokenList { kind: NodeKind, subscript: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),

    // ── Consistency ───────────────────────────────────────────────────────
    #[error("{from} refers to missing {to}")]
    DanglingReference { from: NodeRef, to: NodeRef },

    #[error("{0} has no subscript")]
    Unregistered(NodeRef),

    #[error("{0} is linked into more than one list")]
    DuplicateListMember(NodeRef),

    #[error("invalid local-to-mm scale {0}")]
    InvalidScale(f64),

    #[error("import matrix is singular")]
    SingularMatrix,

    // ── Allocation ────────────────────────────────────────────────────────
    #[error("failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },

    // ── Invariant ─────────────────────────────────────────────────────────
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    /// Returns the family this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::RegionNotFound(_)
            | Error::ShellNotFound(_)
            | Error::FaceUseNotFound(_)
            | Error::FaceNotFound(_)
            | Error::LoopUseNotFound(_)
            | Error::EdgeUseNotFound(_)
            | Error::VertexUseNotFound(_)
            | Error::VertexNotFound(_)
            | Error::DegenerateLoop(_)
            | Error::RepeatedVertex(_)
            | Error::MissingGeometry(_)
            | Error::ShellVertexOccupied(_)
            | Error::InvalidNurbs(_) => ErrorCategory::Topology,

            Error::UnsupportedVersion(_)
            | Error::Truncated { .. }
            | Error::BadMagic { .. }
            | Error::SubscriptOutOfRange { .. }
            | Error::KindMismatch { .. }
            | Error::MissingReference { .. }
            | Error::DerivedRecords { .. }
            | Error::UnexpectedListHead { .. }
            | Error::ArrayLengthMismatch { .. }
            | Error::ArrayTooLarge { .. }
            | Error::BadOrientation { .. }
            | Error::UnsupportedPointType(_)
            | Error::ModelCount(_)
            | Error::BrokenList { .. }
            | Error::Serialization(_) => ErrorCategory::Format,

            Error::DanglingReference { .. }
            | Error::Unregistered(_)
            | Error::DuplicateListMember(_)
            | Error::InvalidScale(_)
            | Error::SingularMatrix => ErrorCategory::Consistency,

            Error::Allocation { .. } => ErrorCategory::Allocation,

            Error::Invariant(_) => ErrorCategory::Invariant,
        }
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Error::Invariant(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(Error::DegenerateLoop(2).category(), ErrorCategory::Topology);
        assert_eq!(Error::UnsupportedVersion(9).category(), ErrorCategory::Format);
        assert_eq!(Error::InvalidScale(0.0).category(), ErrorCategory::Consistency);
        assert_eq!(
            Error::Allocation { bytes: 1 }.category(),
            ErrorCategory::Allocation
        );
        assert_eq!(
            Error::invariant("x").category(),
            ErrorCategory::Invariant
        );
    }

    #[test]
    fn messages_name_the_kind() {
        let e = Error::BadMagic {
            kind: NodeKind::Shell,
            offset: 104,
            found: 0xdead_beef,
        };
        assert_eq!(
            e.to_string(),
            "bad magic for shell record at offset 104: 0xdeadbeef"
        );
    }
}
