// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Disk record catalog.
//!
//! Static tables mapping every node kind to its on-disk record size, its
//! human-readable name, and the magic number that opens each of its records.
//! The discriminant order of [`NodeKind`] is the canonical kind order of the
//! disk format: subscripts are handed out kind by kind in this order and the
//! header lists one count per fixed kind in this order.

use serde::{Deserialize, Serialize};

/// Bytes in one disk index (a big-endian `u32`).
pub const INDEX_BYTES: usize = 4;

/// Bytes in one `(forw, back)` list link.
pub const LINK_BYTES: usize = 2 * INDEX_BYTES;

/// Bytes in one big-endian IEEE double.
pub const DOUBLE_BYTES: usize = 8;

/// Bytes in the header of one variable-length double array (magic + count).
pub const ARRAY_HEADER_BYTES: usize = 8;

/// Disk index meaning "null pointer".
pub const DISK_INDEX_NULL: u32 = 0;

/// Disk index meaning "points back at the list head embedded in the owner".
///
/// Chosen as the all-ones pattern so it can never collide with a subscript:
/// the renumbering pass refuses to hand out a subscript this large.
pub const DISK_INDEX_LISTHEAD: u32 = u32::MAX;

/// Version tag written at the front of every encoded model.
pub const DISK_MODEL_VERSION: u32 = 1;

/// Magic number opening every variable-length double array ("Narr").
pub const DISK_DOUBLE_ARRAY_MAGIC: u32 = 0x4e66_6172;

/// Every kind of node the graph (and its disk form) knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Model = 0,
    Region = 1,
    RegionGeom = 2,
    Shell = 3,
    ShellGeom = 4,
    FaceUse = 5,
    Face = 6,
    FacePlaneGeom = 7,
    FaceSnurbGeom = 8,
    LoopUse = 9,
    Loop = 10,
    LoopGeom = 11,
    EdgeUse = 12,
    Edge = 13,
    EdgeLineGeom = 14,
    EdgeCurveGeom = 15,
    VertexUse = 16,
    VertexUsePlaneGeom = 17,
    VertexUseCurveGeom = 18,
    Vertex = 19,
    VertexGeom = 20,
    /// Synthetic, disk-only kind holding a variable-length double array.
    DoubleArray = 21,
}

/// Number of fixed-size kinds (everything but [`NodeKind::DoubleArray`]).
pub const FIXED_KIND_COUNT: usize = 21;

/// Fixed-size kinds in canonical order.
pub const FIXED_KINDS: [NodeKind; FIXED_KIND_COUNT] = [
    NodeKind::Model,
    NodeKind::Region,
    NodeKind::RegionGeom,
    NodeKind::Shell,
    NodeKind::ShellGeom,
    NodeKind::FaceUse,
    NodeKind::Face,
    NodeKind::FacePlaneGeom,
    NodeKind::FaceSnurbGeom,
    NodeKind::LoopUse,
    NodeKind::Loop,
    NodeKind::LoopGeom,
    NodeKind::EdgeUse,
    NodeKind::Edge,
    NodeKind::EdgeLineGeom,
    NodeKind::EdgeCurveGeom,
    NodeKind::VertexUse,
    NodeKind::VertexUsePlaneGeom,
    NodeKind::VertexUseCurveGeom,
    NodeKind::Vertex,
    NodeKind::VertexGeom,
];

impl NodeKind {
    /// Position of this kind in the canonical order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Size in bytes of one disk record of this kind.
    ///
    /// [`NodeKind::DoubleArray`] reports zero: a single array occupies
    /// `ARRAY_HEADER_BYTES + count * DOUBLE_BYTES` bytes.
    pub const fn disk_size(self) -> usize {
        const M: usize = INDEX_BYTES;
        const L: usize = LINK_BYTES;
        const D: usize = DOUBLE_BYTES;
        match self {
            // magic, version, r_hd
            NodeKind::Model => M + 4 + L,
            // magic, l, m_p, ra_p, s_hd
            NodeKind::Region => M + L + 4 + 4 + L,
            // magic, min, max
            NodeKind::RegionGeom | NodeKind::ShellGeom | NodeKind::LoopGeom => M + 6 * D,
            // magic, l, r_p, sa_p, fu_hd, lu_hd, eu_hd, vu_p
            NodeKind::Shell => M + L + 4 + 4 + 3 * L + 4,
            // magic, l, s_p, fumate_p, orientation, f_p, lu_hd
            NodeKind::FaceUse => M + L + 4 * 4 + L,
            // magic, l, fu_p, g, flip
            NodeKind::Face => M + L + 3 * 4,
            // magic, f_hd, N
            NodeKind::FacePlaneGeom => M + L + 4 * D,
            // magic, f_hd, u/v order, u/v size, u/v knots, us/vs size, pt_type, ctl_points
            NodeKind::FaceSnurbGeom => M + L + 10 * 4,
            // magic, l, up, lumate_p, orientation, l_p, down_hd
            NodeKind::LoopUse => M + L + 4 * 4 + L,
            // magic, lu_p, lg_p
            NodeKind::Loop => M + 4 + 4,
            // magic, l, l2, up, eumate_p, radial_p, e_p, orientation, vu_p, g
            NodeKind::EdgeUse => M + 2 * L + 7 * 4,
            // magic, eu_p, is_real
            NodeKind::Edge => M + 4 + 4,
            // magic, eu_hd2, e_pt, e_dir
            NodeKind::EdgeLineGeom => M + L + 6 * D,
            // magic, eu_hd2, order, k_size, knots, c_size, pt_type, ctl_points
            NodeKind::EdgeCurveGeom => M + L + 6 * 4,
            // magic, l, up, v_p, a
            NodeKind::VertexUse => M + L + 3 * 4,
            // magic, N | param
            NodeKind::VertexUsePlaneGeom | NodeKind::VertexUseCurveGeom => M + 3 * D,
            // magic, vu_hd, vg_p
            NodeKind::Vertex => M + L + 4,
            // magic, coord
            NodeKind::VertexGeom => M + 3 * D,
            NodeKind::DoubleArray => 0,
        }
    }

    /// Human-readable name of this kind.
    pub const fn name(self) -> &'static str {
        match self {
            NodeKind::Model => "model",
            NodeKind::Region => "nmgregion",
            NodeKind::RegionGeom => "nmgregion_a",
            NodeKind::Shell => "shell",
            NodeKind::ShellGeom => "shell_a",
            NodeKind::FaceUse => "faceuse",
            NodeKind::Face => "face",
            NodeKind::FacePlaneGeom => "face_g_plane",
            NodeKind::FaceSnurbGeom => "face_g_snurb",
            NodeKind::LoopUse => "loopuse",
            NodeKind::Loop => "loop",
            NodeKind::LoopGeom => "loop_a",
            NodeKind::EdgeUse => "edgeuse",
            NodeKind::Edge => "edge",
            NodeKind::EdgeLineGeom => "edge_g_lseg",
            NodeKind::EdgeCurveGeom => "edge_g_cnurb",
            NodeKind::VertexUse => "vertexuse",
            NodeKind::VertexUsePlaneGeom => "vertexuse_a_plane",
            NodeKind::VertexUseCurveGeom => "vertexuse_a_cnurb",
            NodeKind::Vertex => "vertex",
            NodeKind::VertexGeom => "vertex_g",
            NodeKind::DoubleArray => "double_array",
        }
    }

    /// Magic number at the front of every disk record of this kind.
    pub const fn disk_magic(self) -> u32 {
        match self {
            NodeKind::Model => 0x4e6d_6f64,              // Nmod
            NodeKind::Region => 0x4e72_6567,             // Nreg
            NodeKind::RegionGeom => 0x4e72_5f61,         // Nr_a
            NodeKind::Shell => 0x4e73_686c,              // Nshl
            NodeKind::ShellGeom => 0x4e73_5f61,          // Ns_a
            NodeKind::FaceUse => 0x4e66_7520,            // Nfu
            NodeKind::Face => 0x4e66_6163,               // Nfac
            NodeKind::FacePlaneGeom => 0x4e66_6770,      // Nfgp
            NodeKind::FaceSnurbGeom => 0x4e66_6773,      // Nfgs
            NodeKind::LoopUse => 0x4e6c_7520,            // Nlu
            NodeKind::Loop => 0x4e6c_6f70,               // Nlop
            NodeKind::LoopGeom => 0x4e6c_5f67,           // Nl_g
            NodeKind::EdgeUse => 0x4e65_7520,            // Neu
            NodeKind::Edge => 0x4e65_6467,               // Nedg
            NodeKind::EdgeLineGeom => 0x4e65_676c,       // Negl
            NodeKind::EdgeCurveGeom => 0x4e65_6763,      // Negc
            NodeKind::VertexUse => 0x4e76_7520,          // Nvu
            NodeKind::VertexUsePlaneGeom => 0x4e76_7561, // Nvua
            NodeKind::VertexUseCurveGeom => 0x4e76_6163, // Nvac
            NodeKind::Vertex => 0x4e76_7274,             // Nvrt
            NodeKind::VertexGeom => 0x4e76_5f67,         // Nv_g
            NodeKind::DoubleArray => DISK_DOUBLE_ARRAY_MAGIC,
        }
    }

    /// `true` for the bounding-box kinds that are never written to disk.
    pub const fn is_derived(self) -> bool {
        matches!(
            self,
            NodeKind::RegionGeom | NodeKind::ShellGeom | NodeKind::LoopGeom
        )
    }

    /// Looks a kind up by its canonical position.
    pub fn from_index(index: usize) -> Option<NodeKind> {
        if index < FIXED_KIND_COUNT {
            Some(FIXED_KINDS[index])
        } else if index == NodeKind::DoubleArray.index() {
            Some(NodeKind::DoubleArray)
        } else {
            None
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A count per fixed kind, indexed in canonical order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts([u32; FIXED_KIND_COUNT]);

impl KindCounts {
    /// Returns the count recorded for `kind` (always zero for `DoubleArray`).
    pub fn get(&self, kind: NodeKind) -> u32 {
        self.0.get(kind.index()).copied().unwrap_or(0)
    }

    /// Sets the count for a fixed kind. Ignored for `DoubleArray`.
    pub fn set(&mut self, kind: NodeKind, count: u32) {
        if let Some(slot) = self.0.get_mut(kind.index()) {
            *slot = count;
        }
    }

    /// Increments the count for a fixed kind and returns the previous value.
    pub fn bump(&mut self, kind: NodeKind) -> u32 {
        let prev = self.get(kind);
        self.set(kind, prev + 1);
        prev
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.0.iter().map(|&c| u64::from(c)).sum()
    }

    /// Bytes occupied by all fixed-kind bodies described by these counts.
    pub fn body_bytes(&self) -> u64 {
        FIXED_KINDS
            .iter()
            .map(|&k| u64::from(self.get(k)) * k.disk_size() as u64)
            .sum()
    }

    /// Iterates `(kind, count)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeKind, u32)> + '_ {
        FIXED_KINDS.iter().map(move |&k| (k, self.get(k)))
    }
}
