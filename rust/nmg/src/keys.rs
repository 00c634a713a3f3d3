// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key types for arena-based NMG storage.
//!
//! Every node kind lives in its own `slotmap::SlotMap`, so every kind gets its
//! own type-safe key. [`NodeRef`] erases the kind so that generic passes (the
//! export census, the renumbering table) can talk about any node at all.

use slotmap::new_key_type;

use crate::kind::NodeKind;

new_key_type! {
    /// Key for a region (a set of shells).
    pub struct RegionKey;

    /// Key for a shell (faces, wire loops, wire edges, or a lone vertex).
    pub struct ShellKey;

    /// Key for a directed use of a face.
    pub struct FaceUseKey;

    /// Key for an undirected face.
    pub struct FaceKey;

    /// Key for a plane equation shared by coplanar faces.
    pub struct FacePlaneKey;

    /// Key for a NURBS surface shared by faces.
    pub struct FaceSnurbKey;

    /// Key for a directed use of a loop.
    pub struct LoopUseKey;

    /// Key for an undirected loop.
    pub struct LoopKey;

    /// Key for a directed use of an edge.
    pub struct EdgeUseKey;

    /// Key for an undirected edge.
    pub struct EdgeKey;

    /// Key for line-segment edge geometry.
    pub struct EdgeLineKey;

    /// Key for NURBS curve edge geometry.
    pub struct EdgeCurveKey;

    /// Key for a use of a vertex.
    pub struct VertexUseKey;

    /// Key for a vertexuse surface normal attribute.
    pub struct VertexUsePlaneKey;

    /// Key for a vertexuse curve parameter attribute.
    pub struct VertexUseCurveKey;

    /// Key for an undirected vertex.
    pub struct VertexKey;

    /// Key for the coordinates of a vertex.
    pub struct VertexGeomKey;
}

/// A reference to any node of the graph.
///
/// The three derived kinds are named after the node whose cached bounding
/// box they stand for; they exist only so the export census can classify and
/// then drop them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Model,
    Region(RegionKey),
    RegionGeom(RegionKey),
    Shell(ShellKey),
    ShellGeom(ShellKey),
    FaceUse(FaceUseKey),
    Face(FaceKey),
    FacePlane(FacePlaneKey),
    FaceSnurb(FaceSnurbKey),
    LoopUse(LoopUseKey),
    Loop(LoopKey),
    LoopGeom(LoopKey),
    EdgeUse(EdgeUseKey),
    Edge(EdgeKey),
    EdgeLine(EdgeLineKey),
    EdgeCurve(EdgeCurveKey),
    VertexUse(VertexUseKey),
    VertexUsePlane(VertexUsePlaneKey),
    VertexUseCurve(VertexUseCurveKey),
    Vertex(VertexKey),
    VertexGeom(VertexGeomKey),
}

impl NodeRef {
    /// Returns the node kind this reference points at.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Model => NodeKind::Model,
            NodeRef::Region(_) => NodeKind::Region,
            NodeRef::RegionGeom(_) => NodeKind::RegionGeom,
            NodeRef::Shell(_) => NodeKind::Shell,
            NodeRef::ShellGeom(_) => NodeKind::ShellGeom,
            NodeRef::FaceUse(_) => NodeKind::FaceUse,
            NodeRef::Face(_) => NodeKind::Face,
            NodeRef::FacePlane(_) => NodeKind::FacePlaneGeom,
            NodeRef::FaceSnurb(_) => NodeKind::FaceSnurbGeom,
            NodeRef::LoopUse(_) => NodeKind::LoopUse,
            NodeRef::Loop(_) => NodeKind::Loop,
            NodeRef::LoopGeom(_) => NodeKind::LoopGeom,
            NodeRef::EdgeUse(_) => NodeKind::EdgeUse,
            NodeRef::Edge(_) => NodeKind::Edge,
            NodeRef::EdgeLine(_) => NodeKind::EdgeLineGeom,
            NodeRef::EdgeCurve(_) => NodeKind::EdgeCurveGeom,
            NodeRef::VertexUse(_) => NodeKind::VertexUse,
            NodeRef::VertexUsePlane(_) => NodeKind::VertexUsePlaneGeom,
            NodeRef::VertexUseCurve(_) => NodeKind::VertexUseCurveGeom,
            NodeRef::Vertex(_) => NodeKind::Vertex,
            NodeRef::VertexGeom(_) => NodeKind::VertexGeom,
        }
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.kind(), self)
    }
}

macro_rules! node_ref_from {
    ($($key:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$key> for NodeRef {
                fn from(k: $key) -> Self {
                    NodeRef::$variant(k)
                }
            }

            impl TryFrom<NodeRef> for $key {
                type Error = NodeRef;

                fn try_from(node: NodeRef) -> Result<Self, NodeRef> {
                    match node {
                        NodeRef::$variant(k) => Ok(k),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

node_ref_from! {
    RegionKey => Region,
    ShellKey => Shell,
    FaceUseKey => FaceUse,
    FaceKey => Face,
    FacePlaneKey => FacePlane,
    FaceSnurbKey => FaceSnurb,
    LoopUseKey => LoopUse,
    LoopKey => Loop,
    EdgeUseKey => EdgeUse,
    EdgeKey => Edge,
    EdgeLineKey => EdgeLine,
    EdgeCurveKey => EdgeCurve,
    VertexUseKey => VertexUse,
    VertexUsePlaneKey => VertexUsePlane,
    VertexUseCurveKey => VertexUseCurve,
    VertexKey => Vertex,
    VertexGeomKey => VertexGeom,
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn node_ref_reports_kind() {
        let mut shells: SlotMap<ShellKey, ()> = SlotMap::with_key();
        let sk = shells.insert(());

        assert_eq!(NodeRef::from(sk).kind(), NodeKind::Shell);
        assert_eq!(NodeRef::ShellGeom(sk).kind(), NodeKind::ShellGeom);
        assert_eq!(NodeRef::Model.kind(), NodeKind::Model);
    }

    #[test]
    fn typed_keys_come_back_out() {
        let mut edges: SlotMap<EdgeKey, ()> = SlotMap::with_key();
        let ek = edges.insert(());
        assert_eq!(EdgeKey::try_from(NodeRef::Edge(ek)), Ok(ek));
        assert_eq!(VertexKey::try_from(NodeRef::Model), Err(NodeRef::Model));
    }

    #[test]
    fn derived_refs_are_distinct_from_owner() {
        let mut loops: SlotMap<LoopKey, ()> = SlotMap::with_key();
        let lk = loops.insert(());
        assert_ne!(NodeRef::Loop(lk), NodeRef::LoopGeom(lk));
    }
}
