// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Counting and classification pass.
//!
//! Visits every node reachable from the model root exactly once, in a
//! deterministic depth-first order, and tallies them per kind. NURBS
//! geometry also books the variable-length arrays it will emit.

use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::keys::NodeRef;
use crate::kind::KindCounts;
use crate::model::{LoopUseDown, Model};

/// Result of one classification walk.
#[derive(Debug, Clone)]
pub(crate) struct Census {
    /// Every reachable node in first-encounter order.
    pub order: Vec<NodeRef>,
    /// Nodes per kind, derived kinds included.
    pub counts: KindCounts,
    /// Number of double arrays the NURBS nodes will emit.
    pub arrays: u32,
    /// Total doubles across those arrays.
    pub doubles: u64,
}

impl Census {
    pub fn take(model: &Model) -> Result<Self> {
        let mut census = Census {
            order: Vec::new(),
            counts: KindCounts::default(),
            arrays: 0,
            doubles: 0,
        };
        let mut seen: FxHashSet<NodeRef> = FxHashSet::default();
        let mut stack = vec![NodeRef::Model];

        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            census.order.push(node);
            census.counts.bump(node.kind());
            census.book_arrays(model, node);

            let next = successors(model, node);
            for &to in &next {
                if !model.contains(to) {
                    return Err(Error::DanglingReference { from: node, to });
                }
            }
            stack.extend(next.into_iter().rev().filter(|n| !seen.contains(n)));
        }

        tracing::debug!(
            nodes = census.order.len(),
            arrays = census.arrays,
            doubles = census.doubles,
            "census complete"
        );
        Ok(census)
    }

    fn book_arrays(&mut self, model: &Model, node: NodeRef) {
        match node {
            NodeRef::FaceSnurb(k) => {
                if let Some(s) = model.face_snurbs.get(k) {
                    let s = &s.surface;
                    self.arrays += 3;
                    self.doubles +=
                        (s.u_knots.len() + s.v_knots.len() + s.ctl_points.len()) as u64;
                }
            }
            NodeRef::EdgeCurve(k) => {
                if let Some(c) = model.edge_curves.get(k) {
                    let c = &c.curve;
                    if !c.is_empty() {
                        self.arrays += 2;
                        self.doubles += (c.knots.len() + c.ctl_points.len()) as u64;
                    }
                }
            }
            _ => {}
        }
    }
}

/// Every node `node` points at, ownership lists first.
fn successors(model: &Model, node: NodeRef) -> Vec<NodeRef> {
    let mut out: Vec<NodeRef> = Vec::new();
    match node {
        NodeRef::Model => out.extend(model.region_list.iter().map(|&r| NodeRef::Region(r))),
        NodeRef::Region(k) => {
            if let Some(r) = model.regions.get(k) {
                out.extend(r.shells.iter().map(|&s| NodeRef::Shell(s)));
                if r.bbox.is_some() {
                    out.push(NodeRef::RegionGeom(k));
                }
            }
        }
        NodeRef::Shell(k) => {
            if let Some(s) = model.shells.get(k) {
                out.push(NodeRef::Region(s.region));
                out.extend(s.faceuses.iter().map(|&fu| NodeRef::FaceUse(fu)));
                out.extend(s.loopuses.iter().map(|&lu| NodeRef::LoopUse(lu)));
                out.extend(s.edgeuses.iter().map(|&eu| NodeRef::EdgeUse(eu)));
                out.extend(s.vertexuse.map(NodeRef::VertexUse));
                if s.bbox.is_some() {
                    out.push(NodeRef::ShellGeom(k));
                }
            }
        }
        NodeRef::FaceUse(k) => {
            if let Some(fu) = model.faceuses.get(k) {
                out.push(NodeRef::Shell(fu.shell));
                out.push(NodeRef::FaceUse(fu.mate));
                out.push(NodeRef::Face(fu.face));
                out.extend(fu.loopuses.iter().map(|&lu| NodeRef::LoopUse(lu)));
            }
        }
        NodeRef::Face(k) => {
            if let Some(f) = model.faces.get(k) {
                out.push(NodeRef::FaceUse(f.faceuse));
                out.extend(f.geom.map(NodeRef::from));
            }
        }
        NodeRef::FacePlane(k) => {
            if let Some(g) = model.face_planes.get(k) {
                out.extend(g.faces.iter().map(|&f| NodeRef::Face(f)));
            }
        }
        NodeRef::FaceSnurb(k) => {
            if let Some(g) = model.face_snurbs.get(k) {
                out.extend(g.faces.iter().map(|&f| NodeRef::Face(f)));
            }
        }
        NodeRef::LoopUse(k) => {
            if let Some(lu) = model.loopuses.get(k) {
                out.push(lu.parent.into());
                out.push(NodeRef::LoopUse(lu.mate));
                out.push(NodeRef::Loop(lu.lp));
                match &lu.down {
                    LoopUseDown::Edges(eus) => {
                        out.extend(eus.iter().map(|&eu| NodeRef::EdgeUse(eu)))
                    }
                    LoopUseDown::Vertex(vu) => out.push(NodeRef::VertexUse(*vu)),
                }
            }
        }
        NodeRef::Loop(k) => {
            if let Some(l) = model.loops.get(k) {
                out.push(NodeRef::LoopUse(l.loopuse));
                if l.bbox.is_some() {
                    out.push(NodeRef::LoopGeom(k));
                }
            }
        }
        NodeRef::EdgeUse(k) => {
            if let Some(eu) = model.edgeuses.get(k) {
                out.push(eu.parent.into());
                out.push(NodeRef::EdgeUse(eu.mate));
                out.push(NodeRef::EdgeUse(eu.radial));
                out.push(NodeRef::Edge(eu.edge));
                out.push(NodeRef::VertexUse(eu.vertexuse));
                out.extend(eu.geom.map(NodeRef::from));
            }
        }
        NodeRef::Edge(k) => {
            if let Some(e) = model.edges.get(k) {
                out.push(NodeRef::EdgeUse(e.edgeuse));
            }
        }
        NodeRef::EdgeLine(k) => {
            if let Some(g) = model.edge_lines.get(k) {
                out.extend(g.edgeuses.iter().map(|&eu| NodeRef::EdgeUse(eu)));
            }
        }
        NodeRef::EdgeCurve(k) => {
            if let Some(g) = model.edge_curves.get(k) {
                out.extend(g.edgeuses.iter().map(|&eu| NodeRef::EdgeUse(eu)));
            }
        }
        NodeRef::VertexUse(k) => {
            if let Some(vu) = model.vertexuses.get(k) {
                out.push(vu.parent.into());
                out.push(NodeRef::Vertex(vu.vertex));
                out.extend(vu.attr.map(NodeRef::from));
            }
        }
        NodeRef::Vertex(k) => {
            if let Some(v) = model.vertices.get(k) {
                out.extend(v.uses.iter().map(|&vu| NodeRef::VertexUse(vu)));
                out.extend(v.geom.map(NodeRef::VertexGeom));
            }
        }
        NodeRef::RegionGeom(_)
        | NodeRef::ShellGeom(_)
        | NodeRef::LoopGeom(_)
        | NodeRef::VertexUsePlane(_)
        | NodeRef::VertexUseCurve(_)
        | NodeRef::VertexGeom(_) => {}
    }
    out
}
