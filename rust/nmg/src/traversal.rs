// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Navigation through the use hierarchy and around edges.

use nalgebra::Point3;
use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::{LoopUseDown, Model, VertexUseParent};

impl Model {
    /// Returns the coordinates of a vertex, if it has any.
    pub fn vertex_point(&self, key: VertexKey) -> Option<Point3<f64>> {
        let g = self.vertices.get(key)?.geom?;
        self.vertex_geoms.get(g).map(|g| g.coord)
    }

    /// Returns the coordinates of the vertex a vertexuse refers to.
    pub fn vertexuse_point(&self, key: VertexUseKey) -> Option<Point3<f64>> {
        self.vertex_point(self.vertexuses.get(key)?.vertex)
    }

    /// Vertex an edgeuse starts at.
    pub fn edgeuse_start(&self, key: EdgeUseKey) -> Option<VertexKey> {
        let vu = self.edgeuses.get(key)?.vertexuse;
        self.vertexuses.get(vu).map(|vu| vu.vertex)
    }

    /// Vertex an edgeuse ends at (the start of its mate).
    pub fn edgeuse_end(&self, key: EdgeUseKey) -> Option<VertexKey> {
        self.edgeuse_start(self.edgeuses.get(key)?.mate)
    }

    /// Vertices of a loopuse in traversal order.
    pub fn loopuse_vertices(&self, key: LoopUseKey) -> Result<Vec<VertexKey>> {
        let lu = self.loopuses.get(key).ok_or(Error::LoopUseNotFound(key))?;
        match &lu.down {
            LoopUseDown::Vertex(vu) => {
                let vu = self.vertexuses.get(*vu).ok_or(Error::VertexUseNotFound(*vu))?;
                Ok(vec![vu.vertex])
            }
            LoopUseDown::Edges(eus) => eus
                .iter()
                .map(|&eu| self.edgeuse_start(eu).ok_or(Error::EdgeUseNotFound(eu)))
                .collect(),
        }
    }

    /// Walks around the edge of `start`, alternating radial and mate steps,
    /// and returns every use visited in walk order.
    ///
    /// Fails when the walk does not come back to `start` within the number of
    /// edgeuses in the model.
    pub fn radial_ring(&self, start: EdgeUseKey) -> Result<Vec<EdgeUseKey>> {
        let mut ring = Vec::new();
        let mut cur = start;
        loop {
            let eu = self.edgeuses.get(cur).ok_or(Error::EdgeUseNotFound(cur))?;
            ring.push(cur);
            let radial = eu.radial;
            let r = self
                .edgeuses
                .get(radial)
                .ok_or(Error::EdgeUseNotFound(radial))?;
            ring.push(radial);
            cur = r.mate;
            if cur == start {
                return Ok(ring);
            }
            if ring.len() >= self.edgeuses.len() {
                return Err(Error::invariant(format!(
                    "radial ring around {start:?} does not close"
                )));
            }
        }
    }

    /// All uses of an edge, found by walking its radial ring.
    pub fn edge_uses(&self, key: EdgeKey) -> Result<Vec<EdgeUseKey>> {
        let edge = self
            .edges
            .get(key)
            .ok_or_else(|| Error::invariant(format!("edge {key:?} not found")))?;
        self.radial_ring(edge.edgeuse)
    }

    /// Distinct faces with a use in `shell`.
    pub fn shell_faces(&self, key: ShellKey) -> Result<Vec<FaceKey>> {
        let shell = self.shells.get(key).ok_or(Error::ShellNotFound(key))?;
        let mut seen = FxHashSet::default();
        let mut faces = Vec::new();
        for &fu in &shell.faceuses {
            let f = self.faceuses.get(fu).ok_or(Error::FaceUseNotFound(fu))?.face;
            if seen.insert(f) {
                faces.push(f);
            }
        }
        Ok(faces)
    }

    /// An edgeuse running from `a` to `b`, if some edge already joins them.
    pub(crate) fn find_edgeuse(&self, a: VertexKey, b: VertexKey) -> Option<EdgeUseKey> {
        let vertex = self.vertices.get(a)?;
        vertex.uses.iter().find_map(|&vu| {
            let VertexUseParent::EdgeUse(eu) = self.vertexuses.get(vu)?.parent else {
                return None;
            };
            (self.edgeuse_end(eu)? == b).then_some(eu)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (Model, ShellKey, [VertexKey; 3]) {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let vs = [
            m.add_vertex(Point3::new(0.0, 0.0, 0.0)),
            m.add_vertex(Point3::new(1.0, 0.0, 0.0)),
            m.add_vertex(Point3::new(0.0, 1.0, 0.0)),
        ];
        m.add_face(s, &vs).unwrap();
        (m, s, vs)
    }

    #[test]
    fn loopuse_vertices_follow_winding() {
        let (m, s, vs) = triangle();
        let fu = m.shell(s).unwrap().faceuses[0];
        let lu = m.faceuse(fu).unwrap().loopuses[0];
        assert_eq!(m.loopuse_vertices(lu).unwrap(), vs.to_vec());

        let mate_lu = m.loopuse(lu).unwrap().mate;
        assert_eq!(
            m.loopuse_vertices(mate_lu).unwrap(),
            vec![vs[0], vs[2], vs[1]]
        );
    }

    #[test]
    fn lone_face_edge_has_two_uses() {
        let (m, _, _) = triangle();
        for e in m.edge_keys() {
            assert_eq!(m.edge_uses(e).unwrap().len(), 2);
        }
    }

    #[test]
    fn find_edgeuse_is_directed() {
        let (m, _, vs) = triangle();
        let eu = m.find_edgeuse(vs[0], vs[1]).unwrap();
        assert_eq!(m.edgeuse_start(eu), Some(vs[0]));
        assert_eq!(m.edgeuse_end(eu), Some(vs[1]));
        let back = m.find_edgeuse(vs[1], vs[0]).unwrap();
        assert_eq!(m.edgeuse(eu).unwrap().mate, back);
    }

    #[test]
    fn shell_faces_are_distinct() {
        let (m, s, _) = triangle();
        assert_eq!(m.shell_faces(s).unwrap().len(), 1);
    }
}
