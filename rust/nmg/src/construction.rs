// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction methods for NMG nodes.
//!
//! Every node is created through the model so that uses always come in mate
//! pairs, parents always list their children, and edges shared by several
//! loops carry one radial ring through all of their uses. Any structural
//! change drops the cached bounding boxes.

use nalgebra::{Point3, Vector3};

use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::*;
use crate::nurbs::{NurbsCurve, NurbsSurface};

impl Model {
    /// Appends a new, empty region to the model.
    pub fn add_region(&mut self) -> RegionKey {
        self.invalidate_bounds();
        let key = self.regions.insert(RegionData::default());
        self.region_list.push(key);
        key
    }

    /// Appends a new, empty shell to a region.
    pub fn add_shell(&mut self, region: RegionKey) -> Result<ShellKey> {
        if !self.regions.contains_key(region) {
            return Err(Error::RegionNotFound(region));
        }
        self.invalidate_bounds();
        let key = self.shells.insert(ShellData {
            region,
            ..Default::default()
        });
        self.regions[region].shells.push(key);
        Ok(key)
    }

    /// Creates a vertex at `p`.
    pub fn add_vertex(&mut self, p: Point3<f64>) -> VertexKey {
        let geom = self.vertex_geoms.insert(VertexGeomData { coord: p });
        self.vertices.insert(VertexData {
            uses: Vec::new(),
            geom: Some(geom),
        })
    }

    /// Creates a face in `shell` bounded by the loop through `verts`.
    ///
    /// Produces the face, its two faceuses (`Same` and `Opposite`), one loop
    /// with a loopuse on each side, and an edgeuse pair per side. Where an
    /// edge already joins two consecutive vertices, the new uses join that
    /// edge's radial ring instead of creating a second edge.
    pub fn add_face(&mut self, shell: ShellKey, verts: &[VertexKey]) -> Result<FaceKey> {
        if !self.shells.contains_key(shell) {
            return Err(Error::ShellNotFound(shell));
        }
        self.check_loop_vertices(verts)?;
        self.invalidate_bounds();

        let face = self.faces.insert(FaceData::default());
        let fu = self.faceuses.insert(FaceUseData {
            shell,
            orientation: Orientation::Same,
            face,
            ..Default::default()
        });
        let fum = self.faceuses.insert(FaceUseData {
            shell,
            mate: fu,
            orientation: Orientation::Opposite,
            face,
            ..Default::default()
        });
        self.faceuses[fu].mate = fum;
        self.faces[face].faceuse = fu;
        self.shells[shell].faceuses.extend([fu, fum]);

        let (lu, lum) = self.build_loop(
            LoopUseParent::FaceUse(fu),
            LoopUseParent::FaceUse(fum),
            Orientation::Same,
            verts,
        );
        self.faceuses[fu].loopuses.push(lu);
        self.faceuses[fum].loopuses.push(lum);
        Ok(face)
    }

    /// Creates a wire loop (a loop not on any face) in `shell`.
    pub fn add_wire_loop(&mut self, shell: ShellKey, verts: &[VertexKey]) -> Result<LoopUseKey> {
        if !self.shells.contains_key(shell) {
            return Err(Error::ShellNotFound(shell));
        }
        self.check_loop_vertices(verts)?;
        self.invalidate_bounds();

        let (lu, lum) = self.build_loop(
            LoopUseParent::Shell(shell),
            LoopUseParent::Shell(shell),
            Orientation::Unspec,
            verts,
        );
        self.shells[shell].loopuses.extend([lu, lum]);
        Ok(lu)
    }

    /// Creates a single-vertex loop on a faceuse (and its mate) or in a shell.
    pub fn add_vertex_loop(&mut self, parent: LoopUseParent, vertex: VertexKey) -> Result<LoopUseKey> {
        if !self.vertices.contains_key(vertex) {
            return Err(Error::VertexNotFound(vertex));
        }
        let (mate_parent, orientation) = match parent {
            LoopUseParent::FaceUse(fu) => {
                let mate = self.faceuses.get(fu).ok_or(Error::FaceUseNotFound(fu))?.mate;
                (LoopUseParent::FaceUse(mate), Orientation::Same)
            }
            LoopUseParent::Shell(s) => {
                if !self.shells.contains_key(s) {
                    return Err(Error::ShellNotFound(s));
                }
                (LoopUseParent::Shell(s), Orientation::Unspec)
            }
        };
        self.invalidate_bounds();

        let (lu, lum) = self.new_loopuse_pair(parent, mate_parent, orientation);
        for key in [lu, lum] {
            let vu = self.new_vertexuse(vertex, VertexUseParent::LoopUse(key));
            self.loopuses[key].down = LoopUseDown::Vertex(vu);
        }
        match (parent, mate_parent) {
            (LoopUseParent::FaceUse(fu), LoopUseParent::FaceUse(fum)) => {
                self.faceuses[fu].loopuses.push(lu);
                self.faceuses[fum].loopuses.push(lum);
            }
            (LoopUseParent::Shell(s), _) | (_, LoopUseParent::Shell(s)) => {
                self.shells[s].loopuses.extend([lu, lum]);
            }
        }
        Ok(lu)
    }

    /// Creates a wire edge from `a` to `b` directly in `shell`.
    pub fn add_wire_edge(&mut self, shell: ShellKey, a: VertexKey, b: VertexKey) -> Result<EdgeUseKey> {
        if !self.shells.contains_key(shell) {
            return Err(Error::ShellNotFound(shell));
        }
        for v in [a, b] {
            if !self.vertices.contains_key(v) {
                return Err(Error::VertexNotFound(v));
            }
        }
        if a == b {
            return Err(Error::RepeatedVertex(a));
        }
        self.invalidate_bounds();

        let (eu, eum) =
            self.new_edgeuse_pair(EdgeUseParent::Shell(shell), EdgeUseParent::Shell(shell), a, b);
        self.shells[shell].edgeuses.extend([eu, eum]);
        Ok(eu)
    }

    /// Gives `shell` a lone vertexuse of `vertex`.
    pub fn set_shell_vertex(&mut self, shell: ShellKey, vertex: VertexKey) -> Result<VertexUseKey> {
        let data = self.shells.get(shell).ok_or(Error::ShellNotFound(shell))?;
        if data.vertexuse.is_some() {
            return Err(Error::ShellVertexOccupied(shell));
        }
        if !self.vertices.contains_key(vertex) {
            return Err(Error::VertexNotFound(vertex));
        }
        self.invalidate_bounds();
        let vu = self.new_vertexuse(vertex, VertexUseParent::Shell(shell));
        self.shells[shell].vertexuse = Some(vu);
        Ok(vu)
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Gives `face` its own plane `normal · p = offset`.
    pub fn set_face_plane(&mut self, face: FaceKey, normal: Vector3<f64>, offset: f64) -> Result<FacePlaneKey> {
        if !self.faces.contains_key(face) {
            return Err(Error::FaceNotFound(face));
        }
        self.detach_face_geom(face);
        let key = self.face_planes.insert(FacePlaneData {
            faces: vec![face],
            normal,
            offset,
        });
        self.faces[face].geom = Some(FaceGeom::Plane(key));
        Ok(key)
    }

    /// Computes the plane of `face` from its outer loop (Newell's method)
    /// and attaches it.
    pub fn compute_face_plane(&mut self, face: FaceKey) -> Result<FacePlaneKey> {
        let data = self.faces.get(face).ok_or(Error::FaceNotFound(face))?;
        let fu = self
            .faceuses
            .get(data.faceuse)
            .ok_or(Error::FaceUseNotFound(data.faceuse))?;
        let Some(&lu) = fu.loopuses.first() else {
            return Err(Error::DegenerateLoop(0));
        };
        let points: Vec<Point3<f64>> = self
            .loopuse_vertices(lu)?
            .into_iter()
            .filter_map(|v| self.vertex_point(v))
            .collect();
        let n = points.len();
        if n < 3 {
            return Err(Error::DegenerateLoop(n));
        }

        let mut normal = Vector3::zeros();
        let mut centroid = Vector3::zeros();
        for i in 0..n {
            let curr = points[i];
            let next = points[(i + 1) % n];
            normal.x += (curr.y - next.y) * (curr.z + next.z);
            normal.y += (curr.z - next.z) * (curr.x + next.x);
            normal.z += (curr.x - next.x) * (curr.y + next.y);
            centroid += curr.coords;
        }
        let len = normal.norm();
        if len < 1e-15 {
            return Err(Error::DegenerateLoop(n));
        }
        normal /= len;
        centroid /= n as f64;
        self.set_face_plane(face, normal, normal.dot(&centroid))
    }

    /// Makes `dst` use the same geometry node as `src`.
    pub fn share_face_geometry(&mut self, dst: FaceKey, src: FaceKey) -> Result<()> {
        let geom = self
            .faces
            .get(src)
            .ok_or(Error::FaceNotFound(src))?
            .geom
            .ok_or(Error::MissingGeometry(src))?;
        if !self.faces.contains_key(dst) {
            return Err(Error::FaceNotFound(dst));
        }
        if dst == src {
            return Ok(());
        }
        self.detach_face_geom(dst);
        match geom {
            FaceGeom::Plane(k) => self.face_planes[k].faces.push(dst),
            FaceGeom::Snurb(k) => self.face_snurbs[k].faces.push(dst),
        }
        self.faces[dst].geom = Some(geom);
        Ok(())
    }

    /// Gives `face` a NURBS surface.
    pub fn set_face_snurb(&mut self, face: FaceKey, surface: NurbsSurface) -> Result<FaceSnurbKey> {
        if !self.faces.contains_key(face) {
            return Err(Error::FaceNotFound(face));
        }
        surface.check()?;
        self.detach_face_geom(face);
        let key = self.face_snurbs.insert(FaceSnurbData {
            faces: vec![face],
            surface,
        });
        self.faces[face].geom = Some(FaceGeom::Snurb(key));
        Ok(key)
    }

    /// Sets whether the face normal runs against its geometry's normal.
    pub fn set_face_flip(&mut self, face: FaceKey, flip: bool) -> Result<()> {
        self.faces.get_mut(face).ok_or(Error::FaceNotFound(face))?.flip = flip;
        Ok(())
    }

    /// Attaches the line through the endpoints of `eu` to every use of its edge.
    pub fn set_edge_line(&mut self, eu: EdgeUseKey) -> Result<EdgeLineKey> {
        let a = self.edgeuse_start(eu).ok_or(Error::EdgeUseNotFound(eu))?;
        let b = self.edgeuse_end(eu).ok_or(Error::EdgeUseNotFound(eu))?;
        let p = self.vertex_point(a).ok_or(Error::VertexNotFound(a))?;
        let q = self.vertex_point(b).ok_or(Error::VertexNotFound(b))?;

        let uses = self.radial_ring(eu)?;
        for &u in &uses {
            self.detach_edge_geom(u);
        }
        let key = self.edge_lines.insert(EdgeLineData {
            edgeuses: uses.clone(),
            point: p,
            dir: q - p,
        });
        for u in uses {
            self.edgeuses[u].geom = Some(EdgeGeom::Line(key));
        }
        Ok(key)
    }

    /// Attaches a NURBS curve to every use of the edge of `eu`.
    pub fn set_edge_curve(&mut self, eu: EdgeUseKey, curve: NurbsCurve) -> Result<EdgeCurveKey> {
        if !self.edgeuses.contains_key(eu) {
            return Err(Error::EdgeUseNotFound(eu));
        }
        curve.check()?;
        let uses = self.radial_ring(eu)?;
        for &u in &uses {
            self.detach_edge_geom(u);
        }
        let key = self.edge_curves.insert(EdgeCurveData {
            edgeuses: uses.clone(),
            curve,
        });
        for u in uses {
            self.edgeuses[u].geom = Some(EdgeGeom::Curve(key));
        }
        Ok(key)
    }

    /// Records a surface normal at a vertexuse.
    pub fn set_vertexuse_normal(&mut self, vu: VertexUseKey, normal: Vector3<f64>) -> Result<VertexUsePlaneKey> {
        if !self.vertexuses.contains_key(vu) {
            return Err(Error::VertexUseNotFound(vu));
        }
        self.detach_vertexuse_attr(vu);
        let key = self.vu_planes.insert(VertexUsePlaneData { normal });
        self.vertexuses[vu].attr = Some(VertexUseAttr::Plane(key));
        Ok(key)
    }

    /// Records a curve parameter at a vertexuse.
    pub fn set_vertexuse_param(&mut self, vu: VertexUseKey, param: [f64; 3]) -> Result<VertexUseCurveKey> {
        if !self.vertexuses.contains_key(vu) {
            return Err(Error::VertexUseNotFound(vu));
        }
        self.detach_vertexuse_attr(vu);
        let key = self.vu_curves.insert(VertexUseCurveData { param });
        self.vertexuses[vu].attr = Some(VertexUseAttr::Curve(key));
        Ok(key)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_loop_vertices(&self, verts: &[VertexKey]) -> Result<()> {
        if verts.len() < 3 {
            return Err(Error::DegenerateLoop(verts.len()));
        }
        for (i, &v) in verts.iter().enumerate() {
            if !self.vertices.contains_key(v) {
                return Err(Error::VertexNotFound(v));
            }
            if verts[(i + 1) % verts.len()] == v {
                return Err(Error::RepeatedVertex(v));
            }
        }
        Ok(())
    }

    fn new_vertexuse(&mut self, vertex: VertexKey, parent: VertexUseParent) -> VertexUseKey {
        let vu = self.vertexuses.insert(VertexUseData {
            parent,
            vertex,
            attr: None,
        });
        self.vertices[vertex].uses.push(vu);
        vu
    }

    fn new_loopuse_pair(
        &mut self,
        parent: LoopUseParent,
        mate_parent: LoopUseParent,
        orientation: Orientation,
    ) -> (LoopUseKey, LoopUseKey) {
        let lp = self.loops.insert(LoopData::default());
        let lu = self.loopuses.insert(LoopUseData {
            parent,
            orientation,
            lp,
            ..Default::default()
        });
        let lum = self.loopuses.insert(LoopUseData {
            parent: mate_parent,
            mate: lu,
            orientation,
            lp,
            ..Default::default()
        });
        self.loopuses[lu].mate = lum;
        self.loops[lp].loopuse = lu;
        (lu, lum)
    }

    /// Builds a loop through `verts` with one loopuse per side. The mate side
    /// runs the other way round, so its edgeuses are the mates in reverse.
    fn build_loop(
        &mut self,
        parent: LoopUseParent,
        mate_parent: LoopUseParent,
        orientation: Orientation,
        verts: &[VertexKey],
    ) -> (LoopUseKey, LoopUseKey) {
        let (lu, lum) = self.new_loopuse_pair(parent, mate_parent, orientation);
        let n = verts.len();
        let mut eus = Vec::with_capacity(n);
        let mut mates = Vec::with_capacity(n);
        for i in 0..n {
            let (eu, eum) = self.new_edgeuse_pair(
                EdgeUseParent::LoopUse(lu),
                EdgeUseParent::LoopUse(lum),
                verts[i],
                verts[(i + 1) % n],
            );
            eus.push(eu);
            mates.push(eum);
        }
        mates.reverse();
        self.loopuses[lu].down = LoopUseDown::Edges(eus);
        self.loopuses[lum].down = LoopUseDown::Edges(mates);
        (lu, lum)
    }

    /// Creates an edgeuse from `a` to `b` and its mate. Reuses the edge
    /// already joining `a` and `b`, if any.
    fn new_edgeuse_pair(
        &mut self,
        parent: EdgeUseParent,
        mate_parent: EdgeUseParent,
        a: VertexKey,
        b: VertexKey,
    ) -> (EdgeUseKey, EdgeUseKey) {
        let existing = self.find_edgeuse(a, b);

        let eu = self.edgeuses.insert(EdgeUseData {
            parent,
            ..Default::default()
        });
        let eum = self.edgeuses.insert(EdgeUseData {
            parent: mate_parent,
            mate: eu,
            ..Default::default()
        });
        self.edgeuses[eu].mate = eum;
        let vu_a = self.new_vertexuse(a, VertexUseParent::EdgeUse(eu));
        let vu_b = self.new_vertexuse(b, VertexUseParent::EdgeUse(eum));
        self.edgeuses[eu].vertexuse = vu_a;
        self.edgeuses[eum].vertexuse = vu_b;

        match existing {
            // `other` runs a -> b like `eu`; its mate runs the opposite way.
            Some(other) => {
                let dst = self.edgeuses[other].mate;
                self.join_radial(dst, eu);
            }
            None => {
                let edge = self.edges.insert(EdgeData {
                    edgeuse: eu,
                    is_real: true,
                });
                for (k, radial) in [(eu, eum), (eum, eu)] {
                    let data = &mut self.edgeuses[k];
                    data.edge = edge;
                    data.radial = radial;
                }
            }
        }
        (eu, eum)
    }

    /// Splices `src` and its mate into the radial ring of `dst`, which must
    /// run opposite to `src`.
    fn join_radial(&mut self, dst: EdgeUseKey, src: EdgeUseKey) {
        let src_mate = self.edgeuses[src].mate;
        let old = self.edgeuses[dst].radial;
        let edge = self.edgeuses[dst].edge;
        let geom = self.edgeuses[dst].geom;

        self.edgeuses[src].radial = dst;
        self.edgeuses[src_mate].radial = old;
        self.edgeuses[old].radial = src_mate;
        self.edgeuses[dst].radial = src;

        for k in [src, src_mate] {
            let data = &mut self.edgeuses[k];
            data.edge = edge;
            data.geom = geom;
        }
        match geom {
            Some(EdgeGeom::Line(g)) => self.edge_lines[g].edgeuses.extend([src, src_mate]),
            Some(EdgeGeom::Curve(g)) => self.edge_curves[g].edgeuses.extend([src, src_mate]),
            None => {}
        }
    }

    fn detach_face_geom(&mut self, face: FaceKey) {
        let Some(geom) = self.faces.get_mut(face).and_then(|f| f.geom.take()) else {
            return;
        };
        match geom {
            FaceGeom::Plane(k) => {
                if let Some(g) = self.face_planes.get_mut(k) {
                    g.faces.retain(|&f| f != face);
                    if g.faces.is_empty() {
                        self.face_planes.remove(k);
                    }
                }
            }
            FaceGeom::Snurb(k) => {
                if let Some(g) = self.face_snurbs.get_mut(k) {
                    g.faces.retain(|&f| f != face);
                    if g.faces.is_empty() {
                        self.face_snurbs.remove(k);
                    }
                }
            }
        }
    }

    fn detach_edge_geom(&mut self, eu: EdgeUseKey) {
        let Some(geom) = self.edgeuses.get_mut(eu).and_then(|e| e.geom.take()) else {
            return;
        };
        match geom {
            EdgeGeom::Line(k) => {
                if let Some(g) = self.edge_lines.get_mut(k) {
                    g.edgeuses.retain(|&u| u != eu);
                    if g.edgeuses.is_empty() {
                        self.edge_lines.remove(k);
                    }
                }
            }
            EdgeGeom::Curve(k) => {
                if let Some(g) = self.edge_curves.get_mut(k) {
                    g.edgeuses.retain(|&u| u != eu);
                    if g.edgeuses.is_empty() {
                        self.edge_curves.remove(k);
                    }
                }
            }
        }
    }

    fn detach_vertexuse_attr(&mut self, vu: VertexUseKey) {
        match self.vertexuses.get_mut(vu).and_then(|v| v.attr.take()) {
            Some(VertexUseAttr::Plane(k)) => {
                self.vu_planes.remove(k);
            }
            Some(VertexUseAttr::Curve(k)) => {
                self.vu_curves.remove(k);
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::NodeKind;
    use crate::nurbs::PointType;
    use approx::assert_relative_eq;

    fn square(m: &mut Model, z: f64) -> [VertexKey; 4] {
        [
            m.add_vertex(Point3::new(0.0, 0.0, z)),
            m.add_vertex(Point3::new(1.0, 0.0, z)),
            m.add_vertex(Point3::new(1.0, 1.0, z)),
            m.add_vertex(Point3::new(0.0, 1.0, z)),
        ]
    }

    // --- Face tests ---

    #[test]
    fn add_face_builds_use_pairs() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let vs = square(&mut m, 5.0);
        let f = m.add_face(s, &vs).unwrap();

        assert_eq!(m.count(NodeKind::FaceUse), 2);
        assert_eq!(m.count(NodeKind::LoopUse), 2);
        assert_eq!(m.count(NodeKind::Loop), 1);
        assert_eq!(m.count(NodeKind::EdgeUse), 8);
        assert_eq!(m.count(NodeKind::Edge), 4);
        assert_eq!(m.count(NodeKind::VertexUse), 8);

        let fu = m.face(f).unwrap().faceuse;
        let fud = m.faceuse(fu).unwrap();
        assert_eq!(fud.orientation, Orientation::Same);
        let mate = m.faceuse(fud.mate).unwrap();
        assert_eq!(mate.orientation, Orientation::Opposite);
        assert_eq!(mate.mate, fu);
        assert_eq!(mate.face, f);
    }

    #[test]
    fn add_face_rejects_short_loops() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let vs = square(&mut m, 0.0);
        assert!(matches!(
            m.add_face(s, &vs[..2]),
            Err(Error::DegenerateLoop(2))
        ));
        assert!(matches!(
            m.add_face(s, &[vs[0], vs[1], vs[1]]),
            Err(Error::RepeatedVertex(_))
        ));
    }

    #[test]
    fn add_face_invalid_vertex() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let vs = square(&mut m, 0.0);
        let gone = m.add_vertex(Point3::origin());
        m.vertices.remove(gone);
        assert!(matches!(
            m.add_face(s, &[vs[0], vs[1], gone]),
            Err(Error::VertexNotFound(_))
        ));
    }

    #[test]
    fn adjacent_faces_share_an_edge() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let vs = square(&mut m, 0.0);
        let apex = m.add_vertex(Point3::new(0.5, 0.5, 1.0));
        m.add_face(s, &vs).unwrap();
        // Runs v1 -> v0, against the first face.
        m.add_face(s, &[vs[1], vs[0], apex]).unwrap();

        assert_eq!(m.count(NodeKind::Edge), 6);
        let eu = m.find_edgeuse(vs[0], vs[1]).unwrap();
        let ring = m.radial_ring(eu).unwrap();
        assert_eq!(ring.len(), 4);

        let data = m.edgeuse(eu).unwrap();
        let radial = m.edgeuse(data.radial).unwrap();
        assert_eq!(radial.radial, eu);
        assert_eq!(radial.edge, data.edge);
        assert_eq!(m.edgeuse_start(data.radial), Some(vs[1]));
    }

    #[test]
    fn three_faces_on_one_edge() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let a = m.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = m.add_vertex(Point3::new(1.0, 0.0, 0.0));
        for (y, z) in [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0)] {
            let c = m.add_vertex(Point3::new(0.5, y, z));
            m.add_face(s, &[a, b, c]).unwrap();
        }
        let eu = m.find_edgeuse(a, b).unwrap();
        let edge = m.edgeuse(eu).unwrap().edge;
        assert_eq!(m.edge_uses(edge).unwrap().len(), 6);
        m.validate().unwrap();
    }

    // --- Wire and vertex tests ---

    #[test]
    fn wire_edge_and_loop() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let vs = square(&mut m, 0.0);
        let eu = m.add_wire_edge(s, vs[0], vs[2]).unwrap();
        let lu = m.add_wire_loop(s, &vs).unwrap();

        let shell = m.shell(s).unwrap();
        assert_eq!(shell.edgeuses.len(), 2);
        assert_eq!(shell.loopuses.len(), 2);
        assert_eq!(
            m.edgeuse(eu).unwrap().parent,
            EdgeUseParent::Shell(s)
        );
        assert_eq!(m.loopuse(lu).unwrap().orientation, Orientation::Unspec);
        m.validate().unwrap();
    }

    #[test]
    fn vertex_loop_on_face() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let vs = square(&mut m, 0.0);
        let f = m.add_face(s, &vs).unwrap();
        let fu = m.face(f).unwrap().faceuse;
        let centre = m.add_vertex(Point3::new(0.5, 0.5, 0.0));
        let lu = m.add_vertex_loop(LoopUseParent::FaceUse(fu), centre).unwrap();

        assert!(matches!(m.loopuse(lu).unwrap().down, LoopUseDown::Vertex(_)));
        let mate = m.faceuse(fu).unwrap().mate;
        assert_eq!(m.faceuse(mate).unwrap().loopuses.len(), 2);
        assert_eq!(m.vertex(centre).unwrap().uses.len(), 2);
        m.validate().unwrap();
    }

    #[test]
    fn shell_vertex_only_once() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let v = m.add_vertex(Point3::origin());
        m.set_shell_vertex(s, v).unwrap();
        assert!(matches!(
            m.set_shell_vertex(s, v),
            Err(Error::ShellVertexOccupied(_))
        ));
    }

    // --- Geometry tests ---

    #[test]
    fn compute_face_plane_uses_winding() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let vs = square(&mut m, 5.0);
        let f = m.add_face(s, &vs).unwrap();
        let p = m.compute_face_plane(f).unwrap();
        let plane = m.face_plane(p).unwrap();
        assert_relative_eq!(plane.normal, Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(plane.offset, 5.0);
        assert_eq!(plane.faces, vec![f]);
    }

    #[test]
    fn shared_plane_keeps_user_list() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let a = square(&mut m, 0.0);
        let f1 = m.add_face(s, &a).unwrap();
        let f2 = m.add_face(s, &[a[0], a[2], a[3]]).unwrap();
        let p = m.set_face_plane(f1, Vector3::z(), 0.0).unwrap();
        m.share_face_geometry(f2, f1).unwrap();
        assert_eq!(m.face_plane(p).unwrap().faces, vec![f1, f2]);

        // Replacing the only user's geometry drops the old node.
        m.compute_face_plane(f1).unwrap();
        m.compute_face_plane(f2).unwrap();
        assert!(m.face_plane(p).is_none());
        assert_eq!(m.count(NodeKind::FacePlaneGeom), 2);
    }

    #[test]
    fn edge_line_reaches_every_use() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let vs = square(&mut m, 0.0);
        let apex = m.add_vertex(Point3::new(0.5, 0.5, 1.0));
        m.add_face(s, &vs).unwrap();
        let eu = m.find_edgeuse(vs[0], vs[1]).unwrap();
        let line = m.set_edge_line(eu).unwrap();
        // A face added later joins the ring and inherits the geometry.
        m.add_face(s, &[vs[1], vs[0], apex]).unwrap();

        let data = m.edge_line(line).unwrap();
        assert_eq!(data.edgeuses.len(), 4);
        assert_relative_eq!(data.dir, Vector3::new(1.0, 0.0, 0.0));
        m.validate().unwrap();
    }

    #[test]
    fn edge_curve_is_checked() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let vs = square(&mut m, 0.0);
        let eu = m.add_wire_edge(s, vs[0], vs[1]).unwrap();
        let bad = NurbsCurve {
            order: 2,
            knots: vec![0.0, 1.0],
            pt_type: PointType::XYZ,
            ctl_points: vec![0.0; 6],
        };
        assert!(m.set_edge_curve(eu, bad).is_err());
        assert_eq!(m.count(NodeKind::EdgeCurveGeom), 0);
    }

    #[test]
    fn vertexuse_attribute_replaced() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let v = m.add_vertex(Point3::origin());
        let vu = m.set_shell_vertex(s, v).unwrap();
        m.set_vertexuse_normal(vu, Vector3::z()).unwrap();
        m.set_vertexuse_param(vu, [0.25, 0.5, 1.0]).unwrap();
        assert_eq!(m.count(NodeKind::VertexUsePlaneGeom), 0);
        assert_eq!(m.count(NodeKind::VertexUseCurveGeom), 1);
    }
}
