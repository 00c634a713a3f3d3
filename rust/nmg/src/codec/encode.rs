// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node-to-disk record encoder.
//!
//! Each record opens with its kind's magic, then lays out its fields in the
//! order listed next to [`crate::kind::NodeKind::disk_size`]. Pointers
//! become subscripts; list membership becomes `(forw, back)` links where an
//! end of the list is written as [`DISK_INDEX_LISTHEAD`]. Lengths are multiplied
//! by the local-to-millimetre factor, directions and parameters are not.

use rustc_hash::FxHashMap;

use super::cursor::{DiskWriter, Link};
use super::payload::PayloadWriter;
use super::renumber::Renumbering;
use crate::error::{Error, Result};
use crate::keys::NodeRef;
use crate::kind::DISK_INDEX_LISTHEAD;
use crate::model::{LoopUseDown, Model};

/// `(prev, next)` neighbours of every list member; `None` is the list head.
type Neighbours = FxHashMap<NodeRef, (Option<NodeRef>, Option<NodeRef>)>;

/// List links for every member of every list in the model.
///
/// Primary lists are the ownership lists. Secondary lists are the user
/// lists of shared geometry (faces on a plane or surface, edgeuses on a
/// line or curve), which occupy the second link slot of a record.
#[derive(Debug, Default)]
pub(crate) struct ListLinks {
    primary: Neighbours,
    secondary: Neighbours,
}

fn chain<K>(map: &mut Neighbours, items: &[K]) -> Result<()>
where
    K: Copy + Into<NodeRef>,
{
    for (i, &item) in items.iter().enumerate() {
        let prev = i.checked_sub(1).map(|j| items[j].into());
        let next = items.get(i + 1).map(|&n| n.into());
        let node = item.into();
        if map.insert(node, (prev, next)).is_some() {
            return Err(Error::DuplicateListMember(node));
        }
    }
    Ok(())
}

impl ListLinks {
    /// Chains the lists owned by every node in `owners`.
    pub fn build(model: &Model, owners: &[NodeRef]) -> Result<Self> {
        let mut links = ListLinks::default();
        let p = &mut links.primary;
        let s = &mut links.secondary;
        for &owner in owners {
            match owner {
                NodeRef::Model => chain(p, &model.region_list)?,
                NodeRef::Region(k) => {
                    if let Some(r) = model.regions.get(k) {
                        chain(p, &r.shells)?;
                    }
                }
                NodeRef::Shell(k) => {
                    if let Some(sh) = model.shells.get(k) {
                        chain(p, &sh.faceuses)?;
                        chain(p, &sh.loopuses)?;
                        chain(p, &sh.edgeuses)?;
                    }
                }
                NodeRef::FaceUse(k) => {
                    if let Some(fu) = model.faceuses.get(k) {
                        chain(p, &fu.loopuses)?;
                    }
                }
                NodeRef::LoopUse(k) => {
                    if let Some(LoopUseDown::Edges(eus)) = model.loopuses.get(k).map(|lu| &lu.down) {
                        chain(p, eus)?;
                    }
                }
                NodeRef::Vertex(k) => {
                    if let Some(v) = model.vertices.get(k) {
                        chain(p, &v.uses)?;
                    }
                }
                NodeRef::FacePlane(k) => {
                    if let Some(g) = model.face_planes.get(k) {
                        chain(s, &g.faces)?;
                    }
                }
                NodeRef::FaceSnurb(k) => {
                    if let Some(g) = model.face_snurbs.get(k) {
                        chain(s, &g.faces)?;
                    }
                }
                NodeRef::EdgeLine(k) => {
                    if let Some(g) = model.edge_lines.get(k) {
                        chain(s, &g.edgeuses)?;
                    }
                }
                NodeRef::EdgeCurve(k) => {
                    if let Some(g) = model.edge_curves.get(k) {
                        chain(s, &g.edgeuses)?;
                    }
                }
                _ => {}
            }
        }
        Ok(links)
    }
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::invariant(format!("length {len} does not fit a disk field")))
}

/// Writes fixed records for one export.
pub(crate) struct Encoder<'m> {
    model: &'m Model,
    renum: &'m Renumbering,
    links: ListLinks,
    scale: f64,
}

impl<'m> Encoder<'m> {
    pub fn new(model: &'m Model, renum: &'m Renumbering, scale: f64) -> Result<Self> {
        let links = ListLinks::build(model, &renum.ordered)?;
        Ok(Self {
            model,
            renum,
            links,
            scale,
        })
    }

    fn index(&self, node: impl Into<NodeRef>) -> Result<u32> {
        self.renum.reindex(Some(node.into()))
    }

    fn opt_index<T: Into<NodeRef>>(&self, node: Option<T>) -> Result<u32> {
        self.renum.reindex(node.map(Into::into))
    }

    fn end(&self, node: Option<NodeRef>) -> Result<u32> {
        match node {
            None => Ok(DISK_INDEX_LISTHEAD),
            Some(n) => self.index(n),
        }
    }

    fn element(&self, map: &Neighbours, node: NodeRef) -> Result<Link> {
        match map.get(&node) {
            None => Ok(Link::NULL),
            Some(&(prev, next)) => Ok(Link {
                forw: self.end(next)?,
                back: self.end(prev)?,
            }),
        }
    }

    fn head<K: Copy + Into<NodeRef>>(&self, items: &[K]) -> Result<Link> {
        match (items.first(), items.last()) {
            (Some(&first), Some(&last)) => Ok(Link {
                forw: self.index(first)?,
                back: self.index(last)?,
            }),
            _ => Ok(Link::EMPTY_HEAD),
        }
    }

    /// Writes the record for `node` into `out`, which must be exactly one
    /// record long. `offset` is the absolute position of `out`.
    pub fn encode(
        &self,
        node: NodeRef,
        out: &mut [u8],
        offset: usize,
        payload: &mut PayloadWriter<'_>,
    ) -> Result<()> {
        let m = self.model;
        let missing = || Error::Unregistered(node);
        let mut w = DiskWriter::new(out, offset);
        w.put_u32(node.kind().disk_magic())?;

        match node {
            NodeRef::Model => {
                w.put_u32(m.version)?;
                w.put_link(self.head(&m.region_list)?)?;
            }
            NodeRef::Region(k) => {
                let r = m.regions.get(k).ok_or_else(missing)?;
                w.put_link(self.element(&self.links.primary, node)?)?;
                w.put_u32(self.index(NodeRef::Model)?)?;
                w.put_u32(self.opt_index(r.bbox.map(|_| NodeRef::RegionGeom(k)))?)?;
                w.put_link(self.head(&r.shells)?)?;
            }
            NodeRef::Shell(k) => {
                let s = m.shells.get(k).ok_or_else(missing)?;
                w.put_link(self.element(&self.links.primary, node)?)?;
                w.put_u32(self.index(s.region)?)?;
                w.put_u32(self.opt_index(s.bbox.map(|_| NodeRef::ShellGeom(k)))?)?;
                w.put_link(self.head(&s.faceuses)?)?;
                w.put_link(self.head(&s.loopuses)?)?;
                w.put_link(self.head(&s.edgeuses)?)?;
                w.put_u32(self.opt_index(s.vertexuse)?)?;
            }
            NodeRef::FaceUse(k) => {
                let fu = m.faceuses.get(k).ok_or_else(missing)?;
                w.put_link(self.element(&self.links.primary, node)?)?;
                w.put_u32(self.index(fu.shell)?)?;
                w.put_u32(self.index(fu.mate)?)?;
                w.put_u32(fu.orientation.code())?;
                w.put_u32(self.index(fu.face)?)?;
                w.put_link(self.head(&fu.loopuses)?)?;
            }
            NodeRef::Face(k) => {
                let f = m.faces.get(k).ok_or_else(missing)?;
                w.put_link(self.element(&self.links.secondary, node)?)?;
                w.put_u32(self.index(f.faceuse)?)?;
                w.put_u32(self.opt_index(f.geom)?)?;
                w.put_u32(u32::from(f.flip))?;
            }
            NodeRef::FacePlane(k) => {
                let g = m.face_planes.get(k).ok_or_else(missing)?;
                w.put_link(self.head(&g.faces)?)?;
                w.put_vector(&g.normal)?;
                w.put_f64(g.offset * self.scale)?;
            }
            NodeRef::FaceSnurb(k) => {
                let g = m.face_snurbs.get(k).ok_or_else(missing)?;
                let s = &g.surface;
                let u_knots = payload.emit(&s.u_knots, None, 1.0)?;
                let v_knots = payload.emit(&s.v_knots, None, 1.0)?;
                let ctl = payload.emit(&s.ctl_points, Some(s.pt_type), self.scale)?;
                w.put_link(self.head(&g.faces)?)?;
                w.put_u32(s.order[0])?;
                w.put_u32(s.order[1])?;
                w.put_u32(len_u32(s.u_knots.len())?)?;
                w.put_u32(len_u32(s.v_knots.len())?)?;
                w.put_u32(u_knots)?;
                w.put_u32(v_knots)?;
                w.put_u32(s.size[0])?;
                w.put_u32(s.size[1])?;
                w.put_u32(s.pt_type.0)?;
                w.put_u32(ctl)?;
            }
            NodeRef::LoopUse(k) => {
                let lu = m.loopuses.get(k).ok_or_else(missing)?;
                w.put_link(self.element(&self.links.primary, node)?)?;
                w.put_u32(self.index(lu.parent)?)?;
                w.put_u32(self.index(lu.mate)?)?;
                w.put_u32(lu.orientation.code())?;
                w.put_u32(self.index(lu.lp)?)?;
                let down = match &lu.down {
                    LoopUseDown::Edges(eus) => self.head(eus)?,
                    LoopUseDown::Vertex(vu) => {
                        let s = self.index(*vu)?;
                        Link { forw: s, back: s }
                    }
                };
                w.put_link(down)?;
            }
            NodeRef::Loop(k) => {
                let l = m.loops.get(k).ok_or_else(missing)?;
                w.put_u32(self.index(l.loopuse)?)?;
                w.put_u32(self.opt_index(l.bbox.map(|_| NodeRef::LoopGeom(k)))?)?;
            }
            NodeRef::EdgeUse(k) => {
                let eu = m.edgeuses.get(k).ok_or_else(missing)?;
                w.put_link(self.element(&self.links.primary, node)?)?;
                w.put_link(self.element(&self.links.secondary, node)?)?;
                w.put_u32(self.index(eu.parent)?)?;
                w.put_u32(self.index(eu.mate)?)?;
                w.put_u32(self.index(eu.radial)?)?;
                w.put_u32(self.index(eu.edge)?)?;
                w.put_u32(eu.orientation.code())?;
                w.put_u32(self.index(eu.vertexuse)?)?;
                w.put_u32(self.opt_index(eu.geom)?)?;
            }
            NodeRef::Edge(k) => {
                let e = m.edges.get(k).ok_or_else(missing)?;
                w.put_u32(self.index(e.edgeuse)?)?;
                w.put_u32(u32::from(e.is_real))?;
            }
            NodeRef::EdgeLine(k) => {
                let g = m.edge_lines.get(k).ok_or_else(missing)?;
                w.put_link(self.head(&g.edgeuses)?)?;
                w.put_point(&(g.point * self.scale))?;
                w.put_vector(&g.dir)?;
            }
            NodeRef::EdgeCurve(k) => {
                let g = m.edge_curves.get(k).ok_or_else(missing)?;
                let c = &g.curve;
                w.put_link(self.head(&g.edgeuses)?)?;
                if c.is_empty() {
                    for _ in 0..6 {
                        w.put_u32(0)?;
                    }
                } else {
                    let scale = if c.pt_type.is_uv() { 1.0 } else { self.scale };
                    let knots = payload.emit(&c.knots, None, 1.0)?;
                    let ctl = payload.emit(&c.ctl_points, Some(c.pt_type), scale)?;
                    w.put_u32(c.order)?;
                    w.put_u32(len_u32(c.knots.len())?)?;
                    w.put_u32(knots)?;
                    w.put_u32(len_u32(c.point_count())?)?;
                    w.put_u32(c.pt_type.0)?;
                    w.put_u32(ctl)?;
                }
            }
            NodeRef::VertexUse(k) => {
                let vu = m.vertexuses.get(k).ok_or_else(missing)?;
                w.put_link(self.element(&self.links.primary, node)?)?;
                w.put_u32(self.index(vu.parent)?)?;
                w.put_u32(self.index(vu.vertex)?)?;
                w.put_u32(self.opt_index(vu.attr)?)?;
            }
            NodeRef::VertexUsePlane(k) => {
                let a = m.vu_planes.get(k).ok_or_else(missing)?;
                w.put_vector(&a.normal)?;
            }
            NodeRef::VertexUseCurve(k) => {
                let a = m.vu_curves.get(k).ok_or_else(missing)?;
                w.put_f64s(a.param)?;
            }
            NodeRef::Vertex(k) => {
                let v = m.vertices.get(k).ok_or_else(missing)?;
                w.put_link(self.head(&v.uses)?)?;
                w.put_u32(self.opt_index(v.geom)?)?;
            }
            NodeRef::VertexGeom(k) => {
                let g = m.vertex_geoms.get(k).ok_or_else(missing)?;
                w.put_point(&(g.coord * self.scale))?;
            }
            NodeRef::RegionGeom(_) | NodeRef::ShellGeom(_) | NodeRef::LoopGeom(_) => {
                return Err(Error::invariant(format!(
                    "{} is derived and has no disk record",
                    node.kind()
                )));
            }
        }
        w.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::census::Census;
    use crate::codec::cursor::DiskReader;
    use crate::codec::renumber::SubscriptAllocator;
    use crate::kind::NodeKind;
    use nalgebra::Point3;

    fn triangle() -> Model {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let vs = [
            m.add_vertex(Point3::new(0.0, 0.0, 0.0)),
            m.add_vertex(Point3::new(2.0, 0.0, 0.0)),
            m.add_vertex(Point3::new(0.0, 2.0, 0.0)),
        ];
        m.add_face(s, &vs).unwrap();
        m
    }

    fn encode_one(m: &Model, node: NodeRef, scale: f64) -> (Renumbering, Vec<u8>) {
        let census = Census::take(m).unwrap();
        let (renum, _) = Renumbering::assign(&census).unwrap();
        let enc = Encoder::new(m, &renum, scale).unwrap();
        let mut out = vec![0u8; node.kind().disk_size()];
        let mut tail: [u8; 0] = [];
        let mut payload = PayloadWriter::new(&mut tail, 0, SubscriptAllocator::new(0));
        enc.encode(node, &mut out, 0, &mut payload).unwrap();
        (renum, out)
    }

    #[test]
    fn duplicate_list_member_is_rejected() {
        let mut m = triangle();
        let r = m.regions()[0];
        let s = m.regions[r].shells[0];
        m.regions[r].shells.push(s);
        assert!(matches!(
            ListLinks::build(&m, &[NodeRef::Region(r)]),
            Err(Error::DuplicateListMember(NodeRef::Shell(_)))
        ));
    }

    #[test]
    fn model_record_heads_region_list() {
        let m = triangle();
        let (renum, out) = encode_one(&m, NodeRef::Model, 1.0);
        let mut r = DiskReader::new(&out, 0);
        r.expect_magic(NodeKind::Model).unwrap();
        assert_eq!(r.get_u32().unwrap(), 1);
        let region = renum.subscript(NodeRef::Region(m.regions()[0])).unwrap();
        assert_eq!(r.get_link().unwrap(), Link { forw: region, back: region });
    }

    #[test]
    fn lone_list_member_points_at_head() {
        let m = triangle();
        let region = m.regions()[0];
        let (_, out) = encode_one(&m, NodeRef::Region(region), 1.0);
        let mut r = DiskReader::new(&out, 0);
        r.expect_magic(NodeKind::Region).unwrap();
        assert_eq!(r.get_link().unwrap(), Link::EMPTY_HEAD);
        assert_eq!(r.get_u32().unwrap(), 1);
        assert_eq!(r.get_u32().unwrap(), 0);
    }

    #[test]
    fn vertex_coordinates_are_scaled() {
        let m = triangle();
        let v = m
            .vertex_keys()
            .find(|&v| m.vertex_point(v) == Some(Point3::new(2.0, 0.0, 0.0)))
            .unwrap();
        let g = m.vertex(v).unwrap().geom.unwrap();
        let (_, out) = encode_one(&m, NodeRef::VertexGeom(g), 25.4);
        let mut r = DiskReader::new(&out, 0);
        r.expect_magic(NodeKind::VertexGeom).unwrap();
        assert_eq!(r.get_point().unwrap(), Point3::new(50.8, 0.0, 0.0));
    }

    #[test]
    fn edgeuse_without_geometry_has_null_second_link() {
        let m = triangle();
        let eu = m.edgeuses.keys().next().unwrap();
        let (_, out) = encode_one(&m, NodeRef::EdgeUse(eu), 1.0);
        let mut r = DiskReader::new(&out, 0);
        r.expect_magic(NodeKind::EdgeUse).unwrap();
        let l = r.get_link().unwrap();
        assert_ne!(l.forw, 0);
        assert_eq!(r.get_link().unwrap(), Link::NULL);
    }

    #[test]
    fn derived_nodes_are_not_encodable() {
        let mut m = triangle();
        m.rebound().unwrap();
        let census = Census::take(&m).unwrap();
        let (renum, _) = Renumbering::assign(&census).unwrap();
        let enc = Encoder::new(&m, &renum, 1.0).unwrap();
        let mut out = vec![0u8; 52];
        let mut tail: [u8; 0] = [];
        let mut payload = PayloadWriter::new(&mut tail, 0, SubscriptAllocator::new(0));
        let region = m.regions()[0];
        assert!(enc
            .encode(NodeRef::RegionGeom(region), &mut out, 0, &mut payload)
            .is_err());
    }
}
