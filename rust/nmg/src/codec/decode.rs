// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Import: rebuilds a [`Model`] from an encoded buffer.
//!
//! Decoding runs in phases:
//!
//! 1. Read the header and lay out the per-kind bodies.
//! 2. Read every variable-length array from the tail.
//! 3. Allocate one placeholder node per record, so every subscript maps to
//!    a key before any record is parsed.
//! 4. Parse records in subscript order. Pointers are resolved through the
//!    subscript ranges, which is also how the arm of every parent and
//!    geometry union is recovered. List links are collected for phase 5.
//! 5. Walk every list from its head, checking back links, and store the
//!    members in order.
//! 6. Recompute bounding boxes and verify the graph.

use nalgebra::{Matrix4, Point3, Vector3};
use rustc_hash::{FxHashMap, FxHashSet};

use super::cursor::{DiskReader, Link};
use super::header::{DiskHeader, HEADER_BYTES};
use super::payload::read_arrays;
use super::ImportOptions;
use crate::error::{Error, Result};
use crate::keys::*;
use crate::kind::{
    NodeKind, DISK_INDEX_LISTHEAD, DISK_INDEX_NULL, FIXED_KINDS, FIXED_KIND_COUNT,
};
use crate::model::*;
use crate::nurbs::{NurbsCurve, NurbsSurface, PointType};
use crate::transform::{
    check_ctl_point_type, inverse_transpose, transform_ctl_points, transform_direction,
    transform_plane, transform_point,
};

/// Where each kind's records sit, by subscript and by byte offset.
#[derive(Debug)]
struct Layout {
    counts: crate::kind::KindCounts,
    first: [u32; FIXED_KIND_COUNT],
    base: [usize; FIXED_KIND_COUNT],
    max_fixed: u32,
    max_index: u32,
}

impl Layout {
    fn new(header: &DiskHeader, len: usize) -> Result<Self> {
        let fixed = header.fixed_bytes();
        if fixed > len as u64 {
            return Err(Error::Truncated {
                offset: len,
                needed: (fixed - len as u64) as usize,
            });
        }
        let records = header.fixed_records();
        if records >= u64::from(DISK_INDEX_LISTHEAD) {
            return Err(Error::SubscriptOutOfRange {
                subscript: u32::MAX,
                max: DISK_INDEX_LISTHEAD - 1,
            });
        }

        let mut first = [0u32; FIXED_KIND_COUNT];
        let mut base = [0usize; FIXED_KIND_COUNT];
        let mut next = 1u32;
        let mut offset = HEADER_BYTES;
        for kind in FIXED_KINDS {
            let count = header.counts.get(kind);
            first[kind.index()] = next;
            base[kind.index()] = offset;
            next += count;
            offset += count as usize * kind.disk_size();
        }
        Ok(Self {
            counts: header.counts,
            first,
            base,
            max_fixed: next - 1,
            max_index: next - 1,
        })
    }

    /// Kind and position within the kind of a fixed-record subscript.
    fn locate(&self, sub: u32) -> Option<(NodeKind, usize)> {
        FIXED_KINDS.iter().find_map(|&kind| {
            let first = self.first[kind.index()];
            let count = self.counts.get(kind);
            (sub >= first && sub - first < count).then(|| (kind, (sub - first) as usize))
        })
    }
}

/// Placeholder keys, one per record, in subscript order per kind.
#[derive(Debug, Default)]
struct Keys {
    regions: Vec<RegionKey>,
    shells: Vec<ShellKey>,
    faceuses: Vec<FaceUseKey>,
    faces: Vec<FaceKey>,
    face_planes: Vec<FacePlaneKey>,
    face_snurbs: Vec<FaceSnurbKey>,
    loopuses: Vec<LoopUseKey>,
    loops: Vec<LoopKey>,
    edgeuses: Vec<EdgeUseKey>,
    edges: Vec<EdgeKey>,
    edge_lines: Vec<EdgeLineKey>,
    edge_curves: Vec<EdgeCurveKey>,
    vertexuses: Vec<VertexUseKey>,
    vu_planes: Vec<VertexUsePlaneKey>,
    vu_curves: Vec<VertexUseCurveKey>,
    vertices: Vec<VertexKey>,
    vertex_geoms: Vec<VertexGeomKey>,
}

macro_rules! allocate {
    ($model:ident, $counts:ident, $keys:ident; $($field:ident: $kind:ident),* $(,)?) => {
        $(
            $keys.$field = (0..$counts.get(NodeKind::$kind))
                .map(|_| $model.$field.insert(Default::default()))
                .collect();
        )*
    };
}

impl Keys {
    fn allocate(model: &mut Model, counts: &crate::kind::KindCounts) -> Self {
        let mut keys = Keys::default();
        allocate!(model, counts, keys;
            regions: Region,
            shells: Shell,
            faceuses: FaceUse,
            faces: Face,
            face_planes: FacePlaneGeom,
            face_snurbs: FaceSnurbGeom,
            loopuses: LoopUse,
            loops: Loop,
            edgeuses: EdgeUse,
            edges: Edge,
            edge_lines: EdgeLineGeom,
            edge_curves: EdgeCurveGeom,
            vertexuses: VertexUse,
            vu_planes: VertexUsePlaneGeom,
            vu_curves: VertexUseCurveGeom,
            vertices: Vertex,
            vertex_geoms: VertexGeom,
        );
        keys
    }

    fn node(&self, kind: NodeKind, i: usize) -> Option<NodeRef> {
        Some(match kind {
            NodeKind::Model => NodeRef::Model,
            NodeKind::Region => NodeRef::Region(*self.regions.get(i)?),
            NodeKind::Shell => NodeRef::Shell(*self.shells.get(i)?),
            NodeKind::FaceUse => NodeRef::FaceUse(*self.faceuses.get(i)?),
            NodeKind::Face => NodeRef::Face(*self.faces.get(i)?),
            NodeKind::FacePlaneGeom => NodeRef::FacePlane(*self.face_planes.get(i)?),
            NodeKind::FaceSnurbGeom => NodeRef::FaceSnurb(*self.face_snurbs.get(i)?),
            NodeKind::LoopUse => NodeRef::LoopUse(*self.loopuses.get(i)?),
            NodeKind::Loop => NodeRef::Loop(*self.loops.get(i)?),
            NodeKind::EdgeUse => NodeRef::EdgeUse(*self.edgeuses.get(i)?),
            NodeKind::Edge => NodeRef::Edge(*self.edges.get(i)?),
            NodeKind::EdgeLineGeom => NodeRef::EdgeLine(*self.edge_lines.get(i)?),
            NodeKind::EdgeCurveGeom => NodeRef::EdgeCurve(*self.edge_curves.get(i)?),
            NodeKind::VertexUse => NodeRef::VertexUse(*self.vertexuses.get(i)?),
            NodeKind::VertexUsePlaneGeom => NodeRef::VertexUsePlane(*self.vu_planes.get(i)?),
            NodeKind::VertexUseCurveGeom => NodeRef::VertexUseCurve(*self.vu_curves.get(i)?),
            NodeKind::Vertex => NodeRef::Vertex(*self.vertices.get(i)?),
            NodeKind::VertexGeom => NodeRef::VertexGeom(*self.vertex_geoms.get(i)?),
            NodeKind::RegionGeom
            | NodeKind::ShellGeom
            | NodeKind::LoopGeom
            | NodeKind::DoubleArray => return None,
        })
    }
}

/// A list whose head was read but whose members are not yet placed.
#[derive(Debug, Clone, Copy)]
enum ListOwner {
    Regions,
    Shells(RegionKey),
    ShellFaceUses(ShellKey),
    ShellLoopUses(ShellKey),
    ShellEdgeUses(ShellKey),
    FaceUseLoopUses(FaceUseKey),
    LoopUseDown(LoopUseKey),
    VertexUses(VertexKey),
    PlaneFaces(FacePlaneKey),
    SnurbFaces(FaceSnurbKey),
    LineEdgeUses(EdgeLineKey),
    CurveEdgeUses(EdgeCurveKey),
}

impl ListOwner {
    fn owner_kind(self) -> NodeKind {
        match self {
            ListOwner::Regions => NodeKind::Model,
            ListOwner::Shells(_) => NodeKind::Region,
            ListOwner::ShellFaceUses(_) | ListOwner::ShellLoopUses(_) | ListOwner::ShellEdgeUses(_) => {
                NodeKind::Shell
            }
            ListOwner::FaceUseLoopUses(_) => NodeKind::FaceUse,
            ListOwner::LoopUseDown(_) => NodeKind::LoopUse,
            ListOwner::VertexUses(_) => NodeKind::Vertex,
            ListOwner::PlaneFaces(_) => NodeKind::FacePlaneGeom,
            ListOwner::SnurbFaces(_) => NodeKind::FaceSnurbGeom,
            ListOwner::LineEdgeUses(_) => NodeKind::EdgeLineGeom,
            ListOwner::CurveEdgeUses(_) => NodeKind::EdgeCurveGeom,
        }
    }

    fn member_kind(self) -> NodeKind {
        match self {
            ListOwner::Regions => NodeKind::Region,
            ListOwner::Shells(_) => NodeKind::Shell,
            ListOwner::ShellFaceUses(_) => NodeKind::FaceUse,
            ListOwner::ShellLoopUses(_) | ListOwner::FaceUseLoopUses(_) => NodeKind::LoopUse,
            ListOwner::ShellEdgeUses(_)
            | ListOwner::LoopUseDown(_)
            | ListOwner::LineEdgeUses(_)
            | ListOwner::CurveEdgeUses(_) => NodeKind::EdgeUse,
            ListOwner::VertexUses(_) => NodeKind::VertexUse,
            ListOwner::PlaneFaces(_) | ListOwner::SnurbFaces(_) => NodeKind::Face,
        }
    }

    /// Geometry user lists thread through the second link of a record.
    fn is_secondary(self) -> bool {
        matches!(
            self,
            ListOwner::PlaneFaces(_)
                | ListOwner::SnurbFaces(_)
                | ListOwner::LineEdgeUses(_)
                | ListOwner::CurveEdgeUses(_)
        )
    }
}

struct Decoder<'b> {
    buf: &'b [u8],
    layout: Layout,
    keys: Keys,
    arrays: Vec<Vec<f64>>,
    matrix: Matrix4<f64>,
    inv_t: Matrix4<f64>,
    /// Geometry is copied bit for bit under the identity matrix.
    identity: bool,
    heads: Vec<(ListOwner, Link)>,
    primary: FxHashMap<NodeRef, Link>,
    secondary: FxHashMap<NodeRef, Link>,
}

macro_rules! typed_ref {
    ($opt:ident, $key:ty, $expected:literal) => {
        fn $opt(&self, kind: NodeKind, field: &'static str, sub: u32) -> Result<Option<$key>> {
            match self.resolve(kind, field, sub)? {
                None => Ok(None),
                Some(node) => <$key>::try_from(node).map(Some).map_err(|other| {
                    Error::KindMismatch {
                        field,
                        expected: $expected,
                        subscript: sub,
                        found: other.kind(),
                    }
                }),
            }
        }
    };
    ($req:ident, $opt:ident, $key:ty, $expected:literal) => {
        typed_ref!($opt, $key, $expected);

        fn $req(&self, kind: NodeKind, field: &'static str, sub: u32) -> Result<$key> {
            self.$opt(kind, field, sub)?
                .ok_or(Error::MissingReference { kind, field })
        }
    };
}

fn orientation(kind: NodeKind, code: u32) -> Result<Orientation> {
    Orientation::from_code(code).ok_or(Error::BadOrientation { kind, code })
}

fn mismatch(field: &'static str, expected: &'static str, sub: u32, node: NodeRef) -> Error {
    Error::KindMismatch {
        field,
        expected,
        subscript: sub,
        found: node.kind(),
    }
}

impl<'b> Decoder<'b> {
    fn resolve(&self, kind: NodeKind, field: &'static str, sub: u32) -> Result<Option<NodeRef>> {
        match sub {
            DISK_INDEX_NULL => Ok(None),
            DISK_INDEX_LISTHEAD => Err(Error::UnexpectedListHead { kind, field }),
            s => self
                .layout
                .locate(s)
                .and_then(|(k, i)| self.keys.node(k, i))
                .map(Some)
                .ok_or(Error::SubscriptOutOfRange {
                    subscript: s,
                    max: self.layout.max_fixed,
                }),
        }
    }

    typed_ref!(region, opt_region, RegionKey, "nmgregion");
    typed_ref!(shell, opt_shell, ShellKey, "shell");
    typed_ref!(faceuse, opt_faceuse, FaceUseKey, "faceuse");
    typed_ref!(face, opt_face, FaceKey, "face");
    typed_ref!(loopuse, opt_loopuse, LoopUseKey, "loopuse");
    typed_ref!(loop_, opt_loop, LoopKey, "loop");
    typed_ref!(edgeuse, opt_edgeuse, EdgeUseKey, "edgeuse");
    typed_ref!(edge, opt_edge, EdgeKey, "edge");
    typed_ref!(vertexuse, opt_vertexuse, VertexUseKey, "vertexuse");
    typed_ref!(vertex, opt_vertex, VertexKey, "vertex");
    typed_ref!(opt_vertex_geom, VertexGeomKey, "vertex_g");

    fn face_geom(&self, kind: NodeKind, field: &'static str, sub: u32) -> Result<Option<FaceGeom>> {
        match self.resolve(kind, field, sub)? {
            None => Ok(None),
            Some(NodeRef::FacePlane(k)) => Ok(Some(FaceGeom::Plane(k))),
            Some(NodeRef::FaceSnurb(k)) => Ok(Some(FaceGeom::Snurb(k))),
            Some(other) => Err(mismatch(field, "face geometry", sub, other)),
        }
    }

    fn edge_geom(&self, kind: NodeKind, field: &'static str, sub: u32) -> Result<Option<EdgeGeom>> {
        match self.resolve(kind, field, sub)? {
            None => Ok(None),
            Some(NodeRef::EdgeLine(k)) => Ok(Some(EdgeGeom::Line(k))),
            Some(NodeRef::EdgeCurve(k)) => Ok(Some(EdgeGeom::Curve(k))),
            Some(other) => Err(mismatch(field, "edge geometry", sub, other)),
        }
    }

    fn vertexuse_attr(
        &self,
        kind: NodeKind,
        field: &'static str,
        sub: u32,
    ) -> Result<Option<VertexUseAttr>> {
        match self.resolve(kind, field, sub)? {
            None => Ok(None),
            Some(NodeRef::VertexUsePlane(k)) => Ok(Some(VertexUseAttr::Plane(k))),
            Some(NodeRef::VertexUseCurve(k)) => Ok(Some(VertexUseAttr::Curve(k))),
            Some(other) => Err(mismatch(field, "vertexuse attribute", sub, other)),
        }
    }

    fn loopuse_parent(&self, sub: u32) -> Result<LoopUseParent> {
        let (kind, field) = (NodeKind::LoopUse, "up");
        match self.resolve(kind, field, sub)? {
            None => Err(Error::MissingReference { kind, field }),
            Some(NodeRef::FaceUse(k)) => Ok(LoopUseParent::FaceUse(k)),
            Some(NodeRef::Shell(k)) => Ok(LoopUseParent::Shell(k)),
            Some(other) => Err(mismatch(field, "faceuse or shell", sub, other)),
        }
    }

    fn edgeuse_parent(&self, sub: u32) -> Result<EdgeUseParent> {
        let (kind, field) = (NodeKind::EdgeUse, "up");
        match self.resolve(kind, field, sub)? {
            None => Err(Error::MissingReference { kind, field }),
            Some(NodeRef::LoopUse(k)) => Ok(EdgeUseParent::LoopUse(k)),
            Some(NodeRef::Shell(k)) => Ok(EdgeUseParent::Shell(k)),
            Some(other) => Err(mismatch(field, "loopuse or shell", sub, other)),
        }
    }

    fn vertexuse_parent(&self, sub: u32) -> Result<VertexUseParent> {
        let (kind, field) = (NodeKind::VertexUse, "up");
        match self.resolve(kind, field, sub)? {
            None => Err(Error::MissingReference { kind, field }),
            Some(NodeRef::EdgeUse(k)) => Ok(VertexUseParent::EdgeUse(k)),
            Some(NodeRef::LoopUse(k)) => Ok(VertexUseParent::LoopUse(k)),
            Some(NodeRef::Shell(k)) => Ok(VertexUseParent::Shell(k)),
            Some(other) => Err(mismatch(field, "edgeuse, loopuse or shell", sub, other)),
        }
    }

    /// The array at `sub`, checked to hold `expected` doubles.
    fn array(&self, sub: u32, expected: usize) -> Result<Vec<f64>> {
        if sub == DISK_INDEX_NULL && expected == 0 {
            return Ok(Vec::new());
        }
        let values = sub
            .checked_sub(self.layout.max_fixed + 1)
            .and_then(|i| self.arrays.get(i as usize))
            .ok_or(Error::SubscriptOutOfRange {
                subscript: sub,
                max: self.layout.max_index,
            })?;
        if values.len() != expected {
            return Err(Error::ArrayLengthMismatch {
                subscript: sub,
                expected,
                found: values.len(),
            });
        }
        Ok(values.clone())
    }

    fn record(&self, kind: NodeKind, i: usize) -> Result<DiskReader<'b>> {
        let size = kind.disk_size();
        let offset = self.layout.base[kind.index()] + i * size;
        let bytes = self
            .buf
            .get(offset..offset + size)
            .ok_or(Error::Truncated { offset, needed: size })?;
        let mut r = DiskReader::new(bytes, offset);
        r.expect_magic(kind)?;
        Ok(r)
    }

    fn point(&self, p: Point3<f64>) -> Point3<f64> {
        if self.identity {
            p
        } else {
            transform_point(&self.matrix, &p)
        }
    }

    fn direction(&self, d: Vector3<f64>) -> Vector3<f64> {
        if self.identity {
            d
        } else {
            transform_direction(&self.matrix, &d)
        }
    }

    fn plane(&self, normal: Vector3<f64>, offset: f64) -> (Vector3<f64>, f64) {
        if self.identity {
            (normal, offset)
        } else {
            transform_plane(&self.inv_t, &normal, offset)
        }
    }

    fn ctl_points(&self, pt_type: PointType, values: &mut [f64]) -> Result<()> {
        if self.identity {
            return check_ctl_point_type(pt_type);
        }
        transform_ctl_points(&self.matrix, pt_type, values)
    }

    fn parse(&mut self, model: &mut Model) -> Result<()> {
        for kind in FIXED_KINDS {
            for i in 0..self.layout.counts.get(kind) as usize {
                self.parse_record(model, kind, i)?;
            }
        }
        Ok(())
    }

    fn parse_record(&mut self, model: &mut Model, kind: NodeKind, i: usize) -> Result<()> {
        let mut r = self.record(kind, i)?;
        let node = self
            .keys
            .node(kind, i)
            .ok_or_else(|| Error::invariant(format!("no placeholder for {kind} #{i}")))?;

        match node {
            NodeRef::Model => {
                model.version = r.get_u32()?;
                self.heads.push((ListOwner::Regions, r.get_link()?));
            }
            NodeRef::Region(k) => {
                self.primary.insert(node, r.get_link()?);
                let m_p = r.get_u32()?;
                match self.resolve(kind, "m_p", m_p)? {
                    Some(NodeRef::Model) => {}
                    None => return Err(Error::MissingReference { kind, field: "m_p" }),
                    Some(other) => return Err(mismatch("m_p", "model", m_p, other)),
                }
                let _ra_p = r.get_u32()?;
                self.heads.push((ListOwner::Shells(k), r.get_link()?));
            }
            NodeRef::Shell(k) => {
                self.primary.insert(node, r.get_link()?);
                let region = self.region(kind, "r_p", r.get_u32()?)?;
                let _sa_p = r.get_u32()?;
                self.heads.push((ListOwner::ShellFaceUses(k), r.get_link()?));
                self.heads.push((ListOwner::ShellLoopUses(k), r.get_link()?));
                self.heads.push((ListOwner::ShellEdgeUses(k), r.get_link()?));
                let vertexuse = self.opt_vertexuse(kind, "vu_p", r.get_u32()?)?;
                if let Some(s) = model.shells.get_mut(k) {
                    s.region = region;
                    s.vertexuse = vertexuse;
                }
            }
            NodeRef::FaceUse(k) => {
                self.primary.insert(node, r.get_link()?);
                let shell = self.shell(kind, "s_p", r.get_u32()?)?;
                let mate = self.faceuse(kind, "fumate_p", r.get_u32()?)?;
                let orient = orientation(kind, r.get_u32()?)?;
                let face = self.face(kind, "f_p", r.get_u32()?)?;
                self.heads.push((ListOwner::FaceUseLoopUses(k), r.get_link()?));
                if let Some(fu) = model.faceuses.get_mut(k) {
                    fu.shell = shell;
                    fu.mate = mate;
                    fu.orientation = orient;
                    fu.face = face;
                }
            }
            NodeRef::Face(k) => {
                self.secondary.insert(node, r.get_link()?);
                let faceuse = self.faceuse(kind, "fu_p", r.get_u32()?)?;
                let geom = self.face_geom(kind, "g", r.get_u32()?)?;
                let flip = r.get_u32()? != 0;
                if let Some(f) = model.faces.get_mut(k) {
                    f.faceuse = faceuse;
                    f.geom = geom;
                    f.flip = flip;
                }
            }
            NodeRef::FacePlane(k) => {
                self.heads.push((ListOwner::PlaneFaces(k), r.get_link()?));
                let normal = r.get_vector()?;
                let offset = r.get_f64()?;
                let (normal, offset) = self.plane(normal, offset);
                if let Some(g) = model.face_planes.get_mut(k) {
                    g.normal = normal;
                    g.offset = offset;
                }
            }
            NodeRef::FaceSnurb(k) => {
                self.heads.push((ListOwner::SnurbFaces(k), r.get_link()?));
                let order = [r.get_u32()?, r.get_u32()?];
                let u_size = r.get_u32()? as usize;
                let v_size = r.get_u32()? as usize;
                let u_knots = self.array(r.get_u32()?, u_size)?;
                let v_knots = self.array(r.get_u32()?, v_size)?;
                let size = [r.get_u32()?, r.get_u32()?];
                let pt_type = PointType(r.get_u32()?);
                let ctl_len = (size[0] as usize)
                    .checked_mul(size[1] as usize)
                    .and_then(|n| n.checked_mul(pt_type.coords()))
                    .ok_or(Error::ArrayTooLarge { kind, field: "ctl_points" })?;
                let mut ctl_points = self.array(r.get_u32()?, ctl_len)?;
                self.ctl_points(pt_type, &mut ctl_points)?;
                if let Some(g) = model.face_snurbs.get_mut(k) {
                    g.surface = NurbsSurface {
                        order,
                        u_knots,
                        v_knots,
                        size,
                        pt_type,
                        ctl_points,
                    };
                }
            }
            NodeRef::LoopUse(k) => {
                self.primary.insert(node, r.get_link()?);
                let parent = self.loopuse_parent(r.get_u32()?)?;
                let mate = self.loopuse(kind, "lumate_p", r.get_u32()?)?;
                let orient = orientation(kind, r.get_u32()?)?;
                let lp = self.loop_(kind, "l_p", r.get_u32()?)?;
                self.heads.push((ListOwner::LoopUseDown(k), r.get_link()?));
                if let Some(lu) = model.loopuses.get_mut(k) {
                    lu.parent = parent;
                    lu.mate = mate;
                    lu.orientation = orient;
                    lu.lp = lp;
                }
            }
            NodeRef::Loop(k) => {
                let loopuse = self.loopuse(kind, "lu_p", r.get_u32()?)?;
                let _lg_p = r.get_u32()?;
                if let Some(l) = model.loops.get_mut(k) {
                    l.loopuse = loopuse;
                }
            }
            NodeRef::EdgeUse(k) => {
                self.primary.insert(node, r.get_link()?);
                self.secondary.insert(node, r.get_link()?);
                let parent = self.edgeuse_parent(r.get_u32()?)?;
                let mate = self.edgeuse(kind, "eumate_p", r.get_u32()?)?;
                let radial = self.edgeuse(kind, "radial_p", r.get_u32()?)?;
                let edge = self.edge(kind, "e_p", r.get_u32()?)?;
                let orient = orientation(kind, r.get_u32()?)?;
                let vertexuse = self.vertexuse(kind, "vu_p", r.get_u32()?)?;
                let geom = self.edge_geom(kind, "g", r.get_u32()?)?;
                if let Some(eu) = model.edgeuses.get_mut(k) {
                    eu.parent = parent;
                    eu.mate = mate;
                    eu.radial = radial;
                    eu.edge = edge;
                    eu.orientation = orient;
                    eu.vertexuse = vertexuse;
                    eu.geom = geom;
                }
            }
            NodeRef::Edge(k) => {
                let edgeuse = self.edgeuse(kind, "eu_p", r.get_u32()?)?;
                let is_real = r.get_u32()? != 0;
                if let Some(e) = model.edges.get_mut(k) {
                    e.edgeuse = edgeuse;
                    e.is_real = is_real;
                }
            }
            NodeRef::EdgeLine(k) => {
                self.heads.push((ListOwner::LineEdgeUses(k), r.get_link()?));
                let point = self.point(r.get_point()?);
                let dir = self.direction(r.get_vector()?);
                if let Some(g) = model.edge_lines.get_mut(k) {
                    g.point = point;
                    g.dir = dir;
                }
            }
            NodeRef::EdgeCurve(k) => {
                self.heads.push((ListOwner::CurveEdgeUses(k), r.get_link()?));
                let order = r.get_u32()?;
                let k_size = r.get_u32()? as usize;
                let knots_sub = r.get_u32()?;
                let c_size = r.get_u32()? as usize;
                let pt_type = PointType(r.get_u32()?);
                let ctl_sub = r.get_u32()?;
                let curve = if order == 0 {
                    NurbsCurve::default()
                } else {
                    let knots = self.array(knots_sub, k_size)?;
                    let ctl_len = c_size
                        .checked_mul(pt_type.coords())
                        .ok_or(Error::ArrayTooLarge { kind, field: "ctl_points" })?;
                    let mut ctl_points = self.array(ctl_sub, ctl_len)?;
                    self.ctl_points(pt_type, &mut ctl_points)?;
                    NurbsCurve {
                        order,
                        knots,
                        pt_type,
                        ctl_points,
                    }
                };
                if let Some(g) = model.edge_curves.get_mut(k) {
                    g.curve = curve;
                }
            }
            NodeRef::VertexUse(k) => {
                self.primary.insert(node, r.get_link()?);
                let parent = self.vertexuse_parent(r.get_u32()?)?;
                let vertex = self.vertex(kind, "v_p", r.get_u32()?)?;
                let attr = self.vertexuse_attr(kind, "a", r.get_u32()?)?;
                if let Some(vu) = model.vertexuses.get_mut(k) {
                    vu.parent = parent;
                    vu.vertex = vertex;
                    vu.attr = attr;
                }
            }
            NodeRef::VertexUsePlane(k) => {
                let normal = self.direction(r.get_vector()?);
                if let Some(a) = model.vu_planes.get_mut(k) {
                    a.normal = normal;
                }
            }
            NodeRef::VertexUseCurve(k) => {
                let param = [r.get_f64()?, r.get_f64()?, r.get_f64()?];
                if let Some(a) = model.vu_curves.get_mut(k) {
                    a.param = param;
                }
            }
            NodeRef::Vertex(k) => {
                self.heads.push((ListOwner::VertexUses(k), r.get_link()?));
                let geom = self.opt_vertex_geom(kind, "vg_p", r.get_u32()?)?;
                if let Some(v) = model.vertices.get_mut(k) {
                    v.geom = geom;
                }
            }
            NodeRef::VertexGeom(k) => {
                let coord = self.point(r.get_point()?);
                if let Some(g) = model.vertex_geoms.get_mut(k) {
                    g.coord = coord;
                }
            }
            NodeRef::RegionGeom(_) | NodeRef::ShellGeom(_) | NodeRef::LoopGeom(_) => {
                return Err(Error::DerivedRecords { kind, count: 1 });
            }
        }
        Ok(())
    }

    /// Follows the list from `head`, checking every back link.
    fn walk(
        &self,
        owner: ListOwner,
        head: Link,
        claimed: &mut FxHashSet<(bool, NodeRef)>,
    ) -> Result<Vec<NodeRef>> {
        let secondary = owner.is_secondary();
        let member = owner.member_kind();
        let links = if secondary { &self.secondary } else { &self.primary };
        let broken = |subscript| Error::BrokenList {
            kind: owner.owner_kind(),
            subscript,
        };

        let limit = self.layout.counts.get(member) as usize;
        let mut out = Vec::new();
        let mut prev = DISK_INDEX_LISTHEAD;
        let mut cur = head.forw;
        while cur != DISK_INDEX_LISTHEAD {
            if out.len() >= limit {
                return Err(broken(cur));
            }
            let node = self
                .layout
                .locate(cur)
                .filter(|&(k, _)| k == member)
                .and_then(|(k, i)| self.keys.node(k, i))
                .ok_or_else(|| broken(cur))?;
            let link = links.get(&node).ok_or_else(|| broken(cur))?;
            if link.back != prev || !claimed.insert((secondary, node)) {
                return Err(broken(cur));
            }
            out.push(node);
            prev = cur;
            cur = link.forw;
        }
        if head.back != prev {
            return Err(broken(head.back));
        }
        Ok(out)
    }

    /// The single vertexuse of a vertex loop, if `head` names one.
    fn vertex_loop(&self, head: Link) -> Option<VertexUseKey> {
        let (kind, i) = self.layout.locate(head.forw)?;
        if kind != NodeKind::VertexUse || head.back != head.forw {
            return None;
        }
        match self.keys.node(kind, i)? {
            NodeRef::VertexUse(vu) => Some(vu),
            _ => None,
        }
    }

    fn link_lists(&self, model: &mut Model) -> Result<()> {
        let mut claimed = FxHashSet::default();
        for &(owner, head) in &self.heads {
            if let ListOwner::LoopUseDown(lu) = owner {
                if let Some(vu) = self.vertex_loop(head) {
                    if let Some(data) = model.loopuses.get_mut(lu) {
                        data.down = LoopUseDown::Vertex(vu);
                    }
                    continue;
                }
            }

            let members = self.walk(owner, head, &mut claimed)?;
            let broken =
                |node: NodeRef| Error::invariant(format!("{node} on a {} list", owner.member_kind()));
            match owner {
                ListOwner::Regions => model.region_list = typed(members).map_err(broken)?,
                ListOwner::Shells(k) => {
                    if let Some(r) = model.regions.get_mut(k) {
                        r.shells = typed(members).map_err(broken)?;
                    }
                }
                ListOwner::ShellFaceUses(k) => {
                    if let Some(s) = model.shells.get_mut(k) {
                        s.faceuses = typed(members).map_err(broken)?;
                    }
                }
                ListOwner::ShellLoopUses(k) => {
                    if let Some(s) = model.shells.get_mut(k) {
                        s.loopuses = typed(members).map_err(broken)?;
                    }
                }
                ListOwner::ShellEdgeUses(k) => {
                    if let Some(s) = model.shells.get_mut(k) {
                        s.edgeuses = typed(members).map_err(broken)?;
                    }
                }
                ListOwner::FaceUseLoopUses(k) => {
                    if let Some(fu) = model.faceuses.get_mut(k) {
                        fu.loopuses = typed(members).map_err(broken)?;
                    }
                }
                ListOwner::LoopUseDown(k) => {
                    if let Some(lu) = model.loopuses.get_mut(k) {
                        lu.down = LoopUseDown::Edges(typed(members).map_err(broken)?);
                    }
                }
                ListOwner::VertexUses(k) => {
                    if let Some(v) = model.vertices.get_mut(k) {
                        v.uses = typed(members).map_err(broken)?;
                    }
                }
                ListOwner::PlaneFaces(k) => {
                    if let Some(g) = model.face_planes.get_mut(k) {
                        g.faces = typed(members).map_err(broken)?;
                    }
                }
                ListOwner::SnurbFaces(k) => {
                    if let Some(g) = model.face_snurbs.get_mut(k) {
                        g.faces = typed(members).map_err(broken)?;
                    }
                }
                ListOwner::LineEdgeUses(k) => {
                    if let Some(g) = model.edge_lines.get_mut(k) {
                        g.edgeuses = typed(members).map_err(broken)?;
                    }
                }
                ListOwner::CurveEdgeUses(k) => {
                    if let Some(g) = model.edge_curves.get_mut(k) {
                        g.edgeuses = typed(members).map_err(broken)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn typed<K: TryFrom<NodeRef, Error = NodeRef>>(nodes: Vec<NodeRef>) -> std::result::Result<Vec<K>, NodeRef> {
    nodes.into_iter().map(K::try_from).collect()
}

/// Rebuilds a model from `buf`.
pub fn import_model(buf: &[u8], options: &ImportOptions) -> Result<Model> {
    let header = DiskHeader::read(buf)?;
    let layout = Layout::new(&header, buf.len())?;
    let inv_t = inverse_transpose(&options.matrix)?;

    let fixed_end = header.fixed_bytes() as usize;
    let mut tail = DiskReader::new(&buf[fixed_end..], fixed_end);
    let arrays = read_arrays(&mut tail)?;
    let arrays_len = u32::try_from(arrays.len()).unwrap_or(u32::MAX);
    if u64::from(layout.max_fixed) + u64::from(arrays_len) >= u64::from(DISK_INDEX_LISTHEAD) {
        return Err(Error::SubscriptOutOfRange {
            subscript: u32::MAX,
            max: DISK_INDEX_LISTHEAD - 1,
        });
    }
    let layout = Layout {
        max_index: layout.max_fixed + arrays_len,
        ..layout
    };

    let mut model = Model::new();
    let keys = Keys::allocate(&mut model, &layout.counts);
    let mut decoder = Decoder {
        buf,
        layout,
        keys,
        arrays,
        matrix: options.matrix,
        inv_t,
        identity: options.matrix == Matrix4::identity(),
        heads: Vec::new(),
        primary: FxHashMap::default(),
        secondary: FxHashMap::default(),
    };
    decoder.parse(&mut model)?;
    decoder.link_lists(&mut model)?;

    model.rebound()?;
    if options.verify {
        model.validate()?;
    }
    tracing::debug!(
        bytes = buf.len(),
        records = decoder.layout.max_fixed,
        arrays = decoder.arrays.len(),
        "imported model"
    );
    Ok(model)
}
