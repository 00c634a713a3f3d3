// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for the NMG boundary representation graph.
//!
//! The [`Model`] is both the root of the graph and the owner of every node.
//! Each kind lives in its own slot map with stable, generational keys, and
//! every cross-reference the classic pointer-based structure carries (mates,
//! radial neighbours, parents, list heads) is a key or an ordered `Vec` of
//! keys here.
//!
//! ## Uses and mates
//!
//! Faces, loops and edges are undirected. Every one of them is reached
//! through *uses*: a face has two faceuses (one per side), a loop has one
//! loopuse per side of its face, and an edge has a pair of edgeuses per
//! loop it bounds. The two uses of a pair are *mates* and always point at
//! each other. Edgeuses are additionally linked around their edge by the
//! radial pointer, which is what lets any number of faces meet at one edge.

use nalgebra::{Point3, Vector3};
use slotmap::SlotMap;

use crate::bbox::Aabb;
use crate::keys::*;
use crate::kind::{NodeKind, DISK_MODEL_VERSION};
use crate::nurbs::{NurbsCurve, NurbsSurface};

/// Which side of the underlying geometry a use sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    None,
    Same,
    Opposite,
    Unspec,
    BoolPlace,
}

impl Orientation {
    pub fn code(self) -> u32 {
        match self {
            Orientation::None => 0,
            Orientation::Same => 1,
            Orientation::Opposite => 2,
            Orientation::Unspec => 3,
            Orientation::BoolPlace => 4,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Orientation::None),
            1 => Some(Orientation::Same),
            2 => Some(Orientation::Opposite),
            3 => Some(Orientation::Unspec),
            4 => Some(Orientation::BoolPlace),
            _ => None,
        }
    }

    /// The orientation a mate must carry.
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Same => Orientation::Opposite,
            Orientation::Opposite => Orientation::Same,
            other => other,
        }
    }
}

/// Owner of a loopuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopUseParent {
    FaceUse(FaceUseKey),
    Shell(ShellKey),
}

impl Default for LoopUseParent {
    fn default() -> Self {
        LoopUseParent::Shell(ShellKey::default())
    }
}

/// Owner of an edgeuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeUseParent {
    LoopUse(LoopUseKey),
    Shell(ShellKey),
}

impl Default for EdgeUseParent {
    fn default() -> Self {
        EdgeUseParent::Shell(ShellKey::default())
    }
}

/// Owner of a vertexuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexUseParent {
    EdgeUse(EdgeUseKey),
    LoopUse(LoopUseKey),
    Shell(ShellKey),
}

impl Default for VertexUseParent {
    fn default() -> Self {
        VertexUseParent::Shell(ShellKey::default())
    }
}

/// Contents of a loopuse: a ring of edgeuses, or a single vertexuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopUseDown {
    Edges(Vec<EdgeUseKey>),
    Vertex(VertexUseKey),
}

impl Default for LoopUseDown {
    fn default() -> Self {
        LoopUseDown::Edges(Vec::new())
    }
}

/// Geometry of a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceGeom {
    Plane(FacePlaneKey),
    Snurb(FaceSnurbKey),
}

/// Geometry of an edge, shared by every use of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeGeom {
    Line(EdgeLineKey),
    Curve(EdgeCurveKey),
}

/// Optional attribute of a vertexuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexUseAttr {
    Plane(VertexUsePlaneKey),
    Curve(VertexUseCurveKey),
}

/// A region: an ordered set of shells.
#[derive(Debug, Clone, Default)]
pub struct RegionData {
    pub shells: Vec<ShellKey>,
    /// Cached bounding box, recomputed by [`Model::rebound`].
    pub bbox: Option<Aabb>,
}

/// A shell: faces, wire loops, wire edges, or a lone vertex.
#[derive(Debug, Clone, Default)]
pub struct ShellData {
    pub region: RegionKey,
    pub faceuses: Vec<FaceUseKey>,
    pub loopuses: Vec<LoopUseKey>,
    pub edgeuses: Vec<EdgeUseKey>,
    pub vertexuse: Option<VertexUseKey>,
    pub bbox: Option<Aabb>,
}

#[derive(Debug, Clone, Default)]
pub struct FaceUseData {
    pub shell: ShellKey,
    pub mate: FaceUseKey,
    pub orientation: Orientation,
    pub face: FaceKey,
    pub loopuses: Vec<LoopUseKey>,
}

#[derive(Debug, Clone, Default)]
pub struct FaceData {
    /// Representative use.
    pub faceuse: FaceUseKey,
    pub geom: Option<FaceGeom>,
    /// `true` when the face normal is the reverse of its geometry's normal.
    pub flip: bool,
    pub bbox: Option<Aabb>,
}

/// Plane `normal · p = offset`, shared by coplanar faces.
#[derive(Debug, Clone)]
pub struct FacePlaneData {
    pub faces: Vec<FaceKey>,
    pub normal: Vector3<f64>,
    pub offset: f64,
}

impl Default for FacePlaneData {
    fn default() -> Self {
        Self {
            faces: Vec::new(),
            normal: Vector3::zeros(),
            offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FaceSnurbData {
    pub faces: Vec<FaceKey>,
    pub surface: NurbsSurface,
}

#[derive(Debug, Clone, Default)]
pub struct LoopUseData {
    pub parent: LoopUseParent,
    pub mate: LoopUseKey,
    pub orientation: Orientation,
    pub lp: LoopKey,
    pub down: LoopUseDown,
}

#[derive(Debug, Clone, Default)]
pub struct LoopData {
    pub loopuse: LoopUseKey,
    pub bbox: Option<Aabb>,
}

#[derive(Debug, Clone, Default)]
pub struct EdgeUseData {
    pub parent: EdgeUseParent,
    pub mate: EdgeUseKey,
    /// Next use around the edge, running the opposite way to this one.
    pub radial: EdgeUseKey,
    pub edge: EdgeKey,
    pub orientation: Orientation,
    /// Use of the vertex this edgeuse starts at.
    pub vertexuse: VertexUseKey,
    pub geom: Option<EdgeGeom>,
}

#[derive(Debug, Clone, Default)]
pub struct EdgeData {
    pub edgeuse: EdgeUseKey,
    /// `false` for bookkeeping edges introduced by modeling algorithms.
    pub is_real: bool,
}

/// Infinite line through `point` along `dir`.
#[derive(Debug, Clone)]
pub struct EdgeLineData {
    pub edgeuses: Vec<EdgeUseKey>,
    pub point: Point3<f64>,
    pub dir: Vector3<f64>,
}

impl Default for EdgeLineData {
    fn default() -> Self {
        Self {
            edgeuses: Vec::new(),
            point: Point3::origin(),
            dir: Vector3::zeros(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EdgeCurveData {
    pub edgeuses: Vec<EdgeUseKey>,
    pub curve: NurbsCurve,
}

#[derive(Debug, Clone, Default)]
pub struct VertexUseData {
    pub parent: VertexUseParent,
    pub vertex: VertexKey,
    pub attr: Option<VertexUseAttr>,
}

/// Surface normal at a vertexuse.
#[derive(Debug, Clone)]
pub struct VertexUsePlaneData {
    pub normal: Vector3<f64>,
}

impl Default for VertexUsePlaneData {
    fn default() -> Self {
        Self {
            normal: Vector3::zeros(),
        }
    }
}

/// Curve parameter `(u, v, w)` at a vertexuse.
#[derive(Debug, Clone, Default)]
pub struct VertexUseCurveData {
    pub param: [f64; 3],
}

#[derive(Debug, Clone, Default)]
pub struct VertexData {
    pub uses: Vec<VertexUseKey>,
    pub geom: Option<VertexGeomKey>,
}

#[derive(Debug, Clone)]
pub struct VertexGeomData {
    pub coord: Point3<f64>,
}

impl Default for VertexGeomData {
    fn default() -> Self {
        Self {
            coord: Point3::origin(),
        }
    }
}

/// The root of an NMG graph and the owner of all of its nodes.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use nmg_lite::Model;
///
/// let mut model = Model::new();
/// let r = model.add_region();
/// let s = model.add_shell(r).unwrap();
/// let vs = [
///     model.add_vertex(Point3::new(0.0, 0.0, 0.0)),
///     model.add_vertex(Point3::new(1.0, 0.0, 0.0)),
///     model.add_vertex(Point3::new(0.0, 1.0, 0.0)),
/// ];
/// model.add_face(s, &vs).unwrap();
///
/// assert_eq!(model.count(nmg_lite::NodeKind::EdgeUse), 6);
/// ```
#[derive(Debug, Clone)]
pub struct Model {
    pub version: u32,
    pub(crate) region_list: Vec<RegionKey>,

    pub(crate) regions: SlotMap<RegionKey, RegionData>,
    pub(crate) shells: SlotMap<ShellKey, ShellData>,
    pub(crate) faceuses: SlotMap<FaceUseKey, FaceUseData>,
    pub(crate) faces: SlotMap<FaceKey, FaceData>,
    pub(crate) face_planes: SlotMap<FacePlaneKey, FacePlaneData>,
    pub(crate) face_snurbs: SlotMap<FaceSnurbKey, FaceSnurbData>,
    pub(crate) loopuses: SlotMap<LoopUseKey, LoopUseData>,
    pub(crate) loops: SlotMap<LoopKey, LoopData>,
    pub(crate) edgeuses: SlotMap<EdgeUseKey, EdgeUseData>,
    pub(crate) edges: SlotMap<EdgeKey, EdgeData>,
    pub(crate) edge_lines: SlotMap<EdgeLineKey, EdgeLineData>,
    pub(crate) edge_curves: SlotMap<EdgeCurveKey, EdgeCurveData>,
    pub(crate) vertexuses: SlotMap<VertexUseKey, VertexUseData>,
    pub(crate) vu_planes: SlotMap<VertexUsePlaneKey, VertexUsePlaneData>,
    pub(crate) vu_curves: SlotMap<VertexUseCurveKey, VertexUseCurveData>,
    pub(crate) vertices: SlotMap<VertexKey, VertexData>,
    pub(crate) vertex_geoms: SlotMap<VertexGeomKey, VertexGeomData>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self {
            version: DISK_MODEL_VERSION,
            region_list: Vec::new(),
            regions: SlotMap::with_key(),
            shells: SlotMap::with_key(),
            faceuses: SlotMap::with_key(),
            faces: SlotMap::with_key(),
            face_planes: SlotMap::with_key(),
            face_snurbs: SlotMap::with_key(),
            loopuses: SlotMap::with_key(),
            loops: SlotMap::with_key(),
            edgeuses: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            edge_lines: SlotMap::with_key(),
            edge_curves: SlotMap::with_key(),
            vertexuses: SlotMap::with_key(),
            vu_planes: SlotMap::with_key(),
            vu_curves: SlotMap::with_key(),
            vertices: SlotMap::with_key(),
            vertex_geoms: SlotMap::with_key(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Regions in model order.
    pub fn regions(&self) -> &[RegionKey] {
        &self.region_list
    }

    pub fn region(&self, key: RegionKey) -> Option<&RegionData> {
        self.regions.get(key)
    }

    pub fn shell(&self, key: ShellKey) -> Option<&ShellData> {
        self.shells.get(key)
    }

    pub fn faceuse(&self, key: FaceUseKey) -> Option<&FaceUseData> {
        self.faceuses.get(key)
    }

    pub fn face(&self, key: FaceKey) -> Option<&FaceData> {
        self.faces.get(key)
    }

    pub fn face_plane(&self, key: FacePlaneKey) -> Option<&FacePlaneData> {
        self.face_planes.get(key)
    }

    pub fn face_snurb(&self, key: FaceSnurbKey) -> Option<&FaceSnurbData> {
        self.face_snurbs.get(key)
    }

    pub fn loopuse(&self, key: LoopUseKey) -> Option<&LoopUseData> {
        self.loopuses.get(key)
    }

    pub fn loop_(&self, key: LoopKey) -> Option<&LoopData> {
        self.loops.get(key)
    }

    pub fn edgeuse(&self, key: EdgeUseKey) -> Option<&EdgeUseData> {
        self.edgeuses.get(key)
    }

    pub fn edge(&self, key: EdgeKey) -> Option<&EdgeData> {
        self.edges.get(key)
    }

    pub fn edge_line(&self, key: EdgeLineKey) -> Option<&EdgeLineData> {
        self.edge_lines.get(key)
    }

    pub fn edge_curve(&self, key: EdgeCurveKey) -> Option<&EdgeCurveData> {
        self.edge_curves.get(key)
    }

    pub fn vertexuse(&self, key: VertexUseKey) -> Option<&VertexUseData> {
        self.vertexuses.get(key)
    }

    pub fn vertexuse_plane(&self, key: VertexUsePlaneKey) -> Option<&VertexUsePlaneData> {
        self.vu_planes.get(key)
    }

    pub fn vertexuse_curve(&self, key: VertexUseCurveKey) -> Option<&VertexUseCurveData> {
        self.vu_curves.get(key)
    }

    pub fn vertex(&self, key: VertexKey) -> Option<&VertexData> {
        self.vertices.get(key)
    }

    pub fn vertex_geom(&self, key: VertexGeomKey) -> Option<&VertexGeomData> {
        self.vertex_geoms.get(key)
    }

    /// Iterates all live vertices.
    pub fn vertex_keys(&self) -> impl Iterator<Item = VertexKey> + '_ {
        self.vertices.keys()
    }

    /// Iterates all live edges.
    pub fn edge_keys(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        self.edges.keys()
    }

    /// Iterates all live faces.
    pub fn face_keys(&self) -> impl Iterator<Item = FaceKey> + '_ {
        self.faces.keys()
    }

    // =========================================================================
    // Counts
    // =========================================================================

    /// Number of live nodes of `kind`.
    ///
    /// Bounding-box kinds count the cached boxes currently present; the
    /// synthetic double-array kind is always zero.
    pub fn count(&self, kind: NodeKind) -> usize {
        match kind {
            NodeKind::Model => 1,
            NodeKind::Region => self.regions.len(),
            NodeKind::RegionGeom => self.regions.values().filter(|r| r.bbox.is_some()).count(),
            NodeKind::Shell => self.shells.len(),
            NodeKind::ShellGeom => self.shells.values().filter(|s| s.bbox.is_some()).count(),
            NodeKind::FaceUse => self.faceuses.len(),
            NodeKind::Face => self.faces.len(),
            NodeKind::FacePlaneGeom => self.face_planes.len(),
            NodeKind::FaceSnurbGeom => self.face_snurbs.len(),
            NodeKind::LoopUse => self.loopuses.len(),
            NodeKind::Loop => self.loops.len(),
            NodeKind::LoopGeom => self.loops.values().filter(|l| l.bbox.is_some()).count(),
            NodeKind::EdgeUse => self.edgeuses.len(),
            NodeKind::Edge => self.edges.len(),
            NodeKind::EdgeLineGeom => self.edge_lines.len(),
            NodeKind::EdgeCurveGeom => self.edge_curves.len(),
            NodeKind::VertexUse => self.vertexuses.len(),
            NodeKind::VertexUsePlaneGeom => self.vu_planes.len(),
            NodeKind::VertexUseCurveGeom => self.vu_curves.len(),
            NodeKind::Vertex => self.vertices.len(),
            NodeKind::VertexGeom => self.vertex_geoms.len(),
            NodeKind::DoubleArray => 0,
        }
    }

    /// `true` when `node` names a live node of this model.
    pub fn contains(&self, node: NodeRef) -> bool {
        match node {
            NodeRef::Model => true,
            NodeRef::Region(k) => self.regions.contains_key(k),
            NodeRef::RegionGeom(k) => self.regions.get(k).is_some_and(|r| r.bbox.is_some()),
            NodeRef::Shell(k) => self.shells.contains_key(k),
            NodeRef::ShellGeom(k) => self.shells.get(k).is_some_and(|s| s.bbox.is_some()),
            NodeRef::FaceUse(k) => self.faceuses.contains_key(k),
            NodeRef::Face(k) => self.faces.contains_key(k),
            NodeRef::FacePlane(k) => self.face_planes.contains_key(k),
            NodeRef::FaceSnurb(k) => self.face_snurbs.contains_key(k),
            NodeRef::LoopUse(k) => self.loopuses.contains_key(k),
            NodeRef::Loop(k) => self.loops.contains_key(k),
            NodeRef::LoopGeom(k) => self.loops.get(k).is_some_and(|l| l.bbox.is_some()),
            NodeRef::EdgeUse(k) => self.edgeuses.contains_key(k),
            NodeRef::Edge(k) => self.edges.contains_key(k),
            NodeRef::EdgeLine(k) => self.edge_lines.contains_key(k),
            NodeRef::EdgeCurve(k) => self.edge_curves.contains_key(k),
            NodeRef::VertexUse(k) => self.vertexuses.contains_key(k),
            NodeRef::VertexUsePlane(k) => self.vu_planes.contains_key(k),
            NodeRef::VertexUseCurve(k) => self.vu_curves.contains_key(k),
            NodeRef::Vertex(k) => self.vertices.contains_key(k),
            NodeRef::VertexGeom(k) => self.vertex_geoms.contains_key(k),
        }
    }

    /// Drops every cached bounding box.
    pub fn invalidate_bounds(&mut self) {
        for r in self.regions.values_mut() {
            r.bbox = None;
        }
        for s in self.shells.values_mut() {
            s.bbox = None;
        }
        for l in self.loops.values_mut() {
            l.bbox = None;
        }
        for f in self.faces.values_mut() {
            f.bbox = None;
        }
    }
}

impl From<LoopUseParent> for NodeRef {
    fn from(p: LoopUseParent) -> Self {
        match p {
            LoopUseParent::FaceUse(k) => NodeRef::FaceUse(k),
            LoopUseParent::Shell(k) => NodeRef::Shell(k),
        }
    }
}

impl From<EdgeUseParent> for NodeRef {
    fn from(p: EdgeUseParent) -> Self {
        match p {
            EdgeUseParent::LoopUse(k) => NodeRef::LoopUse(k),
            EdgeUseParent::Shell(k) => NodeRef::Shell(k),
        }
    }
}

impl From<VertexUseParent> for NodeRef {
    fn from(p: VertexUseParent) -> Self {
        match p {
            VertexUseParent::EdgeUse(k) => NodeRef::EdgeUse(k),
            VertexUseParent::LoopUse(k) => NodeRef::LoopUse(k),
            VertexUseParent::Shell(k) => NodeRef::Shell(k),
        }
    }
}

impl From<FaceGeom> for NodeRef {
    fn from(g: FaceGeom) -> Self {
        match g {
            FaceGeom::Plane(k) => NodeRef::FacePlane(k),
            FaceGeom::Snurb(k) => NodeRef::FaceSnurb(k),
        }
    }
}

impl From<EdgeGeom> for NodeRef {
    fn from(g: EdgeGeom) -> Self {
        match g {
            EdgeGeom::Line(k) => NodeRef::EdgeLine(k),
            EdgeGeom::Curve(k) => NodeRef::EdgeCurve(k),
        }
    }
}

impl From<VertexUseAttr> for NodeRef {
    fn from(a: VertexUseAttr) -> Self {
        match a {
            VertexUseAttr::Plane(k) => NodeRef::VertexUsePlane(k),
            VertexUseAttr::Curve(k) => NodeRef::VertexUseCurve(k),
        }
    }
}
