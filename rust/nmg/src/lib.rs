// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # NMG-Lite
//!
//! Non-manifold geometry (NMG) boundary representation with a portable
//! binary disk form.
//!
//! The graph is the classic region / shell / face / loop / edge / vertex
//! hierarchy where every face, loop, edge and vertex is reached through a
//! directed *use*. Uses come in mate pairs, and the edgeuses around an edge
//! form a radial ring, so any number of faces may share one edge. Nodes
//! are stored in per-kind slot maps owned by [`Model`].
//!
//! The [`codec`] module flattens a model into one contiguous big-endian
//! buffer and rebuilds it, optionally through an affine transform:
//!
//! ```
//! use nalgebra::Point3;
//! use nmg_lite::{export_model, import_model, ExportOptions, ImportOptions, Model};
//!
//! let mut model = Model::new();
//! let r = model.add_region();
//! let s = model.add_shell(r).unwrap();
//! let vs = [
//!     model.add_vertex(Point3::new(0.0, 0.0, 0.0)),
//!     model.add_vertex(Point3::new(1.0, 0.0, 0.0)),
//!     model.add_vertex(Point3::new(0.0, 1.0, 0.0)),
//! ];
//! model.add_face(s, &vs).unwrap();
//!
//! let bytes = export_model(&model, &ExportOptions { local2mm: 25.4 }).unwrap();
//! let back = import_model(&bytes, &ImportOptions::scaled(1.0 / 25.4)).unwrap();
//! assert_eq!(back.count(nmg_lite::NodeKind::Face), 1);
//! ```

pub mod bbox;
pub mod codec;
pub mod construction;
pub mod error;
pub mod keys;
pub mod kind;
pub mod model;
pub mod nurbs;
pub mod transform;
pub mod traversal;
pub mod validate;

pub use bbox::Aabb;
pub use codec::{describe, export_model, import_model, DiskHeader, ExportOptions, ImportOptions};
pub use error::{Error, ErrorCategory, Result};
pub use keys::{
    EdgeCurveKey, EdgeKey, EdgeLineKey, EdgeUseKey, FaceKey, FacePlaneKey, FaceSnurbKey,
    FaceUseKey, LoopKey, LoopUseKey, NodeRef, RegionKey, ShellKey, VertexGeomKey, VertexKey,
    VertexUseCurveKey, VertexUseKey, VertexUsePlaneKey,
};
pub use kind::{KindCounts, NodeKind};
pub use model::{
    EdgeGeom, EdgeUseParent, FaceGeom, LoopUseDown, LoopUseParent, Model, Orientation,
    VertexUseAttr, VertexUseParent,
};
pub use nurbs::{NurbsCurve, NurbsSurface, PointKind, PointType};
