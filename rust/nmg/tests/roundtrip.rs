// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Export/import round trips through the public API.

use approx::assert_relative_eq;
use nalgebra::{Matrix4, Point3, Vector3};
use nmg_lite::codec::HEADER_BYTES;
use nmg_lite::{
    describe, export_model, import_model, EdgeGeom, Error, ErrorCategory, ExportOptions, FaceGeom,
    FaceKey, ImportOptions, LoopUseParent, Model, NodeKind, NurbsCurve, NurbsSurface, PointType,
    ShellKey, VertexKey, VertexUseAttr,
};

fn square_at(m: &mut Model, s: ShellKey, origin: Point3<f64>) -> (FaceKey, [VertexKey; 4]) {
    let vs = [
        m.add_vertex(origin),
        m.add_vertex(origin + Vector3::new(1.0, 0.0, 0.0)),
        m.add_vertex(origin + Vector3::new(1.0, 1.0, 0.0)),
        m.add_vertex(origin + Vector3::new(0.0, 1.0, 0.0)),
    ];
    let f = m.add_face(s, &vs).unwrap();
    m.compute_face_plane(f).unwrap();
    (f, vs)
}

fn square_model(origin: Point3<f64>) -> (Model, FaceKey, [VertexKey; 4]) {
    let mut m = Model::new();
    let r = m.add_region();
    let s = m.add_shell(r).unwrap();
    let (f, vs) = square_at(&mut m, s, origin);
    (m, f, vs)
}

fn tetrahedron() -> Model {
    let mut m = Model::new();
    let r = m.add_region();
    let s = m.add_shell(r).unwrap();
    let a = m.add_vertex(Point3::new(0.0, 0.0, 0.0));
    let b = m.add_vertex(Point3::new(1.0, 0.0, 0.0));
    let c = m.add_vertex(Point3::new(0.0, 1.0, 0.0));
    let d = m.add_vertex(Point3::new(0.0, 0.0, 1.0));
    for tri in [[a, c, b], [a, b, d], [b, c, d], [c, a, d]] {
        let f = m.add_face(s, &tri).unwrap();
        m.compute_face_plane(f).unwrap();
    }
    m
}

fn sorted_points(m: &Model) -> Vec<[f64; 3]> {
    let mut pts: Vec<[f64; 3]> = m
        .vertex_keys()
        .filter_map(|v| m.vertex_point(v))
        .map(|p| [p.x, p.y, p.z])
        .collect();
    pts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    pts
}

/// Absolute offset of record `i` of `kind`, from the header counts.
fn record_offset(buf: &[u8], kind: NodeKind, i: usize) -> usize {
    let h = describe(buf).unwrap();
    let before: usize = h
        .counts
        .iter()
        .take_while(|&(k, _)| k != kind)
        .map(|(k, c)| c as usize * k.disk_size())
        .sum();
    HEADER_BYTES + before + i * kind.disk_size()
}

fn be_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes(buf[at..at + 4].try_into().unwrap())
}

fn be_f64(buf: &[u8], at: usize) -> f64 {
    f64::from_be_bytes(buf[at..at + 8].try_into().unwrap())
}

#[test]
fn square_face_counts_and_coordinates() {
    let (m, _, _) = square_model(Point3::new(0.0, 0.0, 5.0));
    let bytes = export_model(&m, &ExportOptions::default()).unwrap();
    let h = describe(&bytes).unwrap();

    let expected = [
        (NodeKind::Model, 1),
        (NodeKind::Region, 1),
        (NodeKind::Shell, 1),
        (NodeKind::FaceUse, 2),
        (NodeKind::Face, 1),
        (NodeKind::FacePlaneGeom, 1),
        (NodeKind::LoopUse, 2),
        (NodeKind::Loop, 1),
        (NodeKind::EdgeUse, 8),
        (NodeKind::Edge, 4),
        (NodeKind::VertexUse, 8),
        (NodeKind::Vertex, 4),
        (NodeKind::VertexGeom, 4),
    ];
    for (kind, count) in expected {
        assert_eq!(h.counts.get(kind), count, "{kind}");
    }
    assert_eq!(h.counts.total(), 38);
    assert_eq!(bytes.len() as u64, h.fixed_bytes());

    let back = import_model(&bytes, &ImportOptions::default()).unwrap();
    assert_eq!(sorted_points(&back), sorted_points(&m));
    for kind in [NodeKind::FaceUse, NodeKind::EdgeUse, NodeKind::VertexUse] {
        assert_eq!(back.count(kind), m.count(kind));
    }
}

#[test]
fn every_record_sits_in_its_kind_body() {
    let m = tetrahedron();
    let bytes = export_model(&m, &ExportOptions::default()).unwrap();
    let h = describe(&bytes).unwrap();

    let mut at = HEADER_BYTES;
    for (kind, count) in h.counts.iter() {
        for _ in 0..count {
            assert_eq!(be_u32(&bytes, at), kind.disk_magic(), "{kind} at {at}");
            at += kind.disk_size();
        }
    }
    assert_eq!(at, bytes.len());

    // every region points back at the model, subscript 1
    let region = record_offset(&bytes, NodeKind::Region, 0);
    assert_eq!(be_u32(&bytes, region + 12), 1);
}

#[test]
fn zero_count_kinds_take_no_bytes() {
    let (m, _, _) = square_model(Point3::origin());
    let bytes = export_model(&m, &ExportOptions::default()).unwrap();
    let h = describe(&bytes).unwrap();
    assert_eq!(h.counts.get(NodeKind::FaceSnurbGeom), 0);
    assert_eq!(h.counts.get(NodeKind::EdgeCurveGeom), 0);
    assert_eq!(
        record_offset(&bytes, NodeKind::FaceSnurbGeom, 0),
        record_offset(&bytes, NodeKind::LoopUse, 0)
    );
    import_model(&bytes, &ImportOptions::default()).unwrap();
}

#[test]
fn lengths_scale_directions_do_not() {
    let (mut m, f, vs) = square_model(Point3::new(10.0, 10.0, 10.0));
    let edge = m
        .edge_keys()
        .find(|&e| {
            let eu = m.edge(e).unwrap().edgeuse;
            m.edgeuse_start(eu) == Some(vs[0]) && m.edgeuse_end(eu) == Some(vs[1])
                || m.edgeuse_start(eu) == Some(vs[1]) && m.edgeuse_end(eu) == Some(vs[0])
        })
        .unwrap();
    let eu = m.edge(edge).unwrap().edgeuse;
    m.set_edge_line(eu).unwrap();
    let start = m.vertex_point(m.edgeuse_start(eu).unwrap()).unwrap();

    let bytes = export_model(&m, &ExportOptions { local2mm: 25.4 }).unwrap();

    let line = record_offset(&bytes, NodeKind::EdgeLineGeom, 0);
    assert_relative_eq!(be_f64(&bytes, line + 12), start.x * 25.4);
    assert_relative_eq!(be_f64(&bytes, line + 20), 254.0);
    assert_relative_eq!(be_f64(&bytes, line + 28), 254.0);
    assert_relative_eq!(be_f64(&bytes, line + 36).abs(), 1.0);
    assert_eq!(be_f64(&bytes, line + 44), 0.0);
    assert_eq!(be_f64(&bytes, line + 52), 0.0);

    let plane = record_offset(&bytes, NodeKind::FacePlaneGeom, 0);
    assert_relative_eq!(be_f64(&bytes, plane + 28).abs(), 1.0);
    assert_relative_eq!(be_f64(&bytes, plane + 36).abs(), 254.0);

    let back = import_model(&bytes, &ImportOptions::scaled(1.0 / 25.4)).unwrap();
    let f2 = back.face_keys().next().unwrap();
    let Some(FaceGeom::Plane(pk)) = back.face(f2).unwrap().geom else {
        panic!("face lost its plane");
    };
    let Some(FaceGeom::Plane(orig)) = m.face(f).unwrap().geom else {
        panic!("face has no plane");
    };
    assert_relative_eq!(
        back.face_plane(pk).unwrap().offset,
        m.face_plane(orig).unwrap().offset,
        epsilon = 1e-9
    );

    let eu2 = back
        .edge_keys()
        .map(|e| back.edge(e).unwrap().edgeuse)
        .find(|&eu| back.edgeuse(eu).unwrap().geom.is_some())
        .unwrap();
    let Some(EdgeGeom::Line(lk)) = back.edgeuse(eu2).unwrap().geom else {
        panic!("edge lost its line");
    };
    let l = back.edge_line(lk).unwrap();
    assert_relative_eq!(l.point, start, epsilon = 1e-9);
    assert_relative_eq!(l.dir.norm(), 1.0, epsilon = 1e-12);
    for u in back.edge_uses(back.edgeuse(eu2).unwrap().edge).unwrap() {
        assert_eq!(back.edgeuse(u).unwrap().geom, Some(EdgeGeom::Line(lk)));
    }
}

#[test]
fn nurbs_geometry_round_trips() {
    let (mut m, f, vs) = square_model(Point3::origin());
    m.set_face_snurb(
        f,
        NurbsSurface {
            order: [2, 2],
            u_knots: vec![0.0, 0.0, 1.0, 1.0],
            v_knots: vec![0.0, 0.0, 1.0, 1.0],
            size: [2, 2],
            pt_type: PointType::XYZW,
            ctl_points: vec![
                0.0, 0.0, 0.0, 1.0, //
                2.0, 0.0, 0.0, 2.0, //
                0.0, 1.0, 0.0, 1.0, //
                2.0, 2.0, 0.0, 2.0,
            ],
        },
    )
    .unwrap();
    let eu = m
        .edge_keys()
        .map(|e| m.edge(e).unwrap().edgeuse)
        .next()
        .unwrap();
    let a = m.vertex_point(m.edgeuse_start(eu).unwrap()).unwrap();
    let b = m.vertex_point(m.edgeuse_end(eu).unwrap()).unwrap();
    m.set_edge_curve(
        eu,
        NurbsCurve {
            order: 2,
            knots: vec![0.0, 0.0, 1.0, 1.0],
            pt_type: PointType::XYZ,
            ctl_points: vec![a.x, a.y, a.z, b.x, b.y, b.z],
        },
    )
    .unwrap();
    let uv_vu = m.vertex(vs[0]).unwrap().uses[0];
    m.set_vertexuse_param(uv_vu, [0.25, 0.5, 0.0]).unwrap();
    let n_vu = m.vertex(vs[1]).unwrap().uses[0];
    m.set_vertexuse_normal(n_vu, Vector3::new(0.0, 0.0, 1.0)).unwrap();

    let bytes = export_model(&m, &ExportOptions { local2mm: 10.0 }).unwrap();
    let h = describe(&bytes).unwrap();
    assert_eq!(h.counts.get(NodeKind::FaceSnurbGeom), 1);
    assert_eq!(h.counts.get(NodeKind::EdgeCurveGeom), 1);
    // 3 surface arrays + 2 curve arrays: 5 headers and 4+4+16+4+6 doubles
    assert_eq!(bytes.len() as u64, h.fixed_bytes() + 5 * 8 + 34 * 8);

    let back = import_model(&bytes, &ImportOptions::scaled(0.1)).unwrap();

    let f2 = back.face_keys().next().unwrap();
    let Some(FaceGeom::Snurb(sk)) = back.face(f2).unwrap().geom else {
        panic!("face lost its surface");
    };
    let s = &back.face_snurb(sk).unwrap().surface;
    assert_eq!(s.u_knots, vec![0.0, 0.0, 1.0, 1.0]);
    assert_eq!(s.size, [2, 2]);
    assert_eq!(s.pt_type, PointType::XYZW);
    let Some(FaceGeom::Snurb(orig)) = m.face(f).unwrap().geom else {
        panic!("face has no surface");
    };
    for (got, want) in s
        .ctl_points
        .iter()
        .zip(&m.face_snurb(orig).unwrap().surface.ctl_points)
    {
        assert_relative_eq!(got, want, epsilon = 1e-12);
    }

    let curve = back
        .edge_keys()
        .map(|e| back.edge(e).unwrap().edgeuse)
        .find_map(|eu| match back.edgeuse(eu).unwrap().geom {
            Some(EdgeGeom::Curve(k)) => Some(&back.edge_curve(k).unwrap().curve),
            _ => None,
        })
        .unwrap();
    assert_eq!(curve.order, 2);
    assert_eq!(curve.knots, vec![0.0, 0.0, 1.0, 1.0]);
    assert_eq!(curve.point_count(), 2);

    let mut params = 0;
    let mut normals = 0;
    for v in back.vertex_keys() {
        for &vu in &back.vertex(v).unwrap().uses {
            match back.vertexuse(vu).unwrap().attr {
                Some(VertexUseAttr::Curve(k)) => {
                    assert_eq!(back.vertexuse_curve(k).unwrap().param, [0.25, 0.5, 0.0]);
                    params += 1;
                }
                Some(VertexUseAttr::Plane(k)) => {
                    let n = back.vertexuse_plane(k).unwrap().normal;
                    assert_relative_eq!(n, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
                    normals += 1;
                }
                None => {}
            }
        }
    }
    assert_eq!((params, normals), (1, 1));
}

#[test]
fn empty_curve_writes_no_arrays() {
    let (mut m, _, _) = square_model(Point3::origin());
    let eu = m
        .edge_keys()
        .map(|e| m.edge(e).unwrap().edgeuse)
        .next()
        .unwrap();
    m.set_edge_curve(eu, NurbsCurve::default()).unwrap();
    let bytes = export_model(&m, &ExportOptions::default()).unwrap();
    let h = describe(&bytes).unwrap();
    assert_eq!(bytes.len() as u64, h.fixed_bytes());

    let at = record_offset(&bytes, NodeKind::EdgeCurveGeom, 0);
    for field in 0..6 {
        assert_eq!(be_u32(&bytes, at + 12 + 4 * field), 0);
    }

    let back = import_model(&bytes, &ImportOptions::default()).unwrap();
    let curves: Vec<_> = back
        .edge_keys()
        .filter_map(|e| match back.edgeuse(back.edge(e).unwrap().edgeuse).unwrap().geom {
            Some(EdgeGeom::Curve(k)) => Some(k),
            _ => None,
        })
        .collect();
    assert_eq!(curves.len(), 1);
    assert!(back.edge_curve(curves[0]).unwrap().curve.is_empty());
}

#[test]
fn bounding_boxes_are_rebuilt_on_import() {
    let (mut m, _, _) = square_model(Point3::new(1.0, 2.0, 3.0));
    m.rebound().unwrap();
    let bytes = export_model(&m, &ExportOptions::default()).unwrap();
    let h = describe(&bytes).unwrap();
    assert_eq!(h.counts.get(NodeKind::RegionGeom), 0);
    assert_eq!(h.counts.get(NodeKind::ShellGeom), 0);
    assert_eq!(h.counts.get(NodeKind::LoopGeom), 0);

    let shift = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -3.0));
    let back = import_model(&bytes, &ImportOptions::default().with_matrix(shift)).unwrap();
    let r = back.regions()[0];
    let bb = back.region(r).unwrap().bbox.unwrap();
    assert_relative_eq!(bb.min, Point3::new(1.0, 2.0, 0.0));
    assert_relative_eq!(bb.max, Point3::new(2.0, 3.0, 0.0));
    let s = back.region(r).unwrap().shells[0];
    assert!(back.shell(s).unwrap().bbox.is_some());
}

#[test]
fn shared_edges_keep_their_radial_rings() {
    let m = tetrahedron();
    let bytes = export_model(&m, &ExportOptions::default()).unwrap();
    let back = import_model(&bytes, &ImportOptions::default()).unwrap();

    assert_eq!(back.count(NodeKind::Edge), 6);
    assert_eq!(back.count(NodeKind::EdgeUse), 24);
    for e in back.edge_keys() {
        let uses = back.edge_uses(e).unwrap();
        assert_eq!(uses.len(), 4);
        for &eu in &uses {
            assert_eq!(back.radial_ring(eu).unwrap().len(), 4);
        }
    }
    back.validate().unwrap();
}

#[test]
fn wire_topology_round_trips() {
    let mut m = Model::new();
    let r = m.add_region();
    let s = m.add_shell(r).unwrap();
    let a = m.add_vertex(Point3::new(0.0, 0.0, 0.0));
    let b = m.add_vertex(Point3::new(1.0, 0.0, 0.0));
    let c = m.add_vertex(Point3::new(1.0, 1.0, 0.0));
    let lone = m.add_vertex(Point3::new(5.0, 5.0, 5.0));
    m.add_wire_edge(s, a, b).unwrap();
    m.add_wire_loop(s, &[a, b, c]).unwrap();
    let s2 = m.add_shell(r).unwrap();
    m.set_shell_vertex(s2, lone).unwrap();

    let bytes = export_model(&m, &ExportOptions::default()).unwrap();
    let back = import_model(&bytes, &ImportOptions::default()).unwrap();
    let r2 = back.regions()[0];
    let shells = &back.region(r2).unwrap().shells;
    assert_eq!(shells.len(), 2);
    let first = back.shell(shells[0]).unwrap();
    assert_eq!(first.edgeuses.len(), 2);
    assert_eq!(first.loopuses.len(), 2);
    assert!(back.shell(shells[1]).unwrap().vertexuse.is_some());
    assert_eq!(sorted_points(&back), sorted_points(&m));
}

/// Tetrahedron carrying every kind of geometry and attribute, plus wire
/// topology in a second shell.
fn decorated_tetrahedron() -> Model {
    let mut m = tetrahedron();
    let r = m.regions()[0];
    let s = m.region(r).unwrap().shells[0];

    let f = m.face_keys().next().unwrap();
    m.set_face_snurb(
        f,
        NurbsSurface {
            order: [2, 2],
            u_knots: vec![0.0, 0.0, 1.0, 1.0],
            v_knots: vec![0.0, 0.0, 1.0, 1.0],
            size: [2, 2],
            pt_type: PointType::XYZW,
            ctl_points: vec![
                0.0, 0.0, 0.0, 1.0, //
                2.0, 0.0, 0.0, 2.0, //
                0.0, 0.5, 0.0, 0.5, //
                3.0, 3.0, 0.0, 3.0,
            ],
        },
    )
    .unwrap();

    let edges: Vec<_> = m.edge_keys().collect();
    let curved = m.edge(edges[0]).unwrap().edgeuse;
    let a = m.vertex_point(m.edgeuse_start(curved).unwrap()).unwrap();
    let b = m.vertex_point(m.edgeuse_end(curved).unwrap()).unwrap();
    m.set_edge_curve(
        curved,
        NurbsCurve {
            order: 2,
            knots: vec![0.0, 0.0, 1.0, 1.0],
            pt_type: PointType::XYZ,
            ctl_points: vec![a.x, a.y, a.z, b.x, b.y, b.z],
        },
    )
    .unwrap();
    let straight = m.edge(edges[1]).unwrap().edgeuse;
    m.set_edge_line(straight).unwrap();

    let v = m.vertex_keys().next().unwrap();
    let uses = m.vertex(v).unwrap().uses.clone();
    m.set_vertexuse_normal(uses[0], Vector3::new(0.0, -0.6, 0.8)).unwrap();
    m.set_vertexuse_param(uses[1], [0.1, 0.7, 0.0]).unwrap();

    let fu = m.face(f).unwrap().faceuse;
    let centre = m.add_vertex(Point3::new(0.2, 0.2, 0.0));
    m.add_vertex_loop(LoopUseParent::FaceUse(fu), centre).unwrap();

    let w0 = m.add_vertex(Point3::new(4.0, 0.0, 0.0));
    let w1 = m.add_vertex(Point3::new(5.0, 0.0, 0.0));
    let w2 = m.add_vertex(Point3::new(5.0, 1.0, 0.0));
    m.add_wire_edge(s, w0, w1).unwrap();
    let s2 = m.add_shell(r).unwrap();
    m.add_wire_loop(s2, &[w0, w1, w2]).unwrap();
    let lone = m.add_vertex(Point3::new(-1.0, -1.0, -1.0));
    let s3 = m.add_shell(r).unwrap();
    m.set_shell_vertex(s3, lone).unwrap();
    m
}

#[test]
fn reexport_is_byte_identical() {
    let m = decorated_tetrahedron();
    m.validate().unwrap();
    let first = export_model(&m, &ExportOptions::default()).unwrap();
    let back = import_model(&first, &ImportOptions::default()).unwrap();
    let second = export_model(&back, &ExportOptions::default()).unwrap();
    assert_eq!(first.len(), second.len());
    if let Some(at) = first.iter().zip(second.iter()).position(|(a, b)| a != b) {
        panic!("re-export differs at byte {at}");
    }

    // and once more through a scaled export and its inverse import
    let scaled = export_model(&m, &ExportOptions { local2mm: 2.0 }).unwrap();
    let halved = import_model(&scaled, &ImportOptions::scaled(0.5)).unwrap();
    let third = export_model(&halved, &ExportOptions::default()).unwrap();
    assert_eq!(describe(&third).unwrap(), describe(&first).unwrap());
    assert_eq!(third.len(), first.len());
}

#[test]
fn corrupt_buffers_are_reported() {
    let (m, _, _) = square_model(Point3::origin());
    let bytes = export_model(&m, &ExportOptions::default()).unwrap().to_vec();

    let short = &bytes[..bytes.len() - 1];
    let err = import_model(short, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Truncated { .. }));
    assert_eq!(err.category(), ErrorCategory::Format);

    let mut versioned = bytes.clone();
    versioned[..4].copy_from_slice(&2u32.to_be_bytes());
    assert!(matches!(
        import_model(&versioned, &ImportOptions::default()),
        Err(Error::UnsupportedVersion(2))
    ));

    let mut scribbled = bytes.clone();
    let at = record_offset(&scribbled, NodeKind::Vertex, 0);
    scribbled[at..at + 4].copy_from_slice(&0xdead_beefu32.to_be_bytes());
    assert!(matches!(
        import_model(&scribbled, &ImportOptions::default()),
        Err(Error::BadMagic { kind: NodeKind::Vertex, found: 0xdead_beef, .. })
    ));

    let mut extra = bytes.clone();
    extra.extend_from_slice(&[0, 0, 0]);
    assert!(import_model(&extra, &ImportOptions::default()).is_err());

    assert!(import_model(&[], &ImportOptions::default()).is_err());
}

#[test]
fn broken_radial_ring_fails_verification() {
    let m = tetrahedron();
    let mut bytes = export_model(&m, &ExportOptions::default()).unwrap().to_vec();
    // point the first edgeuse's radial at itself
    let at = record_offset(&bytes, NodeKind::EdgeUse, 0);
    let own = describe(&bytes)
        .unwrap()
        .counts
        .iter()
        .take_while(|&(k, _)| k != NodeKind::EdgeUse)
        .map(|(_, c)| c)
        .sum::<u32>()
        + 1;
    bytes[at + 28..at + 32].copy_from_slice(&own.to_be_bytes());

    let err = import_model(&bytes, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Invariant(_)));
    assert_eq!(err.category(), ErrorCategory::Invariant);
    // without verification the graph still loads
    import_model(&bytes, &ImportOptions::default().verify(false)).unwrap();
}

#[test]
fn singular_import_matrix_is_rejected() {
    let (m, _, _) = square_model(Point3::origin());
    let bytes = export_model(&m, &ExportOptions::default()).unwrap();
    assert!(matches!(
        import_model(&bytes, &ImportOptions::default().with_matrix(Matrix4::zeros())),
        Err(Error::SingularMatrix)
    ));
}

#[test]
fn description_is_json() {
    let m = tetrahedron();
    let bytes = export_model(&m, &ExportOptions::default()).unwrap();
    let json = describe(&bytes).unwrap().to_json().unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["version"], 1);
    assert_eq!(v["counts"]["edgeuse"], 24);
    assert_eq!(v["counts"]["face_g_plane"], 4);
    assert_eq!(v["counts"]["loop_a"], 0);
}
