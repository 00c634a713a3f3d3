// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Affine transformation of model geometry.
//!
//! Points move with the full matrix. Directions and normals only turn: they
//! go through the linear part and keep their original length. Planes go
//! through the inverse transpose. Knot vectors and surface parameter
//! control points are never touched. Import applies the same rules with its
//! caller-supplied matrix.

use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use crate::error::{Error, Result};
use crate::model::Model;
use crate::nurbs::PointType;

pub(crate) fn transform_point(m: &Matrix4<f64>, p: &Point3<f64>) -> Point3<f64> {
    m.transform_point(p)
}

/// Rotates `d` through the linear part of `m`, preserving its length.
pub(crate) fn transform_direction(m: &Matrix4<f64>, d: &Vector3<f64>) -> Vector3<f64> {
    let len = d.norm();
    let turned = m.transform_vector(d);
    let new_len = turned.norm();
    if len == 0.0 || new_len < 1e-300 {
        return *d;
    }
    turned * (len / new_len)
}

/// Transforms the plane `normal · p = offset` as the covector
/// `(normal, -offset)`, then restores the normal's length.
///
/// `inv_t` is the inverse transpose of the point matrix.
pub(crate) fn transform_plane(
    inv_t: &Matrix4<f64>,
    normal: &Vector3<f64>,
    offset: f64,
) -> (Vector3<f64>, f64) {
    let len = normal.norm();
    if len == 0.0 {
        return (*normal, offset);
    }
    let h = inv_t * Vector4::new(normal.x, normal.y, normal.z, -offset);
    let n = h.xyz();
    let n_len = n.norm();
    if n_len < 1e-300 {
        return (*normal, offset);
    }
    let k = len / n_len;
    (n * k, -h.w * k)
}

/// Inverse transpose of `m`, or [`Error::SingularMatrix`].
pub(crate) fn inverse_transpose(m: &Matrix4<f64>) -> Result<Matrix4<f64>> {
    m.try_inverse()
        .map(|inv| inv.transpose())
        .ok_or(Error::SingularMatrix)
}

/// Fails for control point types [`transform_ctl_points`] cannot handle.
pub(crate) fn check_ctl_point_type(pt_type: PointType) -> Result<()> {
    if pt_type.is_uv() || matches!(pt_type.coords(), 3 | 4) {
        Ok(())
    } else {
        Err(Error::UnsupportedPointType(pt_type.0))
    }
}

/// Transforms flat control points in place.
///
/// Three coordinates are a point, four a rational point `(wx, wy, wz, w)`.
/// Surface parameter points are left alone.
pub(crate) fn transform_ctl_points(
    m: &Matrix4<f64>,
    pt_type: PointType,
    values: &mut [f64],
) -> Result<()> {
    if pt_type.is_uv() {
        return Ok(());
    }
    match pt_type.coords() {
        3 => {
            for chunk in values.chunks_exact_mut(3) {
                let p = m.transform_point(&Point3::new(chunk[0], chunk[1], chunk[2]));
                chunk.copy_from_slice(p.coords.as_slice());
            }
            Ok(())
        }
        4 => {
            for chunk in values.chunks_exact_mut(4) {
                let h = m * Vector4::new(chunk[0], chunk[1], chunk[2], chunk[3]);
                chunk.copy_from_slice(h.as_slice());
            }
            Ok(())
        }
        _ => Err(Error::UnsupportedPointType(pt_type.0)),
    }
}

impl Model {
    /// Applies `m` to every piece of geometry in the model, then recomputes
    /// the bounding boxes.
    pub fn transform(&mut self, m: &Matrix4<f64>) -> Result<()> {
        let inv_t = inverse_transpose(m)?;

        for g in self.vertex_geoms.values_mut() {
            g.coord = transform_point(m, &g.coord);
        }
        for line in self.edge_lines.values_mut() {
            line.point = transform_point(m, &line.point);
            line.dir = transform_direction(m, &line.dir);
        }
        for plane in self.face_planes.values_mut() {
            let (n, d) = transform_plane(&inv_t, &plane.normal, plane.offset);
            plane.normal = n;
            plane.offset = d;
        }
        for snurb in self.face_snurbs.values_mut() {
            let s = &mut snurb.surface;
            transform_ctl_points(m, s.pt_type, &mut s.ctl_points)?;
        }
        for cnurb in self.edge_curves.values_mut() {
            let c = &mut cnurb.curve;
            if !c.is_empty() {
                transform_ctl_points(m, c.pt_type, &mut c.ctl_points)?;
            }
        }
        for vua in self.vu_planes.values_mut() {
            vua.normal = transform_direction(m, &vua.normal);
        }

        self.rebound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Translation3;

    #[test]
    fn direction_keeps_length_under_scale() {
        let m = Matrix4::new_scaling(25.4);
        let d = transform_direction(&m, &Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(d, Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn plane_follows_translation() {
        let m = Translation3::new(0.0, 0.0, 2.0).to_homogeneous();
        let inv_t = inverse_transpose(&m).unwrap();
        let (n, d) = transform_plane(&inv_t, &Vector3::z(), 5.0);
        assert_relative_eq!(n, Vector3::z());
        assert_relative_eq!(d, 7.0);
    }

    #[test]
    fn identity_leaves_plane_exact() {
        let n = Vector3::new(1.0, 1.0, 1.0).normalize();
        let d = 0.5773502691896257;
        let inv_t = inverse_transpose(&Matrix4::identity()).unwrap();
        let (n2, d2) = transform_plane(&inv_t, &n, d);
        assert_eq!(n2, n);
        assert_eq!(d2, d);
    }

    #[test]
    fn plane_offset_scales() {
        let m = Matrix4::new_scaling(2.0);
        let inv_t = inverse_transpose(&m).unwrap();
        let (n, d) = transform_plane(&inv_t, &Vector3::new(0.0, 1.0, 0.0), 3.0);
        assert_relative_eq!(n, Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(d, 6.0);
    }

    #[test]
    fn rational_points_transform_homogeneously() {
        let m = Translation3::new(1.0, 0.0, 0.0).to_homogeneous();
        // (wx, wy, wz, w) with w = 2 for the point (1, 1, 1).
        let mut pts = vec![2.0, 2.0, 2.0, 2.0];
        transform_ctl_points(&m, PointType::XYZW, &mut pts).unwrap();
        assert_relative_eq!(pts[0] / pts[3], 2.0);
        assert_relative_eq!(pts[3], 2.0);
    }

    #[test]
    fn uv_points_are_untouched() {
        let m = Matrix4::new_scaling(10.0);
        let mut pts = vec![0.5, 0.25];
        transform_ctl_points(&m, PointType::UV, &mut pts).unwrap();
        assert_eq!(pts, vec![0.5, 0.25]);
    }

    #[test]
    fn singular_matrix_rejected() {
        assert!(matches!(
            inverse_transpose(&Matrix4::zeros()),
            Err(Error::SingularMatrix)
        ));
    }

    #[test]
    fn model_transform_moves_vertices() {
        let mut m = Model::new();
        let r = m.add_region();
        let s = m.add_shell(r).unwrap();
        let v = m.add_vertex(Point3::new(1.0, 2.0, 3.0));
        m.set_shell_vertex(s, v).unwrap();
        m.transform(&Matrix4::new_scaling(2.0)).unwrap();
        assert_relative_eq!(m.vertex_point(v).unwrap(), Point3::new(2.0, 4.0, 6.0));
        assert!(m.shell(s).unwrap().bbox.is_some());
    }
}
