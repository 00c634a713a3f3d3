// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! NURBS surface and curve definitions carried as face and edge geometry.
//!
//! Control points are stored flat, `coords()` doubles per point. The packed
//! [`PointType`] says how many coordinates there are, what they mean, and
//! whether the last one is a homogeneous weight.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Meaning of the coordinates of a control point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    Xy = 1,
    Xyz = 2,
    Uv = 3,
    Data = 4,
    Proj = 5,
}

impl PointKind {
    fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(PointKind::Xy),
            2 => Some(PointKind::Xyz),
            3 => Some(PointKind::Uv),
            4 => Some(PointKind::Data),
            5 => Some(PointKind::Proj),
            _ => None,
        }
    }
}

/// Packed control point description: `coords << 5 | kind << 1 | rational`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PointType(pub u32);

impl PointType {
    /// Non-rational 3D points.
    pub const XYZ: PointType = PointType::new(3, PointKind::Xyz, false);
    /// Rational 3D points `(wx, wy, wz, w)`.
    pub const XYZW: PointType = PointType::new(4, PointKind::Xyz, true);
    /// Non-rational surface parameter pairs.
    pub const UV: PointType = PointType::new(2, PointKind::Uv, false);
    /// Rational surface parameter pairs `(wu, wv, w)`.
    pub const UVW: PointType = PointType::new(3, PointKind::Uv, true);

    pub const fn new(coords: u32, kind: PointKind, rational: bool) -> Self {
        PointType((coords << 5) | ((kind as u32) << 1) | rational as u32)
    }

    /// Number of doubles per control point.
    pub const fn coords(self) -> usize {
        (self.0 >> 5) as usize
    }

    pub const fn is_rational(self) -> bool {
        self.0 & 1 == 1
    }

    pub fn kind(self) -> Option<PointKind> {
        PointKind::from_code((self.0 >> 1) & 0x0f)
    }

    pub fn is_uv(self) -> bool {
        self.kind() == Some(PointKind::Uv)
    }
}

/// A tensor-product NURBS surface.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NurbsSurface {
    /// Order in u and v.
    pub order: [u32; 2],
    pub u_knots: Vec<f64>,
    pub v_knots: Vec<f64>,
    /// Control grid size as `(rows, cols)`; rows run along v, cols along u.
    pub size: [u32; 2],
    pub pt_type: PointType,
    pub ctl_points: Vec<f64>,
}

impl NurbsSurface {
    /// Number of control points in the grid, `None` if it overflows.
    pub fn point_count(&self) -> Option<usize> {
        (self.size[0] as usize).checked_mul(self.size[1] as usize)
    }

    /// Checks that knot and control arrays agree with order and grid size.
    pub fn check(&self) -> Result<()> {
        if self.pt_type.coords() == 0 || self.pt_type.kind().is_none() {
            return Err(Error::UnsupportedPointType(self.pt_type.0));
        }
        let [rows, cols] = self.size.map(u64::from);
        let [u_order, v_order] = self.order.map(u64::from);
        if self.u_knots.len() as u64 != cols + u_order {
            return Err(Error::InvalidNurbs(format!(
                "u knot vector has {} entries, expected {}",
                self.u_knots.len(),
                cols + u_order
            )));
        }
        if self.v_knots.len() as u64 != rows + v_order {
            return Err(Error::InvalidNurbs(format!(
                "v knot vector has {} entries, expected {}",
                self.v_knots.len(),
                rows + v_order
            )));
        }
        let expected = self
            .point_count()
            .and_then(|n| n.checked_mul(self.pt_type.coords()))
            .ok_or_else(|| {
                Error::InvalidNurbs(format!("{rows} x {cols} control grid is too large"))
            })?;
        if self.ctl_points.len() != expected {
            return Err(Error::InvalidNurbs(format!(
                "control grid has {} doubles, expected {expected}",
                self.ctl_points.len()
            )));
        }
        Ok(())
    }
}

/// A NURBS curve. An order of zero means "no curve".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NurbsCurve {
    pub order: u32,
    pub knots: Vec<f64>,
    pub pt_type: PointType,
    pub ctl_points: Vec<f64>,
}

impl NurbsCurve {
    /// Number of control points.
    pub fn point_count(&self) -> usize {
        match self.pt_type.coords() {
            0 => 0,
            n => self.ctl_points.len() / n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order == 0
    }

    pub fn check(&self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let coords = self.pt_type.coords();
        if coords == 0 || self.pt_type.kind().is_none() {
            return Err(Error::UnsupportedPointType(self.pt_type.0));
        }
        if self.ctl_points.len() % coords != 0 {
            return Err(Error::InvalidNurbs(format!(
                "{} control doubles is not a multiple of {coords}",
                self.ctl_points.len()
            )));
        }
        let expected = self.point_count() + self.order as usize;
        if self.knots.len() != expected {
            return Err(Error::InvalidNurbs(format!(
                "knot vector has {} entries, expected {expected}",
                self.knots.len()
            )));
        }
        Ok(())
    }
}

/// Multiplies every coordinate of every point by `scale`, leaving the
/// trailing weight of rational points untouched.
pub(crate) fn scale_points(values: &[f64], pt_type: PointType, scale: f64) -> Vec<f64> {
    let coords = pt_type.coords().max(1);
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if pt_type.is_rational() && i % coords == coords - 1 {
                v
            } else {
                v * scale
            }
        })
        .collect()
}
