// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding boxes and their recomputation.
//!
//! Region, shell, loop and face boxes are caches. Nothing persists them:
//! every structural edit drops them and [`Model::rebound`] rebuilds them
//! bottom-up from vertex coordinates.

use nalgebra::Point3;

use crate::error::Result;
use crate::keys::*;
use crate::model::Model;

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    /// A box holding exactly one point.
    pub fn from_point(p: Point3<f64>) -> Self {
        Self { min: p, max: p }
    }

    /// Smallest box holding every point, or `None` for no points.
    pub fn from_points<I: IntoIterator<Item = Point3<f64>>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let mut bb = Self::from_point(iter.next()?);
        for p in iter {
            bb.include(&p);
        }
        Some(bb)
    }

    pub fn include(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }
}

fn merge(acc: Option<Aabb>, next: Option<Aabb>) -> Option<Aabb> {
    match (acc, next) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, b) => a.or(b),
    }
}

impl Model {
    /// Recomputes every cached bounding box from vertex coordinates.
    ///
    /// Loops first, then faces, shells and regions, so each level unions the
    /// fresh boxes of the level below.
    pub fn rebound(&mut self) -> Result<()> {
        self.invalidate_bounds();

        let loop_keys: Vec<LoopKey> = self.loops.keys().collect();
        for l in loop_keys {
            let bb = self.loop_bounds(l)?;
            if let Some(data) = self.loops.get_mut(l) {
                data.bbox = bb;
            }
        }

        let face_keys: Vec<FaceKey> = self.faces.keys().collect();
        for f in face_keys {
            let bb = self.face_bounds(f);
            if let Some(data) = self.faces.get_mut(f) {
                data.bbox = bb;
            }
        }

        let shell_keys: Vec<ShellKey> = self.shells.keys().collect();
        for s in shell_keys {
            let bb = self.shell_bounds(s)?;
            if let Some(data) = self.shells.get_mut(s) {
                data.bbox = bb;
            }
        }

        let region_keys: Vec<RegionKey> = self.regions.keys().collect();
        for r in region_keys {
            let bb = self.regions.get(r).and_then(|region| {
                region
                    .shells
                    .iter()
                    .filter_map(|&s| self.shells.get(s)?.bbox)
                    .reduce(|a, b| a.union(&b))
            });
            if let Some(data) = self.regions.get_mut(r) {
                data.bbox = bb;
            }
        }

        tracing::debug!(
            regions = self.regions.len(),
            shells = self.shells.len(),
            loops = self.loops.len(),
            "rebound model"
        );
        Ok(())
    }

    fn loop_bounds(&self, key: LoopKey) -> Result<Option<Aabb>> {
        let Some(lp) = self.loops.get(key) else {
            return Ok(None);
        };
        let verts = self.loopuse_vertices(lp.loopuse)?;
        Ok(Aabb::from_points(
            verts.into_iter().filter_map(|v| self.vertex_point(v)),
        ))
    }

    fn face_bounds(&self, key: FaceKey) -> Option<Aabb> {
        let fu = self.faceuses.get(self.faces.get(key)?.faceuse)?;
        fu.loopuses
            .iter()
            .filter_map(|&lu| self.loops.get(self.loopuses.get(lu)?.lp)?.bbox)
            .reduce(|a, b| a.union(&b))
    }

    fn shell_bounds(&self, key: ShellKey) -> Result<Option<Aabb>> {
        let Some(shell) = self.shells.get(key) else {
            return Ok(None);
        };
        let mut bb = None;
        for f in self.shell_faces(key)? {
            bb = merge(bb, self.faces.get(f).and_then(|f| f.bbox));
        }
        for &lu in &shell.loopuses {
            let lb = self
                .loopuses
                .get(lu)
                .and_then(|lu| self.loops.get(lu.lp))
                .and_then(|l| l.bbox);
            bb = merge(bb, lb);
        }
        for &eu in &shell.edgeuses {
            if let Some(p) = self.edgeuse_start(eu).and_then(|v| self.vertex_point(v)) {
                bb = merge(bb, Some(Aabb::from_point(p)));
            }
        }
        if let Some(p) = shell.vertexuse.and_then(|vu| self.vertexuse_point(vu)) {
            bb = merge(bb, Some(Aabb::from_point(p)));
        }
        Ok(bb)
    }

    /// Bounding box of the whole model, from the cached region boxes.
    pub fn bounds(&self) -> Option<Aabb> {
        self.region_list
            .iter()
            .filter_map(|&r| self.regions.get(r)?.bbox)
            .reduce(|a, b| a.union(&b))
    }
}
