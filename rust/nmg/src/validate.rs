// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural verification of a model.
//!
//! Checks the invariants every other pass relies on: list parentage, mate
//! pairing, loop continuity, radial ring closure, vertex use lists and
//! geometry user lists. Import runs this on freshly decoded models.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::*;

macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(Error::invariant(format!($($arg)*)));
        }
    };
}

impl Model {
    /// Verifies the structural invariants of the whole graph.
    ///
    /// Returns the first violation found as [`Error::Invariant`].
    pub fn validate(&self) -> Result<()> {
        self.validate_lists()?;
        self.validate_faces()?;
        self.validate_loopuses()?;
        self.validate_edgeuses()?;
        self.validate_vertices()?;
        Ok(())
    }

    /// Every list member names its owner, and every node of a listed kind
    /// is a member of exactly one list.
    fn validate_lists(&self) -> Result<()> {
        let mut seen_regions = FxHashSet::default();
        for &r in &self.region_list {
            ensure!(self.regions.contains_key(r), "model lists missing region {r:?}");
            ensure!(seen_regions.insert(r), "region {r:?} listed twice");
        }
        ensure!(
            seen_regions.len() == self.regions.len(),
            "{} regions are not listed by the model",
            self.regions.len() - seen_regions.len()
        );

        let mut shells = FxHashSet::default();
        let mut faceuses = FxHashSet::default();
        let mut loopuses = FxHashSet::default();
        let mut edgeuses = FxHashSet::default();

        for (r, region) in &self.regions {
            for &s in &region.shells {
                let shell = self.shells.get(s).ok_or_else(|| {
                    Error::invariant(format!("region {r:?} lists missing shell {s:?}"))
                })?;
                ensure!(shell.region == r, "shell {s:?} does not name region {r:?}");
                ensure!(shells.insert(s), "shell {s:?} listed twice");
            }
        }
        for (s, shell) in &self.shells {
            for &fu in &shell.faceuses {
                let data = self.faceuses.get(fu).ok_or_else(|| {
                    Error::invariant(format!("shell {s:?} lists missing faceuse {fu:?}"))
                })?;
                ensure!(data.shell == s, "faceuse {fu:?} does not name shell {s:?}");
                ensure!(faceuses.insert(fu), "faceuse {fu:?} listed twice");
            }
            for &lu in &shell.loopuses {
                self.check_loopuse_parent(lu, LoopUseParent::Shell(s))?;
                ensure!(loopuses.insert(lu), "loopuse {lu:?} listed twice");
            }
            for &eu in &shell.edgeuses {
                self.check_edgeuse_parent(eu, EdgeUseParent::Shell(s))?;
                ensure!(edgeuses.insert(eu), "edgeuse {eu:?} listed twice");
            }
            if let Some(vu) = shell.vertexuse {
                self.check_vertexuse_parent(vu, VertexUseParent::Shell(s))?;
            }
        }
        for (fu, data) in &self.faceuses {
            for &lu in &data.loopuses {
                self.check_loopuse_parent(lu, LoopUseParent::FaceUse(fu))?;
                ensure!(loopuses.insert(lu), "loopuse {lu:?} listed twice");
            }
        }
        for (lu, data) in &self.loopuses {
            match &data.down {
                LoopUseDown::Edges(eus) => {
                    for &eu in eus {
                        self.check_edgeuse_parent(eu, EdgeUseParent::LoopUse(lu))?;
                        ensure!(edgeuses.insert(eu), "edgeuse {eu:?} listed twice");
                    }
                }
                LoopUseDown::Vertex(vu) => {
                    self.check_vertexuse_parent(*vu, VertexUseParent::LoopUse(lu))?;
                }
            }
        }

        ensure!(shells.len() == self.shells.len(), "orphan shells present");
        ensure!(faceuses.len() == self.faceuses.len(), "orphan faceuses present");
        ensure!(loopuses.len() == self.loopuses.len(), "orphan loopuses present");
        ensure!(edgeuses.len() == self.edgeuses.len(), "orphan edgeuses present");
        Ok(())
    }

    fn check_loopuse_parent(&self, lu: LoopUseKey, parent: LoopUseParent) -> Result<()> {
        let data = self
            .loopuses
            .get(lu)
            .ok_or_else(|| Error::invariant(format!("missing loopuse {lu:?}")))?;
        ensure!(data.parent == parent, "loopuse {lu:?} does not name {parent:?}");
        Ok(())
    }

    fn check_edgeuse_parent(&self, eu: EdgeUseKey, parent: EdgeUseParent) -> Result<()> {
        let data = self
            .edgeuses
            .get(eu)
            .ok_or_else(|| Error::invariant(format!("missing edgeuse {eu:?}")))?;
        ensure!(data.parent == parent, "edgeuse {eu:?} does not name {parent:?}");
        Ok(())
    }

    fn check_vertexuse_parent(&self, vu: VertexUseKey, parent: VertexUseParent) -> Result<()> {
        let data = self
            .vertexuses
            .get(vu)
            .ok_or_else(|| Error::invariant(format!("missing vertexuse {vu:?}")))?;
        ensure!(data.parent == parent, "vertexuse {vu:?} does not name {parent:?}");
        Ok(())
    }

    fn validate_faces(&self) -> Result<()> {
        for (fu, data) in &self.faceuses {
            let mate = self
                .faceuses
                .get(data.mate)
                .ok_or_else(|| Error::invariant(format!("faceuse {fu:?} has no mate")))?;
            ensure!(mate.mate == fu, "faceuse {fu:?} mate does not point back");
            ensure!(data.mate != fu, "faceuse {fu:?} is its own mate");
            ensure!(mate.face == data.face, "faceuse {fu:?} and mate name different faces");
            ensure!(
                mate.orientation == data.orientation.flipped()
                    && matches!(data.orientation, Orientation::Same | Orientation::Opposite),
                "faceuse {fu:?} orientation {:?} pairs with {:?}",
                data.orientation,
                mate.orientation
            );
            ensure!(mate.shell == data.shell, "faceuse {fu:?} and mate in different shells");
            ensure!(
                data.loopuses.len() == mate.loopuses.len(),
                "faceuse {fu:?} and mate hold different loop counts"
            );
        }
        for (f, face) in &self.faces {
            let fu = self
                .faceuses
                .get(face.faceuse)
                .ok_or_else(|| Error::invariant(format!("face {f:?} has no faceuse")))?;
            ensure!(fu.face == f, "face {f:?} representative names another face");
            match face.geom {
                Some(FaceGeom::Plane(g)) => {
                    let plane = self.face_planes.get(g).ok_or_else(|| {
                        Error::invariant(format!("face {f:?} names missing plane"))
                    })?;
                    ensure!(plane.faces.contains(&f), "plane does not list face {f:?}");
                }
                Some(FaceGeom::Snurb(g)) => {
                    let snurb = self.face_snurbs.get(g).ok_or_else(|| {
                        Error::invariant(format!("face {f:?} names missing surface"))
                    })?;
                    ensure!(snurb.faces.contains(&f), "surface does not list face {f:?}");
                }
                None => {}
            }
        }
        for (g, plane) in &self.face_planes {
            for &f in &plane.faces {
                let geom = self.faces.get(f).and_then(|f| f.geom);
                ensure!(geom == Some(FaceGeom::Plane(g)), "plane lists face {f:?} that uses other geometry");
            }
        }
        for (g, snurb) in &self.face_snurbs {
            for &f in &snurb.faces {
                let geom = self.faces.get(f).and_then(|f| f.geom);
                ensure!(geom == Some(FaceGeom::Snurb(g)), "surface lists face {f:?} that uses other geometry");
            }
        }
        Ok(())
    }

    fn validate_loopuses(&self) -> Result<()> {
        for (lu, data) in &self.loopuses {
            let mate = self
                .loopuses
                .get(data.mate)
                .ok_or_else(|| Error::invariant(format!("loopuse {lu:?} has no mate")))?;
            ensure!(mate.mate == lu && data.mate != lu, "loopuse {lu:?} mate does not point back");
            ensure!(mate.lp == data.lp, "loopuse {lu:?} and mate name different loops");
            match (data.parent, mate.parent) {
                (LoopUseParent::FaceUse(a), LoopUseParent::FaceUse(b)) => {
                    let fa = self.faceuses.get(a).map(|f| f.mate);
                    ensure!(fa == Some(b), "loopuse {lu:?} mate is not on the mate faceuse");
                }
                (LoopUseParent::Shell(a), LoopUseParent::Shell(b)) => {
                    ensure!(a == b, "loopuse {lu:?} mate is in another shell");
                }
                _ => return Err(Error::invariant(format!("loopuse {lu:?} and mate have different parent kinds"))),
            }
            let lp = self
                .loops
                .get(data.lp)
                .ok_or_else(|| Error::invariant(format!("loopuse {lu:?} names missing loop")))?;
            ensure!(
                lp.loopuse == lu || lp.loopuse == data.mate,
                "loop of {lu:?} is represented by an unrelated loopuse"
            );

            if let LoopUseDown::Edges(eus) = &data.down {
                ensure!(!eus.is_empty(), "loopuse {lu:?} has no edgeuses");
                for (i, &eu) in eus.iter().enumerate() {
                    let next = eus[(i + 1) % eus.len()];
                    let end = self.edgeuse_end(eu);
                    let start = self.edgeuse_start(next);
                    ensure!(
                        end.is_some() && end == start,
                        "loopuse {lu:?} breaks between {eu:?} and {next:?}"
                    );
                }
            }
        }
        for (l, lp) in &self.loops {
            let lu = self.loopuses.get(lp.loopuse).map(|lu| lu.lp);
            ensure!(lu == Some(l), "loop {l:?} representative names another loop");
        }
        Ok(())
    }

    fn validate_edgeuses(&self) -> Result<()> {
        let mut per_edge: FxHashMap<EdgeKey, usize> = FxHashMap::default();
        for (eu, data) in &self.edgeuses {
            ensure!(self.edges.contains_key(data.edge), "edgeuse {eu:?} names missing edge");
            *per_edge.entry(data.edge).or_default() += 1;

            let mate = self
                .edgeuses
                .get(data.mate)
                .ok_or_else(|| Error::invariant(format!("edgeuse {eu:?} has no mate")))?;
            ensure!(mate.mate == eu && data.mate != eu, "edgeuse {eu:?} mate does not point back");
            ensure!(mate.edge == data.edge, "edgeuse {eu:?} and mate name different edges");
            ensure!(mate.geom == data.geom, "edgeuse {eu:?} and mate carry different geometry");

            let radial = self
                .edgeuses
                .get(data.radial)
                .ok_or_else(|| Error::invariant(format!("edgeuse {eu:?} has no radial")))?;
            ensure!(radial.radial == eu, "edgeuse {eu:?} radial does not point back");
            ensure!(radial.edge == data.edge, "edgeuse {eu:?} radial is on another edge");
            ensure!(
                self.edgeuse_start(data.radial) == self.edgeuse_end(eu),
                "edgeuse {eu:?} radial runs the same way"
            );

            let vu = self.vertexuses.get(data.vertexuse);
            ensure!(
                vu.is_some_and(|vu| vu.parent == VertexUseParent::EdgeUse(eu)),
                "edgeuse {eu:?} vertexuse does not name it"
            );

            match data.geom {
                Some(EdgeGeom::Line(g)) => {
                    let users = self.edge_lines.get(g).map(|l| l.edgeuses.contains(&eu));
                    ensure!(users == Some(true), "line does not list edgeuse {eu:?}");
                }
                Some(EdgeGeom::Curve(g)) => {
                    let users = self.edge_curves.get(g).map(|c| c.edgeuses.contains(&eu));
                    ensure!(users == Some(true), "curve does not list edgeuse {eu:?}");
                }
                None => {}
            }
        }

        for (e, edge) in &self.edges {
            let rep = self.edgeuses.get(edge.edgeuse).map(|eu| eu.edge);
            ensure!(rep == Some(e), "edge {e:?} representative names another edge");
            let ring = self.radial_ring(edge.edgeuse)?;
            let unique: FxHashSet<_> = ring.iter().collect();
            let expected = per_edge.get(&e).copied().unwrap_or(0);
            ensure!(
                unique.len() == ring.len() && ring.len() == expected,
                "radial ring of edge {e:?} visits {} of {expected} uses",
                ring.len()
            );
        }

        for (g, line) in &self.edge_lines {
            for &eu in &line.edgeuses {
                let geom = self.edgeuses.get(eu).and_then(|e| e.geom);
                ensure!(geom == Some(EdgeGeom::Line(g)), "line lists edgeuse {eu:?} that uses other geometry");
            }
        }
        for (g, curve) in &self.edge_curves {
            for &eu in &curve.edgeuses {
                let geom = self.edgeuses.get(eu).and_then(|e| e.geom);
                ensure!(geom == Some(EdgeGeom::Curve(g)), "curve lists edgeuse {eu:?} that uses other geometry");
            }
        }
        Ok(())
    }

    fn validate_vertices(&self) -> Result<()> {
        let mut listed = 0usize;
        for (v, vertex) in &self.vertices {
            for &vu in &vertex.uses {
                let data = self
                    .vertexuses
                    .get(vu)
                    .ok_or_else(|| Error::invariant(format!("vertex {v:?} lists missing use {vu:?}")))?;
                ensure!(data.vertex == v, "vertexuse {vu:?} names another vertex");
                listed += 1;
            }
            if let Some(g) = vertex.geom {
                ensure!(self.vertex_geoms.contains_key(g), "vertex {v:?} names missing coordinates");
            }
        }
        ensure!(
            listed == self.vertexuses.len(),
            "{} vertexuses missing from vertex use lists",
            self.vertexuses.len().saturating_sub(listed)
        );

        for (vu, data) in &self.vertexuses {
            let owned = match data.parent {
                VertexUseParent::EdgeUse(eu) => {
                    self.edgeuses.get(eu).is_some_and(|e| e.vertexuse == vu)
                }
                VertexUseParent::LoopUse(lu) => self
                    .loopuses
                    .get(lu)
                    .is_some_and(|l| l.down == LoopUseDown::Vertex(vu)),
                VertexUseParent::Shell(s) => {
                    self.shells.get(s).is_some_and(|s| s.vertexuse == Some(vu))
                }
            };
            ensure!(owned, "parent of vertexuse {vu:?} does not hold it");
            match data.attr {
                Some(VertexUseAttr::Plane(a)) => {
                    ensure!(self.vu_planes.contains_key(a), "vertexuse {vu:?} names missing normal")
                }
                Some(VertexUseAttr::Curve(a)) => {
                    ensure!(self.vu_curves.contains_key(a), "vertexuse {vu:?} names missing parameter")
                }
                None => {}
            }
        }
        Ok(())
    }
}
