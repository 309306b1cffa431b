//! In-memory geometric model behind [`GmshSession`](crate::session::GmshSession).
//!
//! The model mirrors what the engine keeps for a scenario: point coordinates,
//! curves referencing their end points, curve loops, plane surfaces and named
//! physical groups. It performs the checks the engine would otherwise raise
//! as fatal errors (open loops, holes outside the outer boundary, overlapping
//! holes, duplicate group names) so a scenario fails before a mesher is ever
//! started.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::f64::consts::TAU;

use log::debug;
use nalgebra::{Point2, Point3, Rotation3, Unit, Vector3};

use crate::Float;
use crate::engine::{Dim, Tag};
use crate::error::{MeshError, Result};

/// Distance below which two points are considered the same location.
pub const GEOMETRY_TOLERANCE: Float = 1e-8;

/// Interior samples per arc when a loop is turned into a polygon.
const ARC_SAMPLES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct PointEntity {
    pub position: Point3<Float>,
    /// Zero means the point carries no size constraint.
    pub mesh_size: Float,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Curve {
    Line {
        start: Tag,
        end: Tag,
    },
    /// Arc swept counter-clockwise about `normal` from `start` to `end`.
    Arc {
        start: Tag,
        end: Tag,
        center: Point3<Float>,
        normal: Vector3<Float>,
    },
}

impl Curve {
    pub fn endpoints(&self) -> (Tag, Tag) {
        match *self {
            Curve::Line { start, end } | Curve::Arc { start, end, .. } => (start, end),
        }
    }

    fn replace_point(&mut self, from: Tag, to: Tag) {
        let (start, end) = match self {
            Curve::Line { start, end } | Curve::Arc { start, end, .. } => (start, end),
        };
        if *start == from {
            *start = to;
        }
        if *end == from {
            *end = to;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalGroup {
    pub dim: Dim,
    pub tag: Tag,
    pub name: String,
    pub entities: Vec<Tag>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    point: u32,
    curve: u32,
    curve_loop: u32,
    surface: u32,
    group: [u32; 3],
}

fn next_tag(counter: &mut u32) -> Tag {
    *counter += 1;
    Tag(*counter)
}

#[derive(Debug, Default, Clone)]
pub struct Model {
    points: BTreeMap<Tag, PointEntity>,
    curves: BTreeMap<Tag, Curve>,
    loops: BTreeMap<Tag, Vec<Tag>>,
    surfaces: BTreeMap<Tag, Vec<Tag>>,
    groups: Vec<PhysicalGroup>,
    counters: Counters,
    dirty: bool,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn add_point(&mut self, position: Point3<Float>, mesh_size: Float) -> Result<Tag> {
        if !(position.x.is_finite() && position.y.is_finite() && position.z.is_finite()) {
            return Err(MeshError::geometry(format!(
                "point coordinates must be finite, got {position}"
            )));
        }
        if !(mesh_size.is_finite() && mesh_size >= 0.0) {
            return Err(MeshError::geometry(format!(
                "point mesh size must be >= 0, got {mesh_size}"
            )));
        }
        let tag = next_tag(&mut self.counters.point);
        self.points.insert(tag, PointEntity { position, mesh_size });
        self.dirty = true;
        Ok(tag)
    }

    pub fn add_line(&mut self, start: Tag, end: Tag) -> Result<Tag> {
        let a = self.point(start)?.position;
        let b = self.point(end)?.position;
        if start == end || (b - a).norm() <= GEOMETRY_TOLERANCE {
            return Err(MeshError::geometry(format!(
                "line from point {start} to point {end} has zero length"
            )));
        }
        let tag = next_tag(&mut self.counters.curve);
        self.curves.insert(tag, Curve::Line { start, end });
        self.dirty = true;
        Ok(tag)
    }

    pub fn add_circle_arc(
        &mut self,
        center: Point3<Float>,
        radius: Float,
        angle1: Float,
        angle2: Float,
    ) -> Result<Tag> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(MeshError::geometry(format!(
                "arc radius must be > 0, got {radius}"
            )));
        }
        let sweep = angle2 - angle1;
        if !(sweep > 0.0 && sweep <= TAU + GEOMETRY_TOLERANCE) {
            return Err(MeshError::geometry(format!(
                "arc angles [{angle1}, {angle2}] must span (0, 2pi]"
            )));
        }
        let on_circle = |angle: Float| {
            Point3::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
                center.z,
            )
        };
        let start = self.add_point(on_circle(angle1), 0.0)?;
        let end = self.add_point(on_circle(angle2), 0.0)?;
        let tag = next_tag(&mut self.counters.curve);
        self.curves.insert(
            tag,
            Curve::Arc {
                start,
                end,
                center,
                normal: Vector3::z(),
            },
        );
        Ok(tag)
    }

    pub fn add_curve_loop(&mut self, curves: &[Tag]) -> Result<Tag> {
        self.ordered_cycle(curves)?;
        let tag = next_tag(&mut self.counters.curve_loop);
        self.loops.insert(tag, curves.to_vec());
        self.dirty = true;
        Ok(tag)
    }

    pub fn add_plane_surface(&mut self, loops: &[Tag]) -> Result<Tag> {
        let Some((&outer, holes)) = loops.split_first() else {
            return Err(MeshError::geometry("plane surface needs at least one curve loop"));
        };
        let unique: BTreeSet<Tag> = loops.iter().copied().collect();
        if unique.len() != loops.len() {
            return Err(MeshError::geometry("plane surface uses the same curve loop twice"));
        }

        let outer_region = self.loop_region(outer)?;
        let hole_regions = holes
            .iter()
            .map(|&hole| self.loop_region(hole))
            .collect::<Result<Vec<_>>>()?;

        for (hole, region) in holes.iter().zip(&hole_regions) {
            if !outer_region.strictly_contains(region) {
                return Err(MeshError::geometry(format!(
                    "curve loop {hole} is not strictly inside outer loop {outer}"
                )));
            }
        }
        for i in 0..hole_regions.len() {
            for j in i + 1..hole_regions.len() {
                if hole_regions[i].overlaps(&hole_regions[j]) {
                    return Err(MeshError::geometry(format!(
                        "holes {} and {} overlap",
                        holes[i], holes[j]
                    )));
                }
            }
        }

        let tag = next_tag(&mut self.counters.surface);
        self.surfaces.insert(tag, loops.to_vec());
        self.dirty = true;
        Ok(tag)
    }

    pub fn translate(&mut self, entities: &[(Dim, Tag)], vector: Vector3<Float>) -> Result<()> {
        if !(vector.x.is_finite() && vector.y.is_finite() && vector.z.is_finite()) {
            return Err(MeshError::geometry("translation vector must be finite"));
        }
        self.transform(entities, |p| p + vector, |n| n)
    }

    pub fn rotate(
        &mut self,
        entities: &[(Dim, Tag)],
        origin: Point3<Float>,
        axis: Vector3<Float>,
        angle: Float,
    ) -> Result<()> {
        let Some(axis) = Unit::try_new(axis, GEOMETRY_TOLERANCE) else {
            return Err(MeshError::geometry("rotation axis must be non-zero"));
        };
        let rotation = Rotation3::from_axis_angle(&axis, angle);
        self.transform(
            entities,
            |p| origin + rotation * (p - origin),
            |n| rotation * n,
        )
    }

    /// Applies a rigid motion to the union of the points (and arc frames)
    /// under `entities`, moving each of them exactly once.
    fn transform(
        &mut self,
        entities: &[(Dim, Tag)],
        move_point: impl Fn(Point3<Float>) -> Point3<Float>,
        move_vector: impl Fn(Vector3<Float>) -> Vector3<Float>,
    ) -> Result<()> {
        let mut points = BTreeSet::new();
        let mut curves = BTreeSet::new();
        for &(dim, tag) in entities {
            match dim {
                Dim::Point => {
                    self.point(tag)?;
                    points.insert(tag);
                }
                Dim::Curve => {
                    self.collect_curve(tag, &mut points, &mut curves)?;
                }
                Dim::Surface => {
                    let loops = self
                        .surfaces
                        .get(&tag)
                        .ok_or(MeshError::UnknownEntity { dim, tag })?
                        .clone();
                    for curve in loops.iter().flat_map(|l| self.loops[l].clone()) {
                        self.collect_curve(curve, &mut points, &mut curves)?;
                    }
                }
            }
        }

        for tag in &points {
            if let Some(point) = self.points.get_mut(tag) {
                point.position = move_point(point.position);
            }
        }
        for tag in &curves {
            if let Some(Curve::Arc { center, normal, .. }) = self.curves.get_mut(tag) {
                *center = move_point(*center);
                *normal = move_vector(*normal);
            }
        }
        self.dirty = true;
        Ok(())
    }

    fn collect_curve(
        &self,
        tag: Tag,
        points: &mut BTreeSet<Tag>,
        curves: &mut BTreeSet<Tag>,
    ) -> Result<()> {
        let (start, end) = self.curve(tag)?.endpoints();
        points.insert(start);
        points.insert(end);
        curves.insert(tag);
        Ok(())
    }

    /// Merges points closer than [`GEOMETRY_TOLERANCE`] into the one with the
    /// lowest tag and rewires every curve and group. Returns how many points
    /// were merged away.
    pub fn remove_all_duplicates(&mut self) -> usize {
        let mut kept: Vec<Tag> = Vec::new();
        let mut merged: HashMap<Tag, Tag> = HashMap::new();
        for (&tag, point) in &self.points {
            let twin = kept.iter().copied().find(|k| {
                (self.points[k].position - point.position).norm() <= GEOMETRY_TOLERANCE
            });
            match twin {
                Some(keep) => {
                    merged.insert(tag, keep);
                }
                None => kept.push(tag),
            }
        }
        if merged.is_empty() {
            return 0;
        }

        for (from, to) in &merged {
            if let Some(removed) = self.points.remove(from) {
                if let Some(target) = self.points.get_mut(to) {
                    if target.mesh_size == 0.0 {
                        target.mesh_size = removed.mesh_size;
                    }
                }
            }
            for curve in self.curves.values_mut() {
                curve.replace_point(*from, *to);
            }
        }
        for group in self.groups.iter_mut().filter(|g| g.dim == Dim::Point) {
            for entity in group.entities.iter_mut() {
                if let Some(to) = merged.get(entity) {
                    *entity = *to;
                }
            }
            group.entities.dedup();
        }
        debug!("merged {} duplicate points", merged.len());
        self.dirty = true;
        merged.len()
    }

    pub fn synchronize(&mut self) {
        self.dirty = false;
    }

    pub fn is_synchronized(&self) -> bool {
        !self.dirty
    }

    pub fn add_physical_group(&mut self, dim: Dim, entities: &[Tag], name: &str) -> Result<Tag> {
        if name.is_empty() {
            return Err(MeshError::geometry("physical group name must not be empty"));
        }
        if self.groups.iter().any(|g| g.name == name) {
            return Err(MeshError::DuplicateTag(name.to_string()));
        }
        if !self.is_synchronized() {
            return Err(MeshError::geometry(format!(
                "physical group `{name}` refers to entities that were not synchronized"
            )));
        }
        if entities.is_empty() {
            return Err(MeshError::geometry(format!(
                "physical group `{name}` has no entities"
            )));
        }
        for &tag in entities {
            if !self.contains(dim, tag) {
                return Err(MeshError::UnknownEntity { dim, tag });
            }
        }
        let tag = next_tag(&mut self.counters.group[dim.as_int() as usize]);
        self.groups.push(PhysicalGroup {
            dim,
            tag,
            name: name.to_string(),
            entities: entities.to_vec(),
        });
        Ok(tag)
    }

    pub fn contains(&self, dim: Dim, tag: Tag) -> bool {
        match dim {
            Dim::Point => self.points.contains_key(&tag),
            Dim::Curve => self.curves.contains_key(&tag),
            Dim::Surface => self.surfaces.contains_key(&tag),
        }
    }

    pub fn point(&self, tag: Tag) -> Result<&PointEntity> {
        self.points.get(&tag).ok_or(MeshError::UnknownEntity {
            dim: Dim::Point,
            tag,
        })
    }

    pub fn curve(&self, tag: Tag) -> Result<&Curve> {
        self.curves.get(&tag).ok_or(MeshError::UnknownEntity {
            dim: Dim::Curve,
            tag,
        })
    }

    pub fn curve_loop(&self, tag: Tag) -> Result<&[Tag]> {
        self.loops
            .get(&tag)
            .map(Vec::as_slice)
            .ok_or_else(|| MeshError::geometry(format!("curve loop {tag} does not exist")))
    }

    pub fn surface(&self, tag: Tag) -> Result<&[Tag]> {
        self.surfaces
            .get(&tag)
            .map(Vec::as_slice)
            .ok_or(MeshError::UnknownEntity {
                dim: Dim::Surface,
                tag,
            })
    }

    pub fn points(&self) -> impl Iterator<Item = (Tag, &PointEntity)> {
        self.points.iter().map(|(tag, point)| (*tag, point))
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn groups(&self) -> &[PhysicalGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&PhysicalGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Orders `curves` into one cycle, returning each curve with a flag set
    /// when it is traversed from its end point to its start point.
    fn ordered_cycle(&self, curves: &[Tag]) -> Result<Vec<(Tag, bool)>> {
        if curves.is_empty() {
            return Err(MeshError::geometry("curve loop needs at least one curve"));
        }
        let mut incidence: BTreeMap<Tag, Vec<usize>> = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for (index, &tag) in curves.iter().enumerate() {
            if !seen.insert(tag) {
                return Err(MeshError::geometry(format!(
                    "curve {tag} appears twice in one curve loop"
                )));
            }
            let (start, end) = self.curve(tag)?.endpoints();
            incidence.entry(start).or_default().push(index);
            incidence.entry(end).or_default().push(index);
        }
        if let Some((point, uses)) = incidence.iter().find(|(_, uses)| uses.len() != 2) {
            return Err(MeshError::geometry(format!(
                "curve loop is not closed: point {point} is shared by {} curve ends",
                uses.len()
            )));
        }

        let mut order = Vec::with_capacity(curves.len());
        let mut index = 0;
        let mut reversed = false;
        loop {
            order.push((curves[index], reversed));
            let (start, end) = self.curve(curves[index])?.endpoints();
            let at = if reversed { start } else { end };
            let uses = &incidence[&at];
            let next = if uses[0] == index { uses[1] } else { uses[0] };
            if next == 0 {
                break;
            }
            if order.len() > curves.len() {
                break;
            }
            reversed = self.curve(curves[next])?.endpoints().1 == at;
            index = next;
        }
        if order.len() != curves.len() {
            return Err(MeshError::geometry(format!(
                "curve loop is not connected: cycle through curve {} covers {} of {} curves",
                curves[0],
                order.len(),
                curves.len()
            )));
        }
        Ok(order)
    }

    /// Exact region of a loop when all of its arcs lie on one circle, the
    /// polygonal approximation otherwise.
    fn loop_region(&self, tag: Tag) -> Result<Region> {
        let curves = self.curve_loop(tag)?;
        let mut circle: Option<(Point2<Float>, Float)> = None;
        for &curve in curves {
            let Curve::Arc { start, center, .. } = self.curve(curve)? else {
                circle = None;
                break;
            };
            let c = center.xy();
            let r = (self.point(*start)?.position.xy() - c).norm();
            let same = |(c0, r0): (Point2<Float>, Float)| {
                (c0 - c).norm() <= GEOMETRY_TOLERANCE && (r0 - r).abs() <= GEOMETRY_TOLERANCE
            };
            match circle {
                None => circle = Some((c, r)),
                Some(first) if same(first) => {}
                Some(_) => {
                    circle = None;
                    break;
                }
            }
        }
        Ok(match circle {
            Some((center, radius)) => Region::Disk { center, radius },
            None => Region::Polygon(self.loop_polygon(tag)?),
        })
    }

    /// Polygonal approximation of a curve loop in the xy plane.
    pub fn loop_polygon(&self, tag: Tag) -> Result<Vec<Point2<Float>>> {
        let curves = self.curve_loop(tag)?.to_vec();
        let mut polygon = Vec::new();
        for (curve, reversed) in self.ordered_cycle(&curves)? {
            let mut samples = self.curve_samples(curve)?;
            if reversed {
                samples.reverse();
            }
            // the last sample is the first one of the next curve
            samples.pop();
            polygon.extend(samples);
        }
        Ok(polygon)
    }

    fn curve_samples(&self, tag: Tag) -> Result<Vec<Point2<Float>>> {
        let flat = |p: Point3<Float>| Point2::new(p.x, p.y);
        match self.curve(tag)? {
            Curve::Line { start, end } => Ok(vec![
                flat(self.point(*start)?.position),
                flat(self.point(*end)?.position),
            ]),
            Curve::Arc {
                start,
                end,
                center,
                normal,
            } => {
                let (center, normal) = (*center, *normal);
                let a = self.point(*start)?.position - center;
                let b = self.point(*end)?.position - center;
                let radius = a.xy().norm();
                let theta_a = a.y.atan2(a.x);
                let theta_b = b.y.atan2(b.x);
                let mut sweep = (theta_b - theta_a).rem_euclid(TAU);
                if sweep <= GEOMETRY_TOLERANCE {
                    sweep = TAU;
                }
                if normal.z < 0.0 {
                    sweep -= TAU;
                }
                let mut samples = Vec::with_capacity(ARC_SAMPLES + 2);
                samples.push(flat(center + a));
                for k in 1..=ARC_SAMPLES {
                    let theta = theta_a + sweep * k as Float / (ARC_SAMPLES + 1) as Float;
                    samples.push(Point2::new(
                        center.x + radius * theta.cos(),
                        center.y + radius * theta.sin(),
                    ));
                }
                samples.push(flat(center + b));
                Ok(samples)
            }
        }
    }
}

/// Area enclosed by a curve loop.
#[derive(Debug, Clone, PartialEq)]
enum Region {
    Disk { center: Point2<Float>, radius: Float },
    Polygon(Vec<Point2<Float>>),
}

impl Region {
    /// True when `inner` lies inside `self` without touching its boundary.
    fn strictly_contains(&self, inner: &Region) -> bool {
        match (self, inner) {
            (Region::Disk { center, radius }, Region::Disk { center: c, radius: r }) => {
                (c - center).norm() + r < radius - GEOMETRY_TOLERANCE
            }
            (Region::Disk { center, radius }, Region::Polygon(polygon)) => polygon
                .iter()
                .all(|p| (p - center).norm() < radius - GEOMETRY_TOLERANCE),
            (Region::Polygon(polygon), Region::Disk { center, radius }) => {
                polygon_contains(polygon, center)
                    && boundary_distance(polygon, center) > radius + GEOMETRY_TOLERANCE
            }
            (Region::Polygon(outer), Region::Polygon(hole)) => {
                hole.iter().all(|p| polygon_contains(outer, p))
                    && !outer.iter().any(|p| polygon_contains(hole, p))
                    && !boundaries_touch(outer, hole)
            }
        }
    }

    /// True when the two regions share any point, touching included.
    fn overlaps(&self, other: &Region) -> bool {
        match (self, other) {
            (Region::Disk { center, radius }, Region::Disk { center: c, radius: r }) => {
                (c - center).norm() <= radius + r + GEOMETRY_TOLERANCE
            }
            (Region::Disk { center, radius }, Region::Polygon(polygon))
            | (Region::Polygon(polygon), Region::Disk { center, radius }) => {
                polygon_contains(polygon, center)
                    || boundary_distance(polygon, center) <= radius + GEOMETRY_TOLERANCE
            }
            (Region::Polygon(a), Region::Polygon(b)) => {
                a.iter().any(|p| polygon_contains(b, p))
                    || b.iter().any(|p| polygon_contains(a, p))
                    || boundaries_touch(a, b)
            }
        }
    }
}

/// Even-odd ray casting test.
fn polygon_contains(polygon: &[Point2<Float>], p: &Point2<Float>) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn edges(polygon: &[Point2<Float>]) -> impl Iterator<Item = (Point2<Float>, Point2<Float>)> + '_ {
    polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(a, b)| (*a, *b))
}

fn point_segment_distance(p: &Point2<Float>, a: &Point2<Float>, b: &Point2<Float>) -> Float {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (*p - (*a + ab * t)).norm()
}

/// Distance from `p` to the closest edge of `polygon`.
fn boundary_distance(polygon: &[Point2<Float>], p: &Point2<Float>) -> Float {
    edges(polygon)
        .map(|(a, b)| point_segment_distance(p, &a, &b))
        .fold(Float::INFINITY, Float::min)
}

fn cross(o: &Point2<Float>, a: &Point2<Float>, b: &Point2<Float>) -> Float {
    (a - o).perp(&(b - o))
}

fn segments_touch(a: (Point2<Float>, Point2<Float>), b: (Point2<Float>, Point2<Float>)) -> bool {
    let (d1, d2) = (cross(&b.0, &b.1, &a.0), cross(&b.0, &b.1, &a.1));
    let (d3, d4) = (cross(&a.0, &a.1, &b.0), cross(&a.0, &a.1, &b.1));
    if d1 * d2 < 0.0 && d3 * d4 < 0.0 {
        return true;
    }
    point_segment_distance(&a.0, &b.0, &b.1) <= GEOMETRY_TOLERANCE
        || point_segment_distance(&a.1, &b.0, &b.1) <= GEOMETRY_TOLERANCE
        || point_segment_distance(&b.0, &a.0, &a.1) <= GEOMETRY_TOLERANCE
        || point_segment_distance(&b.1, &a.0, &a.1) <= GEOMETRY_TOLERANCE
}

fn boundaries_touch(a: &[Point2<Float>], b: &[Point2<Float>]) -> bool {
    edges(a).any(|ea| edges(b).any(|eb| segments_touch(ea, eb)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(model: &mut Model, cx: Float, cy: Float, half: Float) -> Tag {
        rect(model, cx, cy, half, half)
    }

    fn rect(model: &mut Model, cx: Float, cy: Float, hx: Float, hy: Float) -> Tag {
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        let points: Vec<Tag> = corners
            .iter()
            .map(|(sx, sy)| {
                model
                    .add_point(Point3::new(cx + sx * hx, cy + sy * hy, 0.0), 0.1)
                    .unwrap()
            })
            .collect();
        let lines: Vec<Tag> = (0..4)
            .map(|i| model.add_line(points[i], points[(i + 1) % 4]).unwrap())
            .collect();
        model.add_curve_loop(&lines).unwrap()
    }

    fn circle(model: &mut Model, cx: Float, cy: Float, radius: Float, arcs: usize) -> Vec<Tag> {
        let step = TAU / arcs as Float;
        (0..arcs)
            .map(|i| {
                model
                    .add_circle_arc(
                        Point3::new(cx, cy, 0.0),
                        radius,
                        step * i as Float,
                        step * (i + 1) as Float,
                    )
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_arcs_need_duplicate_removal_to_close() {
        let mut model = Model::new();
        let arcs = circle(&mut model, 0.0, 0.0, 1.0, 6);
        assert!(matches!(
            model.add_curve_loop(&arcs),
            Err(MeshError::Geometry(_))
        ));

        assert_eq!(model.remove_all_duplicates(), 6);
        assert_eq!(model.points().count(), 6);
        assert!(model.add_curve_loop(&arcs).is_ok());
        // idempotent
        assert_eq!(model.remove_all_duplicates(), 0);
    }

    #[test]
    fn test_loop_order_does_not_matter() {
        let mut model = Model::new();
        let arcs = circle(&mut model, 0.0, 0.0, 1.0, 5);
        model.remove_all_duplicates();
        let shuffled = vec![arcs[3], arcs[0], arcs[4], arcs[2], arcs[1]];
        let tag = model.add_curve_loop(&shuffled).unwrap();
        assert_eq!(model.loop_polygon(tag).unwrap().len(), 5 * (ARC_SAMPLES + 1));
    }

    #[test]
    fn test_disconnected_loop_rejected() {
        let mut model = Model::new();
        let a = square(&mut model, 0.0, 0.0, 1.0);
        let b = square(&mut model, 5.0, 0.0, 1.0);
        let mut curves = model.curve_loop(a).unwrap().to_vec();
        curves.extend_from_slice(model.curve_loop(b).unwrap());
        let err = model.add_curve_loop(&curves).unwrap_err();
        assert!(err.to_string().contains("not connected"));
    }

    #[test]
    fn test_surface_with_hole() {
        let mut model = Model::new();
        let outer = square(&mut model, 0.0, 0.0, 10.0);
        let arcs = circle(&mut model, 1.0, 1.0, 0.5, 8);
        model.remove_all_duplicates();
        let hole = model.add_curve_loop(&arcs).unwrap();
        let surface = model.add_plane_surface(&[outer, hole]).unwrap();
        assert_eq!(model.surface(surface).unwrap(), &[outer, hole]);
    }

    #[test]
    fn test_hole_outside_outer_rejected() {
        let mut model = Model::new();
        let outer = square(&mut model, 0.0, 0.0, 1.0);
        let hole = square(&mut model, 0.9, 0.0, 0.5);
        let err = model.add_plane_surface(&[outer, hole]).unwrap_err();
        assert!(err.to_string().contains("not strictly inside"));
    }

    #[test]
    fn test_overlapping_holes_rejected() {
        let mut model = Model::new();
        let outer = square(&mut model, 0.0, 0.0, 10.0);
        let a = square(&mut model, 0.0, 0.0, 1.0);
        let b = square(&mut model, 1.5, 0.5, 1.0);
        let err = model.add_plane_surface(&[outer, a, b]).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    fn circle_loop(model: &mut Model, cx: Float, cy: Float, radius: Float) -> Tag {
        let arcs = circle(model, cx, cy, radius, 15);
        model.remove_all_duplicates();
        model.add_curve_loop(&arcs).unwrap()
    }

    #[test]
    fn test_near_tangent_circle_holes_rejected() {
        let mut model = Model::new();
        let outer = square(&mut model, 0.0, 0.0, 1.0);
        let angle = 3.0_f64.to_radians();
        let gap = 0.00999;
        let a = circle_loop(&mut model, 0.0, 0.0, 0.005);
        let b = circle_loop(&mut model, gap * angle.cos(), gap * angle.sin(), 0.005);
        let err = model.add_plane_surface(&[outer, a, b]).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_separated_circle_holes_accepted() {
        let mut model = Model::new();
        let outer = square(&mut model, 0.0, 0.0, 1.0);
        let a = circle_loop(&mut model, 0.0, 0.0, 0.005);
        let b = circle_loop(&mut model, 0.0101, 0.0, 0.005);
        assert!(model.add_plane_surface(&[outer, a, b]).is_ok());
    }

    #[test]
    fn test_circle_crossing_outer_edge_rejected() {
        let mut model = Model::new();
        let outer = square(&mut model, 0.0, 0.0, 1.0);
        // center inside, but the circle reaches past x = 1
        let hole = circle_loop(&mut model, 0.996, 0.0, 0.005);
        let err = model.add_plane_surface(&[outer, hole]).unwrap_err();
        assert!(err.to_string().contains("not strictly inside"));
    }

    #[test]
    fn test_crossing_rectangles_without_shared_corners_overlap() {
        let mut model = Model::new();
        let outer = square(&mut model, 0.0, 0.0, 10.0);
        // a plus sign: no corner of either bar lies inside the other
        let wide = rect(&mut model, 0.0, 0.0, 2.0, 0.2);
        let tall = rect(&mut model, 0.0, 0.0, 0.2, 2.0);
        let err = model.add_plane_surface(&[outer, wide, tall]).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_rectangle_hole_touching_outer_rejected() {
        let mut model = Model::new();
        let outer = square(&mut model, 0.0, 0.0, 1.0);
        let hole = rect(&mut model, 0.5, 0.0, 0.5, 0.25);
        assert!(model.add_plane_surface(&[outer, hole]).is_err());
    }

    #[test]
    fn test_translate_moves_shared_points_once() {
        let mut model = Model::new();
        let outer = square(&mut model, 0.0, 0.0, 1.0);
        let lines: Vec<(Dim, Tag)> = model
            .curve_loop(outer)
            .unwrap()
            .iter()
            .map(|&t| (Dim::Curve, t))
            .collect();
        model.translate(&lines, Vector3::new(2.0, -1.0, 0.0)).unwrap();
        let p = model.point(Tag(1)).unwrap().position;
        assert_relative_eq!(p, Point3::new(1.0, -2.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_quarter_turn_about_origin() {
        let mut model = Model::new();
        let tag = model.add_point(Point3::new(1.0, 0.0, 0.0), 0.1).unwrap();
        model
            .rotate(
                &[(Dim::Point, tag)],
                Point3::origin(),
                Vector3::z(),
                std::f64::consts::FRAC_PI_2,
            )
            .unwrap();
        let p = model.point(tag).unwrap().position;
        assert_relative_eq!(p, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_axis_rejected() {
        let mut model = Model::new();
        let tag = model.add_point(Point3::new(1.0, 0.0, 0.0), 0.1).unwrap();
        let err = model
            .rotate(&[(Dim::Point, tag)], Point3::origin(), Vector3::zeros(), 1.0)
            .unwrap_err();
        assert!(matches!(err, MeshError::Geometry(_)));
    }

    #[test]
    fn test_physical_groups_are_write_once() {
        let mut model = Model::new();
        let outer = square(&mut model, 0.0, 0.0, 1.0);
        let surface = model.add_plane_surface(&[outer]).unwrap();
        assert!(model.add_physical_group(Dim::Surface, &[surface], "fluid").is_err());

        model.synchronize();
        model.add_physical_group(Dim::Surface, &[surface], "fluid").unwrap();
        assert!(matches!(
            model.add_physical_group(Dim::Surface, &[surface], "fluid"),
            Err(MeshError::DuplicateTag(name)) if name == "fluid"
        ));
        assert!(matches!(
            model.add_physical_group(Dim::Curve, &[Tag(99)], "ghost"),
            Err(MeshError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn test_degenerate_line_rejected() {
        let mut model = Model::new();
        let a = model.add_point(Point3::new(0.0, 0.0, 0.0), 0.1).unwrap();
        let b = model.add_point(Point3::new(0.0, 0.0, 0.0), 0.1).unwrap();
        assert!(model.add_line(a, b).is_err());
    }
}
