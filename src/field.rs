//! Mesh-size fields: typed descriptions, builders that register them with the
//! engine, and a reference evaluator for the composition rules.
//!
//! Several refinement zones are merged into one background field with a
//! `Min` reduction, so the finest size requested at a location always wins.

use std::fmt;

use nalgebra::{Point2, Point3, Vector3};

use crate::Float;
use crate::engine::{FieldId, GeometryEngine, Tag};
use crate::error::{MeshError, Result, ensure_finite, ensure_positive};
use crate::model::Model;

/// Width of the band outside a box field over which the size blends from
/// `v_in` to `v_out`.
pub const BOX_THICKNESS: Float = 0.3;

/// Size reported by a threshold field past `dist_max` when it stops there.
pub const MAX_SIZE: Float = 1e22;

/// Constant size inside an axis-aligned box.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxField {
    pub v_in: Float,
    pub v_out: Float,
    pub x_min: Float,
    pub x_max: Float,
    pub y_min: Float,
    pub y_max: Float,
    pub thickness: Float,
}

impl BoxField {
    fn value(&self, p: &Point2<Float>) -> Float {
        let dx = (self.x_min - p.x).max(p.x - self.x_max).max(0.0);
        let dy = (self.y_min - p.y).max(p.y - self.y_max).max(0.0);
        let distance = dx.hypot(dy);
        if distance == 0.0 {
            self.v_in
        } else if distance < self.thickness {
            self.v_in + distance / self.thickness * (self.v_out - self.v_in)
        } else {
            self.v_out
        }
    }
}

/// Constant size inside a cylinder whose axis is perpendicular to the plane.
#[derive(Debug, Clone, PartialEq)]
pub struct CylinderField {
    pub v_in: Float,
    pub v_out: Float,
    pub center: Point2<Float>,
    pub radius: Float,
    pub axis: Vector3<Float>,
}

impl CylinderField {
    fn value(&self, p: &Point2<Float>) -> Float {
        let offset = Vector3::new(p.x - self.center.x, p.y - self.center.y, 0.0);
        let axis_len2 = self.axis.norm_squared();
        let along = offset.dot(&self.axis) / axis_len2;
        let radial = (offset - self.axis * along).norm();
        if along.abs() <= 1.0 && radial <= self.radius {
            self.v_in
        } else {
            self.v_out
        }
    }
}

/// Linear ramp from `size_min` at `dist_min` to `size_max` at `dist_max`,
/// driven by the value of another field.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdField {
    pub in_field: FieldId,
    pub dist_min: Float,
    pub dist_max: Float,
    pub size_min: Float,
    pub size_max: Float,
    pub stop_at_dist_max: bool,
}

impl ThresholdField {
    fn value(&self, r: Float) -> Float {
        if self.stop_at_dist_max && r >= self.dist_max {
            MAX_SIZE
        } else if r <= self.dist_min {
            self.size_min
        } else if r >= self.dist_max {
            self.size_max
        } else {
            let t = (r - self.dist_min) / (self.dist_max - self.dist_min);
            self.size_min + t * (self.size_max - self.size_min)
        }
    }
}

/// Closed-form size growing linearly with the distance to `center`.
///
/// Rendered as an engine expression with the sign of each center coordinate
/// folded into the operator, so the text never contains `x - -a`.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialExpr {
    pub center: Point2<Float>,
    pub dist_min: Float,
    pub dist_max: Float,
    pub size_in: Float,
    pub size_out: Float,
}

impl RadialExpr {
    pub fn value(&self, p: &Point2<Float>) -> Float {
        let r = (p - self.center).norm();
        (r - self.dist_min) / (self.dist_max - self.dist_min) * (self.size_out - self.size_in)
            + self.size_in
    }
}

impl fmt::Display for RadialExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fold = |c: Float| if c < 0.0 { ('+', -c) } else { ('-', c) };
        let (sx, ax) = fold(self.center.x);
        let (sy, ay) = fold(self.center.y);
        write!(
            f,
            "(sqrt((x {sx} {ax})^2 + (y {sy} {ay})^2) - {})/{}*({}) + {}",
            self.dist_min,
            self.dist_max - self.dist_min,
            self.size_out - self.size_in,
            self.size_in
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    Box(BoxField),
    Cylinder(CylinderField),
    /// Distance to the nearest of the listed points.
    Distance { points: Vec<Tag> },
    Threshold(ThresholdField),
    MathEval(RadialExpr),
    Min(Vec<FieldId>),
    Max(Vec<FieldId>),
}

impl FieldSpec {
    /// Engine name of the field kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldSpec::Box(_) => "Box",
            FieldSpec::Cylinder(_) => "Cylinder",
            FieldSpec::Distance { .. } => "Distance",
            FieldSpec::Threshold(_) => "Threshold",
            FieldSpec::MathEval(_) => "MathEval",
            FieldSpec::Min(_) => "Min",
            FieldSpec::Max(_) => "Max",
        }
    }

    pub fn dependencies(&self) -> Vec<FieldId> {
        match self {
            FieldSpec::Threshold(t) => vec![t.in_field],
            FieldSpec::Min(ids) | FieldSpec::Max(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            FieldSpec::Box(b) => {
                ensure_positive("v_in", b.v_in)?;
                ensure_positive("v_out", b.v_out)?;
                ensure_range("x_min", b.x_min, b.x_max)?;
                ensure_range("y_min", b.y_min, b.y_max)?;
                if !(b.thickness.is_finite() && b.thickness >= 0.0) {
                    return Err(MeshError::invalid("thickness", "must be >= 0"));
                }
            }
            FieldSpec::Cylinder(c) => {
                ensure_positive("v_in", c.v_in)?;
                ensure_positive("v_out", c.v_out)?;
                ensure_positive("radius", c.radius)?;
                ensure_finite("center.x", c.center.x)?;
                ensure_finite("center.y", c.center.y)?;
                ensure_positive("axis", c.axis.norm())?;
            }
            FieldSpec::Distance { points } => {
                if points.is_empty() {
                    return Err(MeshError::invalid("points", "distance field needs a point"));
                }
            }
            FieldSpec::Threshold(t) => {
                ensure_distance_band(t.dist_min, t.dist_max)?;
                if !(t.size_min.is_finite() && t.size_min >= 0.0) {
                    return Err(MeshError::invalid("size_min", "must be >= 0"));
                }
                ensure_positive("size_max", t.size_max)?;
            }
            FieldSpec::MathEval(e) => {
                ensure_finite("center.x", e.center.x)?;
                ensure_finite("center.y", e.center.y)?;
                ensure_distance_band(e.dist_min, e.dist_max)?;
                ensure_positive("size_in", e.size_in)?;
                ensure_positive("size_out", e.size_out)?;
            }
            FieldSpec::Min(ids) | FieldSpec::Max(ids) => {
                if ids.is_empty() {
                    return Err(MeshError::invalid(
                        "fields",
                        format!("{} field needs at least one input", self.kind()),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn ensure_range(name: &'static str, lo: Float, hi: Float) -> Result<()> {
    ensure_finite(name, lo)?;
    ensure_finite(name, hi)?;
    if lo < hi {
        Ok(())
    } else {
        Err(MeshError::invalid(name, format!("empty range [{lo}, {hi}]")))
    }
}

fn ensure_distance_band(dist_min: Float, dist_max: Float) -> Result<()> {
    if !(dist_min.is_finite() && dist_min >= 0.0) {
        return Err(MeshError::invalid("dist_min", format!("must be >= 0, got {dist_min}")));
    }
    ensure_finite("dist_max", dist_max)?;
    if dist_min >= dist_max {
        return Err(MeshError::invalid(
            "dist_min",
            format!("must be below dist_max ({dist_min} >= {dist_max})"),
        ));
    }
    Ok(())
}

/// Resolves point handles for distance fields.
pub trait PointSource {
    fn position(&self, tag: Tag) -> Result<Point3<Float>>;
}

impl PointSource for Model {
    fn position(&self, tag: Tag) -> Result<Point3<Float>> {
        Ok(self.point(tag)?.position)
    }
}

/// Fields registered in one model, numbered from 1 in registration order.
#[derive(Debug, Default, Clone)]
pub struct FieldSet {
    fields: Vec<FieldSpec>,
    background: Option<FieldId>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, spec: FieldSpec) -> Result<FieldId> {
        spec.validate()?;
        for dep in spec.dependencies() {
            self.get(dep)?;
        }
        self.fields.push(spec);
        Ok(FieldId(self.fields.len() as u32))
    }

    pub fn get(&self, id: FieldId) -> Result<&FieldSpec> {
        (id.0 as usize)
            .checked_sub(1)
            .and_then(|index| self.fields.get(index))
            .ok_or(MeshError::UnknownField(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &FieldSpec)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, spec)| (FieldId(i as u32 + 1), spec))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn set_background(&mut self, id: FieldId) -> Result<()> {
        self.get(id)?;
        self.background = Some(id);
        Ok(())
    }

    pub fn background(&self) -> Option<FieldId> {
        self.background
    }

    pub fn clear(&mut self) {
        self.fields.clear();
        self.background = None;
    }

    /// Size requested by field `id` at `(x, y)`.
    pub fn evaluate(
        &self,
        id: FieldId,
        x: Float,
        y: Float,
        points: &dyn PointSource,
    ) -> Result<Float> {
        let p = Point2::new(x, y);
        Ok(match self.get(id)? {
            FieldSpec::Box(b) => b.value(&p),
            FieldSpec::Cylinder(c) => c.value(&p),
            FieldSpec::Distance { points: tags } => {
                let here = Point3::new(x, y, 0.0);
                let mut nearest = Float::INFINITY;
                for &tag in tags {
                    nearest = nearest.min((points.position(tag)? - here).norm());
                }
                nearest
            }
            FieldSpec::Threshold(t) => t.value(self.evaluate(t.in_field, x, y, points)?),
            FieldSpec::MathEval(e) => e.value(&p),
            FieldSpec::Min(ids) => {
                let mut size = Float::INFINITY;
                for &dep in ids {
                    size = size.min(self.evaluate(dep, x, y, points)?);
                }
                size
            }
            FieldSpec::Max(ids) => {
                let mut size = Float::NEG_INFINITY;
                for &dep in ids {
                    size = size.max(self.evaluate(dep, x, y, points)?);
                }
                size
            }
        })
    }
}

/// Box refinement zone of `length` x `height` centered on `center`.
pub fn add_refinement_zone_rect(
    engine: &mut dyn GeometryEngine,
    center: Point2<Float>,
    length: Float,
    height: Float,
    mesh_size_in: Float,
    mesh_size_out: Float,
) -> Result<FieldId> {
    ensure_finite("center.x", center.x)?;
    ensure_finite("center.y", center.y)?;
    ensure_positive("length", length)?;
    ensure_positive("height", height)?;
    ensure_positive("mesh_size_in", mesh_size_in)?;
    ensure_positive("mesh_size_out", mesh_size_out)?;
    engine.add_field(FieldSpec::Box(BoxField {
        v_in: mesh_size_in,
        v_out: mesh_size_out,
        x_min: center.x - length / 2.0,
        x_max: center.x + length / 2.0,
        y_min: center.y - height / 2.0,
        y_max: center.y + height / 2.0,
        thickness: BOX_THICKNESS,
    }))
}

/// Disk refinement zone of the given diameter.
pub fn add_refinement_zone_cyl(
    engine: &mut dyn GeometryEngine,
    center: Point2<Float>,
    diameter: Float,
    mesh_size_in: Float,
    mesh_size_out: Float,
) -> Result<FieldId> {
    ensure_positive("diameter", diameter)?;
    ensure_positive("mesh_size_in", mesh_size_in)?;
    ensure_positive("mesh_size_out", mesh_size_out)?;
    engine.add_field(FieldSpec::Cylinder(CylinderField {
        v_in: mesh_size_in,
        v_out: mesh_size_out,
        center,
        radius: diameter / 2.0,
        axis: Vector3::z(),
    }))
}

/// Distance-based refinement around `center`: `mesh_size_in` up to
/// `dist_min`, `mesh_size_out` from `dist_max` on.
pub fn threshold(
    engine: &mut dyn GeometryEngine,
    center: Point2<Float>,
    dist_min: Float,
    dist_max: Float,
    mesh_size_in: Float,
    mesh_size_out: Float,
) -> Result<FieldId> {
    ensure_distance_band(dist_min, dist_max)?;
    ensure_positive("mesh_size_in", mesh_size_in)?;
    ensure_positive("mesh_size_out", mesh_size_out)?;
    let point = engine.add_point(Point3::new(center.x, center.y, 0.0), mesh_size_in)?;
    let distance = engine.add_field(FieldSpec::Distance {
        points: vec![point],
    })?;
    engine.add_field(FieldSpec::Threshold(ThresholdField {
        in_field: distance,
        dist_min,
        dist_max,
        size_min: mesh_size_in,
        size_max: mesh_size_out,
        stop_at_dist_max: false,
    }))
}

/// Radial expression field capped from below by a threshold on its own value,
/// returned as the `Max` of the two.
pub fn custom_distance(
    engine: &mut dyn GeometryEngine,
    center: Point2<Float>,
    dist_min: Float,
    dist_max: Float,
    mesh_size_in: Float,
    mesh_size_out: Float,
    global_mesh_size: Float,
) -> Result<FieldId> {
    ensure_positive("global_mesh_size", global_mesh_size)?;
    let expr = engine.add_field(FieldSpec::MathEval(RadialExpr {
        center,
        dist_min,
        dist_max,
        size_in: mesh_size_in,
        size_out: mesh_size_out,
    }))?;
    let cap = engine.add_field(FieldSpec::Threshold(ThresholdField {
        in_field: expr,
        dist_min: mesh_size_out * 0.998,
        dist_max: mesh_size_out * 0.999,
        size_min: 0.0,
        size_max: global_mesh_size,
        stop_at_dist_max: false,
    }))?;
    max_of(engine, &[expr, cap])
}

pub fn min_of(engine: &mut dyn GeometryEngine, fields: &[FieldId]) -> Result<FieldId> {
    engine.add_field(FieldSpec::Min(fields.to_vec()))
}

pub fn max_of(engine: &mut dyn GeometryEngine, fields: &[FieldId]) -> Result<FieldId> {
    engine.add_field(FieldSpec::Max(fields.to_vec()))
}

/// Combines `fields` with `Min` and makes the result the background field.
pub fn apply_fields(engine: &mut dyn GeometryEngine, fields: &[FieldId]) -> Result<FieldId> {
    let combined = min_of(engine, fields)?;
    engine.set_background_field(combined)?;
    Ok(combined)
}
