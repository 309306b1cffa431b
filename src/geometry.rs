use std::f64::consts::PI;

use nalgebra::{Isometry3, Point3, Unit, UnitQuaternion, Vector3};

use crate::Float;
use crate::engine::{Dim, GeometryEngine, Tag};
use crate::error::{MeshError, Result, ensure_finite, ensure_positive};

/// Rigid motions shared by every primitive.
///
/// A composite primitive lists all of its constituents in `entities`, and the
/// engine moves the union of their points once, so the shape stays rigid.
/// Once the engine has moved the entities, the primitive applies the same
/// motion to the coordinates it keeps.
pub trait Transform {
    fn entities(&self) -> Vec<(Dim, Tag)>;

    fn follow(&mut self, motion: &Isometry3<Float>);

    fn rotate(
        &mut self,
        engine: &mut dyn GeometryEngine,
        angle: Float,
        origin: Point3<Float>,
        axis: Vector3<Float>,
    ) -> Result<()> {
        ensure_finite("angle", angle)?;
        if !(axis.norm() > 0.0) {
            return Err(MeshError::invalid("axis", "rotation axis must be non-zero"));
        }
        engine.rotate(&self.entities(), origin, axis, angle)?;
        let rotation = UnitQuaternion::from_axis_angle(&Unit::new_normalize(axis), angle);
        self.follow(&Isometry3::rotation_wrt_point(rotation, origin));
        Ok(())
    }

    fn translate(&mut self, engine: &mut dyn GeometryEngine, vector: Vector3<Float>) -> Result<()> {
        engine.translate(&self.entities(), vector)?;
        self.follow(&Isometry3::translation(vector.x, vector.y, vector.z));
        Ok(())
    }
}

/// Primitives that can bound a surface.
pub trait Boundary: Transform {
    /// Registers a closed curve loop around the primitive and returns its tag.
    fn close_loop(&self, engine: &mut dyn GeometryEngine) -> Result<Tag>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub position: Point3<Float>,
    pub mesh_size: Float,
    pub tag: Tag,
}

impl Point {
    pub fn new(engine: &mut dyn GeometryEngine, x: Float, y: Float, mesh_size: Float) -> Result<Self> {
        ensure_finite("x", x)?;
        ensure_finite("y", y)?;
        ensure_positive("mesh_size", mesh_size)?;
        let position = Point3::new(x, y, 0.0);
        let tag = engine.add_point(position, mesh_size)?;
        Ok(Self {
            position,
            mesh_size,
            tag,
        })
    }
}

impl Transform for Point {
    fn entities(&self) -> Vec<(Dim, Tag)> {
        vec![(Dim::Point, self.tag)]
    }

    fn follow(&mut self, motion: &Isometry3<Float>) {
        self.position = motion.transform_point(&self.position);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub start: Tag,
    pub end: Tag,
    pub tag: Tag,
}

impl Line {
    pub fn new(engine: &mut dyn GeometryEngine, start: &Point, end: &Point) -> Result<Self> {
        if start.tag == end.tag {
            return Err(MeshError::invalid("end", "line needs two distinct points"));
        }
        let tag = engine.add_line(start.tag, end.tag)?;
        Ok(Self {
            start: start.tag,
            end: end.tag,
            tag,
        })
    }
}

impl Transform for Line {
    fn entities(&self) -> Vec<(Dim, Tag)> {
        vec![(Dim::Curve, self.tag)]
    }

    // only handles, nothing to move
    fn follow(&mut self, _motion: &Isometry3<Float>) {}
}

/// Closed loop over lines; build it once the lines are in their final place.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveLoop {
    pub curves: Vec<Tag>,
    pub tag: Tag,
}

impl CurveLoop {
    pub fn new(engine: &mut dyn GeometryEngine, lines: &[Line]) -> Result<Self> {
        let curves: Vec<Tag> = lines.iter().map(|line| line.tag).collect();
        let tag = engine.add_curve_loop(&curves)?;
        Ok(Self { curves, tag })
    }
}

/// Number of arcs used for a circle resolved with `n_points` per diameter.
pub fn segment_count(n_points: usize) -> usize {
    (n_points as Float * PI).floor() as usize
}

/// Circle made of `segment_count(n_points)` equal arcs.
#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub center: Point3<Float>,
    pub radius: Float,
    pub n_points: usize,
    /// Nominal element size along the circle.
    pub mesh_size: Float,
    pub arcs: Vec<Tag>,
}

impl Circle {
    pub fn new(
        engine: &mut dyn GeometryEngine,
        xc: Float,
        yc: Float,
        diameter: Float,
        n_points: usize,
    ) -> Result<Self> {
        ensure_finite("xc", xc)?;
        ensure_finite("yc", yc)?;
        ensure_positive("diameter", diameter)?;
        if n_points == 0 {
            return Err(MeshError::invalid("n_points", "must be at least 1"));
        }

        let radius = diameter / 2.0;
        let count = segment_count(n_points);
        let step = 2.0 * PI / count as Float;
        let center = Point3::new(xc, yc, 0.0);
        let arcs = (0..count)
            .map(|i| engine.add_circle_arc(center, radius, step * i as Float, step * (i + 1) as Float))
            .collect::<Result<Vec<_>>>()?;

        // neighbouring arcs only share end points after the merge
        engine.synchronize()?;
        engine.remove_all_duplicates()?;

        Ok(Self {
            center,
            radius,
            n_points,
            mesh_size: diameter / n_points as Float,
            arcs,
        })
    }

    pub fn diameter(&self) -> Float {
        2.0 * self.radius
    }

    /// Registers the arcs as one physical curve group.
    pub fn define_bc(&self, engine: &mut dyn GeometryEngine, name: &str) -> Result<Tag> {
        engine.add_physical_group(Dim::Curve, &self.arcs, name)
    }
}

impl Transform for Circle {
    fn entities(&self) -> Vec<(Dim, Tag)> {
        self.arcs.iter().map(|&arc| (Dim::Curve, arc)).collect()
    }

    fn follow(&mut self, motion: &Isometry3<Float>) {
        self.center = motion.transform_point(&self.center);
    }
}

impl Boundary for Circle {
    fn close_loop(&self, engine: &mut dyn GeometryEngine) -> Result<Tag> {
        engine.add_curve_loop(&self.arcs)
    }
}

/// Boundary role of a rectangle edge in a channel flowing towards +x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeRole {
    WallBottom,
    Outlet,
    WallTop,
    Inlet,
}

impl EdgeRole {
    /// Role of each edge, indexed like [`Rectangle::lines`].
    pub const BY_EDGE: [EdgeRole; 4] = [
        EdgeRole::WallBottom,
        EdgeRole::Outlet,
        EdgeRole::WallTop,
        EdgeRole::Inlet,
    ];

    /// Order in which the edge groups are registered.
    pub const REGISTRATION_ORDER: [EdgeRole; 4] = [
        EdgeRole::Inlet,
        EdgeRole::Outlet,
        EdgeRole::WallTop,
        EdgeRole::WallBottom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EdgeRole::WallBottom => "wall_bottom",
            EdgeRole::Outlet => "outlet",
            EdgeRole::WallTop => "wall_top",
            EdgeRole::Inlet => "inlet",
        }
    }

    pub fn edge_index(self) -> usize {
        match self {
            EdgeRole::WallBottom => 0,
            EdgeRole::Outlet => 1,
            EdgeRole::WallTop => 2,
            EdgeRole::Inlet => 3,
        }
    }
}

/// Axis-aligned rectangle made of 4 corner points and 4 lines.
///
/// Corners run counter-clockwise from the bottom-left one, and line `i` joins
/// corner `i` to corner `i + 1`: bottom, right, top, left.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectangle {
    pub center: Point3<Float>,
    /// Extents along the rectangle's own axes.
    pub dx: Float,
    pub dy: Float,
    pub mesh_size: Float,
    pub points: [Point; 4],
    pub lines: [Line; 4],
}

impl Rectangle {
    pub fn new(
        engine: &mut dyn GeometryEngine,
        xc: Float,
        yc: Float,
        dx: Float,
        dy: Float,
        mesh_size: Float,
    ) -> Result<Self> {
        ensure_finite("xc", xc)?;
        ensure_finite("yc", yc)?;
        ensure_positive("dx", dx)?;
        ensure_positive("dy", dy)?;
        ensure_positive("mesh_size", mesh_size)?;

        let points = [
            Point::new(engine, xc - dx / 2.0, yc - dy / 2.0, mesh_size)?,
            Point::new(engine, xc + dx / 2.0, yc - dy / 2.0, mesh_size)?,
            Point::new(engine, xc + dx / 2.0, yc + dy / 2.0, mesh_size)?,
            Point::new(engine, xc - dx / 2.0, yc + dy / 2.0, mesh_size)?,
        ];
        let lines = [
            Line::new(engine, &points[0], &points[1])?,
            Line::new(engine, &points[1], &points[2])?,
            Line::new(engine, &points[2], &points[3])?,
            Line::new(engine, &points[3], &points[0])?,
        ];

        Ok(Self {
            center: Point3::new(xc, yc, 0.0),
            dx,
            dy,
            mesh_size,
            points,
            lines,
        })
    }

    pub fn edge(&self, role: EdgeRole) -> &Line {
        &self.lines[role.edge_index()]
    }

    /// Registers one physical group per edge, named after its role.
    pub fn define_bc(&self, engine: &mut dyn GeometryEngine) -> Result<Vec<(EdgeRole, Tag)>> {
        EdgeRole::REGISTRATION_ORDER
            .iter()
            .map(|&role| -> Result<(EdgeRole, Tag)> {
                let group =
                    engine.add_physical_group(Dim::Curve, &[self.edge(role).tag], role.name())?;
                Ok((role, group))
            })
            .collect()
    }
}

impl Transform for Rectangle {
    fn entities(&self) -> Vec<(Dim, Tag)> {
        self.lines.iter().map(|line| (Dim::Curve, line.tag)).collect()
    }

    fn follow(&mut self, motion: &Isometry3<Float>) {
        self.center = motion.transform_point(&self.center);
        for point in &mut self.points {
            point.follow(motion);
        }
    }
}

impl Boundary for Rectangle {
    fn close_loop(&self, engine: &mut dyn GeometryEngine) -> Result<Tag> {
        Ok(CurveLoop::new(engine, &self.lines)?.tag)
    }
}

/// Plane surface bounded by the first boundary, with the others as holes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneSurface {
    pub loops: Vec<Tag>,
    pub tag: Tag,
}

impl PlaneSurface {
    pub const DOMAIN_NAME: &'static str = "fluid";

    pub fn new(engine: &mut dyn GeometryEngine, boundaries: &[&dyn Boundary]) -> Result<Self> {
        if boundaries.is_empty() {
            return Err(MeshError::invalid("boundaries", "a surface needs an outer boundary"));
        }
        let loops = boundaries
            .iter()
            .map(|boundary| boundary.close_loop(engine))
            .collect::<Result<Vec<_>>>()?;
        let tag = engine.add_plane_surface(&loops)?;
        Ok(Self { loops, tag })
    }

    pub fn define_bc(&self, engine: &mut dyn GeometryEngine) -> Result<Tag> {
        engine.add_physical_group(Dim::Surface, &[self.tag], Self::DOMAIN_NAME)
    }
}

/// Moving a surface moves its boundary entities in the engine; the
/// primitives that built those boundaries keep their own coordinates.
impl Transform for PlaneSurface {
    fn entities(&self) -> Vec<(Dim, Tag)> {
        vec![(Dim::Surface, self.tag)]
    }

    fn follow(&mut self, _motion: &Isometry3<Float>) {}
}
