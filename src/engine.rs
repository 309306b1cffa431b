//! Capability surface of the external geometry / meshing engine.
//!
//! Every primitive constructor and field builder takes the engine as an
//! explicit `&mut dyn GeometryEngine`. The engine holds one mutable model at a
//! time, so a session must be [`reset`](GeometryEngine::reset) before a new
//! scenario registers anything.

use std::fmt;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::Float;
use crate::error::Result;
use crate::field::FieldSpec;

/// Opaque identifier handed out by the engine. Points, curves, curve loops,
/// surfaces and physical groups each number their tags independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag(pub u32);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a registered mesh-size field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u32);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Topological dimension of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dim {
    Point = 0,
    Curve = 1,
    Surface = 2,
}

impl Dim {
    pub fn as_int(self) -> u8 {
        self as u8
    }
}

pub trait GeometryEngine {
    fn add_point(&mut self, position: Point3<Float>, mesh_size: Float) -> Result<Tag>;

    fn add_line(&mut self, start: Tag, end: Tag) -> Result<Tag>;

    /// Arc of the circle of `radius` around `center` in the xy plane, running
    /// counter-clockwise from `angle1` to `angle2`. The arc gets its own end
    /// points; coincident points are only shared after
    /// [`remove_all_duplicates`](GeometryEngine::remove_all_duplicates).
    fn add_circle_arc(
        &mut self,
        center: Point3<Float>,
        radius: Float,
        angle1: Float,
        angle2: Float,
    ) -> Result<Tag>;

    /// Curves must form one connected cycle.
    fn add_curve_loop(&mut self, curves: &[Tag]) -> Result<Tag>;

    /// First loop is the outer boundary, the others are holes.
    fn add_plane_surface(&mut self, loops: &[Tag]) -> Result<Tag>;

    fn rotate(
        &mut self,
        entities: &[(Dim, Tag)],
        origin: Point3<Float>,
        axis: Vector3<Float>,
        angle: Float,
    ) -> Result<()>;

    fn translate(&mut self, entities: &[(Dim, Tag)], vector: Vector3<Float>) -> Result<()>;

    fn remove_all_duplicates(&mut self) -> Result<()>;

    /// Commits pending geometric operations so they can be tagged and meshed.
    fn synchronize(&mut self) -> Result<()>;

    fn point_position(&self, tag: Tag) -> Result<Point3<Float>>;

    fn add_physical_group(&mut self, dim: Dim, entities: &[Tag], name: &str) -> Result<Tag>;

    fn add_field(&mut self, spec: FieldSpec) -> Result<FieldId>;

    fn evaluate_field(&self, field: FieldId, x: Float, y: Float) -> Result<Float>;

    fn set_background_field(&mut self, field: FieldId) -> Result<()>;

    fn generate(&mut self, dim: Dim) -> Result<()>;

    fn write(&mut self, path: &Path) -> Result<()>;

    /// Drops every entity, group and field of the current model.
    fn reset(&mut self);
}
