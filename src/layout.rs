//! Channel layout: one bounding rectangle, N cylinders, and one wake-biased
//! refinement box per cylinder.

use std::path::{Path, PathBuf};

use log::debug;

use crate::config::Params;
use crate::engine::{Dim, FieldId, GeometryEngine};
use crate::error::{MeshError, Result, ensure_finite};
use crate::field::{add_refinement_zone_rect, apply_fields};
use crate::geometry::{Boundary, Circle, PlaneSurface, Rectangle};
use crate::{Float, Position};

/// Axis-aligned rectangle described by its center and extents.
#[derive(Debug, Clone, PartialEq)]
pub struct RectSpec {
    pub center: Position,
    pub length: Float,
    pub height: Float,
}

impl RectSpec {
    pub fn x_min(&self) -> Float {
        self.center.x - self.length / 2.0
    }

    pub fn x_max(&self) -> Float {
        self.center.x + self.length / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CylinderPlan {
    /// Boundary tag of the cylinder wall.
    pub name: String,
    pub center: Position,
    pub refinement: RectSpec,
}

/// Placement of every shape of a scenario, before anything is registered.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    pub domain: RectSpec,
    pub cylinders: Vec<CylinderPlan>,
}

/// Domain and refinement boxes both sit `upstream` ahead of their anchor
/// and `downstream` behind it.
fn wake_biased(anchor: &Position, upstream: Float, downstream: Float, height: Float) -> RectSpec {
    let length = upstream + downstream;
    RectSpec {
        center: Position::new(length / 2.0 - upstream + anchor.x, anchor.y),
        length,
        height,
    }
}

pub fn plan(positions: &[Position], params: &Params) -> Result<LayoutPlan> {
    params.validate()?;
    if positions.is_empty() {
        return Err(MeshError::invalid("positions", "at least one cylinder is required"));
    }

    let domain = wake_biased(
        &Position::origin(),
        params.length_upstream,
        params.length_downstream,
        params.height,
    );
    let cylinders = positions
        .iter()
        .enumerate()
        .map(|(i, position)| {
            ensure_finite("positions", position.x)?;
            ensure_finite("positions", position.y)?;
            Ok(CylinderPlan {
                name: format!("cyl{i}"),
                center: *position,
                refinement: wake_biased(
                    position,
                    params.length_refinement,
                    params.length_refinement_downstream,
                    2.0 * params.length_refinement,
                ),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LayoutPlan { domain, cylinders })
}

/// What a call to [`mesh`] registered.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshReport {
    pub output: PathBuf,
    /// Physical group names in registration order.
    pub boundary_tags: Vec<String>,
    pub cylinders: usize,
    pub background_field: FieldId,
}

/// Builds the channel around `positions`, meshes it in 2-D and writes the mesh
/// to `out_path`. The engine must hold an empty model.
pub fn mesh(
    engine: &mut dyn GeometryEngine,
    positions: &[Position],
    params: &Params,
    out_path: &Path,
) -> Result<MeshReport> {
    let layout = plan(positions, params)?;

    // Channel
    let domain = Rectangle::new(
        engine,
        layout.domain.center.x,
        layout.domain.center.y,
        layout.domain.length,
        layout.domain.height,
        params.global_mesh_size,
    )?;

    // Cylinders and their wake boxes
    let mut circles = Vec::with_capacity(layout.cylinders.len());
    let mut zones = Vec::with_capacity(layout.cylinders.len());
    for cylinder in &layout.cylinders {
        circles.push(Circle::new(
            engine,
            cylinder.center.x,
            cylinder.center.y,
            params.diameter,
            params.n_points_cyl,
        )?);
        zones.push(add_refinement_zone_rect(
            engine,
            cylinder.refinement.center,
            cylinder.refinement.length,
            cylinder.refinement.height,
            params.refined_mesh_size,
            params.global_mesh_size,
        )?);
    }
    // Background size is the finest zone at each point
    let background_field = apply_fields(engine, &zones)?;

    // Fluid surface: channel loop with one hole per cylinder
    let mut boundaries: Vec<&dyn Boundary> = vec![&domain];
    boundaries.extend(circles.iter().map(|c| c as &dyn Boundary));
    let surface = PlaneSurface::new(engine, &boundaries)?;
    engine.synchronize()?;

    // Physical groups
    let mut boundary_tags = Vec::new();
    for (role, _) in domain.define_bc(engine)? {
        boundary_tags.push(role.name().to_string());
    }
    for (circle, cylinder) in circles.iter().zip(&layout.cylinders) {
        circle.define_bc(engine, &cylinder.name)?;
        boundary_tags.push(cylinder.name.clone());
    }
    surface.define_bc(engine)?;
    boundary_tags.push(PlaneSurface::DOMAIN_NAME.to_string());
    engine.synchronize()?;
    debug!("boundary tags: {}", boundary_tags.join(", "));

    // Mesh and write
    engine.generate(Dim::Surface)?;
    engine.write(out_path)?;

    Ok(MeshReport {
        output: out_path.to_path_buf(),
        boundary_tags,
        cylinders: circles.len(),
        background_field,
    })
}
