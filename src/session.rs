//! Engine session backed by the in-memory model and the Gmsh executable.

use std::path::Path;

use log::{debug, info, warn};
use nalgebra::{Point3, Vector3};

use crate::Float;
use crate::config::EngineSettings;
use crate::engine::{Dim, FieldId, GeometryEngine, Tag};
use crate::error::{MeshError, Result};
use crate::field::{FieldSet, FieldSpec};
use crate::model::Model;
use crate::output::{Command, GeoWriter, GmshRunner, script_path};

/// One engine model at a time; call [`reset`](GeometryEngine::reset) between
/// scenarios.
#[derive(Debug, Default)]
pub struct GmshSession {
    model: Model,
    fields: FieldSet,
    journal: Vec<Command>,
    generated: Option<Dim>,
    runner: Option<GmshRunner>,
}

impl GmshSession {
    pub fn new(settings: &EngineSettings) -> Self {
        let runner = settings
            .resolve_executable()
            .map(|exe| GmshRunner::new(exe, settings.format.clone()));
        Self {
            runner,
            ..Self::default()
        }
    }

    pub fn with_runner(runner: GmshRunner) -> Self {
        Self {
            runner: Some(runner),
            ..Self::default()
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn commands(&self) -> &[Command] {
        &self.journal
    }

    pub fn generated_dim(&self) -> Option<Dim> {
        self.generated
    }

    /// The `.geo` script for the current model.
    pub fn script(&self) -> String {
        GeoWriter::new(&self.journal).render()
    }
}

impl GeometryEngine for GmshSession {
    fn add_point(&mut self, position: Point3<Float>, mesh_size: Float) -> Result<Tag> {
        let tag = self.model.add_point(position, mesh_size)?;
        self.journal.push(Command::Point {
            tag,
            position,
            mesh_size,
        });
        Ok(tag)
    }

    fn add_line(&mut self, start: Tag, end: Tag) -> Result<Tag> {
        let tag = self.model.add_line(start, end)?;
        self.journal.push(Command::Line { tag, start, end });
        Ok(tag)
    }

    fn add_circle_arc(
        &mut self,
        center: Point3<Float>,
        radius: Float,
        angle1: Float,
        angle2: Float,
    ) -> Result<Tag> {
        let tag = self.model.add_circle_arc(center, radius, angle1, angle2)?;
        self.journal.push(Command::CircleArc {
            tag,
            center,
            radius,
            angle1,
            angle2,
        });
        Ok(tag)
    }

    fn add_curve_loop(&mut self, curves: &[Tag]) -> Result<Tag> {
        let tag = self.model.add_curve_loop(curves)?;
        self.journal.push(Command::CurveLoop {
            tag,
            curves: curves.to_vec(),
        });
        Ok(tag)
    }

    fn add_plane_surface(&mut self, loops: &[Tag]) -> Result<Tag> {
        let tag = self.model.add_plane_surface(loops)?;
        debug!("plane surface {tag} with {} holes", loops.len() - 1);
        self.journal.push(Command::PlaneSurface {
            tag,
            loops: loops.to_vec(),
        });
        Ok(tag)
    }

    fn rotate(
        &mut self,
        entities: &[(Dim, Tag)],
        origin: Point3<Float>,
        axis: Vector3<Float>,
        angle: Float,
    ) -> Result<()> {
        self.model.rotate(entities, origin, axis, angle)?;
        self.journal.push(Command::Rotate {
            entities: entities.to_vec(),
            origin,
            axis,
            angle,
        });
        Ok(())
    }

    fn translate(&mut self, entities: &[(Dim, Tag)], vector: Vector3<Float>) -> Result<()> {
        self.model.translate(entities, vector)?;
        self.journal.push(Command::Translate {
            entities: entities.to_vec(),
            vector,
        });
        Ok(())
    }

    fn remove_all_duplicates(&mut self) -> Result<()> {
        self.model.remove_all_duplicates();
        self.journal.push(Command::Coherence);
        Ok(())
    }

    fn synchronize(&mut self) -> Result<()> {
        self.model.synchronize();
        Ok(())
    }

    fn point_position(&self, tag: Tag) -> Result<Point3<Float>> {
        Ok(self.model.point(tag)?.position)
    }

    fn add_physical_group(&mut self, dim: Dim, entities: &[Tag], name: &str) -> Result<Tag> {
        let tag = self.model.add_physical_group(dim, entities, name)?;
        debug!("physical group `{name}` ({dim:?} {tag}) on {} entities", entities.len());
        self.journal.push(Command::PhysicalGroup {
            dim,
            tag,
            name: name.to_string(),
            entities: entities.to_vec(),
        });
        Ok(tag)
    }

    fn add_field(&mut self, spec: FieldSpec) -> Result<FieldId> {
        let id = self.fields.add(spec.clone())?;
        debug!("field {id} = {}", spec.kind());
        self.journal.push(Command::Field { id, spec });
        Ok(id)
    }

    fn evaluate_field(&self, field: FieldId, x: Float, y: Float) -> Result<Float> {
        self.fields.evaluate(field, x, y, &self.model)
    }

    fn set_background_field(&mut self, field: FieldId) -> Result<()> {
        self.fields.set_background(field)?;
        self.journal.push(Command::BackgroundField(field));
        Ok(())
    }

    fn generate(&mut self, dim: Dim) -> Result<()> {
        if !self.model.is_synchronized() {
            return Err(MeshError::Generation(
                "model has unsynchronized geometry".into(),
            ));
        }
        if dim == Dim::Surface && self.model.surface_count() == 0 {
            return Err(MeshError::Generation("no surface to mesh".into()));
        }
        if self.fields.background().is_none() {
            debug!("no background field set; meshing with point sizes only");
        }
        self.generated = Some(dim);
        Ok(())
    }

    fn write(&mut self, path: &Path) -> Result<()> {
        let Some(dim) = self.generated else {
            return Err(MeshError::Generation(format!(
                "nothing generated before writing {}",
                path.display()
            )));
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| MeshError::io(parent, e))?;
        }

        let script = script_path(path);
        GeoWriter::new(&self.journal).write(&script)?;
        debug!("wrote geometry script {}", script.display());

        match &self.runner {
            Some(runner) => {
                runner.run(&script, path, dim)?;
                info!("Wrote mesh file: {}", path.display());
            }
            None => warn!(
                "no Gmsh executable configured; {} was not meshed (script: {})",
                path.display(),
                script.display()
            ),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.model.clear();
        self.fields.clear();
        self.journal.clear();
        self.generated = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Boundary, PlaneSurface, Rectangle};

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("cylmesh-session-{}", std::process::id()))
            .join(name)
    }

    fn square(session: &mut GmshSession) -> PlaneSurface {
        let rect = Rectangle::new(&mut *session, 0.0, 0.0, 1.0, 1.0, 0.1).unwrap();
        let boundaries: [&dyn Boundary; 1] = [&rect];
        PlaneSurface::new(&mut *session, &boundaries).unwrap()
    }

    #[test]
    fn test_generate_needs_synchronized_surface() {
        let mut session = GmshSession::default();
        assert!(matches!(
            session.generate(Dim::Surface),
            Err(MeshError::Generation(_))
        ));
        square(&mut session);
        assert!(session.generate(Dim::Surface).is_err());
        session.synchronize().unwrap();
        session.generate(Dim::Surface).unwrap();
        assert_eq!(session.generated_dim(), Some(Dim::Surface));
    }

    #[test]
    fn test_write_before_generate_fails() {
        let mut session = GmshSession::default();
        square(&mut session);
        session.synchronize().unwrap();
        assert!(session.write(&scratch("early.msh")).is_err());
        assert!(!scratch("early.geo").exists());
    }

    #[test]
    fn test_missing_executable_reports_generation_error() {
        let runner = GmshRunner::new(scratch("no-such-gmsh"), None);
        let mut session = GmshSession::with_runner(runner);
        square(&mut session);
        session.synchronize().unwrap();
        session.generate(Dim::Surface).unwrap();
        let out = scratch("missing/square.msh");
        assert!(matches!(session.write(&out), Err(MeshError::Generation(_))));
        assert!(out.with_extension("geo").exists());
    }

    #[test]
    fn test_reset_clears_model_and_journal() {
        let mut session = GmshSession::default();
        square(&mut session);
        session.synchronize().unwrap();
        session.generate(Dim::Surface).unwrap();
        session.reset();
        assert!(session.commands().is_empty());
        assert!(session.fields().is_empty());
        assert_eq!(session.model().surface_count(), 0);
        assert_eq!(session.generated_dim(), None);
        // tags restart after a reset
        let tag = session.add_point(Point3::origin(), 0.1).unwrap();
        assert_eq!(tag, Tag(1));
    }
}
