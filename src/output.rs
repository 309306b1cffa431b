//! Gmsh `.geo` script output and the Gmsh process runner.
//!
//! The session journals every engine call as a [`Command`]; replaying the
//! journal as a script with the OpenCASCADE factory rebuilds the same model
//! inside Gmsh, which then meshes it and writes the mesh file.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command as Process;

use log::debug;
use nalgebra::{Point3, Vector3};

use crate::Float;
use crate::engine::{Dim, FieldId, Tag};
use crate::error::{MeshError, Result};
use crate::field::FieldSpec;

/// One statement of the generated script.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Point {
        tag: Tag,
        position: Point3<Float>,
        mesh_size: Float,
    },
    Line {
        tag: Tag,
        start: Tag,
        end: Tag,
    },
    CircleArc {
        tag: Tag,
        center: Point3<Float>,
        radius: Float,
        angle1: Float,
        angle2: Float,
    },
    CurveLoop {
        tag: Tag,
        curves: Vec<Tag>,
    },
    PlaneSurface {
        tag: Tag,
        loops: Vec<Tag>,
    },
    Translate {
        entities: Vec<(Dim, Tag)>,
        vector: Vector3<Float>,
    },
    Rotate {
        entities: Vec<(Dim, Tag)>,
        origin: Point3<Float>,
        axis: Vector3<Float>,
        angle: Float,
    },
    Coherence,
    PhysicalGroup {
        dim: Dim,
        tag: Tag,
        name: String,
        entities: Vec<Tag>,
    },
    Field {
        id: FieldId,
        spec: FieldSpec,
    },
    BackgroundField(FieldId),
}

fn list<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn entity_keyword(dim: Dim) -> &'static str {
    match dim {
        Dim::Point => "Point",
        Dim::Curve => "Curve",
        Dim::Surface => "Surface",
    }
}

fn entity_block(entities: &[(Dim, Tag)]) -> String {
    entities
        .iter()
        .map(|(dim, tag)| format!("{}{{{}}};", entity_keyword(*dim), tag))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Where the script for a mesh written to `output` is stored.
pub fn script_path(output: &Path) -> PathBuf {
    if output.extension().is_some_and(|ext| ext == "geo") {
        output.with_extension("src.geo")
    } else {
        output.with_extension("geo")
    }
}

pub struct GeoWriter<'a> {
    commands: &'a [Command],
}

impl<'a> GeoWriter<'a> {
    pub fn new(commands: &'a [Command]) -> Self {
        Self { commands }
    }

    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn write(&self, filename: &Path) -> Result<()> {
        let file = File::create(filename).map_err(|e| MeshError::io(filename, e))?;
        let mut out = BufWriter::new(file);
        self.write_to(&mut out)
            .and_then(|_| out.flush())
            .map_err(|e| MeshError::io(filename, e))
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "// cylinder channel geometry")?;
        writeln!(out, "SetFactory(\"OpenCASCADE\");")?;

        for command in self.commands {
            match command {
                Command::Point {
                    tag,
                    position,
                    mesh_size,
                } => writeln!(
                    out,
                    "Point({tag}) = {{{}, {}, {}, {mesh_size}}};",
                    position.x, position.y, position.z
                )?,
                Command::Line { tag, start, end } => {
                    writeln!(out, "Line({tag}) = {{{start}, {end}}};")?
                }
                Command::CircleArc {
                    tag,
                    center,
                    radius,
                    angle1,
                    angle2,
                } => writeln!(
                    out,
                    "Circle({tag}) = {{{}, {}, {}, {radius}, {angle1}, {angle2}}};",
                    center.x, center.y, center.z
                )?,
                Command::CurveLoop { tag, curves } => {
                    writeln!(out, "Curve Loop({tag}) = {{{}}};", list(curves))?
                }
                Command::PlaneSurface { tag, loops } => {
                    writeln!(out, "Plane Surface({tag}) = {{{}}};", list(loops))?
                }
                Command::Translate { entities, vector } => writeln!(
                    out,
                    "Translate {{{}, {}, {}}} {{ {} }}",
                    vector.x,
                    vector.y,
                    vector.z,
                    entity_block(entities)
                )?,
                Command::Rotate {
                    entities,
                    origin,
                    axis,
                    angle,
                } => writeln!(
                    out,
                    "Rotate {{{{{}, {}, {}}}, {{{}, {}, {}}}, {angle}}} {{ {} }}",
                    axis.x,
                    axis.y,
                    axis.z,
                    origin.x,
                    origin.y,
                    origin.z,
                    entity_block(entities)
                )?,
                Command::Coherence => writeln!(out, "Coherence;")?,
                Command::PhysicalGroup {
                    dim,
                    tag,
                    name,
                    entities,
                } => writeln!(
                    out,
                    "Physical {}(\"{name}\", {tag}) = {{{}}};",
                    entity_keyword(*dim),
                    list(entities)
                )?,
                Command::Field { id, spec } => write_field(out, *id, spec)?,
                Command::BackgroundField(id) => writeln!(out, "Background Field = {id};")?,
            }
        }
        Ok(())
    }
}

fn write_field<W: Write>(out: &mut W, id: FieldId, spec: &FieldSpec) -> std::io::Result<()> {
    writeln!(out, "Field[{id}] = {};", spec.kind())?;
    let number =
        |out: &mut W, name: &str, value: Float| writeln!(out, "Field[{id}].{name} = {value};");
    match spec {
        FieldSpec::Box(b) => {
            number(out, "VIn", b.v_in)?;
            number(out, "VOut", b.v_out)?;
            number(out, "XMin", b.x_min)?;
            number(out, "XMax", b.x_max)?;
            number(out, "YMin", b.y_min)?;
            number(out, "YMax", b.y_max)?;
            number(out, "Thickness", b.thickness)?;
        }
        FieldSpec::Cylinder(c) => {
            number(out, "Radius", c.radius)?;
            number(out, "VIn", c.v_in)?;
            number(out, "VOut", c.v_out)?;
            number(out, "XCenter", c.center.x)?;
            number(out, "YCenter", c.center.y)?;
            number(out, "XAxis", c.axis.x)?;
            number(out, "YAxis", c.axis.y)?;
            number(out, "ZAxis", c.axis.z)?;
        }
        FieldSpec::Distance { points } => {
            writeln!(out, "Field[{id}].PointsList = {{{}}};", list(points))?;
        }
        FieldSpec::Threshold(t) => {
            writeln!(out, "Field[{id}].InField = {};", t.in_field)?;
            number(out, "DistMin", t.dist_min)?;
            number(out, "DistMax", t.dist_max)?;
            number(out, "SizeMin", t.size_min)?;
            number(out, "SizeMax", t.size_max)?;
            number(out, "StopAtDistMax", if t.stop_at_dist_max { 1.0 } else { 0.0 })?;
        }
        FieldSpec::MathEval(expr) => {
            writeln!(out, "Field[{id}].F = \"{expr}\";")?;
        }
        FieldSpec::Min(ids) | FieldSpec::Max(ids) => {
            writeln!(out, "Field[{id}].FieldsList = {{{}}};", list(ids))?;
        }
    }
    Ok(())
}

/// Runs the Gmsh executable on a generated script.
#[derive(Debug, Clone, PartialEq)]
pub struct GmshRunner {
    executable: PathBuf,
    format: Option<String>,
}

impl GmshRunner {
    pub fn new(executable: impl Into<PathBuf>, format: Option<String>) -> Self {
        Self {
            executable: executable.into(),
            format,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn arguments(&self, script: &Path, output: &Path, dim: Dim) -> Vec<String> {
        let mut args = vec![
            script.display().to_string(),
            format!("-{}", dim.as_int()),
            "-o".to_string(),
            output.display().to_string(),
        ];
        if let Some(format) = &self.format {
            args.push("-format".to_string());
            args.push(format.clone());
        }
        args
    }

    pub fn run(&self, script: &Path, output: &Path, dim: Dim) -> Result<()> {
        let args = self.arguments(script, output, dim);
        debug!("running {} {}", self.executable.display(), args.join(" "));
        let result = Process::new(&self.executable)
            .args(&args)
            .output()
            .map_err(|e| {
                MeshError::Generation(format!(
                    "cannot start {}: {e}",
                    self.executable.display()
                ))
            })?;
        debug!("{}", String::from_utf8_lossy(&result.stdout));
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MeshError::Generation(format!(
                "{} exited with {}: {}",
                self.executable.display(),
                result.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::BoxField;

    #[test]
    fn test_render_statements() {
        let commands = vec![
            Command::Point {
                tag: Tag(1),
                position: Point3::new(0.5, -0.25, 0.0),
                mesh_size: 0.02,
            },
            Command::Line {
                tag: Tag(3),
                start: Tag(1),
                end: Tag(2),
            },
            Command::CurveLoop {
                tag: Tag(1),
                curves: vec![Tag(1), Tag(2), Tag(3)],
            },
            Command::Translate {
                entities: vec![(Dim::Curve, Tag(1)), (Dim::Point, Tag(4))],
                vector: Vector3::new(1.0, 0.0, 0.0),
            },
            Command::Coherence,
            Command::PhysicalGroup {
                dim: Dim::Curve,
                tag: Tag(2),
                name: "outlet".into(),
                entities: vec![Tag(2)],
            },
            Command::BackgroundField(FieldId(4)),
        ];
        let script = GeoWriter::new(&commands).render();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[1], "SetFactory(\"OpenCASCADE\");");
        assert_eq!(lines[2], "Point(1) = {0.5, -0.25, 0, 0.02};");
        assert_eq!(lines[3], "Line(3) = {1, 2};");
        assert_eq!(lines[4], "Curve Loop(1) = {1, 2, 3};");
        assert_eq!(lines[5], "Translate {1, 0, 0} { Curve{1}; Point{4}; }");
        assert_eq!(lines[6], "Coherence;");
        assert_eq!(lines[7], "Physical Curve(\"outlet\", 2) = {2};");
        assert_eq!(lines[8], "Background Field = 4;");
    }

    #[test]
    fn test_render_box_field() {
        let commands = vec![Command::Field {
            id: FieldId(1),
            spec: FieldSpec::Box(BoxField {
                v_in: 0.1,
                v_out: 1.0,
                x_min: -1.0,
                x_max: 1.0,
                y_min: -0.5,
                y_max: 0.5,
                thickness: 0.3,
            }),
        }];
        let script = GeoWriter::new(&commands).render();
        assert!(script.contains("Field[1] = Box;\n"));
        assert!(script.contains("Field[1].VIn = 0.1;\n"));
        assert!(script.contains("Field[1].XMin = -1;\n"));
        assert!(script.contains("Field[1].Thickness = 0.3;\n"));
    }

    #[test]
    fn test_runner_arguments() {
        let runner = GmshRunner::new("/opt/gmsh/bin/gmsh", Some("msh22".into()));
        let args = runner.arguments(Path::new("out/a.geo"), Path::new("out/a.msh"), Dim::Surface);
        assert_eq!(args, ["out/a.geo", "-2", "-o", "out/a.msh", "-format", "msh22"]);
    }

    #[test]
    fn test_script_path() {
        assert_eq!(script_path(Path::new("meshes/a.msh")), PathBuf::from("meshes/a.geo"));
        assert_eq!(script_path(Path::new("meshes/a.geo")), PathBuf::from("meshes/a.src.geo"));
    }
}
