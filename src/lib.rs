pub mod catalogue;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod geometry;
pub mod layout;
pub mod model;
pub mod output;
pub mod runner;
pub mod session;

pub use config::{EngineSettings, FailurePolicy, Params, RunMeshConfig, Scenario};
pub use engine::{Dim, FieldId, GeometryEngine, Tag};
pub use error::{MeshError, Result};
pub use field::FieldSpec;
pub use geometry::{Circle, CurveLoop, Line, PlaneSurface, Point, Rectangle};
pub use layout::{LayoutPlan, MeshReport, mesh, plan};
pub use output::{GeoWriter, GmshRunner};
pub use runner::{MeshRunner, RunSummary};
pub use session::GmshSession;

pub type Float = f64;

/// Planar coordinate of a cylinder center.
pub type Position = nalgebra::Point2<Float>;
