use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result, ensure_finite, ensure_positive};
use crate::{Float, Position};

/// Environment variable naming the Gmsh executable when the run
/// configuration does not.
pub const GMSH_ENV: &str = "GMSH";

/// Geometry and resolution of one channel-with-cylinders mesh. Fields
/// missing from a config fall back to [`Params::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Params {
    pub diameter: Float,
    /// Circle resolution: the circle gets `floor(n_points_cyl * pi)` arcs.
    pub n_points_cyl: usize,
    pub height: Float,
    pub length_upstream: Float,
    pub length_downstream: Float,
    pub global_mesh_size: Float,
    pub length_refinement: Float,
    pub length_refinement_downstream: Float,
    pub refined_mesh_size: Float,
}

impl Default for Params {
    fn default() -> Self {
        Self::from_diameter(0.01)
    }
}

impl Params {
    /// Standard channel proportions for a cylinder of diameter `d`.
    pub fn from_diameter(d: Float) -> Self {
        Self {
            diameter: d,
            n_points_cyl: 50,
            height: 52.0 * d,
            length_upstream: 10.0 * d,
            length_downstream: 46.0 * d,
            global_mesh_size: 2.0 * d,
            length_refinement: d,
            length_refinement_downstream: 4.0 * d,
            refined_mesh_size: d / 12.0,
        }
    }

    pub fn with_n_points_cyl(mut self, n_points_cyl: usize) -> Self {
        self.n_points_cyl = n_points_cyl;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("diameter", self.diameter)?;
        ensure_positive("height", self.height)?;
        ensure_positive("length_upstream", self.length_upstream)?;
        ensure_positive("length_downstream", self.length_downstream)?;
        ensure_positive("global_mesh_size", self.global_mesh_size)?;
        ensure_positive("length_refinement", self.length_refinement)?;
        ensure_positive("length_refinement_downstream", self.length_refinement_downstream)?;
        ensure_positive("refined_mesh_size", self.refined_mesh_size)?;
        if self.n_points_cyl == 0 {
            return Err(MeshError::invalid("n_points_cyl", "must be at least 1"));
        }
        Ok(())
    }
}

/// A named cylinder arrangement and where its mesh goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Cylinder centers; keep the first at the origin and all of them within
    /// about 20 diameters of it.
    pub positions: Vec<Position>,
    pub path: PathBuf,
    #[serde(default)]
    pub params: Params,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        positions: Vec<Position>,
        path: impl Into<PathBuf>,
        params: Params,
    ) -> Self {
        Self {
            name: name.into(),
            positions,
            path: path.into(),
            params,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.positions.is_empty() {
            return Err(MeshError::invalid(
                "positions",
                format!("scenario `{}` has no cylinders", self.name),
            ));
        }
        for position in &self.positions {
            ensure_finite("positions", position.x)?;
            ensure_finite("positions", position.y)?;
        }
        self.params.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Gmsh binary; when absent the `GMSH` environment variable is used, and
    /// without either only the `.geo` scripts are written.
    #[serde(default)]
    pub gmsh_executable: Option<PathBuf>,
    /// Value passed to Gmsh's `-format` option, e.g. `msh22`.
    #[serde(default)]
    pub format: Option<String>,
}

impl EngineSettings {
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        self.gmsh_executable
            .clone()
            .or_else(|| std::env::var_os(GMSH_ENV).map(PathBuf::from))
    }
}

/// What the runner does when a scenario fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run at the first failing scenario.
    #[default]
    Abort,
    /// Log the failure and carry on with the next scenario.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeshConfig {
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub on_error: FailurePolicy,
}

impl RunMeshConfig {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self {
            scenarios,
            engine: EngineSettings::default(),
            on_error: FailurePolicy::default(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MeshError::io(path, e))?;
        Self::from_json(&content)
            .map_err(|e| MeshError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| MeshError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.scenarios.is_empty() {
            return Err(MeshError::Config("no scenarios to run".into()));
        }
        let mut paths = HashSet::new();
        for scenario in &self.scenarios {
            scenario.validate()?;
            if !paths.insert(&scenario.path) {
                warn!(
                    "scenario `{}` writes to {}, which an earlier scenario also uses",
                    scenario.name,
                    scenario.path.display()
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_params_follow_diameter() {
        let params = Params::default();
        assert_relative_eq!(params.diameter, 0.01);
        assert_relative_eq!(params.height, 0.52);
        assert_relative_eq!(params.length_upstream, 0.1);
        assert_relative_eq!(params.length_downstream, 0.46);
        assert_relative_eq!(params.global_mesh_size, 0.02);
        assert_relative_eq!(params.refined_mesh_size, 0.01 / 12.0);
        assert_eq!(params.n_points_cyl, 50);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        let mut params = Params::default();
        params.refined_mesh_size = 0.0;
        assert!(matches!(
            params.validate(),
            Err(MeshError::InvalidParameter { name: "refined_mesh_size", .. })
        ));
        let params = Params::default().with_n_points_cyl(0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_parse_run_config_with_defaults() {
        let json = r#"{
            "scenarios": [
                { "name": "pair", "positions": [[0.0, 0.0], [0.03, 0.0]], "path": "meshes/pair.msh" }
            ],
            "on_error": "continue"
        }"#;
        let config = RunMeshConfig::from_json(json).unwrap();
        assert_eq!(config.on_error, FailurePolicy::Continue);
        assert_eq!(config.engine, EngineSettings::default());
        let scenario = &config.scenarios[0];
        assert_eq!(scenario.params, Params::default());
        assert_relative_eq!(scenario.positions[1].x, 0.03);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_params_override() {
        let json = r#"{
            "scenarios": [{
                "name": "cyl_res_20", "positions": [[0.0, 0.0]], "path": "cyl_res_20.msh",
                "params": { "n_points_cyl": 20 }
            }]
        }"#;
        let config = RunMeshConfig::from_json(json).unwrap();
        assert_eq!(
            config.scenarios[0].params,
            Params::default().with_n_points_cyl(20)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_rejects_unknown_param() {
        let json = r#"{
            "scenarios": [{
                "name": "x", "positions": [[0, 0]], "path": "x.msh",
                "params": { "diameter": 0.01, "bogus": 1 }
            }]
        }"#;
        assert!(matches!(
            RunMeshConfig::from_json(json),
            Err(MeshError::Config(_))
        ));
    }

    #[test]
    fn test_empty_positions_rejected() {
        let config = RunMeshConfig::new(vec![Scenario::new(
            "empty",
            Vec::new(),
            "empty.msh",
            Params::default(),
        )]);
        assert!(matches!(
            config.validate(),
            Err(MeshError::InvalidParameter { name: "positions", .. })
        ));
    }
}
