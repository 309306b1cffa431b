use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};

use crate::config::{FailurePolicy, RunMeshConfig, Scenario};
use crate::engine::GeometryEngine;
use crate::error::{MeshError, Result};
use crate::layout::{MeshReport, mesh};

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub completed: Vec<MeshReport>,
    /// Scenario name and the error that stopped it.
    pub failed: Vec<(String, MeshError)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Meshes every scenario of a run configuration, one after the other, on a
/// single engine session.
pub struct MeshRunner {
    config: RunMeshConfig,
}

impl MeshRunner {
    pub fn new(config: RunMeshConfig) -> Self {
        Self { config }
    }

    pub fn get_config(&self) -> &RunMeshConfig {
        &self.config
    }

    pub fn run(&self, engine: &mut dyn GeometryEngine) -> Result<RunSummary> {
        // Reject bad scenarios before anything is meshed
        self.config.validate()?;
        info!("Meshing {} scenarios", self.config.scenarios.len());

        let progress = ProgressBar::new(self.config.scenarios.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut summary = RunSummary::default();
        for scenario in &self.config.scenarios {
            progress.set_message(scenario.name.clone());
            // Each scenario starts from an empty model
            match run_scenario(engine, scenario) {
                Ok(report) => summary.completed.push(report),
                Err(e) => {
                    error!("Scenario `{}` failed: {e}", scenario.name);
                    // Failure policy
                    if self.config.on_error == FailurePolicy::Abort {
                        progress.abandon();
                        return Err(e);
                    }
                    summary.failed.push((scenario.name.clone(), e));
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        info!(
            "Run finished: {} meshed, {} failed",
            summary.completed.len(),
            summary.failed.len()
        );
        Ok(summary)
    }
}

/// Meshes one scenario on a freshly reset engine model.
pub fn run_scenario(engine: &mut dyn GeometryEngine, scenario: &Scenario) -> Result<MeshReport> {
    engine.reset();
    info!(
        "Meshing `{}`: {} cylinders -> {}",
        scenario.name,
        scenario.positions.len(),
        scenario.path.display()
    );
    let report = mesh(engine, &scenario.positions, &scenario.params, &scenario.path)?;
    info!("Finished `{}`: {}", scenario.name, report.output.display());
    Ok(report)
}
