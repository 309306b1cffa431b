use anyhow::{Context, Result, bail};
use cylmesh::{GmshSession, MeshRunner, RunMeshConfig, catalogue};
use log::info;
use std::env;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config = match args.len() {
        1 => {
            info!("No run configuration given, meshing the built-in catalogue");
            catalogue::default_run_config()
        }
        2 => {
            info!("Loading run configuration from: {}", args[1]);
            RunMeshConfig::from_file(&args[1])
                .with_context(|| format!("failed to load run configuration {}", args[1]))?
        }
        _ => {
            eprintln!("Usage: {} [run_config.json]", args[0]);
            eprintln!("  run_config.json - JSON file listing the scenarios to mesh");
            eprintln!("  Without it the built-in cylinder arrangements are meshed.");
            eprintln!("  Set GMSH to the Gmsh executable to produce .msh files.");
            std::process::exit(1);
        }
    };
    config.validate().context("invalid run configuration")?;

    let mut session = GmshSession::new(&config.engine);
    let runner = MeshRunner::new(config);
    let summary = runner.run(&mut session)?;

    for report in &summary.completed {
        info!(
            "  {} ({} cylinders, {} boundary tags)",
            report.output.display(),
            report.cylinders,
            report.boundary_tags.len()
        );
    }
    if !summary.is_success() {
        let names: Vec<&str> = summary.failed.iter().map(|(name, _)| name.as_str()).collect();
        bail!("{} scenarios failed: {}", names.len(), names.join(", "));
    }

    info!("Meshing completed successfully!");
    Ok(())
}
