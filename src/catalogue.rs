//! Built-in cylinder arrangements and the circle-resolution sweep.

use crate::config::{Params, RunMeshConfig, Scenario};
use crate::{Float, Position};

/// `n_points_cyl` values of the resolution sweep.
pub const RESOLUTION_SWEEP: [usize; 8] = [5, 10, 20, 30, 50, 75, 100, 150];

/// One cylinder at the origin.
pub fn line_1(params: &Params) -> Scenario {
    Scenario::new(
        "line_1",
        vec![Position::origin()],
        "meshes/cyl_line_1.msh",
        params.clone(),
    )
}

/// Six cylinders in a row, 2.5 diameters apart.
pub fn line_6(params: &Params) -> Scenario {
    let spacing = 2.5 * params.diameter;
    let positions = (0..6)
        .map(|i| Position::new(i as Float * spacing, 0.0))
        .collect();
    Scenario::new("line_6", positions, "meshes/cyl_line_6.msh", params.clone())
}

/// Nine cylinders alternating above and below the axis, fanning out.
pub fn v_setup_b(params: &Params) -> Scenario {
    let step = 2.0 * params.diameter;
    let positions = (0..9)
        .map(|i| {
            let side = if i % 2 == 0 { 1.0 } else { -1.0 };
            Position::new(i as Float * step, side * i as Float * step)
        })
        .collect();
    Scenario::new(
        "v_setup_b",
        positions,
        "meshes/cyl_v_setup_b.msh",
        params.clone(),
    )
}

/// Symmetric V: the leading cylinder followed by four pairs.
pub fn v_setup_d(params: &Params) -> Scenario {
    let step = 2.0 * params.diameter;
    let mut positions = vec![Position::origin()];
    for i in 1..5 {
        let offset = i as Float * step;
        positions.push(Position::new(offset, offset));
        positions.push(Position::new(offset, -offset));
    }
    Scenario::new(
        "v_setup_d",
        positions,
        "meshes/cyl_v_setup_d.msh",
        params.clone(),
    )
}

pub fn default_catalogue() -> Vec<Scenario> {
    let params = Params::default();
    vec![
        line_1(&params),
        line_6(&params),
        v_setup_b(&params),
        v_setup_d(&params),
    ]
}

/// Single cylinder meshed once per circle resolution.
pub fn resolution_sweep(n_points: &[usize]) -> Vec<Scenario> {
    n_points
        .iter()
        .map(|&n| {
            Scenario::new(
                format!("cyl_res_{n}"),
                vec![Position::origin()],
                format!("meshes/cyl_res_{n}.msh"),
                Params::default().with_n_points_cyl(n),
            )
        })
        .collect()
}

pub fn default_run_config() -> RunMeshConfig {
    RunMeshConfig::new(default_catalogue())
}

pub fn sweep_run_config() -> RunMeshConfig {
    RunMeshConfig::new(resolution_sweep(&RESOLUTION_SWEEP))
}
