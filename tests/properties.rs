//! Property-based checks of the primitives, the transforms and the layout.

use std::f64::consts::{PI, TAU};

use cylmesh::field::{add_refinement_zone_rect, min_of};
use cylmesh::geometry::{Boundary, Transform, segment_count};
use cylmesh::{Circle, Float, GeometryEngine, GmshSession, Params, Position, Rectangle, plan};
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;

fn corners(session: &GmshSession, rect: &Rectangle) -> Vec<Point3<Float>> {
    rect.points
        .iter()
        .map(|p| session.point_position(p.tag).unwrap())
        .collect()
}

fn circle_points(session: &GmshSession) -> Vec<Point3<Float>> {
    session
        .model()
        .points()
        .map(|(_, point)| point.position)
        .collect()
}

fn arb_axis() -> impl Strategy<Value = Vector3<Float>> {
    (-1.0..1.0f64, -1.0..1.0f64, -1.0..1.0f64)
        .prop_map(|(x, y, z)| Vector3::new(x, y, z))
        .prop_filter("axis must be non-zero", |axis| axis.norm() > 1e-3)
}

fn arb_rectangle() -> impl Strategy<Value = (Float, Float, Float, Float)> {
    (-10.0..10.0f64, -10.0..10.0f64, 0.01..5.0f64, 0.01..5.0f64)
}

proptest! {
    #[test]
    fn segment_count_is_floor_of_n_pi(n in 1usize..2000) {
        let count = segment_count(n);
        prop_assert_eq!(count, (n as Float * PI).floor() as usize);
        prop_assert!(count >= 3 * n);
        prop_assert!(count < 4 * n);
    }

    #[test]
    fn circle_arcs_form_one_loop(
        n in 1usize..40,
        xc in -1.0..1.0f64,
        yc in -1.0..1.0f64,
        d in 0.001..1.0f64,
    ) {
        let mut session = GmshSession::default();
        let circle = Circle::new(&mut session, xc, yc, d, n).unwrap();
        prop_assert_eq!(circle.arcs.len(), segment_count(n));
        prop_assert!(session.add_curve_loop(&circle.arcs).is_ok());
    }

    #[test]
    fn translation_round_trip(
        (xc, yc, dx, dy) in arb_rectangle(),
        vx in -50.0..50.0f64,
        vy in -50.0..50.0f64,
    ) {
        let mut session = GmshSession::default();
        let mut rect = Rectangle::new(&mut session, xc, yc, dx, dy, 0.1).unwrap();
        let before = corners(&session, &rect);
        let v = Vector3::new(vx, vy, 0.0);
        rect.translate(&mut session, v).unwrap();
        rect.translate(&mut session, -v).unwrap();
        for (a, b) in before.iter().zip(corners(&session, &rect)) {
            prop_assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn full_turn_restores_rectangle(
        (xc, yc, dx, dy) in arb_rectangle(),
        ox in -5.0..5.0f64,
        oy in -5.0..5.0f64,
    ) {
        let mut session = GmshSession::default();
        let mut rect = Rectangle::new(&mut session, xc, yc, dx, dy, 0.1).unwrap();
        let before = corners(&session, &rect);
        rect.rotate(&mut session, TAU, Point3::new(ox, oy, 0.0), Vector3::z()).unwrap();
        for (a, b) in before.iter().zip(corners(&session, &rect)) {
            prop_assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn circle_round_trips_stay_rigid_and_closed(
        n in 1usize..20,
        xc in -1.0..1.0f64,
        yc in -1.0..1.0f64,
        vx in -50.0..50.0f64,
        vy in -50.0..50.0f64,
        ox in -5.0..5.0f64,
        oy in -5.0..5.0f64,
        axis in arb_axis(),
    ) {
        let mut session = GmshSession::default();
        let mut circle = Circle::new(&mut session, xc, yc, 0.1, n).unwrap();
        let before = circle_points(&session);
        let center = circle.center;

        let v = Vector3::new(vx, vy, 0.0);
        circle.translate(&mut session, v).unwrap();
        for (a, b) in before.iter().zip(circle_points(&session)) {
            prop_assert!((b - (a + v)).norm() < 1e-9);
        }
        circle.translate(&mut session, -v).unwrap();
        circle.rotate(&mut session, TAU, Point3::new(ox, oy, 0.0), axis).unwrap();

        for (a, b) in before.iter().zip(circle_points(&session)) {
            prop_assert!((a - b).norm() < 1e-9);
        }
        prop_assert!((circle.center - center).norm() < 1e-9);
        prop_assert!(circle.close_loop(&mut session).is_ok());
    }

    #[test]
    fn min_field_is_pointwise_min(
        zones in prop::collection::vec((-0.5..0.5f64, -0.5..0.5f64, 0.001..0.1f64), 1..6),
        x in -1.0..1.0f64,
        y in -1.0..1.0f64,
    ) {
        let mut session = GmshSession::default();
        let ids: Vec<_> = zones
            .iter()
            .map(|&(cx, cy, size)| {
                add_refinement_zone_rect(&mut session, Position::new(cx, cy), 0.2, 0.1, size, 0.5)
                    .unwrap()
            })
            .collect();
        let combined = min_of(&mut session, &ids).unwrap();

        let expected = ids
            .iter()
            .map(|&id| session.evaluate_field(id, x, y).unwrap())
            .fold(Float::INFINITY, Float::min);
        prop_assert_eq!(session.evaluate_field(combined, x, y).unwrap(), expected);
    }

    #[test]
    fn domain_spans_upstream_to_downstream(
        d in 0.001..1.0f64,
        px in -5.0..5.0f64,
        py in -5.0..5.0f64,
    ) {
        let params = Params::from_diameter(d);
        let layout = plan(&[Position::origin(), Position::new(px, py)], &params).unwrap();
        let tol = 1e-9 * (1.0 + d);
        prop_assert!((layout.domain.x_min() + params.length_upstream).abs() < tol);
        prop_assert!((layout.domain.x_max() - params.length_downstream).abs() < tol);
        let zone = &layout.cylinders[1].refinement;
        prop_assert!((zone.x_min() - (px - params.length_refinement)).abs() < tol * 10.0);
        prop_assert!((zone.center.y - py).abs() < tol);
    }
}
