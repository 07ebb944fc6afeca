//! Uniform-sphere halos: the tabulated radius and area pipeline against the
//! closed-form inverse.

use absorber_counts::{Derivative, LineQuery, ProfileLookup};
use approx::assert_relative_eq;
use halo_math::{integrate, QuadratureConfig};
use ndarray::{arr0, array, Array1};
use std::f64::consts::PI;
use test_helpers::{init_logging, toy_model, uniform_sphere_params, uniform_sphere_radius};

const Z: f64 = 1.0;
const MASS: f64 = 1e12;

fn central_tau(model: &absorber_counts::AbsorberModel) -> f64 {
    model
        .tau_gaussian(
            &arr0(0.0),
            MASS,
            Z,
            &uniform_sphere_params(),
            &LineQuery::line_centre().lookup(ProfileLookup::Direct),
        )
        .unwrap()
        .into_scalar()
}

#[test]
fn test_chord_optical_depth() {
    init_logging();
    let model = toy_model();
    let params = uniform_sphere_params();
    let tau0 = central_tau(&model);
    let rv = model.halo(MASS, Z).unwrap().virial_radius;

    let b = array![0.3 * rv, 0.6 * rv, 0.9 * rv];
    let tau = model
        .tau_gaussian(
            &b,
            MASS,
            Z,
            &params,
            &LineQuery::line_centre().lookup(ProfileLookup::Direct),
        )
        .unwrap();
    for (t, b) in tau.iter().zip(b.iter()) {
        let expected = tau0 * (1.0 - (b / rv).powi(2)).sqrt();
        assert_relative_eq!(*t, expected, max_relative = 1e-6);
    }
}

#[test]
fn test_area_matches_closed_form() {
    init_logging();
    let model = toy_model();
    let params = uniform_sphere_params();
    let tau0 = central_tau(&model);
    let grid = model.settings().grids.tau;
    assert!(
        tau0 > 10.0 * grid.min() && tau0 < grid.max() / 10.0,
        "central tau {tau0:e} too close to the grid edges"
    );
    let rv = model.halo(MASS, Z).unwrap().virial_radius;

    let tau: Array1<f64> = [0.3, 0.4, 0.5, 0.6].iter().map(|x| x * tau0).collect();
    let sigma = model.sigma_tau(&tau, MASS, Z, &params).unwrap();
    for (s, t) in sigma.iter().zip(tau.iter()) {
        let r = uniform_sphere_radius(*t, tau0, rv);
        assert_relative_eq!(*s, PI * r * r, max_relative = 5e-2);
    }

    // Deeper than the centre: no sightline qualifies
    let beyond = model
        .sigma_tau(&array![1.5 * tau0], MASS, Z, &params)
        .unwrap();
    assert!(beyond[0] < 1e-3 * PI * rv * rv);
}

#[test]
fn test_slope_integrates_to_area_difference() {
    init_logging();
    let model = toy_model();
    let params = uniform_sphere_params();
    let tau0 = central_tau(&model);
    let (lo, hi) = (0.3 * tau0, 0.8 * tau0);

    let config = QuadratureConfig {
        rel_tolerance: 1e-9,
        ..QuadratureConfig::default()
    };
    let integral = integrate(
        |tau: f64| {
            model
                .dsigma_dtau(&arr0(tau), MASS, Z, &params)
                .map(|d| d.into_scalar())
        },
        lo,
        hi,
        &config,
    )
    .unwrap();
    let sigma = model.sigma_tau(&array![lo, hi], MASS, Z, &params).unwrap();
    assert!(integral < 0.0);
    assert_relative_eq!(integral, sigma[1] - sigma[0], max_relative = 1e-5);
}

#[test]
fn test_radius_zero_past_virial_edge() {
    init_logging();
    let model = toy_model();
    let params = uniform_sphere_params();
    let rv = model.halo(MASS, Z).unwrap().virial_radius;

    let b = array![rv, 2.0 * rv];
    for lookup in [ProfileLookup::Surface, ProfileLookup::Direct] {
        let tau = model
            .tau_gaussian(&b, MASS, Z, &params, &LineQuery::line_centre().lookup(lookup))
            .unwrap();
        assert_eq!(tau, array![0.0, 0.0]);
    }

    // Radius never exceeds the virial radius
    let r = model
        .r_tau(&array![1e-5, 1e-4], MASS, Z, &params, Derivative::Value)
        .unwrap();
    assert!(r.iter().all(|&r| r <= rv * (1.0 + 1e-12)));
}
