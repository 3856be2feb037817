use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Canonical beam entry direction in (Z, Y, X) index order: the beam enters
/// from anterior, so it points along negative Y before any rotation.
pub const BASE_DIRECTION: Vector3<f64> = Vector3::new(0.0, -1.0, 0.0);

/// One beam geometry: a couch/gantry angle pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamAngle {
    pub couch: f64,
    pub gantry: f64,
}

impl BeamAngle {
    pub fn new(couch: f64, gantry: f64) -> Self {
        Self { couch, gantry }
    }

    /// The composite rotation for this geometry: the gantry rotation about
    /// the patient's long axis followed by the couch rotation about the
    /// vertical axis, in (Z, Y, X) row order.
    pub fn rotation(&self) -> Matrix3<f64> {
        let (sin_g, cos_g) = self.gantry.to_radians().sin_cos();
        let (sin_c, cos_c) = self.couch.to_radians().sin_cos();

        // Gantry rotates the (Y, Z) components, couch the (X, Z) components.
        let gantry = Matrix3::new(
            1.0, 0.0, 0.0, //
            0.0, cos_g, sin_g, //
            0.0, -sin_g, cos_g,
        );
        let couch = Matrix3::new(
            cos_c, 0.0, -sin_c, //
            0.0, 1.0, 0.0, //
            sin_c, 0.0, cos_c,
        );

        couch * gantry
    }

    /// The ray-marching step for this geometry: the base direction under the
    /// composite rotation. The result is a direction in index space with the
    /// (Z, Y, X) axis order of the grids; voxel spacing is applied later by
    /// the chord distance estimator, never here.
    pub fn step_vector(&self) -> Vector3<f64> {
        self.rotation() * BASE_DIRECTION
    }
}

/// Spherical separation between two beam geometries in whole degrees.
///
/// Gantry + 90 degrees and couch act as a polar/azimuth pair on the unit
/// sphere; the separation follows from the spherical law of cosines and is
/// rounded to the nearest degree. Symmetric in its arguments and zero for
/// identical geometries.
pub fn central_angle(a: &BeamAngle, b: &BeamAngle) -> f64 {
    let g1 = (a.gantry + 90.0).to_radians();
    let g2 = (b.gantry + 90.0).to_radians();
    let c1 = a.couch.to_radians();
    let c2 = b.couch.to_radians();

    let cos_sep = g1.sin() * g2.sin() + g1.cos() * g2.cos() * (c1 - c2).abs().cos();
    // Rounding error can push the argument just outside [-1, 1].
    cos_sep.clamp(-1.0, 1.0).acos().to_degrees().round()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn zero_angles_give_base_direction() {
        let step = BeamAngle::new(0.0, 0.0).step_vector();
        assert_eq!(step, BASE_DIRECTION);
    }

    #[test]
    fn composite_rotation_is_orthonormal() {
        let identity = Matrix3::identity();
        for couch in (-90..=90).step_by(15) {
            for gantry in (0..360).step_by(10) {
                let angle = BeamAngle::new(couch as f64, gantry as f64);
                let r = angle.rotation();
                let residual = (r * r.transpose() - identity).norm();
                assert!(
                    residual < TOL,
                    "R*R^T residual {} at couch {} gantry {}",
                    residual,
                    couch,
                    gantry
                );
                assert!((angle.step_vector().norm() - 1.0).abs() < TOL);
            }
        }
    }

    #[test]
    fn gantry_quarter_turn_points_along_x() {
        // Components are in (Z, Y, X) index order.
        let step = BeamAngle::new(0.0, 90.0).step_vector();
        assert!(step[0].abs() < TOL);
        assert!(step[1].abs() < TOL);
        assert!((step[2] - 1.0).abs() < TOL);
    }

    #[test]
    fn central_angle_of_identical_pairs_is_zero() {
        for couch in (-90..=90).step_by(30) {
            for gantry in (0..360).step_by(45) {
                let a = BeamAngle::new(couch as f64, gantry as f64);
                assert_eq!(central_angle(&a, &a), 0.0);
            }
        }
    }

    #[test]
    fn central_angle_is_symmetric() {
        let a = BeamAngle::new(-45.0, 120.0);
        let b = BeamAngle::new(30.0, 270.0);
        assert_eq!(central_angle(&a, &b), central_angle(&b, &a));
    }

    #[test]
    fn opposed_gantry_angles_are_antipodal() {
        let a = BeamAngle::new(0.0, 0.0);
        let b = BeamAngle::new(0.0, 180.0);
        assert_eq!(central_angle(&a, &b), 180.0);
    }
}
