use thiserror::Error;

/// Error kinds surfaced by the angle-selection pipeline.
///
/// Structural errors (`InvalidGeometry`, `EmptyTumorMask`) abort the run
/// before any angle is processed. Everything else is isolated to the angle or
/// organ it concerns and recorded as missing data in the results table.
#[derive(Debug, Error)]
pub enum BeamselError {
    /// Input grids disagree on shape; no angle work is possible.
    #[error("grid shape mismatch: {name} has shape {found:?}, expected {expected:?}")]
    InvalidGeometry {
        name: String,
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },

    /// The tumor mask contains no voxels, so no distal points or rays exist.
    #[error("tumor mask is empty")]
    EmptyTumorMask,

    /// An organ mask contains no voxels; its PIV is undefined for all angles.
    #[error("organ mask '{0}' is empty")]
    EmptyOrganMask(String),

    /// A ray path of length 1 has zero traversal and no chord distance.
    #[error("degenerate ray of length 1 at distal point {0:?}")]
    DegenerateRay((usize, usize, usize)),

    /// No angle triple satisfies the pairwise separation constraint.
    #[error("no angle triple satisfies the {0} degree separation constraint")]
    NoQualifyingTriple(f64),

    #[error("failed to load volume data: {0}")]
    VolumeLoad(String),
}
