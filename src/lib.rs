//! Beam-geometry ray-tracing and scoring engine for radiotherapy angle
//! selection.
//!
//! Evaluates every (couch, gantry) cell of a configurable angle grid against
//! a patient's voxel volumes: rays are traced from the tumor's distal edge
//! through the grid, scored for respiratory water-equivalent-path-length
//! (WEPL) variation and per-organ percentage irradiated volume (PIV),
//! standardized to z-scores, and combined into one composite score per
//! angle. A constrained combinatorial search then picks the angle triple
//! with the lowest summed composite whose pairwise central-angle
//! separations meet a configured minimum.

pub mod aggregate;
pub mod distal;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod output;
pub mod problem;
pub mod result;
pub mod score;
pub mod select;
pub mod settings;
pub mod sweep;
pub mod trace;
pub mod volume;
