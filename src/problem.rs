use crate::distal::{locate_distal_edge, DistalEdge};
use crate::geometry::BeamAngle;
use crate::result::AngleScore;
use crate::score::{irradiated_volume, wepl_variation};
use crate::trace::{chord_distances, trace_rays, Traversal};
use crate::volume::PatientVolumes;

/// One angle cell of the sweep: a single beam geometry evaluated against the
/// shared immutable patient context.
///
/// A problem is a pure function of its inputs. Resolving the step vector,
/// locating the distal edge, tracing rays, estimating chord distances, and
/// scoring WEPL/PIV all happen here; the output is one `AngleScore` row.
/// Cells share no mutable state, which is what makes the sweep
/// embarrassingly parallel.
#[derive(Debug, Clone, Copy)]
pub struct Problem<'a> {
    pub volumes: &'a PatientVolumes,
    pub angle: BeamAngle,
    /// Hop budget for the distal-edge backward walk.
    pub distal_threshold: usize,
}

impl<'a> Problem<'a> {
    pub fn new(volumes: &'a PatientVolumes, angle: BeamAngle, distal_threshold: usize) -> Self {
        Self {
            volumes,
            angle,
            distal_threshold,
        }
    }

    /// Runs the full per-angle pipeline and returns the score row.
    pub fn solve(&self) -> AngleScore {
        let step = self.angle.step_vector();
        let edge = locate_distal_edge(&self.volumes.tumor, &step, self.distal_threshold);
        let traversal = trace_rays(self.volumes.shape(), &edge.points, &step);
        self.score(&edge, &traversal)
    }

    fn score(&self, edge: &DistalEdge, traversal: &Traversal) -> AngleScore {
        let chords = chord_distances(&traversal.paths, &self.volumes.spacing);

        let wepl = wepl_variation(
            &self.volumes.reference,
            &self.volumes.phases,
            &traversal.paths,
            &chords,
        );

        let piv = self
            .volumes
            .organs
            .iter()
            .map(|organ| irradiated_volume(organ, &traversal.union_mask))
            .collect();

        AngleScore {
            angle: self.angle,
            wepl,
            piv,
            num_rays: edge.num_points(),
            degenerate_rays: chords.degenerate,
        }
    }
}
