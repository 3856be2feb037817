use ndarray::Array1;
use ndarray_stats::QuantileExt;

use crate::trace::{ChordDistances, RayPath};
use crate::volume::{IntensityGrid, MaskGrid, Organ};

/// Spread of the mean absolute per-phase WEPL difference for one angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeplMetrics {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

/// WEPL of each non-degenerate ray through `grid`: the sum of calibrated
/// intensities along the path, scaled by the angle's mean chord distance.
/// Returns one value per included ray, in path order.
pub fn beam_wepl(
    grid: &IntensityGrid,
    paths: &[RayPath],
    chords: &ChordDistances,
    mean_chord: f64,
) -> Vec<f64> {
    paths
        .iter()
        .zip(chords.per_ray.iter())
        .filter(|(_, chord)| chord.is_some())
        .map(|(path, _)| {
            let line_sum: f64 = path.coords.iter().map(|&v| grid.get(v)).sum();
            line_sum * mean_chord
        })
        .collect()
}

/// Respiratory WEPL variation for one angle.
///
/// Computes the reference WEPL once, then for each breathing phase the mean
/// absolute per-ray difference against the reference; the angle's metrics
/// are the mean/max/min of those per-phase summaries. `None` when there are
/// no usable rays or no phases, so the angle's row reads as missing instead
/// of aborting the sweep.
pub fn wepl_variation(
    reference: &IntensityGrid,
    phases: &[IntensityGrid],
    paths: &[RayPath],
    chords: &ChordDistances,
) -> Option<WeplMetrics> {
    let mean_chord = chords.mean()?;
    if phases.is_empty() {
        return None;
    }

    let ref_wepl = beam_wepl(reference, paths, chords, mean_chord);
    if ref_wepl.is_empty() {
        return None;
    }

    let summaries: Array1<f64> = phases
        .iter()
        .map(|phase| {
            let eval_wepl = beam_wepl(phase, paths, chords, mean_chord);
            ref_wepl
                .iter()
                .zip(eval_wepl.iter())
                .map(|(r, e)| (r - e).abs())
                .sum::<f64>()
                / ref_wepl.len() as f64
        })
        .collect();

    Some(WeplMetrics {
        mean: summaries.mean()?,
        max: *summaries.max().ok()?,
        min: *summaries.min().ok()?,
    })
}

/// Percentage irradiated volume of one organ: the share of its voxels
/// struck by any traced ray, in [0, 100]. Zero when no ray touches the
/// organ, `None` when the organ mask itself is empty and the fraction is
/// undefined.
pub fn irradiated_volume(organ: &Organ, union_mask: &MaskGrid) -> Option<f64> {
    if organ.total_voxels == 0 {
        return None;
    }

    let struck = organ
        .mask
        .iter_set()
        .filter(|&v| union_mask.get(v))
        .count();

    Some(struck as f64 / organ.total_voxels as f64 * 100.0)
}
