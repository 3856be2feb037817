use std::collections::BTreeSet;

use nalgebra::Vector3;

use crate::volume::{MaskGrid, Voxel};

/// The tumor boundary farthest from the beam source along the beam
/// direction, for one beam geometry.
#[derive(Debug, Clone)]
pub struct DistalEdge {
    /// Deduplicated distal-edge coordinates in sorted (z, y, x) order.
    pub points: Vec<Voxel>,
    /// Boolean grid marking the same coordinates.
    pub mask: MaskGrid,
}

impl DistalEdge {
    pub fn num_points(&self) -> usize {
        self.points.len()
    }
}

/// Locates the distal edge of `tumor` relative to the beam step direction.
///
/// From every tumor voxel, walks backward against the beam (position minus
/// step each hop, each axis rounded to the nearest index for the lookup)
/// until the walk leaves the grid, a background voxel is reached, or
/// `threshold` hops are spent. A voxel only yields a distal point if some
/// intermediate voxel on the walk was itself tumor and the hop budget was
/// not exhausted, so an isolated voxel with no tumor neighbour along the
/// walk never contributes one. Runs in O(tumorVoxels x threshold).
///
/// The recorded coordinate is the walk position truncated toward zero after
/// the loop exits, which sits one hop past the last tumor voxel actually
/// observed. Truncations that land outside the grid are discarded.
pub fn locate_distal_edge(tumor: &MaskGrid, step: &Vector3<f64>, threshold: usize) -> DistalEdge {
    let shape = tumor.shape();
    let bounds = [shape.0 as i64, shape.1 as i64, shape.2 as i64];

    // One ordered set keyed by coordinate replaces repeated list-to-set
    // round trips; it is materialized exactly once at the end.
    let mut points = BTreeSet::new();
    let mut mask = MaskGrid::zeros(shape);

    for (i, j, k) in tumor.iter_set() {
        let mut pos = [
            i as f64 - step[0],
            j as f64 - step[1],
            k as f64 - step[2],
        ];
        let mut count = 0;
        let mut is_distal_edge = false;

        while in_bounds_rounded(&pos, &bounds) && count < threshold {
            let rounded = (
                pos[0].round() as usize,
                pos[1].round() as usize,
                pos[2].round() as usize,
            );
            if !tumor.get(rounded) {
                break;
            }
            is_distal_edge = true;
            count += 1;
            pos[0] -= step[0];
            pos[1] -= step[1];
            pos[2] -= step[2];
        }

        if is_distal_edge && count < threshold {
            let truncated = [pos[0] as i64, pos[1] as i64, pos[2] as i64];
            if truncated
                .iter()
                .zip(bounds.iter())
                .all(|(&t, &b)| t >= 0 && t < b)
            {
                let voxel = (
                    truncated[0] as usize,
                    truncated[1] as usize,
                    truncated[2] as usize,
                );
                points.insert(voxel);
                mask.set(voxel);
            }
        }
    }

    DistalEdge {
        points: points.into_iter().collect(),
        mask,
    }
}

/// Lower bound is checked on the raw float position, upper bound on the
/// rounded index.
#[inline]
fn in_bounds_rounded(pos: &[f64; 3], bounds: &[i64; 3]) -> bool {
    pos.iter()
        .zip(bounds.iter())
        .all(|(&p, &b)| p >= 0.0 && (p.round() as i64) < b)
}
