use std::collections::HashSet;

use nalgebra::Vector3;

use crate::volume::{GridShape, MaskGrid, Voxel, VoxelSpacing};

/// Ordered voxel coordinates visited by one ray, from its distal point to
/// the last in-bounds position. Each coordinate appears once, at its first
/// visit.
#[derive(Debug, Clone)]
pub struct RayPath {
    pub origin: Voxel,
    pub coords: Vec<Voxel>,
}

impl RayPath {
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

/// The per-angle ray bundle: one path per distal point plus the union of all
/// voxels any ray passed through.
#[derive(Debug, Clone)]
pub struct Traversal {
    pub paths: Vec<RayPath>,
    pub union_mask: MaskGrid,
}

/// Projects a ray forward from every distal point along the step direction.
///
/// The float position advances by the step each iteration and each axis is
/// rounded to the nearest index independently for the lookup. This can
/// produce traversal that is not 8-connected in 3D; that is the intended
/// stepping, and the WEPL/PIV values downstream depend on it, so no
/// line-drawing substitute is used here. Repeat visits to a cell are
/// dropped from the path but still written to the union mask.
pub fn trace_rays(shape: GridShape, distal_points: &[Voxel], step: &Vector3<f64>) -> Traversal {
    let bounds = [shape.0 as i64, shape.1 as i64, shape.2 as i64];
    let mut union_mask = MaskGrid::zeros(shape);
    let mut paths = Vec::with_capacity(distal_points.len());

    for &origin in distal_points {
        let mut pos = [origin.0 as f64, origin.1 as f64, origin.2 as f64];
        let mut coords = Vec::new();
        let mut seen = HashSet::new();

        loop {
            let rounded = [pos[0].round() as i64, pos[1].round() as i64, pos[2].round() as i64];
            if rounded
                .iter()
                .zip(bounds.iter())
                .any(|(&r, &b)| r < 0 || r >= b)
            {
                break;
            }
            let current = (rounded[0] as usize, rounded[1] as usize, rounded[2] as usize);
            if seen.insert(current) {
                coords.push(current);
            }
            union_mask.set(current);

            pos[0] += step[0];
            pos[1] += step[1];
            pos[2] += step[2];
        }

        paths.push(RayPath { origin, coords });
    }

    Traversal { paths, union_mask }
}

/// Per-ray average physical step lengths, aligned with the path list.
#[derive(Debug, Clone)]
pub struct ChordDistances {
    /// mm per voxel step for each ray; `None` marks a degenerate ray of
    /// length 1, which is excluded from all aggregation.
    pub per_ray: Vec<Option<f64>>,
    pub degenerate: usize,
}

impl ChordDistances {
    /// Mean chord distance over the non-degenerate rays, or `None` when
    /// every ray was degenerate or there were no rays at all.
    pub fn mean(&self) -> Option<f64> {
        let valid: Vec<f64> = self.per_ray.iter().flatten().copied().collect();
        if valid.is_empty() {
            None
        } else {
            Some(valid.iter().sum::<f64>() / valid.len() as f64)
        }
    }
}

/// Estimates the physical distance covered per voxel step of each ray.
///
/// The chord runs from the first to the last coordinate of the path in
/// physical space (index elementwise times spacing), divided by the number
/// of steps. A path of length 1 would divide by zero; it is flagged instead.
pub fn chord_distances(paths: &[RayPath], spacing: &VoxelSpacing) -> ChordDistances {
    let mut per_ray = Vec::with_capacity(paths.len());
    let mut degenerate = 0;

    for path in paths {
        if path.len() < 2 {
            degenerate += 1;
            per_ray.push(None);
            continue;
        }
        let first = spacing.physical(path.coords[0]);
        let last = spacing.physical(path.coords[path.len() - 1]);
        let chord = first
            .iter()
            .zip(last.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        per_ray.push(Some(chord / (path.len() - 1) as f64));
    }

    ChordDistances { per_ray, degenerate }
}
