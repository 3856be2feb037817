use ndarray::Array3;
use serde::Deserialize;

use crate::error::BeamselError;

/// Grid dimensions in (Z, Y, X) index order.
pub type GridShape = (usize, usize, usize);

/// Integer voxel coordinate in (Z, Y, X) index order.
pub type Voxel = (usize, usize, usize);

/// Physical size of one voxel in mm along each axis, (Z, Y, X).
/// Anisotropic in general; 4DCT slices are usually thicker than in-plane.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct VoxelSpacing {
    pub z: f64,
    pub y: f64,
    pub x: f64,
}

impl VoxelSpacing {
    pub fn new(z: f64, y: f64, x: f64) -> Self {
        Self { z, y, x }
    }

    /// Physical position of a voxel index in mm.
    pub fn physical(&self, voxel: Voxel) -> [f64; 3] {
        [
            voxel.0 as f64 * self.z,
            voxel.1 as f64 * self.y,
            voxel.2 as f64 * self.x,
        ]
    }
}

/// Boolean anatomy mask over a rectilinear voxel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskGrid {
    pub data: Array3<bool>,
}

impl MaskGrid {
    pub fn new(data: Array3<bool>) -> Self {
        Self { data }
    }

    pub fn zeros(shape: GridShape) -> Self {
        Self {
            data: Array3::from_elem(shape, false),
        }
    }

    pub fn shape(&self) -> GridShape {
        let d = self.data.dim();
        (d.0, d.1, d.2)
    }

    #[inline]
    pub fn get(&self, voxel: Voxel) -> bool {
        self.data[[voxel.0, voxel.1, voxel.2]]
    }

    #[inline]
    pub fn set(&mut self, voxel: Voxel) {
        self.data[[voxel.0, voxel.1, voxel.2]] = true;
    }

    /// Number of voxels inside the mask.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    /// Iterate the coordinates of all voxels inside the mask, in (z, y, x)
    /// index order.
    pub fn iter_set(&self) -> impl Iterator<Item = Voxel> + '_ {
        self.data
            .indexed_iter()
            .filter(|(_, &v)| v)
            .map(|((z, y, x), _)| (z, y, x))
    }
}

/// Continuous intensity grid, calibrated to relative stopping power by the
/// upstream preprocessing.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityGrid {
    pub data: Array3<f64>,
}

impl IntensityGrid {
    pub fn new(data: Array3<f64>) -> Self {
        Self { data }
    }

    pub fn shape(&self) -> GridShape {
        let d = self.data.dim();
        (d.0, d.1, d.2)
    }

    #[inline]
    pub fn get(&self, voxel: Voxel) -> f64 {
        self.data[[voxel.0, voxel.1, voxel.2]]
    }
}

/// A named organ-at-risk mask.
#[derive(Debug, Clone)]
pub struct Organ {
    pub name: String,
    pub mask: MaskGrid,
    /// Total voxel count, cached at construction. Zero means the PIV is
    /// undefined for this organ and every angle reports it as missing.
    pub total_voxels: usize,
}

impl Organ {
    pub fn new(name: impl Into<String>, mask: MaskGrid) -> Self {
        let total_voxels = mask.count();
        Self {
            name: name.into(),
            mask,
            total_voxels,
        }
    }
}

/// The immutable per-patient input context: tumor mask, organ masks,
/// reference intensity grid, and per-phase intensity grids, all sharing one
/// shape and spacing. Built once, validated once, and shared read-only by
/// every angle cell.
#[derive(Debug, Clone)]
pub struct PatientVolumes {
    pub tumor: MaskGrid,
    pub organs: Vec<Organ>,
    pub reference: IntensityGrid,
    pub phases: Vec<IntensityGrid>,
    pub spacing: VoxelSpacing,
}

impl PatientVolumes {
    /// Validates shape agreement across all grids and rejects an empty tumor
    /// mask. Empty organ masks are accepted but reported; their PIV stays
    /// missing for the whole run.
    pub fn new(
        tumor: MaskGrid,
        organs: Vec<Organ>,
        reference: IntensityGrid,
        phases: Vec<IntensityGrid>,
        spacing: VoxelSpacing,
    ) -> Result<Self, BeamselError> {
        let shape = tumor.shape();

        if reference.shape() != shape {
            return Err(BeamselError::InvalidGeometry {
                name: "reference".to_string(),
                expected: shape,
                found: reference.shape(),
            });
        }
        for (i, phase) in phases.iter().enumerate() {
            if phase.shape() != shape {
                return Err(BeamselError::InvalidGeometry {
                    name: format!("phase {}", i),
                    expected: shape,
                    found: phase.shape(),
                });
            }
        }
        for organ in &organs {
            if organ.mask.shape() != shape {
                return Err(BeamselError::InvalidGeometry {
                    name: organ.name.clone(),
                    expected: shape,
                    found: organ.mask.shape(),
                });
            }
        }

        if tumor.is_empty() {
            return Err(BeamselError::EmptyTumorMask);
        }

        for organ in &organs {
            if organ.total_voxels == 0 {
                eprintln!(
                    "Warning: organ mask '{}' is empty, its PIV will be reported as missing",
                    organ.name
                );
            }
        }

        Ok(Self {
            tumor,
            organs,
            reference,
            phases,
            spacing,
        })
    }

    pub fn shape(&self) -> GridShape {
        self.tumor.shape()
    }
}
