use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use ndarray::Array3;
use serde::Deserialize;

use crate::error::BeamselError;
use crate::volume::{GridShape, IntensityGrid, MaskGrid, Organ, PatientVolumes, VoxelSpacing};

/// JSON manifest naming the patient grids. All paths are resolved relative
/// to the manifest file. Masks are one `u8` per voxel (nonzero inside);
/// intensity grids are little-endian `f32`, both in (Z, Y, X) C order as the
/// preprocessing emits them.
#[derive(Debug, Deserialize)]
struct Manifest {
    shape: [usize; 3],
    spacing: [f64; 3],
    tumor: String,
    reference: String,
    #[serde(default)]
    phases: Vec<String>,
    #[serde(default)]
    organs: Vec<OrganEntry>,
}

#[derive(Debug, Deserialize)]
struct OrganEntry {
    name: String,
    path: String,
}

/// Loads and validates the full patient context from a manifest file.
pub fn load_volumes(manifest_path: &Path) -> Result<PatientVolumes> {
    let file = File::open(manifest_path)
        .with_context(|| format!("failed to open manifest {:?}", manifest_path))?;
    let manifest: Manifest =
        serde_json::from_reader(BufReader::new(file)).context("failed to parse manifest")?;

    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let shape = (manifest.shape[0], manifest.shape[1], manifest.shape[2]);
    let spacing = VoxelSpacing::new(
        manifest.spacing[0],
        manifest.spacing[1],
        manifest.spacing[2],
    );

    let tumor = read_mask(&resolve(base, &manifest.tumor), shape)?;
    let reference = read_intensity(&resolve(base, &manifest.reference), shape)?;

    let mut phases = Vec::with_capacity(manifest.phases.len());
    for path in &manifest.phases {
        phases.push(read_intensity(&resolve(base, path), shape)?);
    }

    let mut organs = Vec::with_capacity(manifest.organs.len());
    for entry in &manifest.organs {
        let mask = read_mask(&resolve(base, &entry.path), shape)?;
        organs.push(Organ::new(entry.name.clone(), mask));
    }

    let volumes = PatientVolumes::new(tumor, organs, reference, phases, spacing)?;
    println!(
        "Loaded volumes: shape {:?}, {} organs, {} phases",
        volumes.shape(),
        volumes.organs.len(),
        volumes.phases.len()
    );
    Ok(volumes)
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn read_mask(path: &Path, shape: GridShape) -> Result<MaskGrid> {
    let n = shape.0 * shape.1 * shape.2;
    let mut bytes = Vec::with_capacity(n);
    File::open(path)
        .with_context(|| format!("failed to open mask {:?}", path))?
        .read_to_end(&mut bytes)?;
    if bytes.len() != n {
        return Err(BeamselError::VolumeLoad(format!(
            "mask {:?} holds {} voxels, expected {}",
            path,
            bytes.len(),
            n
        ))
        .into());
    }

    let data = Array3::from_shape_vec(shape, bytes.into_iter().map(|b| b != 0).collect())?;
    Ok(MaskGrid::new(data))
}

fn read_intensity(path: &Path, shape: GridShape) -> Result<IntensityGrid> {
    let n = shape.0 * shape.1 * shape.2;
    let mut reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open intensity grid {:?}", path))?,
    );
    let mut values = vec![0.0f32; n];
    reader
        .read_f32_into::<LittleEndian>(&mut values)
        .map_err(|e| {
            BeamselError::VolumeLoad(format!("intensity grid {:?} truncated: {}", path, e))
        })?;
    // Reject trailing data too; a wrong-shape file must not load silently.
    let mut rest = [0u8; 1];
    if reader.read(&mut rest)? != 0 {
        return Err(BeamselError::VolumeLoad(format!(
            "intensity grid {:?} holds more than {} voxels",
            path, n
        ))
        .into());
    }

    let data = Array3::from_shape_vec(shape, values.into_iter().map(f64::from).collect())?;
    Ok(IntensityGrid::new(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    fn write_mask(dir: &Path, name: &str, voxels: &[u8]) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(voxels).unwrap();
    }

    fn write_intensity(dir: &Path, name: &str, values: &[f32]) {
        let mut f = File::create(dir.join(name)).unwrap();
        for &v in values {
            f.write_f32::<LittleEndian>(v).unwrap();
        }
    }

    #[test]
    fn round_trips_a_tiny_phantom() {
        let dir = tempfile::tempdir().unwrap();
        let n = 2 * 2 * 2;

        let mut tumor = vec![0u8; n];
        tumor[0] = 1;
        tumor[1] = 1;
        write_mask(dir.path(), "tumor.raw", &tumor);
        write_mask(dir.path(), "heart.raw", &vec![1u8; n]);
        write_intensity(dir.path(), "ref.raw", &vec![1.0; n]);
        write_intensity(dir.path(), "phase0.raw", &vec![1.5; n]);

        let manifest = r#"{
            "shape": [2, 2, 2],
            "spacing": [3.0, 1.0527, 1.0527],
            "tumor": "tumor.raw",
            "reference": "ref.raw",
            "phases": ["phase0.raw"],
            "organs": [{"name": "heart", "path": "heart.raw"}]
        }"#;
        let manifest_path = dir.path().join("manifest.json");
        std::fs::write(&manifest_path, manifest).unwrap();

        let volumes = load_volumes(&manifest_path).unwrap();
        assert_eq!(volumes.shape(), (2, 2, 2));
        assert_eq!(volumes.tumor.count(), 2);
        assert_eq!(volumes.organs.len(), 1);
        assert_eq!(volumes.organs[0].total_voxels, n);
        assert_eq!(volumes.phases.len(), 1);
        assert_eq!(volumes.reference.get((0, 0, 0)), 1.0);
        assert_eq!(volumes.phases[0].get((1, 1, 1)), 1.5);
    }

    #[test]
    fn wrong_size_mask_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_mask(dir.path(), "tumor.raw", &[1u8; 7]);
        write_intensity(dir.path(), "ref.raw", &vec![1.0; 8]);

        let manifest = r#"{
            "shape": [2, 2, 2],
            "spacing": [1.0, 1.0, 1.0],
            "tumor": "tumor.raw",
            "reference": "ref.raw"
        }"#;
        let manifest_path = dir.path().join("manifest.json");
        std::fs::write(&manifest_path, manifest).unwrap();

        assert!(load_volumes(&manifest_path).is_err());
    }
}
