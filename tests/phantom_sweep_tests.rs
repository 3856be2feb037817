use std::collections::BTreeMap;

use beamsel::{
    geometry::central_angle,
    result::Selection,
    settings::{self, AngleRange, Weights},
    sweep::Sweep,
    volume::{IntensityGrid, MaskGrid, Organ, PatientVolumes, VoxelSpacing},
};
use ndarray::Array3;

// Tolerance for comparing aggregated statistics
const TOL: f64 = 1e-9;

/// A synthetic thorax-like phantom: a solid tumor block in the middle, a
/// cord column posterior of it, a heart block on one side, and breathing
/// phases that shift the intensity everywhere by a constant.
fn phantom() -> PatientVolumes {
    let shape = (24, 24, 24);

    let mut tumor = MaskGrid::zeros(shape);
    for z in 10..14 {
        for y in 10..14 {
            for x in 10..14 {
                tumor.set((z, y, x));
            }
        }
    }

    let mut cord = MaskGrid::zeros(shape);
    for z in 0..24 {
        cord.set((z, 20, 12));
    }

    let mut heart = MaskGrid::zeros(shape);
    for z in 8..16 {
        for y in 8..16 {
            for x in 2..6 {
                heart.set((z, y, x));
            }
        }
    }

    let reference = IntensityGrid::new(Array3::from_elem(shape, 1.0));
    let phases = vec![
        IntensityGrid::new(Array3::from_elem(shape, 0.95)),
        IntensityGrid::new(Array3::from_elem(shape, 1.0)),
        IntensityGrid::new(Array3::from_elem(shape, 1.08)),
    ];

    PatientVolumes::new(
        tumor,
        vec![Organ::new("cord", cord), Organ::new("heart", heart)],
        reference,
        phases,
        VoxelSpacing::new(3.0, 1.0527, 1.0527),
    )
    .unwrap()
}

fn phantom_settings() -> settings::Settings {
    let mut settings = settings::load_default_config().unwrap();
    // Reduce the grid for faster testing
    settings.couch = AngleRange::new(-30.0, 30.0, 30.0);
    settings.gantry = AngleRange::new(0.0, 270.0, 90.0);
    settings.quantile = 1.0;
    settings.weights = Weights {
        tumour: 2.0,
        organs: BTreeMap::from([("cord".to_string(), 0.5), ("heart".to_string(), 1.0)]),
    };
    settings
}

#[test]
fn phantom_sweep_scores_every_cell() {
    let mut sweep = Sweep::new(phantom(), phantom_settings());
    sweep.solve();

    let grid = sweep.angle_grid();
    assert_eq!(grid.len(), 12);
    assert_eq!(sweep.result.scores.len(), 12);

    for (row, angle) in sweep.result.scores.iter().zip(grid.iter()) {
        assert_eq!(row.angle, *angle);
        // A solid 4x4x4 tumor always has distal structure.
        assert!(row.num_rays > 0, "no rays at {:?}", angle);
        let wepl = row.wepl.expect("missing WEPL metrics");
        assert!(wepl.min <= wepl.mean && wepl.mean <= wepl.max);
        assert!(wepl.min >= 0.0);
        for piv in row.piv.iter().flatten() {
            assert!((0.0..=100.0).contains(piv));
        }
    }
}

#[test]
fn uniform_phase_shift_gives_identical_wepl_ranking_inputs() {
    // With spatially uniform intensities the per-ray WEPL difference is
    // (shift x pathlen x meanChord), so the per-phase summaries scale with
    // the phase shift: 0.05, 0.0 and 0.08 of the reference sum.
    let mut sweep = Sweep::new(phantom(), phantom_settings());
    sweep.solve();

    for row in &sweep.result.scores {
        let wepl = row.wepl.unwrap();
        assert!(wepl.min.abs() < TOL, "phase 1 matches the reference");
        assert!((wepl.max / wepl.mean - 0.08 / (0.13 / 3.0)).abs() < 1e-6);
    }
}

#[test]
fn z_columns_standardize_across_the_grid() {
    let mut sweep = Sweep::new(phantom(), phantom_settings());
    sweep.solve();

    let table = sweep.result.table.as_ref().unwrap();
    assert!(!table.columns.is_empty());

    for column in &table.columns {
        let finite: Vec<f64> = column.z.iter().copied().filter(|z| z.is_finite()).collect();
        assert!(!finite.is_empty());
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        let sd = (finite.iter().map(|z| (z - mean) * (z - mean)).sum::<f64>()
            / finite.len() as f64)
            .sqrt();
        assert!(mean.abs() < TOL, "column {} mean {}", column.name, mean);
        // A constant column z-scores to all zeros, otherwise unit SD.
        assert!(
            (sd - 1.0).abs() < TOL || sd.abs() < TOL,
            "column {} sd {}",
            column.name,
            sd
        );
    }
}

#[test]
fn selected_triple_is_mutually_separated_and_minimal() {
    let mut sweep = Sweep::new(phantom(), phantom_settings());
    sweep.solve();

    let table = sweep.result.table.as_ref().unwrap();
    let Some(Selection::Found(triple)) = &sweep.result.selection else {
        panic!("expected a qualifying triple");
    };

    for i in 0..3 {
        for j in (i + 1)..3 {
            assert!(
                central_angle(&triple.angles[i], &triple.angles[j]) >= 20.0,
                "separation violated between {:?} and {:?}",
                triple.angles[i],
                triple.angles[j]
            );
        }
    }

    // Exhaustive check over the full table: no qualifying triple scores
    // lower than the selected one.
    let rows: Vec<_> = table
        .angles
        .iter()
        .zip(table.composite.iter())
        .filter(|(_, c)| c.is_finite())
        .collect();
    for i in 0..rows.len() {
        for j in (i + 1)..rows.len() {
            for k in (j + 1)..rows.len() {
                let (a, za) = rows[i];
                let (b, zb) = rows[j];
                let (c, zc) = rows[k];
                if central_angle(a, b) >= 20.0
                    && central_angle(a, c) >= 20.0
                    && central_angle(b, c) >= 20.0
                {
                    assert!(triple.total_score <= za + zb + zc + TOL);
                }
            }
        }
    }
}

#[test]
fn writeup_produces_all_output_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = phantom_settings();
    settings.directory = dir.path().to_str().unwrap().to_string();

    let mut sweep = Sweep::new(phantom(), settings);
    sweep.solve();
    sweep.writeup();

    for name in ["angle_scores", "z_scores", "selection.json"] {
        assert!(dir.path().join(name).exists(), "missing output {}", name);
    }

    let scores = std::fs::read_to_string(dir.path().join("angle_scores")).unwrap();
    // Header plus one row per cell plus the timestamp line.
    assert_eq!(scores.lines().count(), 2 + 12);
    assert!(scores.contains("piv_cord"));
    assert!(scores.contains("piv_heart"));
}
