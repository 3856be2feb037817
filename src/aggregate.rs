use ndarray::Array1;

use crate::geometry::BeamAngle;
use crate::result::AngleScore;
use crate::settings::Weights;

/// One standardized metric column with its configured weight.
#[derive(Debug, Clone)]
pub struct ZColumn {
    pub name: String,
    pub weight: f64,
    /// Raw metric values, NaN where the angle's row is missing.
    pub raw: Vec<f64>,
    /// Z-scored values over the finite entries of the column.
    pub z: Vec<f64>,
}

/// The standardized score table: per-angle z columns and the weighted
/// composite. Lower composite is always better, since every metric is
/// oriented so that lower raw values are clinically favourable.
#[derive(Debug, Clone, Default)]
pub struct ZTable {
    pub angles: Vec<BeamAngle>,
    pub columns: Vec<ZColumn>,
    /// Σ weight_i × z_i per angle; NaN where any contributing column is
    /// missing for that angle.
    pub composite: Vec<f64>,
}

/// Standardizes a metric column to zero mean and unit standard deviation
/// over its finite entries (population SD, matching `scipy.stats.zscore`).
/// NaN entries stay NaN. A zero-variance column cannot discriminate between
/// angles and z-scores to 0 rather than NaN.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    let finite: Array1<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return values.to_vec();
    }

    let mean = finite.mean().unwrap_or(0.0);
    let std = finite.std(0.0);

    values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                v
            } else if std == 0.0 {
                0.0
            } else {
                (v - mean) / std
            }
        })
        .collect()
}

/// Builds the z-scored table from the raw per-angle rows.
///
/// The tumour column carries the mean ΔWEPL; one column is added per organ
/// that has a configured weight and at least one finite PIV value. Organs
/// whose masks were empty (PIV missing everywhere) never reach the
/// composite, and unweighted organs stay in the raw table only.
pub fn aggregate(scores: &[AngleScore], organ_names: &[String], weights: &Weights) -> ZTable {
    let angles: Vec<BeamAngle> = scores.iter().map(|s| s.angle).collect();
    let mut columns = Vec::new();

    let wepl_raw: Vec<f64> = scores
        .iter()
        .map(|s| s.wepl.map_or(f64::NAN, |w| w.mean))
        .collect();
    columns.push(ZColumn {
        name: "tumour".to_string(),
        weight: weights.tumour,
        z: zscore(&wepl_raw),
        raw: wepl_raw,
    });

    for (idx, name) in organ_names.iter().enumerate() {
        let Some(&weight) = weights.organs.get(name) else {
            continue;
        };
        let raw: Vec<f64> = scores
            .iter()
            .map(|s| s.piv[idx].unwrap_or(f64::NAN))
            .collect();
        if !raw.iter().any(|v| v.is_finite()) {
            continue;
        }
        columns.push(ZColumn {
            name: name.clone(),
            weight,
            z: zscore(&raw),
            raw,
        });
    }

    let composite = (0..angles.len())
        .map(|row| {
            columns
                .iter()
                .map(|col| col.weight * col.z[row])
                .sum::<f64>()
        })
        .collect();

    ZTable {
        angles,
        columns,
        composite,
    }
}
