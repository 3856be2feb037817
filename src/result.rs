use serde::Serialize;

use crate::aggregate::ZTable;
use crate::geometry::BeamAngle;
use crate::score::WeplMetrics;

/// One row of the results table: everything measured for a single beam
/// geometry. Missing metrics stay `None` and print as `nan`; a failed angle
/// never aborts the sweep.
#[derive(Debug, Clone)]
pub struct AngleScore {
    pub angle: BeamAngle,
    /// Respiratory ΔWEPL spread, `None` when the angle produced no usable
    /// rays.
    pub wepl: Option<WeplMetrics>,
    /// Percentage irradiated volume per organ, aligned with the context's
    /// organ list. `None` marks an empty organ mask.
    pub piv: Vec<Option<f64>>,
    pub num_rays: usize,
    pub degenerate_rays: usize,
}

/// The winning angle triple and its summed composite score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedTriple {
    pub angles: [BeamAngle; 3],
    pub total_score: f64,
}

/// Outcome of the combinatorial selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Selection {
    Found(SelectedTriple),
    /// No triple in the candidate set satisfied the pairwise separation
    /// constraint.
    NoneFound { min_separation: f64 },
}

/// Aggregated output of a full sweep: the raw score table, the z-scored
/// table with composite scores, and the selected triple.
#[derive(Debug, Clone, Default)]
pub struct Results {
    pub organ_names: Vec<String>,
    pub scores: Vec<AngleScore>,
    pub table: Option<ZTable>,
    pub selection: Option<Selection>,
}

impl Results {
    pub fn new_empty(organ_names: Vec<String>) -> Self {
        Self {
            organ_names,
            scores: Vec::new(),
            table: None,
            selection: None,
        }
    }

    /// Prints a short human-readable summary.
    pub fn print(&self) {
        println!("Angles evaluated: {}", self.scores.len());
        match &self.selection {
            Some(Selection::Found(triple)) => {
                println!(
                    "Optimal angle combination (couch, gantry): {:?}, {:?}, {:?}",
                    (triple.angles[0].couch, triple.angles[0].gantry),
                    (triple.angles[1].couch, triple.angles[1].gantry),
                    (triple.angles[2].couch, triple.angles[2].gantry),
                );
                println!("Minimum summed z-score: {:.4}", triple.total_score);
            }
            Some(Selection::NoneFound { min_separation }) => {
                println!(
                    "No angle triple satisfies the {} degree separation constraint",
                    min_separation
                );
            }
            None => println!("No selection computed"),
        }
    }
}
