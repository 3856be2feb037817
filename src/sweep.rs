//! Parallel beam-geometry sweep orchestration.
//!
//! This module manages the evaluation of every (couch, gantry) cell of the
//! configured angle grid against one immutable patient context, then
//! standardizes the resulting score table and runs the constrained triple
//! selection.
//!
//! The sweep provides:
//! - Parallel cell processing with rayon
//! - Progress tracking for long-running grids
//! - Deterministic row ordering independent of task completion order
//! - Cooperative cancellation between cells
//! - Z-score aggregation and combinatorial selection over the full table

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use itertools::iproduct;
use rayon::prelude::*;

use crate::{
    aggregate::aggregate,
    geometry::BeamAngle,
    problem::Problem,
    result::{AngleScore, Results},
    select::select_triple,
    settings::Settings,
    volume::PatientVolumes,
};

/// Multi-angle sweep over the couch×gantry grid.
///
/// **Context**: ranking beam geometries requires the same per-angle
/// evaluation repeated over hundreds of cells. Cells are pure functions of
/// the shared read-only grids, so they run in parallel; the aggregation and
/// selection phases need the complete table and stay sequential.
///
/// **How it Works**: generates the cell list in deterministic (couch, then
/// gantry) order, solves each cell with a `Problem`, collects rows in grid
/// order regardless of which worker finished first, then z-scores the table
/// and searches for the best separated triple.
#[derive(Debug)]
pub struct Sweep {
    pub volumes: PatientVolumes,
    pub settings: Settings, // runtime settings
    pub result: Results,
    cancel: Arc<AtomicBool>,
}

impl Sweep {
    pub fn new(volumes: PatientVolumes, settings: Settings) -> Self {
        let organ_names = volumes.organs.iter().map(|o| o.name.clone()).collect();
        Self {
            volumes,
            settings,
            result: Results::new_empty(organ_names),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for cooperative cancellation. Setting the flag stops the
    /// sweep between cells; cells already running finish their row.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// The cell list in deterministic couch-then-gantry order. The
    /// selector's tie-break is defined over this ordering, never over task
    /// completion order.
    pub fn angle_grid(&self) -> Vec<BeamAngle> {
        iproduct!(
            self.settings.couch.values(),
            self.settings.gantry.values()
        )
        .map(|(couch, gantry)| BeamAngle::new(couch, gantry))
        .collect()
    }

    /// Resets accumulated results for rerunning.
    pub fn reset(&mut self) {
        self.result = Results::new_empty(self.result.organ_names.clone());
        self.cancel.store(false, Ordering::Relaxed);
    }

    /// Executes the parallel sweep, then aggregates and selects.
    pub fn solve(&mut self) {
        let start = Instant::now();
        println!("Solving sweep...");

        let grid = self.angle_grid();
        let pb = ProgressBar::new(grid.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
            )
            .unwrap()
            .progress_chars("█▇▆▅▄▃▂▁"),
        );
        pb.set_message("angle".to_string());

        let cancel = Arc::clone(&self.cancel);
        let volumes = &self.volumes;
        let threshold = self.settings.distal_threshold;

        // Solve each cell; rows land in grid order because the parallel
        // iterator preserves indices on collect.
        self.result.scores = grid
            .par_iter()
            .map(|&angle| {
                let score = if cancel.load(Ordering::Relaxed) {
                    Self::skipped_row(angle, volumes.organs.len())
                } else {
                    Problem::new(volumes, angle, threshold).solve()
                };
                pb.inc(1);
                score
            })
            .collect();
        pb.finish_and_clear();

        if self.cancel.load(Ordering::Relaxed) {
            let skipped = self
                .result
                .scores
                .iter()
                .filter(|s| s.num_rays == 0 && s.wepl.is_none())
                .count();
            println!("Sweep cancelled; {} cells skipped", skipped);
        }

        let degenerate: usize = self.result.scores.iter().map(|s| s.degenerate_rays).sum();
        if degenerate > 0 {
            println!("Excluded {} degenerate rays from scoring", degenerate);
        }

        let table = aggregate(
            &self.result.scores,
            &self.result.organ_names,
            &self.settings.weights,
        );
        let selection = select_triple(
            &table,
            self.settings.min_separation,
            self.settings.quantile,
        );
        self.result.table = Some(table);
        self.result.selection = Some(selection);

        let duration = Instant::now().duration_since(start);
        println!(
            "Time taken: {:.2?}, Time per angle: {:.2?}",
            duration,
            duration / grid.len().max(1) as u32
        );

        println!("Results:");
        self.result.print();
    }

    /// Placeholder row for a cell skipped by cancellation: every metric is
    /// missing, so the row never becomes a selection candidate.
    fn skipped_row(angle: BeamAngle, num_organs: usize) -> AngleScore {
        AngleScore {
            angle,
            wepl: None,
            piv: vec![None; num_organs],
            num_rays: 0,
            degenerate_rays: 0,
        }
    }

    /// Writes all result tables to the configured output directory.
    pub fn writeup(&self) {
        let _ = crate::output::write_scores(&self.result, &self.settings.directory);
        let _ = crate::output::write_zscores(&self.result, &self.settings.directory);
        let _ = crate::output::write_selection(&self.result, &self.settings.directory);
    }
}
