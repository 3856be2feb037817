use crate::aggregate::ZTable;
use crate::error::BeamselError;
use crate::geometry::{central_angle, BeamAngle};
use crate::result::{SelectedTriple, Selection};

/// One scored candidate in the selection arena.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    angle: BeamAngle,
    composite: f64,
}

/// Searches the aggregated table for the angle triple with the lowest
/// summed composite score whose pairwise central-angle separations all meet
/// `min_separation` degrees.
///
/// Candidates are the finite-composite rows, ordered by composite ascending
/// with couch then gantry as tie-break, optionally cut down to the lowest
/// `quantile` fraction to bound the cubic search. Enumeration runs over
/// index combinations of that fixed ordering, pruning a pair as soon as its
/// separation fails, so the first minimum found is deterministic regardless
/// of how the sweep's parallel tasks completed.
pub fn select_triple(table: &ZTable, min_separation: f64, quantile: f64) -> Selection {
    let mut candidates: Vec<Candidate> = table
        .angles
        .iter()
        .zip(table.composite.iter())
        .filter(|(_, c)| c.is_finite())
        .map(|(&angle, &composite)| Candidate { angle, composite })
        .collect();

    candidates.sort_by(|a, b| {
        a.composite
            .partial_cmp(&b.composite)
            .unwrap()
            .then(a.angle.couch.partial_cmp(&b.angle.couch).unwrap())
            .then(a.angle.gantry.partial_cmp(&b.angle.gantry).unwrap())
    });

    let keep = ((candidates.len() as f64) * quantile) as usize;
    candidates.truncate(keep);

    let mut best: Option<SelectedTriple> = None;

    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            if central_angle(&candidates[i].angle, &candidates[j].angle) < min_separation {
                continue;
            }
            for k in (j + 1)..candidates.len() {
                if central_angle(&candidates[i].angle, &candidates[k].angle) < min_separation
                    || central_angle(&candidates[j].angle, &candidates[k].angle) < min_separation
                {
                    continue;
                }
                let total = candidates[i].composite + candidates[j].composite + candidates[k].composite;
                if best.as_ref().map_or(true, |b| total < b.total_score) {
                    best = Some(SelectedTriple {
                        angles: [
                            candidates[i].angle,
                            candidates[j].angle,
                            candidates[k].angle,
                        ],
                        total_score: total,
                    });
                }
            }
        }
    }

    match best {
        Some(triple) => Selection::Found(triple),
        None => Selection::NoneFound { min_separation },
    }
}

/// Convenience wrapper that turns the none-found state into a typed error
/// for callers that require a triple.
pub fn require_triple(
    table: &ZTable,
    min_separation: f64,
    quantile: f64,
) -> Result<SelectedTriple, BeamselError> {
    match select_triple(table, min_separation, quantile) {
        Selection::Found(triple) => Ok(triple),
        Selection::NoneFound { min_separation } => {
            Err(BeamselError::NoQualifyingTriple(min_separation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(f64, f64, f64)]) -> ZTable {
        ZTable {
            angles: rows.iter().map(|&(c, g, _)| BeamAngle::new(c, g)).collect(),
            columns: vec![],
            composite: rows.iter().map(|&(_, _, z)| z).collect(),
        }
    }

    #[test]
    fn returns_known_minimum_separated_triple() {
        // Three well-separated low scores plus two cheap but crowded rows.
        let table = table(&[
            (0.0, 0.0, -3.0),
            (0.0, 2.0, -2.9), // too close to the first
            (0.0, 90.0, -1.0),
            (0.0, 180.0, -0.5),
            (45.0, 270.0, 0.2),
        ]);

        let selection = select_triple(&table, 20.0, 1.0);
        let Selection::Found(triple) = selection else {
            panic!("expected a triple");
        };
        assert_eq!(triple.angles[0], BeamAngle::new(0.0, 0.0));
        assert_eq!(triple.angles[1], BeamAngle::new(0.0, 90.0));
        assert_eq!(triple.angles[2], BeamAngle::new(0.0, 180.0));
        assert!((triple.total_score - (-4.5)).abs() < 1e-12);
    }

    #[test]
    fn reports_none_when_all_candidates_are_crowded() {
        let table = table(&[(0.0, 0.0, -1.0), (0.0, 5.0, -0.9), (0.0, 10.0, -0.8)]);
        let selection = select_triple(&table, 20.0, 1.0);
        assert_eq!(
            selection,
            Selection::NoneFound {
                min_separation: 20.0
            }
        );
        assert!(require_triple(&table, 20.0, 1.0).is_err());
    }

    #[test]
    fn nan_composites_are_not_candidates() {
        let table = table(&[
            (0.0, 0.0, f64::NAN),
            (0.0, 90.0, -1.0),
            (0.0, 180.0, -0.5),
            (45.0, 270.0, 0.2),
        ]);

        let Selection::Found(triple) = select_triple(&table, 20.0, 1.0) else {
            panic!("expected a triple");
        };
        assert!(triple
            .angles
            .iter()
            .all(|a| *a != BeamAngle::new(0.0, 0.0)));
    }

    #[test]
    fn quantile_filter_bounds_the_candidate_set() {
        // Six cheap but crowded rows plus two expensive well-separated
        // ones. The 50% cut keeps only the crowded four, so no triple
        // exists; without the cut the expensive rows complete one.
        let rows: Vec<(f64, f64, f64)> = (0..6)
            .map(|i| (0.0, i as f64, -2.0 + 0.01 * i as f64))
            .chain([(0.0, 90.0, 5.0), (0.0, 180.0, 6.0)])
            .collect();
        let table = table(&rows);

        assert!(matches!(
            select_triple(&table, 20.0, 0.5),
            Selection::NoneFound { .. }
        ));
        assert!(matches!(
            select_triple(&table, 20.0, 1.0),
            Selection::Found(_)
        ));
    }
}
