use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::Local;

use crate::result::{Results, Selection};

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => "nan".to_string(),
    }
}

/// Write the raw score table: couch, gantry, mean/max/min ΔWEPL, PIV per
/// organ. Missing metrics print as `nan`.
pub fn write_scores(results: &Results, directory: &str) -> Result<()> {
    let file = File::create(Path::new(directory).join("angle_scores"))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# generated {}", Local::now().to_rfc3339())?;
    write!(writer, "couch gantry wepl max_wepl min_wepl")?;
    for name in &results.organ_names {
        write!(writer, " piv_{}", name)?;
    }
    writeln!(writer)?;

    for row in &results.scores {
        write!(
            writer,
            "{} {} {} {} {}",
            row.angle.couch,
            row.angle.gantry,
            fmt_opt(row.wepl.map(|w| w.mean)),
            fmt_opt(row.wepl.map(|w| w.max)),
            fmt_opt(row.wepl.map(|w| w.min)),
        )?;
        for piv in &row.piv {
            write!(writer, " {}", fmt_opt(*piv))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

/// Write the standardized table: couch, gantry, one z column per weighted
/// metric, and the composite score.
pub fn write_zscores(results: &Results, directory: &str) -> Result<()> {
    let table = results
        .table
        .as_ref()
        .ok_or_else(|| anyhow!("no z-score table computed"))?;

    let file = File::create(Path::new(directory).join("z_scores"))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# generated {}", Local::now().to_rfc3339())?;
    write!(writer, "couch gantry")?;
    for column in &table.columns {
        write!(writer, " {}_score", column.name)?;
    }
    writeln!(writer, " final_z_score")?;

    for (index, angle) in table.angles.iter().enumerate() {
        write!(writer, "{} {}", angle.couch, angle.gantry)?;
        for column in &table.columns {
            write!(writer, " {}", column.z[index])?;
        }
        writeln!(writer, " {}", table.composite[index])?;
    }

    Ok(())
}

/// Write the selection outcome as JSON, including the explicit none-found
/// state.
pub fn write_selection(results: &Results, directory: &str) -> Result<()> {
    let selection = results
        .selection
        .as_ref()
        .ok_or_else(|| anyhow!("no selection computed"))?;

    let file = File::create(Path::new(directory).join("selection.json"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, selection)?;
    writeln!(writer)?;

    match selection {
        Selection::Found(triple) => {
            println!("Wrote selection with summed score {:.4}", triple.total_score)
        }
        Selection::NoneFound { .. } => println!("Wrote empty selection"),
    }

    Ok(())
}
