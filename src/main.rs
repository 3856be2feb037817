use std::path::Path;

use beamsel::loader;
use beamsel::settings::{self};
use beamsel::sweep::Sweep;

fn main() -> anyhow::Result<()> {
    let settings = settings::load_config()?;
    let volumes = loader::load_volumes(Path::new(&settings.volumes))?;

    let mut sweep = Sweep::new(volumes, settings);
    sweep.solve();
    sweep.writeup();

    Ok(())
}
