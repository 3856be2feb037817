use anyhow::Result;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fmt;

/// Default hop budget for the distal-edge backward walk.
pub const DEFAULT_DISTAL_THRESHOLD: usize = 40;
/// Default minimum pairwise central-angle separation between selected beams,
/// in degrees.
pub const DEFAULT_MIN_SEPARATION: f64 = 20.0;
/// Default fraction of lowest-composite rows kept before the triple search.
pub const DEFAULT_QUANTILE: f64 = 0.25;

/// An inclusive angle range with a fixed step, in degrees.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct AngleRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl AngleRange {
    pub fn new(start: f64, end: f64, step: f64) -> Self {
        Self { start, end, step }
    }

    /// Materializes the range in ascending order.
    pub fn values(&self) -> Vec<f64> {
        let mut values = Vec::new();
        let mut v = self.start;
        while v <= self.end + 1e-9 {
            values.push(v);
            v += self.step;
        }
        values
    }
}

/// Per-metric composite weights. All weights are positive; every metric is
/// oriented so that lower raw values are favourable.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Weights {
    /// Weight on the mean respiratory ΔWEPL column.
    pub tumour: f64,
    /// Weight per organ name; organs absent from this map are scored in the
    /// raw table but excluded from the composite.
    pub organs: BTreeMap<String, f64>,
}

/// Runtime configuration for the application.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// Path to the volume manifest naming the patient grids.
    pub volumes: String,
    /// Output directory for the score tables and selection summary.
    pub directory: String,
    pub couch: AngleRange,
    pub gantry: AngleRange,
    #[serde(default = "default_distal_threshold")]
    pub distal_threshold: usize,
    #[serde(default = "default_min_separation")]
    pub min_separation: f64,
    #[serde(default = "default_quantile")]
    pub quantile: f64,
    pub weights: Weights,
}

fn default_distal_threshold() -> usize {
    DEFAULT_DISTAL_THRESHOLD
}

fn default_min_separation() -> f64 {
    DEFAULT_MIN_SEPARATION
}

fn default_quantile() -> f64 {
    DEFAULT_QUANTILE
}

impl Settings {
    /// Number of angle cells in the sweep grid.
    pub fn num_cells(&self) -> usize {
        self.couch.values().len() * self.gantry.values().len()
    }
}

pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root();
    let default_config_file = root.join("config/default.toml");

    let settings: Config = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .unwrap_or_else(|err| {
            eprintln!("Error loading configuration: {}", err);
            std::process::exit(1);
        });

    let config: Settings = settings.try_deserialize().unwrap_or_else(|err| {
        eprintln!("Error deserializing configuration: {}", err);
        std::process::exit(1);
    });

    validate_config(&config);

    Ok(config)
}

pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root();

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    // Check if local config exists, if not use default
    let config_file = if local_config.exists() {
        println!("Using local configuration: {:?}", local_config);
        local_config
    } else {
        println!("Using default configuration: {:?}", default_config_file);
        default_config_file
    };

    let settings: Config = Config::builder()
        .add_source(File::from(config_file).required(true))
        .add_source(Environment::with_prefix("beamsel"))
        .build()
        .unwrap_or_else(|err| {
            eprintln!("Error loading configuration: {}", err);
            std::process::exit(1);
        });

    let mut config: Settings = settings.try_deserialize().unwrap_or_else(|err| {
        eprintln!("Error deserializing configuration: {}", err);
        std::process::exit(1);
    });

    // Parse command-line arguments and override values
    let args = CliArgs::parse();

    if let Some(volumes) = args.volumes {
        config.volumes = volumes;
    }
    if let Some(directory) = args.dir {
        config.directory = directory;
    }
    if let Some(couch) = &args.couch {
        config.couch = AngleRange::new(couch[0], couch[1], couch[2]);
    }
    if let Some(gantry) = &args.gantry {
        config.gantry = AngleRange::new(gantry[0], gantry[1], gantry[2]);
    }
    if let Some(threshold) = args.threshold {
        config.distal_threshold = threshold;
    }
    if let Some(sep) = args.sep {
        config.min_separation = sep;
    }
    if let Some(quantile) = args.quantile {
        config.quantile = quantile;
    }

    validate_config(&config);

    println!("{}", config);

    Ok(config)
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the BEAMSEL_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
/// If none of these methods work, the function will panic.
fn retrieve_project_root() -> std::path::PathBuf {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        std::path::PathBuf::from(manifest_dir)
    } else if let Ok(path) = env::var("BEAMSEL_ROOT_DIR") {
        // Allow explicit configuration via environment variable
        std::path::PathBuf::from(path)
    } else {
        // Fallback: walk upward from the executable directory until a
        // "config" subdirectory is found.
        let exe_path = env::current_exe().expect("Failed to get current executable path");
        let mut current_dir = exe_path
            .parent()
            .expect("Failed to get executable directory")
            .to_path_buf();
        let mut found = false;

        while !found && current_dir.parent().is_some() {
            if current_dir.join("config").is_dir() {
                found = true;
            } else {
                current_dir = current_dir.parent().unwrap().to_path_buf();
            }
        }

        if found {
            current_dir
        } else {
            panic!("Could not find project root directory");
        }
    }
}

fn validate_config(config: &Settings) {
    assert!(config.couch.step > 0.0, "Couch step must be greater than 0");
    assert!(
        config.gantry.step > 0.0,
        "Gantry step must be greater than 0"
    );
    assert!(
        config.couch.end >= config.couch.start,
        "Couch range end must not precede its start"
    );
    assert!(
        config.gantry.end >= config.gantry.start,
        "Gantry range end must not precede its start"
    );
    assert!(
        config.distal_threshold >= 1,
        "Distal threshold must be at least 1 hop"
    );
    assert!(
        config.quantile > 0.0 && config.quantile <= 1.0,
        "Quantile must be in (0, 1]"
    );
    assert!(
        config.min_separation >= 0.0,
        "Minimum separation must not be negative"
    );
    assert!(
        config.weights.tumour > 0.0,
        "Tumour weight must be positive"
    );
    for (name, weight) in &config.weights.organs {
        assert!(*weight > 0.0, "Weight for organ '{}' must be positive", name);
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "beamsel - beam geometry selection by ray-traced WEPL and OAR scoring"
)]
pub struct CliArgs {
    /// Path to the volume manifest describing the patient grids.
    #[arg(short, long)]
    volumes: Option<String>,

    /// Output directory for the score tables and selection summary.
    #[arg(short, long)]
    dir: Option<String>,

    /// Couch angle range in degrees: start end step.
    #[arg(long, num_args = 3, value_delimiter = ' ')]
    couch: Option<Vec<f64>>,

    /// Gantry angle range in degrees: start end step.
    #[arg(long, num_args = 3, value_delimiter = ' ')]
    gantry: Option<Vec<f64>>,

    /// Hop budget for the distal-edge backward walk.
    #[arg(long)]
    threshold: Option<usize>,

    /// Minimum pairwise central-angle separation between selected beams, in degrees.
    #[arg(long)]
    sep: Option<f64>,

    /// Fraction of lowest-composite rows kept before the triple search, in (0, 1].
    #[arg(short, long)]
    quantile: Option<f64>,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Volumes: {}
  - Output Directory: {}
  - Couch: {} to {} step {}
  - Gantry: {} to {} step {}
  - Distal Threshold: {}
  - Min Separation: {} deg
  - Quantile: {}
  - Tumour Weight: {}
  - Organ Weights: {:?}
  ",
            self.volumes,
            self.directory,
            self.couch.start,
            self.couch.end,
            self.couch.step,
            self.gantry.start,
            self.gantry.end,
            self.gantry.step,
            self.distal_threshold,
            self.min_separation,
            self.quantile,
            self.weights.tumour,
            self.weights.organs,
        )
    }
}
