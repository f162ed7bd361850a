//! TOML configuration deserialisation for benchmark sweeps.

use serde::Deserialize;

/// An execution strategy as named on the command line and in sweep files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    Sequential,
    Farm,
    Pipeline,
    Collective,
}

/// Top-level sweep configuration.
#[derive(Debug, Deserialize)]
pub struct SweepConfig {
    pub sweep: SweepParams,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What to benchmark.
#[derive(Debug, Deserialize)]
pub struct SweepParams {
    /// Matrix dimensions to sweep over.
    pub sizes: Vec<usize>,
    /// Strategies to run at each size.
    pub strategies: Vec<StrategyChoice>,
    /// Unit counts for parallel strategies; sequential always runs with 1.
    #[serde(default = "default_units")]
    pub units: Vec<usize>,
    /// Timed repetitions of each configuration (default: 1).
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
}

fn default_units() -> Vec<usize> {
    vec![2, 4, 8]
}

fn default_repetitions() -> usize {
    1
}

/// Where timings go.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "outputs").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Timings CSV file name, appended to across runs (default: "timings.csv").
    #[serde(default = "default_csv_name")]
    pub csv: String,
    /// Whether to also save the timings as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
    /// Whether to write a result file for every timed run (default: false;
    /// bench runs of one configuration all produce the same file).
    #[serde(default)]
    pub save_results: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            csv: default_csv_name(),
            save_json: false,
            save_results: false,
        }
    }
}

fn default_output_dir() -> String {
    "outputs".into()
}

fn default_csv_name() -> String {
    "timings.csv".into()
}

/// Load and parse a TOML sweep configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<SweepConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: SweepConfig = toml::from_str(&content)?;
    Ok(config)
}
