//! Sweep runner: builds executors, times runs, writes result files and
//! timing reports.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;

use crest_compute::{
    Collective, ExecutorError, Pipeline, Sequential, StrategyInfo, StrategyKind, TaskFarm,
    WavefrontExecutor,
};
use crest_core::Matrix;

use crate::config::{StrategyChoice, SweepConfig};

/// One timed run, as recorded in the JSON report.
#[derive(Debug, Serialize)]
struct TimingRecord {
    strategy: &'static str,
    n: usize,
    units: usize,
    ms: u128,
}

fn build_executor(
    strategy: StrategyChoice,
    units: usize,
) -> Result<Box<dyn WavefrontExecutor>, ExecutorError> {
    match strategy {
        StrategyChoice::Sequential => Ok(Box::new(Sequential)),
        StrategyChoice::Farm => Ok(Box::new(TaskFarm::new(units)?)),
        StrategyChoice::Pipeline => Ok(Box::new(Pipeline::new(units)?)),
        StrategyChoice::Collective => Ok(Box::new(Collective::new(units)?)),
    }
}

/// Build and time a single sweep. Only the sweep itself is timed, not the
/// matrix allocation.
fn execute_once(
    strategy: StrategyChoice,
    n: usize,
    units: usize,
) -> Result<(Matrix, StrategyInfo, Duration)> {
    let executor = build_executor(strategy, units)?;
    let info = executor.info();
    let mut matrix = Matrix::new(n)?;

    let started = Instant::now();
    executor.execute(&mut matrix)?;
    let elapsed = started.elapsed();

    Ok((matrix, info, elapsed))
}

/// The `run` subcommand: one sweep, timing line, diagnostics, result file.
pub fn run(strategy: StrategyChoice, n: usize, units: usize, output: &Path) -> Result<()> {
    log::info!("run: strategy={strategy:?} n={n} units={units}");
    let (matrix, info, elapsed) = execute_once(strategy, n, units)?;

    println!("{};{};{}", n, info.units, elapsed.as_millis());
    println!("A(0, n-1) = {}", matrix.top_right());
    if n <= 10 {
        // print only if the matrix is small
        let mut stdout = io::stdout().lock();
        matrix.write_grid(&mut stdout)?;
    }

    let path = write_result_file(&matrix, info.kind, output)?;
    println!("Result written to: {}", path.display());
    Ok(())
}

/// Write `<strategy>_<n>.txt` into `dir`, creating the directory if needed.
fn write_result_file(matrix: &Matrix, kind: StrategyKind, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}_{}.txt", kind, matrix.size()));
    let mut file = BufWriter::new(File::create(&path)?);
    matrix.write_result(&mut file)?;
    file.flush()?;
    Ok(path)
}

/// The `compare` subcommand: parse every result file and check exact
/// equality. Returns whether all matrices are equal.
pub fn compare(files: &[PathBuf]) -> Result<bool> {
    let mut matrices = Vec::with_capacity(files.len());
    for path in files {
        let file = File::open(path)
            .with_context(|| format!("Unable to open file: {}", path.display()))?;
        let matrix = Matrix::read_result(BufReader::new(file))
            .with_context(|| format!("Unable to parse result file: {}", path.display()))?;
        matrices.push(matrix);
    }

    let Some(first) = matrices.first() else {
        return Ok(true);
    };
    if matrices.iter().any(|m| m.size() != first.size()) {
        anyhow::bail!("Matrices are of different sizes");
    }
    Ok(matrices.iter().all(|m| m == first))
}

/// The `bench` subcommand: time every configuration in the sweep, appending
/// to the timings CSV and optionally writing a JSON report.
pub fn bench(config: &SweepConfig, output_override: Option<PathBuf>) -> Result<()> {
    let out_dir = output_override.unwrap_or_else(|| PathBuf::from(&config.output.directory));
    std::fs::create_dir_all(&out_dir)?;

    let mut jobs: Vec<(StrategyChoice, usize, usize)> = Vec::new();
    for &n in &config.sweep.sizes {
        for &strategy in &config.sweep.strategies {
            let unit_counts: &[usize] = match strategy {
                StrategyChoice::Sequential => &[1],
                _ => &config.sweep.units,
            };
            for &units in unit_counts {
                jobs.push((strategy, n, units));
            }
        }
    }

    let csv_path = out_dir.join(&config.output.csv);
    let mut csv = open_timings_csv(&csv_path)?;

    let total = jobs.len() * config.sweep.repetitions;
    let mut completed = 0;
    let mut records = Vec::with_capacity(total);

    for (strategy, n, units) in jobs {
        for _ in 0..config.sweep.repetitions {
            let (matrix, info, elapsed) = execute_once(strategy, n, units)?;
            let ms = elapsed.as_millis();
            completed += 1;
            println!(
                "  [{}/{}] {} n={} units={}: {} ms",
                completed, total, info.kind, n, info.units, ms
            );
            writeln!(csv, "{};{};{};{}", info.kind, n, info.units, ms)?;
            records.push(TimingRecord {
                strategy: info.kind.name(),
                n,
                units: info.units,
                ms,
            });

            if config.output.save_results {
                write_result_file(&matrix, info.kind, &out_dir)?;
            }
        }
    }

    println!("Timings written to: {}", csv_path.display());

    if config.output.save_json {
        let json_path = out_dir.join("timings.json");
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(&json_path, json)?;
        println!("Timings (JSON) written to: {}", json_path.display());
    }

    Ok(())
}

/// Open the timings CSV for appending, writing the header on first use.
fn open_timings_csv(path: &Path) -> Result<File> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        writeln!(file, "strategy;n;units;ms")?;
    }
    Ok(file)
}
