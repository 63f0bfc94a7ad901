//! Benchmark driver: sorts the same random integers with the library sort
//! and with [`tree_sort`](crate::tree_sort), then compares the results.

use std::fmt;
use std::time::{Duration, Instant};

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::sort::tree_sort_with_stats;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "treesort",
    about = "Times an AVL tree sort against the standard library sort",
    version
)]
pub struct Config {
    /// Number of integers to sort
    #[arg(long, default_value_t = 1_000_000)]
    pub ints: usize,

    /// Integers are drawn uniformly from 1..=WIDTH
    #[arg(long, default_value_t = 10)]
    pub width: i32,

    /// Seed for a reproducible input; drawn from the OS when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ints: 1_000_000,
            width: 10,
            seed: None,
            json: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("width must be at least 1, got {0}")]
    InvalidWidth(i32),
    #[error("tree sort disagrees with the library sort at index {index}")]
    Mismatch { index: usize },
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub ints: usize,
    pub width: i32,
    pub distinct: usize,
    pub height: i32,
    pub reference_ms: f64,
    pub treesort_ms: f64,
    /// Bytes allocated while the tree sort ran.
    pub tree_bytes: usize,
    pub single_rotations: usize,
    pub double_rotations: usize,
    pub equal: bool,
    pub first_mismatch: Option<usize>,
}

impl Report {
    pub fn check(&self) -> Result<(), HarnessError> {
        match self.first_mismatch {
            Some(index) => Err(HarnessError::Mismatch { index }),
            None => Ok(()),
        }
    }

    pub fn to_json(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Library sort() in {:.0} milliseconds.", self.reference_ms)?;
        writeln!(f, "Treesort in {:.0} milliseconds.", self.treesort_ms)?;
        writeln!(f, "Equal: {}", self.equal)?;
        writeln!(
            f,
            "Tree: {} distinct of {} ints, height {}, {} single / {} double rotations, {} bytes",
            self.distinct,
            self.ints,
            self.height,
            self.single_rotations,
            self.double_rotations,
            self.tree_bytes
        )
    }
}

/// `len` integers drawn uniformly from `1..=width`.
pub fn random_integers<R: Rng>(
    len: usize,
    width: i32,
    rng: &mut R,
) -> Result<Vec<i32>, HarnessError> {
    if width < 1 {
        return Err(HarnessError::InvalidWidth(width));
    }
    Ok((0..len).map(|_| rng.gen_range(1..=width)).collect())
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Runs one comparison.
///
/// `allocated_bytes` reports the process's cumulative allocated bytes; the
/// binary backs it with its instrumented global allocator. Pass `|| 0` when
/// no such counter is available.
pub fn run<F>(config: &Config, allocated_bytes: F) -> Result<Report, HarnessError>
where
    F: Fn() -> usize,
{
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(ints = config.ints, width = config.width, "generating input");
    let mut reference = random_integers(config.ints, config.width, &mut rng)?;
    let mut sorted = reference.clone();

    let start = Instant::now();
    reference.sort();
    let reference_elapsed = start.elapsed();
    info!(elapsed = ?reference_elapsed, "library sort finished");

    let bytes_before = allocated_bytes();
    let start = Instant::now();
    let stats = tree_sort_with_stats(&mut sorted).unwrap_or_default();
    let treesort_elapsed = start.elapsed();
    let tree_bytes = allocated_bytes().saturating_sub(bytes_before);
    info!(elapsed = ?treesort_elapsed, distinct = stats.distinct, "tree sort finished");

    let first_mismatch = reference.iter().zip(&sorted).position(|(a, b)| a != b);
    if let Some(index) = first_mismatch {
        warn!(index, "outputs differ");
    }

    Ok(Report {
        ints: config.ints,
        width: config.width,
        distinct: stats.distinct,
        height: stats.height,
        reference_ms: millis(reference_elapsed),
        treesort_ms: millis(treesort_elapsed),
        tree_bytes,
        single_rotations: stats.single_rotations,
        double_rotations: stats.double_rotations,
        equal: first_mismatch.is_none(),
        first_mismatch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> Config {
        Config {
            ints: 10_000,
            width: 50,
            seed: Some(seed),
            json: false,
        }
    }

    #[test]
    fn test_random_integers_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let ints = random_integers(5000, 10, &mut rng).unwrap();

        assert_eq!(ints.len(), 5000);
        assert!(ints.iter().all(|i| (1..=10).contains(i)));
    }

    #[test]
    fn test_random_integers_are_reproducible() {
        let a = random_integers(100, 1000, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = random_integers(100, 1000, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_width_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            random_integers(10, 0, &mut rng),
            Err(HarnessError::InvalidWidth(0))
        ));

        let config = Config {
            width: -3,
            ..small_config(0)
        };
        assert!(matches!(
            run(&config, || 0),
            Err(HarnessError::InvalidWidth(-3))
        ));
    }

    #[test]
    fn test_run_agrees_with_library_sort() {
        let report = run(&small_config(11), || 0).unwrap();

        assert!(report.equal);
        assert_eq!(report.first_mismatch, None);
        assert!(report.check().is_ok());
        assert_eq!(report.ints, 10_000);
        assert!(report.distinct <= 50);
        assert!(report.height >= 0);
    }

    #[test]
    fn test_run_tiny_inputs() {
        for ints in [0, 1, 2] {
            let config = Config {
                ints,
                ..small_config(5)
            };
            let report = run(&config, || 0).unwrap();
            assert!(report.equal, "failed for {ints} ints");
        }
    }

    #[test]
    fn test_mismatch_fails_check() {
        let mut report = run(&small_config(1), || 0).unwrap();
        report.equal = false;
        report.first_mismatch = Some(17);

        assert!(matches!(
            report.check(),
            Err(HarnessError::Mismatch { index: 17 })
        ));
    }

    #[test]
    fn test_report_renders_as_text_and_json() {
        let report = run(&small_config(2), || 0).unwrap();

        let text = report.to_string();
        assert!(text.contains("Library sort() in"));
        assert!(text.contains("Treesort in"));
        assert!(text.contains("Equal: true"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["ints"], 10_000);
        assert_eq!(json["width"], 50);
        assert_eq!(json["equal"], true);
        assert!(json["first_mismatch"].is_null());
    }

    #[test]
    fn test_config_parses_flags() {
        let config =
            Config::try_parse_from(["treesort", "--ints", "42", "--width", "7", "--json"]).unwrap();
        assert_eq!(config.ints, 42);
        assert_eq!(config.width, 7);
        assert_eq!(config.seed, None);
        assert!(config.json);

        let defaults = Config::try_parse_from(["treesort"]).unwrap();
        assert_eq!(defaults.ints, Config::default().ints);
        assert_eq!(defaults.width, Config::default().width);
    }
}
