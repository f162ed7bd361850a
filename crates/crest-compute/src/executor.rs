//! Execution strategy trait and the shared error type.
//!
//! The [`WavefrontExecutor`] trait isolates the driver from how a sweep is
//! carried out. Callers hand a zero-filled matrix to [`execute`], which seeds
//! the diagonal and fills every off-diagonal element in place; strategies are
//! interchangeable beyond their timing.
//!
//! [`execute`]: WavefrontExecutor::execute

use std::fmt;
use std::io;

use crest_core::{Matrix, MatrixError};
use thiserror::Error;

use crate::cluster::fabric::CommError;

/// Errors raised by execution strategies. All of them are fatal to the run;
/// no strategy retries.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Task farm requires at least one worker")]
    NoWorkers,

    #[error("Cluster strategies require at least two ranks, got {0}")]
    ClusterTooSmall(usize),

    #[error("Failed to spawn {role} thread")]
    Spawn {
        role: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Farm workers disconnected before the sweep finished")]
    FarmDisconnected,

    #[error(transparent)]
    Comm(#[from] CommError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

/// The kind of execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Sequential,
    Farm,
    Pipeline,
    Collective,
}

impl StrategyKind {
    /// Stable lowercase name, used for result-file naming and reports.
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::Farm => "farm",
            StrategyKind::Pipeline => "pipeline",
            StrategyKind::Collective => "collective",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Describes a configured strategy.
#[derive(Debug, Clone, Copy)]
pub struct StrategyInfo {
    pub kind: StrategyKind,
    /// Parallel units driving the sweep: worker threads for the farm, ranks
    /// for the cluster strategies, 1 for sequential.
    pub units: usize,
}

/// Abstraction over execution strategies.
///
/// `matrix` arrives zero-filled; `execute` seeds the diagonal and computes
/// every off-diagonal element. For a fixed size the filled matrix is
/// identical bit for bit across strategies and unit counts.
pub trait WavefrontExecutor {
    /// Describe this strategy instance.
    fn info(&self) -> StrategyInfo;

    /// Run the full sweep over `matrix`.
    fn execute(&self, matrix: &mut Matrix) -> Result<(), ExecutorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_are_stable() {
        assert_eq!(StrategyKind::Sequential.to_string(), "sequential");
        assert_eq!(StrategyKind::Farm.to_string(), "farm");
        assert_eq!(StrategyKind::Pipeline.to_string(), "pipeline");
        assert_eq!(StrategyKind::Collective.to_string(), "collective");
    }
}
