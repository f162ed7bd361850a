//! Sequential sweep: the baseline every parallel strategy is compared to.

use crest_core::{element, Matrix};

use crate::executor::{ExecutorError, StrategyInfo, StrategyKind, WavefrontExecutor};

/// Computes generations in order on the caller thread, elements in ascending
/// row order, mirroring each write.
pub struct Sequential;

impl WavefrontExecutor for Sequential {
    fn info(&self) -> StrategyInfo {
        StrategyInfo {
            kind: StrategyKind::Sequential,
            units: 1,
        }
    }

    fn execute(&self, matrix: &mut Matrix) -> Result<(), ExecutorError> {
        matrix.initialize_diagonal();
        let n = matrix.size();
        for k in 1..n {
            for m in 0..n - k {
                let value = element(matrix, m, k);
                matrix.set_symmetric(m, m + k, value);
            }
        }
        Ok(())
    }
}
