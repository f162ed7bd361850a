//! Point-to-point pipelined cluster strategy.
//!
//! Rank 0 owns the matrix and coordinates. For each element of a generation
//! it packs the two dependency arms into a single block of `2k` values and
//! deals the blocks round-robin across ranks 1..R; workers never see the
//! matrix, they fold whatever block arrives and send one value back. The
//! coordinator then drains the generation's values, in whatever order they
//! complete, before dealing the next generation.
//!
//! Only `(m, m + k)` cells are written during the sweep; symmetry is
//! restored once at the end.

use std::thread;

use crest_core::Matrix;

use crate::cluster::fabric::{self, CommError, Endpoint, Message, Rank};
use crate::executor::{ExecutorError, StrategyInfo, StrategyKind, WavefrontExecutor};

/// Rotating dealer over the worker ranks `1..world`.
///
/// The rotation survives generation boundaries, so the deal stays balanced
/// even once generations shrink below the worker count.
#[derive(Debug)]
struct RoundRobin {
    lanes: usize,
    next: usize,
}

impl RoundRobin {
    fn new(lanes: usize) -> Self {
        Self { lanes, next: 0 }
    }

    /// Worker rank for the next element.
    fn deal(&mut self) -> Rank {
        let lane = self.next;
        self.next = (self.next + 1) % self.lanes;
        lane + 1
    }
}

/// Pack the dependency arms of `(m, m + k)` into one block of `2k` values:
/// the row arm first, already reversed, then the column arm read downward
/// from the upper triangle. A forward fold over the two halves then
/// reproduces the kernel's accumulation order exactly.
fn pack_arms(matrix: &Matrix, m: usize, k: usize) -> Vec<f64> {
    let mut halves = vec![0.0; 2 * k];
    for i in 0..k {
        halves[i] = matrix.at(m, m + k - 1 - i);
        halves[k + i] = matrix.at(m + 1 + i, m + k);
    }
    halves
}

/// Forward fold of a packed block; the worker-side half of the kernel.
fn fold_halves(halves: &[f64]) -> f64 {
    let k = halves.len() / 2;
    let mut acc = 0.0;
    for i in 0..k {
        acc += halves[i] * halves[k + i];
    }
    acc
}

fn coordinate(endpoint: &mut Endpoint, matrix: &mut Matrix) -> Result<(), CommError> {
    let n = matrix.size();
    let mut dealer = RoundRobin::new(endpoint.world() - 1);

    for k in 1..n {
        for m in 0..n - k {
            let halves = pack_arms(matrix, m, k);
            endpoint.send(dealer.deal(), Message::Block { m, k, halves })?;
        }
        for _ in 0..n - k {
            let envelope = endpoint.recv()?;
            let Message::Value { m, k: generation, value } = envelope.message else {
                return Err(CommError::Protocol {
                    from: envelope.from,
                    expected: "element value",
                });
            };
            debug_assert_eq!(generation, k, "value from a different generation");
            matrix.set(m, m + k, value);
        }
    }

    for worker in 1..endpoint.world() {
        endpoint.send(worker, Message::Shutdown)?;
    }
    Ok(())
}

fn serve(endpoint: &mut Endpoint) -> Result<(), CommError> {
    loop {
        let envelope = endpoint.recv()?;
        match envelope.message {
            Message::Block { m, k, halves } => {
                let value = fold_halves(&halves).cbrt();
                endpoint.send(fabric::COORDINATOR, Message::Value { m, k, value })?;
            }
            Message::Shutdown => return Ok(()),
            Message::Value { .. } | Message::Share { .. } => {
                return Err(CommError::Protocol {
                    from: envelope.from,
                    expected: "block or shutdown",
                });
            }
        }
    }
}

/// Pipelined point-to-point strategy over `ranks` ranks.
pub struct Pipeline {
    ranks: usize,
}

impl Pipeline {
    /// At least two ranks are required: the coordinator plus one worker.
    pub fn new(ranks: usize) -> Result<Self, ExecutorError> {
        if ranks < 2 {
            return Err(ExecutorError::ClusterTooSmall(ranks));
        }
        Ok(Self { ranks })
    }
}

impl WavefrontExecutor for Pipeline {
    fn info(&self) -> StrategyInfo {
        StrategyInfo {
            kind: StrategyKind::Pipeline,
            units: self.ranks,
        }
    }

    fn execute(&self, matrix: &mut Matrix) -> Result<(), ExecutorError> {
        matrix.initialize_diagonal();
        if matrix.size() == 1 {
            return Ok(());
        }

        let mut world = fabric::connect(self.ranks);
        let mut coordinator = world.remove(0);

        thread::scope(|scope| -> Result<(), ExecutorError> {
            let mut handles = Vec::with_capacity(self.ranks - 1);
            for mut endpoint in world {
                let spawned = thread::Builder::new()
                    .name(format!("rank-{}", endpoint.rank()))
                    .spawn_scoped(scope, move || serve(&mut endpoint));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        // Unblock the ranks that did start before the scope
                        // joins them.
                        coordinator.release_peers();
                        return Err(ExecutorError::Spawn {
                            role: "pipeline rank",
                            source,
                        });
                    }
                }
            }

            let outcome = coordinate(&mut coordinator, matrix);
            if outcome.is_err() {
                coordinator.release_peers();
            }
            outcome?;

            for handle in handles {
                match handle.join() {
                    Ok(result) => result?,
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            }
            Ok(())
        })?;

        matrix.mirror_lower_from_upper();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crest_core::arm_dot;

    use super::*;
    use crate::sequential::Sequential;

    #[test]
    fn dealer_cycles_over_worker_ranks() {
        let mut dealer = RoundRobin::new(3);
        let dealt: Vec<Rank> = (0..7).map(|_| dealer.deal()).collect();
        assert_eq!(dealt, vec![1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn dealer_with_a_single_lane() {
        let mut dealer = RoundRobin::new(1);
        assert_eq!(dealer.deal(), 1);
        assert_eq!(dealer.deal(), 1);
    }

    #[test]
    fn packed_block_replays_the_kernel() {
        // Symmetric fill with a distinct value per cell pair: the kernel
        // reads the lower mirror of the column arm, packing reads the upper,
        // and the fold must still come out identical bit for bit.
        let mut matrix = Matrix::new(5).unwrap();
        for row in 0..5 {
            for col in row..5 {
                matrix.set_symmetric(row, col, (row * 5 + col) as f64 * 0.125);
            }
        }
        for (m, k) in [(0, 1), (1, 2), (0, 4), (2, 2)] {
            let halves = pack_arms(&matrix, m, k);
            assert_eq!(halves.len(), 2 * k);
            assert_eq!(fold_halves(&halves), arm_dot(&matrix, m, k), "m={m} k={k}");
        }
    }

    #[test]
    fn packed_block_reads_only_the_upper_triangle() {
        // Poison the strict lower triangle; packing must never touch it.
        let mut matrix = Matrix::new(4).unwrap();
        matrix.initialize_diagonal();
        matrix.set(0, 1, 0.5);
        matrix.set(1, 2, 0.25);
        matrix.set(2, 3, 0.125);
        for row in 0..4 {
            for col in 0..row {
                matrix.set(row, col, f64::NAN);
            }
        }
        let halves = pack_arms(&matrix, 0, 2);
        assert!(halves.iter().all(|v| v.is_finite()));
        assert_eq!(halves, vec![0.5, 0.25, 0.25, 0.75]);
    }

    #[test]
    fn rejects_worlds_without_workers() {
        assert!(matches!(Pipeline::new(0), Err(ExecutorError::ClusterTooSmall(0))));
        assert!(matches!(Pipeline::new(1), Err(ExecutorError::ClusterTooSmall(1))));
    }

    #[test]
    fn matches_sequential_bit_for_bit() {
        let mut reference = Matrix::new(12).unwrap();
        Sequential.execute(&mut reference).unwrap();

        for ranks in [2, 3, 5] {
            let mut piped = Matrix::new(12).unwrap();
            Pipeline::new(ranks).unwrap().execute(&mut piped).unwrap();
            assert_eq!(piped, reference, "ranks = {ranks}");
        }
    }

    #[test]
    fn single_cell_matrix_short_circuits() {
        let mut matrix = Matrix::new(1).unwrap();
        Pipeline::new(2).unwrap().execute(&mut matrix).unwrap();
        assert_eq!(matrix.at(0, 0), 1.0);
    }
}
