//! Collective cluster strategy: static shares and an all-gather barrier.
//!
//! Every rank holds a full replica of the matrix and runs the same loop.
//! Each generation is split into near-equal contiguous shares, one per rank;
//! a rank computes its share, contributes it to the all-gather, then applies
//! the gathered generation (with mirrors) to its replica. The gather doubles
//! as the generation barrier. The final single-element generation is
//! computed redundantly on every rank instead of being gathered.

use std::ops::Range;
use std::thread;

use crest_core::{element, Matrix};

use crate::cluster::fabric::{self, CommError, Endpoint};
use crate::executor::{ExecutorError, StrategyInfo, StrategyKind, WavefrontExecutor};

/// Per-rank shares of one generation of length `len`, in displacement order.
///
/// Shares differ by at most one element and the remainder goes to the low
/// ranks, so concatenating them in rank order reproduces `0..len`. Ranks
/// beyond `len` receive empty shares and still take part in the gather.
fn shares(len: usize, world: usize) -> Vec<Range<usize>> {
    let base = len / world;
    let extra = len % world;
    let mut out = Vec::with_capacity(world);
    let mut start = 0;
    for rank in 0..world {
        let size = base + usize::from(rank < extra);
        out.push(start..start + size);
        start += size;
    }
    out
}

/// The per-rank sweep. Identical on the coordinator and the workers; only
/// the matrix they apply it to differs.
fn sweep(endpoint: &mut Endpoint, matrix: &mut Matrix) -> Result<(), CommError> {
    let n = matrix.size();
    let world = endpoint.world();

    for k in 1..n - 1 {
        let len = n - k;
        let own = shares(len, world)[endpoint.rank()].clone();
        let mut mine = Vec::with_capacity(own.len());
        for m in own {
            mine.push(element(matrix, m, k));
        }

        let gathered = endpoint.all_gather(k, mine)?;
        debug_assert_eq!(gathered.len(), len);
        for (m, value) in gathered.into_iter().enumerate() {
            matrix.set_symmetric(m, m + k, value);
        }
    }

    // Last generation: one element, computed by everyone.
    let value = element(matrix, 0, n - 1);
    matrix.set_symmetric(0, n - 1, value);
    Ok(())
}

/// Collective strategy over `ranks` full-replica ranks.
pub struct Collective {
    ranks: usize,
}

impl Collective {
    /// At least two ranks are required.
    pub fn new(ranks: usize) -> Result<Self, ExecutorError> {
        if ranks < 2 {
            return Err(ExecutorError::ClusterTooSmall(ranks));
        }
        Ok(Self { ranks })
    }
}

impl WavefrontExecutor for Collective {
    fn info(&self) -> StrategyInfo {
        StrategyInfo {
            kind: StrategyKind::Collective,
            units: self.ranks,
        }
    }

    fn execute(&self, matrix: &mut Matrix) -> Result<(), ExecutorError> {
        matrix.initialize_diagonal();
        let n = matrix.size();
        if n == 1 {
            return Ok(());
        }

        let mut replicas = Vec::with_capacity(self.ranks - 1);
        for _ in 1..self.ranks {
            let mut replica = Matrix::new(n)?;
            replica.initialize_diagonal();
            replicas.push(replica);
        }

        let mut world = fabric::connect(self.ranks);
        let mut coordinator = world.remove(0);

        thread::scope(|scope| -> Result<(), ExecutorError> {
            let mut handles = Vec::with_capacity(self.ranks - 1);
            for (mut endpoint, mut replica) in world.into_iter().zip(replicas) {
                let spawned = thread::Builder::new()
                    .name(format!("rank-{}", endpoint.rank()))
                    .spawn_scoped(scope, move || sweep(&mut endpoint, &mut replica));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        // Unblock the ranks that did start before the scope
                        // joins them.
                        coordinator.release_peers();
                        return Err(ExecutorError::Spawn {
                            role: "collective rank",
                            source,
                        });
                    }
                }
            }

            let outcome = sweep(&mut coordinator, matrix);
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
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequential::Sequential;

    fn sizes(len: usize, world: usize) -> Vec<usize> {
        shares(len, world).iter().map(|s| s.len()).collect()
    }

    #[test]
    fn shares_cover_the_generation_in_order() {
        for len in 0..30 {
            for world in 2..9 {
                let ranges = shares(len, world);
                assert_eq!(ranges.len(), world);
                let mut expected_start = 0;
                for range in &ranges {
                    assert_eq!(range.start, expected_start);
                    expected_start = range.end;
                }
                assert_eq!(expected_start, len);
            }
        }
    }

    #[test]
    fn remainder_goes_to_the_low_ranks() {
        assert_eq!(sizes(10, 4), vec![3, 3, 2, 2]);
        assert_eq!(sizes(7, 3), vec![3, 2, 2]);
    }

    #[test]
    fn short_generations_leave_high_ranks_idle() {
        assert_eq!(sizes(2, 5), vec![1, 1, 0, 0, 0]);
    }

    #[test]
    fn rejects_worlds_without_workers() {
        assert!(matches!(
            Collective::new(1),
            Err(ExecutorError::ClusterTooSmall(1))
        ));
    }

    #[test]
    fn matches_sequential_bit_for_bit() {
        let mut reference = Matrix::new(13).unwrap();
        Sequential.execute(&mut reference).unwrap();

        for ranks in [2, 3, 6] {
            let mut gathered = Matrix::new(13).unwrap();
            Collective::new(ranks)
                .unwrap()
                .execute(&mut gathered)
                .unwrap();
            assert_eq!(gathered, reference, "ranks = {ranks}");
        }
    }

    #[test]
    fn single_cell_matrix_keeps_its_seed() {
        let mut matrix = Matrix::new(1).unwrap();
        Collective::new(3).unwrap().execute(&mut matrix).unwrap();
        assert_eq!(matrix.at(0, 0), 1.0);
    }

    #[test]
    fn two_by_two_computes_the_lone_element() {
        let mut reference = Matrix::new(2).unwrap();
        Sequential.execute(&mut reference).unwrap();

        let mut matrix = Matrix::new(2).unwrap();
        Collective::new(4).unwrap().execute(&mut matrix).unwrap();
        assert_eq!(matrix, reference);
    }
}
