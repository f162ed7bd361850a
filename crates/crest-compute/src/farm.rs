//! Dynamically load-balanced task farm over a shared matrix.
//!
//! One coordinator (the calling thread) drives W worker threads. Each
//! generation is cut into contiguous row chunks: workers pull chunks from a
//! shared queue on demand, the coordinator computes the tail chunk itself,
//! then drains one completion per dispatched chunk before opening the next
//! generation. That drain is the generation barrier; nothing else
//! synchronises access to the matrix.

use std::marker::PhantomData;
use std::ops::Range;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crest_core::{element, Matrix, MatrixRead};

use crate::executor::{ExecutorError, StrategyInfo, StrategyKind, WavefrontExecutor};

/// Work order pulled by farm workers.
enum Order {
    /// Compute rows `rows` of generation `k`.
    Chunk { k: usize, rows: Range<usize> },
    /// Exit the service loop. One per worker.
    Shutdown,
}

/// Unsynchronised view of a [`Matrix`] shared between the coordinator and
/// the farm workers.
///
/// # Safety
///
/// Reads and writes are raw and unsynchronised; soundness is the scheduler's
/// partition discipline, not the type system:
///
/// - within generation `k` the dispatched row chunks are pairwise disjoint,
///   and row `m` writes only the pair `(m, m + k)` / `(m + k, m)`, which no
///   other row of the same generation touches;
/// - kernel reads only visit anti-diagonals below `k`, all written before the
///   previous generation's completion drain;
/// - the channels carrying orders and completions give every generation-`k`
///   write a happens-before edge to every generation-`k + 1` access.
#[derive(Clone, Copy)]
struct SharedMatrix<'a> {
    cells: *mut f64,
    n: usize,
    _borrow: PhantomData<&'a mut Matrix>,
}

unsafe impl Send for SharedMatrix<'_> {}
unsafe impl Sync for SharedMatrix<'_> {}

impl<'a> SharedMatrix<'a> {
    fn new(matrix: &'a mut Matrix) -> Self {
        Self {
            n: matrix.size(),
            cells: matrix.as_mut_ptr(),
            _borrow: PhantomData,
        }
    }

    /// Write `value` to `(row, col)` and its mirror `(col, row)`.
    fn set_symmetric(&self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.n && col < self.n);
        // SAFETY: in bounds, and the partition discipline above makes this
        // thread the only writer of the pair during the current generation.
        unsafe {
            *self.cells.add(row * self.n + col) = value;
            *self.cells.add(col * self.n + row) = value;
        }
    }
}

impl MatrixRead for SharedMatrix<'_> {
    fn size(&self) -> usize {
        self.n
    }

    fn at(&self, row: usize, col: usize) -> f64 {
        debug_assert!(row < self.n && col < self.n);
        // SAFETY: in bounds, and kernel reads stay below the generation
        // currently being written.
        unsafe { *self.cells.add(row * self.n + col) }
    }
}

/// How one generation of length `len` splits between `workers` pull-workers
/// and the coordinator.
#[derive(Debug, PartialEq, Eq)]
struct Partition {
    /// Row chunks handed to workers, in dispatch order.
    chunks: Vec<Range<usize>>,
    /// Rows the coordinator computes itself. Never empty.
    tail: Range<usize>,
}

/// Cut `0..len` into worker chunks plus a coordinator tail.
///
/// Sizes are `len / (workers + 1)` rounded down, with the remainder spread
/// one row at a time over the leading chunks. When a generation is shorter
/// than the crew only `len - 1` single-row chunks are dispatched, so the
/// coordinator always keeps at least one row for itself.
fn partition(len: usize, workers: usize) -> Partition {
    debug_assert!(len >= 2 && workers >= 1);
    let crew = workers + 1;
    let base = len / crew;
    let extra = len % crew;
    let active = if base == 0 { extra - 1 } else { workers };

    let mut chunks = Vec::with_capacity(active);
    let mut start = 0;
    for index in 0..active {
        let size = base + usize::from(index < extra);
        chunks.push(start..start + size);
        start += size;
    }
    Partition {
        chunks,
        tail: start..len,
    }
}

fn serve(view: SharedMatrix<'_>, orders: Arc<Mutex<Receiver<Order>>>, done: Sender<usize>) {
    loop {
        let order = {
            let queue = orders.lock().unwrap_or_else(PoisonError::into_inner);
            queue.recv()
        };
        match order {
            Ok(Order::Chunk { k, rows }) => {
                for m in rows {
                    let value = element(&view, m, k);
                    view.set_symmetric(m, m + k, value);
                }
                if done.send(k).is_err() {
                    return;
                }
            }
            Ok(Order::Shutdown) | Err(_) => return,
        }
    }
}

/// Task-farm strategy: `workers` pull-workers plus the coordinating caller.
pub struct TaskFarm {
    workers: usize,
}

impl TaskFarm {
    /// Create a farm with `workers` worker threads. At least one is required.
    pub fn new(workers: usize) -> Result<Self, ExecutorError> {
        if workers < 1 {
            return Err(ExecutorError::NoWorkers);
        }
        Ok(Self { workers })
    }
}

impl WavefrontExecutor for TaskFarm {
    fn info(&self) -> StrategyInfo {
        StrategyInfo {
            kind: StrategyKind::Farm,
            units: self.workers,
        }
    }

    fn execute(&self, matrix: &mut Matrix) -> Result<(), ExecutorError> {
        matrix.initialize_diagonal();
        let n = matrix.size();
        if n == 1 {
            return Ok(());
        }

        let view = SharedMatrix::new(matrix);
        let (order_tx, order_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let order_rx = Arc::new(Mutex::new(order_rx));

        // The channels move into the scope: any early return drops them
        // before the scope joins, so no worker stays blocked on its queue.
        thread::scope(move |scope| -> Result<(), ExecutorError> {
            for id in 0..self.workers {
                let orders = Arc::clone(&order_rx);
                let done = done_tx.clone();
                thread::Builder::new()
                    .name(format!("farm-worker-{id}"))
                    .spawn_scoped(scope, move || serve(view, orders, done))
                    .map_err(|source| ExecutorError::Spawn {
                        role: "farm worker",
                        source,
                    })?;
            }
            // Completions must only arrive from workers.
            drop(done_tx);

            for k in 1..n {
                let len = n - k;
                if len == 1 {
                    // Single-element generation: not worth a dispatch.
                    let value = element(&view, 0, k);
                    view.set_symmetric(0, k, value);
                    break;
                }

                let parts = partition(len, self.workers);
                let dispatched = parts.chunks.len();
                for rows in parts.chunks {
                    order_tx
                        .send(Order::Chunk { k, rows })
                        .map_err(|_| ExecutorError::FarmDisconnected)?;
                }
                for m in parts.tail {
                    let value = element(&view, m, k);
                    view.set_symmetric(m, m + k, value);
                }
                for _ in 0..dispatched {
                    let finished = done_rx
                        .recv()
                        .map_err(|_| ExecutorError::FarmDisconnected)?;
                    debug_assert_eq!(finished, k, "completion from a different generation");
                }
            }

            // A worker that died early surfaces as a panic when the scope
            // joins; a failed send here only means no one is left to tell.
            for _ in 0..self.workers {
                let _ = order_tx.send(Order::Shutdown);
            }
            Ok(())
        })
    }
}
