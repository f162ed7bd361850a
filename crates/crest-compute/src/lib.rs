//! # Crest Compute
//!
//! Execution strategies for the wavefront sweep. Every strategy implements
//! the [`WavefrontExecutor`](executor::WavefrontExecutor) trait and fills the
//! same [`Matrix`](crest_core::Matrix) in place, so result files are
//! interchangeable across strategies.
//!
//! ## Available strategies
//!
//! | Strategy | Parallelism | Work placement |
//! |----------|-------------|----------------|
//! | Sequential | none | caller thread, element by element |
//! | Task farm | worker threads, shared matrix | chunks pulled on demand, coordinator keeps a tail |
//! | Pipeline | ranks over the message fabric | per-element blocks dealt round-robin, rank 0 holds the matrix |
//! | Collective | ranks over the message fabric | static shares, all-gather per generation, full replica per rank |
//!
//! The two cluster strategies exchange data exclusively through
//! [`cluster::fabric`]; only the farm shares memory, and only under the
//! scheduler's partition discipline.

pub mod cluster;
pub mod executor;
pub mod farm;
pub mod sequential;

pub use cluster::{Collective, CommError, Pipeline};
pub use executor::{ExecutorError, StrategyInfo, StrategyKind, WavefrontExecutor};
pub use farm::TaskFarm;
pub use sequential::Sequential;
