//! Cluster strategies: ranks as threads over an in-process message fabric.
//!
//! Both strategies run a world of R ranks. Rank 0 coordinates on the calling
//! thread and owns the caller's matrix; ranks 1..R run on spawned threads
//! and exchange typed, tagged messages through [`fabric`], never memory.
//! A rank failure surfaces as a fatal [`CommError`] on whoever talks to it
//! next; there is no retry.

pub mod collective;
pub mod fabric;
pub mod pipeline;

pub use collective::Collective;
pub use fabric::CommError;
pub use pipeline::Pipeline;
