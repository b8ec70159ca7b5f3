//! A Tokio-based bounded task pool with lazily spawned workers, rendezvous
//! handoff between submitters and workers, and a draining shutdown that never
//! drops accepted work.

mod error;
mod intake;
mod pool;
mod task;
mod worker;

pub use error::PoolError;
pub use pool::{PoolState, TaskPool};
