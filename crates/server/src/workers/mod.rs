//! Single-task workers that own their state and serve requests over
//! channels.

pub mod parts;
pub mod pull;

pub use parts::{PartsCache, PartsHandle, PartsQuery, run_parts_provider, spawn_parts_provider};
pub use pull::{PullHandle, Puller, run_pull_worker, spawn_pull_worker};
