//! dcsim-scheduler: Per-tick scheduling strategies for dcsim
//!
//! This crate provides the strategies that hand machines to workloads:
//! - The `Scheduler` trait implemented by every strategy
//! - FIFO allocation with round-robin over parallelizable workloads
//! - Sorting policies (shortest remaining work, seeded random)

pub mod fifo;
pub mod scheduler;
pub mod sorting;

pub use fifo::FifoScheduler;
pub use scheduler::{build_scheduler, Scheduler};
pub use sorting::{RandomPolicy, SortedScheduler, SortingPolicy, SrtfPolicy};
