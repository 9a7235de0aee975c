//! memlift-planner — discrete memory/cpu tier stepping.
//!
//! Given a workload's current task-level memory, picks the next valid
//! (memory, cpu) sizing from an ordered tier table, or reports that the
//! ceiling has been reached.
//!
//! # Stepping Rule
//!
//! ```text
//! for class in table (ascending cpu):
//!     next = smallest value on class grid (memory_min + k*step) > current
//!     if next <= class.memory_max:
//!         return (next, class.cpu)
//! return None  // ceiling
//! ```
//!
//! The cpu half of the answer is always the table's, never the cpu the
//! task currently runs with. A task sized 8192 MiB / 4096 cpu therefore
//! steps to 9216 / 2048: 9216 MiB only needs the 2048 class.

pub mod tiers;

pub use tiers::{
    DEFAULT_CPU_CLASSES, ResourceTier, TierTable, TierTableError, get_next_memory_cpu_tier,
};
