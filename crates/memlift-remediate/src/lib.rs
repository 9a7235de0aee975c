//! memlift-remediate — reacts to out-of-memory task stops.
//!
//! When a worker task is stopped by the OOM killer, the handler looks up
//! the worker's service, checks that the event is not a replay for an
//! already-replaced revision, and moves the service one memory tier up by
//! registering a resized task definition and redeploying on it. At the top
//! tier, or when any mutation fails, the service is halted (desired count
//! zero) so it stops crash-looping.
//!
//! # Architecture
//!
//! ```text
//!   ClusterEvent
//!        │
//!        ▼
//!   classify ── resolve ── planner ── cloner ── executor
//!                  │                     │          │
//!                  └──── ControlPlane ───┴──────────┘
//!                                │
//!                      notify (PlatformNotifier)
//! ```

pub mod classify;
pub mod cloner;
pub mod executor;
pub mod handler;
pub mod resolve;

pub use classify::{OOM_EXIT_CODE, is_oom_event, is_stopped_event};
pub use cloner::{clone_from_snapshot, clone_task_definition_with_memory};
pub use executor::{scale_service_to_zero, update_service_with_new_task_def};
pub use handler::{Outcome, RemediationHandler};
pub use resolve::{
    Freshness, check_freshness, get_challenge_pk_from_service, get_service_name_from_task,
    is_stale_event,
};
