//! Event classification.

use memlift_core::{STOPPED_STATUS, TaskStateChange};

/// Exit code of a container killed by SIGKILL, which is how the kernel
/// OOM killer terminates it.
pub const OOM_EXIT_CODE: i32 = 137;

/// Lowercase phrases matched case-insensitively against the stop reason.
const OOM_PHRASES: [&str; 2] = ["outofmemory", "out of memory"];

/// Matched case-sensitively, so words like "room" do not count.
const OOM_TOKEN: &str = "OOM";

/// Whether the task has reached `STOPPED`.
pub fn is_stopped_event(detail: &TaskStateChange) -> bool {
    detail.last_status == STOPPED_STATUS
}

/// Whether the task stopped because it ran out of memory: the stop reason
/// names it, or any container exited with 137.
pub fn is_oom_event(detail: &TaskStateChange) -> bool {
    let reason = &detail.stopped_reason;
    let lower = reason.to_ascii_lowercase();
    if reason.contains(OOM_TOKEN) || OOM_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    detail
        .containers
        .iter()
        .any(|c| c.exit_code == Some(OOM_EXIT_CODE))
}
