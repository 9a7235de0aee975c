//! memlift-notify — best-effort platform notification.
//!
//! After a remediation mutates a worker service, the owning platform is
//! told the worker's new sizing (or that it was paused) so the challenge
//! host can be informed. Notification failures are logged and never
//! affect the remediation result.

pub mod error;
pub mod notifier;
pub mod platform;

pub use error::{NotifyError, NotifyResult};
pub use notifier::{PlatformNotifier, RecordingNotifier, WorkerUpdate, notify_evalai_api};
pub use platform::HttpNotifier;
