//! Progress event streaming.
//!
//! Every task event goes to the task's own subscribers and to the
//! pipeline-wide broadcaster.

pub mod subscription;
pub mod task_progress;

pub use subscription::TaskSubscription;
pub use task_progress::{TaskProgressBroadcaster, TaskProgressEvent};
