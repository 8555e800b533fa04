//! Per-task event stream.

use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;

use super::task_progress::TaskProgressEvent;

/// Ordered events for one task.
///
/// The first event is the task's state at subscription time. The stream ends
/// after a terminal event, or without one if the task is removed.
pub struct TaskSubscription {
    receiver: mpsc::UnboundedReceiver<TaskProgressEvent>,
}

impl TaskSubscription {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<TaskProgressEvent>) -> Self {
        Self { receiver }
    }

    /// Next event, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<TaskProgressEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`next`](Self::next).
    pub fn try_next(&mut self) -> Option<TaskProgressEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drains the stream and returns the terminal event, if one arrives.
    pub async fn wait_terminal(mut self) -> Option<TaskProgressEvent> {
        while let Some(event) = self.receiver.recv().await {
            if event.is_terminal() {
                return Some(event);
            }
        }
        None
    }

    pub fn into_stream(self) -> impl Stream<Item = TaskProgressEvent> + Send + 'static {
        stream::unfold(self.receiver, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }
}
