use crate::handler::HandlerChain;
use mesh_discovery_core::Event;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One unit of handler work: a single observed change applied to a chain.
pub(crate) struct Task<T> {
    pub(crate) handlers: Arc<HandlerChain<T>>,
    pub(crate) obj: T,
    pub(crate) event: Event,
}

/// The producer half of an event queue.
pub struct QueueSender<T>(mpsc::UnboundedSender<Task<T>>);

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> QueueSender<T> {
    pub fn push(&self, handlers: Arc<HandlerChain<T>>, obj: T, event: Event) {
        if self
            .0
            .send(Task {
                handlers,
                obj,
                event,
            })
            .is_err()
        {
            tracing::warn!(%event, "event queue closed; dropping change");
        }
    }
}

/// A task queue with a single consumer, so that handler application is
/// serialized in arrival order no matter how many watch tasks produce
/// events.
pub struct EventQueue<T> {
    rx: mpsc::UnboundedReceiver<Task<T>>,
}

pub fn channel<T>() -> (QueueSender<T>, EventQueue<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueSender(tx), EventQueue { rx })
}

impl<T> EventQueue<T> {
    /// Applies tasks one at a time until every sender is dropped and the
    /// queue is drained.
    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            task.handlers.apply(&task.obj, task.event);
        }
    }
}
