use mesh_discovery_core::Event;
use parking_lot::RwLock;

type ChangeFn<T> = Box<dyn Fn(&T, Event) -> anyhow::Result<()> + Send + Sync>;

/// An ordered chain of change callbacks.
///
/// Registration is append-only and iteration order is stable, so the
/// notification sink installed at construction always runs first.
pub struct HandlerChain<T> {
    handlers: RwLock<Vec<ChangeFn<T>>>,
}

impl<T> Default for HandlerChain<T> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }
}

impl<T> HandlerChain<T> {
    pub fn append(&self, f: impl Fn(&T, Event) -> anyhow::Result<()> + Send + Sync + 'static) {
        self.handlers.write().push(Box::new(f));
    }

    /// Invokes every handler in registration order. A handler error is
    /// logged and does not stop the rest of the chain.
    pub fn apply(&self, obj: &T, event: Event) {
        for handler in self.handlers.read().iter() {
            if let Err(error) = handler(obj, event) {
                tracing::error!(%event, %error, "change handler failed");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
