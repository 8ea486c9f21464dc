use crate::{
    handler::HandlerChain,
    metrics::EventMetrics,
    queue::QueueSender,
    resource::EndpointResource,
    store::{ObjectKey, ObjectStore},
};
use mesh_discovery_core::Event;
use std::sync::Arc;

/// A change delivered by the watcher substrate.
#[derive(Clone, Debug)]
pub enum WatchEvent<T> {
    Added(T),
    Updated { old: T, new: T },
    Deleted(Deletion<T>),
}

/// The payload of a delete: the final object state, or a tombstone when the
/// watcher lost track of the object before delivery.
#[derive(Clone, Debug)]
pub enum Deletion<T> {
    Object(T),
    Tombstone { key: ObjectKey, object: Option<T> },
}

/// Binds a resource watch to a handler chain through the event queue.
///
/// Maintains the object cache the read paths are served from, counts every
/// observed event, and drops updates whose semantic payload is unchanged so
/// that metadata churn never reaches the handlers.
pub struct CacheHandler<T: EndpointResource> {
    store: Arc<ObjectStore<T>>,
    chain: Arc<HandlerChain<T>>,
    queue: QueueSender<T>,
    metrics: EventMetrics,
}

impl<T: EndpointResource> CacheHandler<T> {
    pub(crate) fn new(
        store: Arc<ObjectStore<T>>,
        chain: Arc<HandlerChain<T>>,
        queue: QueueSender<T>,
        metrics: EventMetrics,
    ) -> Self {
        Self {
            store,
            chain,
            queue,
            metrics,
        }
    }

    pub fn handle(&self, event: WatchEvent<T>) {
        match event {
            WatchEvent::Added(obj) => {
                self.metrics.incr(T::KIND, "add");
                self.store.upsert(obj.object_key(), obj.clone());
                self.queue.push(self.chain.clone(), obj, Event::Add);
            }
            WatchEvent::Updated { old, new } => {
                if old.semantic_eq(&new) {
                    self.metrics.incr(T::KIND, "updatesame");
                    return;
                }
                self.metrics.incr(T::KIND, "update");
                self.store.upsert(new.object_key(), new.clone());
                self.queue.push(self.chain.clone(), new, Event::Update);
            }
            WatchEvent::Deleted(deletion) => {
                self.metrics.incr(T::KIND, "delete");
                let obj = match deletion {
                    Deletion::Object(obj) => obj,
                    Deletion::Tombstone {
                        object: Some(obj), ..
                    } => obj,
                    Deletion::Tombstone { key, object: None } => {
                        tracing::error!(%key, kind = T::KIND, "tombstone carried no object; dropping delete");
                        return;
                    }
                };
                self.store.remove(&obj.object_key());
                self.queue.push(self.chain.clone(), obj, Event::Delete);
            }
        }
    }
}

/// Lets a reflector-style watch drive the cache with keyed apply/delete
/// callbacks. The previous object state is recovered from the cache itself,
/// and a delete for an unknown key surfaces as an empty tombstone.
impl<T: EndpointResource> kubert::index::IndexNamespacedResource<T> for CacheHandler<T> {
    fn apply(&mut self, resource: T) {
        match self.store.get(&resource.object_key()) {
            Some(old) => self.handle(WatchEvent::Updated {
                old,
                new: resource,
            }),
            None => self.handle(WatchEvent::Added(resource)),
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        let key = ObjectKey { namespace, name };
        let object = self.store.get(&key);
        self.handle(WatchEvent::Deleted(Deletion::Tombstone { key, object }));
    }

    fn reset(&mut self, resources: Vec<T>, removed: kubert::index::NamespacedRemoved) {
        for resource in resources {
            self.apply(resource);
        }
        for (namespace, names) in removed {
            for name in names {
                self.delete(namespace.clone(), name);
            }
        }
    }
}
