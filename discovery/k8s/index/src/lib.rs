//! Endpoint discovery aggregation.
//!
//! Watches cluster endpoint state in either of two representations (coarse
//! per-service `Endpoints` records, or sharded `EndpointSlice`s), projects it
//! into the canonical service-instance model, and serves per-service instance
//! queries under churn.
//!
//! Watch events flow through a cache handler that suppresses metadata-only
//! churn, then through a single-consumer event queue that serializes an
//! ordered chain of change handlers. Read paths are served directly from the
//! thread-safe object cache and never mutate shared state.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cache;
mod controller;
mod endpoint_slice;
mod endpoints;
mod handler;
mod metrics;
mod queue;
mod resource;
mod source;
mod store;

pub use self::{
    cache::{CacheHandler, Deletion, WatchEvent},
    controller::{CacheBinding, Controller, EndpointMode},
    endpoint_slice::SliceSource,
    endpoints::EndpointsSource,
    handler::HandlerChain,
    metrics::EventMetrics,
    queue::{channel, EventQueue, QueueSender},
    resource::EndpointResource,
    source::SourceContext,
    store::{ObjectKey, ObjectStore},
};
