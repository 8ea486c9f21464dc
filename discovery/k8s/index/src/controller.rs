use crate::{
    cache::CacheHandler,
    endpoint_slice::SliceSource,
    endpoints::EndpointsSource,
    handler::HandlerChain,
    metrics::EventMetrics,
    queue,
    source::SourceContext,
    store::ObjectStore,
};
use anyhow::Result;
use mesh_discovery_core::{
    DiscoverEndpoints, EndpointSource, InstanceHandler, MeshConfig, MeshService, PodStore,
    ServiceInstance, ServiceRegistry,
};
use mesh_discovery_k8s_api::{self as k8s, Labels};
use parking_lot::RwLock;
use std::{future::Future, pin::Pin, sync::Arc};

/// Which endpoint representation a controller consumes.
///
/// Chosen at construction and fixed for the controller's lifetime.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum EndpointMode {
    /// Coarse per-service `Endpoints` records.
    #[default]
    Endpoints,
    /// Sharded `EndpointSlice` records.
    EndpointSlice,
}

impl std::fmt::Display for EndpointMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointMode::Endpoints => "endpoints".fmt(f),
            EndpointMode::EndpointSlice => "endpointslice".fmt(f),
        }
    }
}

impl std::str::FromStr for EndpointMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("endpoints") {
            Ok(EndpointMode::Endpoints)
        } else if s.eq_ignore_ascii_case("endpointslice") {
            Ok(EndpointMode::EndpointSlice)
        } else {
            anyhow::bail!("unknown endpoint mode: {}", s)
        }
    }
}

/// The watch-side handle for a controller's cache, shaped for
/// `kubert`-style reflectors.
pub enum CacheBinding {
    Endpoints(Arc<RwLock<CacheHandler<k8s::Endpoints>>>),
    EndpointSlices(Arc<RwLock<CacheHandler<k8s::EndpointSlice>>>),
}

impl CacheBinding {
    pub fn endpoints(&self) -> Option<&Arc<RwLock<CacheHandler<k8s::Endpoints>>>> {
        match self {
            CacheBinding::Endpoints(handler) => Some(handler),
            CacheBinding::EndpointSlices(_) => None,
        }
    }

    pub fn endpoint_slices(&self) -> Option<&Arc<RwLock<CacheHandler<k8s::EndpointSlice>>>> {
        match self {
            CacheBinding::EndpointSlices(handler) => Some(handler),
            CacheBinding::Endpoints(_) => None,
        }
    }
}

/// Aggregates watched endpoint state into the canonical service-instance
/// model and serves per-service queries.
pub struct Controller {
    source: Arc<dyn EndpointSource>,
    mode: EndpointMode,
}

impl Controller {
    /// Builds a controller over the chosen endpoint representation.
    ///
    /// `notify` is installed as the first change handler, so every accepted
    /// event triggers a downstream push before any appended handler runs.
    /// The returned future serializes handler application; it completes
    /// once the cache binding is dropped and the queue is drained.
    pub fn new(
        mode: EndpointMode,
        pods: Arc<dyn PodStore>,
        services: Arc<dyn ServiceRegistry>,
        mesh: MeshConfig,
        notify: InstanceHandler,
        metrics: EventMetrics,
    ) -> (Self, CacheBinding, impl Future<Output = ()>) {
        let ctx = SourceContext::new(pods, services, Arc::new(mesh));

        let (source, binding, task) = match mode {
            EndpointMode::Endpoints => {
                let store = Arc::new(ObjectStore::default());
                let chain = Arc::new(HandlerChain::default());
                let (tx, rx) = queue::channel();
                let handler = CacheHandler::new(store.clone(), chain.clone(), tx, metrics);
                let source: Arc<dyn EndpointSource> =
                    Arc::new(EndpointsSource::new(store, chain, ctx));
                let task: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(rx.run());
                (
                    source,
                    CacheBinding::Endpoints(Arc::new(RwLock::new(handler))),
                    task,
                )
            }
            EndpointMode::EndpointSlice => {
                let store = Arc::new(ObjectStore::default());
                let chain = Arc::new(HandlerChain::default());
                let (tx, rx) = queue::channel();
                let handler = CacheHandler::new(store.clone(), chain.clone(), tx, metrics);
                let source: Arc<dyn EndpointSource> =
                    Arc::new(SliceSource::new(store, chain, ctx));
                let task: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(rx.run());
                (
                    source,
                    CacheBinding::EndpointSlices(Arc::new(RwLock::new(handler))),
                    task,
                )
            }
        };

        source.subscribe(notify);
        (Self { source, mode }, binding, task)
    }

    pub fn mode(&self) -> EndpointMode {
        self.mode
    }

    /// Registers a handler invoked after the built-in notification sink.
    pub fn append_instance_handler(&self, handler: InstanceHandler) {
        self.source.subscribe(handler);
    }

    pub fn instances_by_port(
        &self,
        service: &MeshService,
        port: u16,
        filter: &[Labels],
    ) -> Vec<ServiceInstance> {
        self.source.instances_by_port(service, port, filter)
    }

    pub fn endpoint_instances(&self, proxy_namespace: &str) -> Vec<ServiceInstance> {
        self.source.endpoint_instances(proxy_namespace)
    }
}

#[async_trait::async_trait]
impl DiscoverEndpoints for Controller {
    async fn instances_by_port(
        &self,
        service: &MeshService,
        port: u16,
        filter: &[Labels],
    ) -> Result<Vec<ServiceInstance>> {
        Ok(Controller::instances_by_port(self, service, port, filter))
    }

    async fn endpoint_instances(&self, proxy_namespace: &str) -> Result<Vec<ServiceInstance>> {
        Ok(Controller::endpoint_instances(self, proxy_namespace))
    }
}

#[cfg(test)]
mod mode_tests {
    use super::EndpointMode;

    #[test]
    fn parses_modes() {
        assert_eq!(
            "endpoints".parse::<EndpointMode>().unwrap(),
            EndpointMode::Endpoints
        );
        assert_eq!(
            "EndpointSlice".parse::<EndpointMode>().unwrap(),
            EndpointMode::EndpointSlice
        );
        assert!("slices".parse::<EndpointMode>().is_err());
    }
}
