//! Core service-discovery model.
//!
//! Defines the canonical service-instance types produced by the discovery
//! controller, along with the trait seams binding it to the cluster substrate
//! (`PodStore`, `ServiceRegistry`) and to the streaming layer
//! (`DiscoverEndpoints`).

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod instance;
mod mesh;
mod pod;
mod protocol;
mod service;

pub use self::{
    instance::ServiceInstance,
    mesh::MeshConfig,
    pod::{PodInfo, PodStore},
    protocol::Protocol,
    service::{MeshService, ServiceKey, ServicePort, ServiceRegistry},
};
use anyhow::Result;
use mesh_discovery_k8s_api::Labels;
use std::sync::Arc;

/// The kind of change observed for a watched resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    Add,
    Update,
    Delete,
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Add => "add".fmt(f),
            Event::Update => "update".fmt(f),
            Event::Delete => "delete".fmt(f),
        }
    }
}

/// A callback invoked whenever a service's endpoints change.
///
/// Errors are logged by the caller and do not stop later handlers.
pub type InstanceHandler = Arc<dyn Fn(&ServiceKey, Event) -> Result<()> + Send + Sync>;

/// A uniform read API over either endpoint representation.
///
/// The backing representation is chosen at construction and fixed for the
/// life of the source.
pub trait EndpointSource: Send + Sync {
    /// The resource kind backing this source, for logs and metrics.
    fn kind(&self) -> &'static str;

    /// Returns the instances binding backends to `service` on the service
    /// port numbered `port`.
    ///
    /// Backends whose pod labels do not contain at least one of the maps in
    /// `filter` are omitted; an empty `filter` admits everything.
    fn instances_by_port(
        &self,
        service: &MeshService,
        port: u16,
        filter: &[Labels],
    ) -> Vec<ServiceInstance>;

    /// Returns instances for every known endpoint record, ordering records
    /// in `proxy_namespace` before all others.
    fn endpoint_instances(&self, proxy_namespace: &str) -> Vec<ServiceInstance>;

    /// Appends `handler` to the chain invoked on every observed change.
    fn subscribe(&self, handler: InstanceHandler);
}

/// Models service-instance discovery for the streaming layer.
#[async_trait::async_trait]
pub trait DiscoverEndpoints {
    async fn instances_by_port(
        &self,
        service: &MeshService,
        port: u16,
        filter: &[Labels],
    ) -> Result<Vec<ServiceInstance>>;

    async fn endpoint_instances(&self, proxy_namespace: &str) -> Result<Vec<ServiceInstance>>;
}
