use crate::{ServiceKey, ServicePort};
use mesh_discovery_k8s_api::Labels;
use std::net::IpAddr;

/// A single (address, service port) binding of a backend to a service.
///
/// Instances are derived per query from the endpoint caches and are never
/// stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceInstance {
    /// The backend's address.
    pub address: IpAddr,

    /// The port the backend actually listens on.
    pub endpoint_port: u16,

    /// The service port this backend serves.
    pub service_port: ServicePort,

    /// The service this instance belongs to.
    pub service: ServiceKey,

    /// The service's stable hostname.
    pub hostname: String,

    /// Labels of the backing pod; empty when the pod is unknown.
    pub labels: Labels,

    /// Zone/region of the backing pod, for traffic affinity.
    pub locality: String,

    /// Service account the backing pod runs as.
    pub service_account: String,

    /// Telemetry attribution UID, set only when the mesh has a mixer
    /// endpoint configured.
    pub uid: Option<String>,

    /// The network the backend is reachable on.
    pub network: Option<String>,

    /// Whether the backend's sidecar is ready to terminate mutual TLS.
    pub mtls_ready: bool,
}
