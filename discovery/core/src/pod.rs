use mesh_discovery_k8s_api::Labels;
use std::net::IpAddr;

/// Pod metadata resolved from a backend address.
#[derive(Clone, Debug, Default)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub labels: Labels,
    pub locality: String,
    pub service_account: String,
    pub mtls_ready: bool,
}

/// Read-only pod lookup provided by the cluster substrate.
///
/// Lookups may miss: a pod may not yet be indexed when its endpoint
/// appears. Callers treat a miss as an empty-metadata backend, not an
/// error.
pub trait PodStore: Send + Sync {
    fn pod_by_ip(&self, ip: IpAddr) -> Option<PodInfo>;
}
