use mesh_discovery_core::{
    MeshConfig, MeshService, PodInfo, PodStore, ServiceInstance, ServiceKey, ServicePort,
    ServiceRegistry,
};
use mesh_discovery_k8s_api::Labels;
use std::{net::IpAddr, sync::Arc};

/// The slice of controller state a source needs: pod lookup, service
/// lookup, and mesh settings.
///
/// Sources hold this instead of the controller itself, so neither owns the
/// other.
#[derive(Clone)]
pub struct SourceContext {
    pods: Arc<dyn PodStore>,
    services: Arc<dyn ServiceRegistry>,
    mesh: Arc<MeshConfig>,
}

impl SourceContext {
    pub fn new(
        pods: Arc<dyn PodStore>,
        services: Arc<dyn ServiceRegistry>,
        mesh: Arc<MeshConfig>,
    ) -> Self {
        Self {
            pods,
            services,
            mesh,
        }
    }

    /// Resolves a backend address against the pod store. A miss is served
    /// as an empty-metadata backend, not an error.
    pub(crate) fn pod(&self, ip: IpAddr) -> Option<PodInfo> {
        let pod = self.pods.pod_by_ip(ip);
        if pod.is_none() {
            tracing::info!(%ip, "no pod found for endpoint address");
        }
        pod
    }

    pub(crate) fn service(&self, key: &ServiceKey) -> Option<MeshService> {
        self.services.service(key)
    }

    /// Builds one instance for a matched (address, port) pair.
    pub(crate) fn instance(
        &self,
        service: &MeshService,
        service_port: &ServicePort,
        address: IpAddr,
        endpoint_port: u16,
        pod: Option<&PodInfo>,
    ) -> ServiceInstance {
        let uid = match (pod, self.mesh.mixer_enabled()) {
            (Some(pod), true) => Some(format!("kubernetes://{}.{}", pod.name, pod.namespace)),
            _ => None,
        };
        ServiceInstance {
            address,
            endpoint_port,
            service_port: service_port.clone(),
            service: service.key(),
            hostname: service.hostname.clone(),
            labels: pod.map(|p| p.labels.clone()).unwrap_or_default(),
            locality: pod.map(|p| p.locality.clone()).unwrap_or_default(),
            service_account: pod.map(|p| p.service_account.clone()).unwrap_or_default(),
            uid,
            network: self.mesh.network.clone(),
            mtls_ready: pod.map(|p| p.mtls_ready).unwrap_or(false),
        }
    }
}

/// Applies a label filter: a backend passes when its pod labels contain at
/// least one of the filter maps. An empty filter admits everything,
/// including backends without a resolved pod.
pub(crate) fn filter_admits(filter: &[Labels], pod: Option<&PodInfo>) -> bool {
    if filter.is_empty() {
        return true;
    }
    match pod {
        Some(pod) => filter.iter().any(|f| pod.labels.contains(f)),
        None => false,
    }
}

/// Orders items admitted by `is_same` before all others, preserving
/// relative order within each partition.
pub(crate) fn namespace_first<T>(items: Vec<T>, is_same: impl Fn(&T) -> bool) -> Vec<T> {
    let (mut same, other): (Vec<T>, Vec<T>) = items.into_iter().partition(is_same);
    same.extend(other);
    same
}

pub(crate) fn parse_ip(addr: &str) -> Option<IpAddr> {
    match addr.parse() {
        Ok(ip) => Some(ip),
        Err(error) => {
            tracing::warn!(%addr, %error, "skipping unparseable endpoint address");
            None
        }
    }
}
