use crate::{
    handler::HandlerChain,
    resource::EndpointResource,
    source::{filter_admits, namespace_first, parse_ip, SourceContext},
    store::{ObjectKey, ObjectStore},
};
use mesh_discovery_core::{EndpointSource, InstanceHandler, MeshService, ServiceInstance};
use mesh_discovery_k8s_api::{self as k8s, ResourceExt};
use std::sync::Arc;

/// Serves instance queries from coarse per-service `Endpoints` records.
///
/// One record carries every ready backend of its service, grouped into
/// subsets of addresses sharing a port list. Not-ready addresses are never
/// projected into instances.
pub struct EndpointsSource {
    store: Arc<ObjectStore<k8s::Endpoints>>,
    chain: Arc<HandlerChain<k8s::Endpoints>>,
    ctx: SourceContext,
}

impl EndpointsSource {
    pub(crate) fn new(
        store: Arc<ObjectStore<k8s::Endpoints>>,
        chain: Arc<HandlerChain<k8s::Endpoints>>,
        ctx: SourceContext,
    ) -> Self {
        Self { store, chain, ctx }
    }

    /// Projects every (subset, address, port) triple of one record,
    /// resolving ports against the owning service's port table.
    fn record_instances(&self, ep: &k8s::Endpoints, out: &mut Vec<ServiceInstance>) {
        let Some(key) = ep.service_key() else {
            return;
        };
        let Some(service) = self.ctx.service(&key) else {
            tracing::info!(service = %key, "endpoints without a known service");
            return;
        };
        for subset in ep.subsets.iter().flatten() {
            for port in subset.ports.iter().flatten() {
                let Some(service_port) = service.match_endpoint_port(port.name.as_deref())
                else {
                    continue;
                };
                let Ok(endpoint_port) = u16::try_from(port.port) else {
                    continue;
                };
                for address in subset.addresses.iter().flatten() {
                    let Some(ip) = parse_ip(&address.ip) else {
                        continue;
                    };
                    let pod = self.ctx.pod(ip);
                    out.push(self.ctx.instance(
                        &service,
                        service_port,
                        ip,
                        endpoint_port,
                        pod.as_ref(),
                    ));
                }
            }
        }
    }
}

impl EndpointSource for EndpointsSource {
    fn kind(&self) -> &'static str {
        <k8s::Endpoints as EndpointResource>::KIND
    }

    fn instances_by_port(
        &self,
        service: &MeshService,
        port: u16,
        filter: &[k8s::Labels],
    ) -> Vec<ServiceInstance> {
        let key = ObjectKey {
            namespace: service.namespace.clone(),
            name: service.name.clone(),
        };
        let Some(ep) = self.store.get(&key) else {
            return Vec::new();
        };
        let Some(service_port) = service.port_by_number(port) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for subset in ep.subsets.iter().flatten() {
            for ep_port in subset.ports.iter().flatten() {
                if service.match_endpoint_port(ep_port.name.as_deref()) != Some(service_port) {
                    continue;
                }
                let Ok(endpoint_port) = u16::try_from(ep_port.port) else {
                    continue;
                };
                for address in subset.addresses.iter().flatten() {
                    let Some(ip) = parse_ip(&address.ip) else {
                        continue;
                    };
                    let pod = self.ctx.pod(ip);
                    if !filter_admits(filter, pod.as_ref()) {
                        continue;
                    }
                    out.push(self.ctx.instance(
                        service,
                        service_port,
                        ip,
                        endpoint_port,
                        pod.as_ref(),
                    ));
                }
            }
        }
        out
    }

    fn endpoint_instances(&self, proxy_namespace: &str) -> Vec<ServiceInstance> {
        let records = namespace_first(self.store.list(), |ep: &k8s::Endpoints| {
            ep.namespace().as_deref() == Some(proxy_namespace)
        });
        let mut out = Vec::new();
        for ep in &records {
            self.record_instances(ep, &mut out);
        }
        out
    }

    fn subscribe(&self, handler: InstanceHandler) {
        self.chain.append(move |ep: &k8s::Endpoints, event| {
            match ep.service_key() {
                Some(key) => handler(&key, event),
                None => Ok(()),
            }
        });
    }
}
