use crate::{
    handler::HandlerChain,
    resource::EndpointResource,
    source::{filter_admits, namespace_first, parse_ip, SourceContext},
    store::ObjectStore,
};
use mesh_discovery_core::{
    EndpointSource, InstanceHandler, MeshService, ServiceInstance, ServiceKey,
};
use mesh_discovery_k8s_api::{self as k8s, discovery, ResourceExt};
use std::sync::Arc;

/// Serves instance queries from sharded `EndpointSlice` records.
///
/// One service may be backed by many slices, discovered through the
/// `kubernetes.io/service-name` label. Slices are consumed in the order the
/// index returns them and their instances concatenated.
pub struct SliceSource {
    store: Arc<ObjectStore<k8s::EndpointSlice>>,
    chain: Arc<HandlerChain<k8s::EndpointSlice>>,
    ctx: SourceContext,
}

impl SliceSource {
    pub(crate) fn new(
        store: Arc<ObjectStore<k8s::EndpointSlice>>,
        chain: Arc<HandlerChain<k8s::EndpointSlice>>,
        ctx: SourceContext,
    ) -> Self {
        Self { store, chain, ctx }
    }

    fn slices_for(&self, key: &ServiceKey) -> Vec<k8s::EndpointSlice> {
        self.store
            .select(|slice| slice.service_key().as_ref() == Some(key))
    }

    fn slice_instances(
        &self,
        slice: &k8s::EndpointSlice,
        service: &MeshService,
        filter: &[k8s::Labels],
        service_port_number: Option<u16>,
        out: &mut Vec<ServiceInstance>,
    ) {
        for port in slice.ports.iter().flatten() {
            let Some(service_port) = service.match_endpoint_port(port.name.as_deref()) else {
                continue;
            };
            if let Some(number) = service_port_number {
                if service_port.port != number {
                    continue;
                }
            }
            let Some(endpoint_port) = port.port.and_then(|p| u16::try_from(p).ok()) else {
                continue;
            };
            for endpoint in &slice.endpoints {
                if !ready(endpoint) {
                    continue;
                }
                for address in &endpoint.addresses {
                    let Some(ip) = parse_ip(address) else {
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
    }
}

/// An endpoint with unknown readiness is served; only an explicit
/// not-ready condition excludes it.
fn ready(endpoint: &discovery::Endpoint) -> bool {
    endpoint
        .conditions
        .as_ref()
        .and_then(|c| c.ready)
        .unwrap_or(true)
}

impl EndpointSource for SliceSource {
    fn kind(&self) -> &'static str {
        <k8s::EndpointSlice as EndpointResource>::KIND
    }

    fn instances_by_port(
        &self,
        service: &MeshService,
        port: u16,
        filter: &[k8s::Labels],
    ) -> Vec<ServiceInstance> {
        if service.port_by_number(port).is_none() {
            return Vec::new();
        }
        let mut out = Vec::new();
        for slice in self.slices_for(&service.key()) {
            self.slice_instances(&slice, service, filter, Some(port), &mut out);
        }
        out
    }

    fn endpoint_instances(&self, proxy_namespace: &str) -> Vec<ServiceInstance> {
        let records = namespace_first(self.store.list(), |slice: &k8s::EndpointSlice| {
            slice.namespace().as_deref() == Some(proxy_namespace)
        });
        let mut out = Vec::new();
        for slice in &records {
            let Some(key) = slice.service_key() else {
                tracing::debug!(slice = %slice.name_unchecked(), "endpoint slice without a service label");
                continue;
            };
            let Some(service) = self.ctx.service(&key) else {
                tracing::info!(service = %key, "endpoint slice without a known service");
                continue;
            };
            self.slice_instances(slice, &service, &[], None, &mut out);
        }
        out
    }

    fn subscribe(&self, handler: InstanceHandler) {
        self.chain.append(move |slice: &k8s::EndpointSlice, event| {
            match slice.service_key() {
                Some(key) => handler(&key, event),
                None => {
                    tracing::debug!(slice = %slice.name_unchecked(), "ignoring change to unlabeled endpoint slice");
                    Ok(())
                }
            }
        });
    }
}
