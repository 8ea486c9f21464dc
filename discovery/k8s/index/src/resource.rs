use crate::store::ObjectKey;
use mesh_discovery_core::ServiceKey;
use mesh_discovery_k8s_api::{self as k8s, ResourceExt};

/// A watched endpoint representation.
///
/// Implementations tie a Kubernetes resource to the service it backs and
/// define which changes are semantic, as opposed to metadata churn from
/// external controllers bumping resource versions.
pub trait EndpointResource: Clone + Send + Sync + 'static {
    /// Kind label used in logs and metrics.
    const KIND: &'static str;

    fn object_key(&self) -> ObjectKey;

    /// The service whose endpoints this object carries, when determinable.
    fn service_key(&self) -> Option<ServiceKey>;

    /// Compares the semantic payload, ignoring metadata-only fields.
    fn semantic_eq(&self, other: &Self) -> bool;
}

impl EndpointResource for k8s::Endpoints {
    const KIND: &'static str = "endpoints";

    fn object_key(&self) -> ObjectKey {
        ObjectKey {
            namespace: self.namespace().unwrap_or_default(),
            name: self.name_unchecked(),
        }
    }

    // Coarse endpoints are named after the service they back.
    fn service_key(&self) -> Option<ServiceKey> {
        Some(ServiceKey::new(
            self.namespace().unwrap_or_default(),
            self.name_unchecked(),
        ))
    }

    fn semantic_eq(&self, other: &Self) -> bool {
        self.subsets == other.subsets
    }
}

impl EndpointResource for k8s::EndpointSlice {
    const KIND: &'static str = "endpointslice";

    fn object_key(&self) -> ObjectKey {
        ObjectKey {
            namespace: self.namespace().unwrap_or_default(),
            name: self.name_unchecked(),
        }
    }

    fn service_key(&self) -> Option<ServiceKey> {
        let namespace = self.namespace().unwrap_or_default();
        self.labels()
            .get(k8s::SERVICE_NAME_LABEL)
            .map(|name| ServiceKey::new(namespace, name))
    }

    fn semantic_eq(&self, other: &Self) -> bool {
        self.address_type == other.address_type
            && self.endpoints == other.endpoints
            && self.ports == other.ports
    }
}
