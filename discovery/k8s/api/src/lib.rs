#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;

pub use self::labels::Labels;
pub use k8s_openapi::api::{
    self,
    core::v1::{EndpointAddress, EndpointSubset, Endpoints, Pod, Service, ServiceSpec},
    discovery::v1::EndpointSlice,
};
pub use k8s_openapi::api::discovery::v1 as discovery;
pub use kube::core::{ObjectMeta, Resource, ResourceExt};

/// The well-known label binding an `EndpointSlice` to the service whose
/// endpoints it shards.
pub const SERVICE_NAME_LABEL: &str = "kubernetes.io/service-name";
