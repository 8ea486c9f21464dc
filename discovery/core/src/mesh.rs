/// Mesh-wide settings that shape instance enrichment.
#[derive(Clone, Debug)]
pub struct MeshConfig {
    /// Address of the telemetry (mixer) endpoint, when one is deployed.
    /// Presence enables `kubernetes://{pod}.{namespace}` instance UIDs.
    pub mixer_address: Option<String>,

    /// The network this cluster's workloads are reachable on.
    pub network: Option<String>,

    /// Suffix used to form service hostnames.
    pub domain_suffix: String,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            mixer_address: None,
            network: None,
            domain_suffix: "cluster.local".to_string(),
        }
    }
}

impl MeshConfig {
    pub fn mixer_enabled(&self) -> bool {
        self.mixer_address.is_some()
    }
}
