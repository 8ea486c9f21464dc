use crate::Protocol;

/// Identifies a service by name and namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub namespace: String,
    pub name: String,
}

/// One named port exposed by a service.
///
/// Within a service, ports are unique by name; the name may be empty only
/// when the service has exactly one port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServicePort {
    pub name: String,
    pub port: u16,
    pub protocol: Protocol,
}

/// The canonical model of a mesh service: a stable hostname plus a port
/// table against which endpoint ports are resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshService {
    pub name: String,
    pub namespace: String,
    pub hostname: String,
    pub ports: Vec<ServicePort>,
}

/// Read-only service lookup provided by the cluster substrate.
pub trait ServiceRegistry: Send + Sync {
    fn service(&self, key: &ServiceKey) -> Option<MeshService>;
}

// === impl ServiceKey ===

impl ServiceKey {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.name, self.namespace)
    }
}

// === impl MeshService ===

impl MeshService {
    pub fn new(
        namespace: impl ToString,
        name: impl ToString,
        domain_suffix: &str,
        ports: Vec<ServicePort>,
    ) -> Self {
        let name = name.to_string();
        let namespace = namespace.to_string();
        let hostname = format!("{}.{}.svc.{}", name, namespace, domain_suffix);
        Self {
            name,
            namespace,
            hostname,
            ports,
        }
    }

    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(&self.namespace, &self.name)
    }

    pub fn port_by_number(&self, port: u16) -> Option<&ServicePort> {
        self.ports.iter().find(|p| p.port == port)
    }

    /// Resolves an endpoint port name against this service's port table.
    ///
    /// An unnamed endpoint port matches only when the service has exactly
    /// one port.
    pub fn match_endpoint_port(&self, name: Option<&str>) -> Option<&ServicePort> {
        match name {
            None | Some("") => {
                if self.ports.len() == 1 {
                    self.ports.first()
                } else {
                    None
                }
            }
            Some(name) => self.ports.iter().find(|p| p.name == name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc(ports: Vec<ServicePort>) -> MeshService {
        MeshService::new("default", "web", "cluster.local", ports)
    }

    fn port(name: &str, port: u16) -> ServicePort {
        ServicePort {
            name: name.to_string(),
            port,
            protocol: Protocol::Tcp,
        }
    }

    #[test]
    fn hostname_is_fully_qualified() {
        assert_eq!(svc(vec![]).hostname, "web.default.svc.cluster.local");
    }

    #[test]
    fn unnamed_endpoint_port_requires_single_service_port() {
        let single = svc(vec![port("", 80)]);
        assert_eq!(single.match_endpoint_port(None), Some(&single.ports[0]));
        assert_eq!(single.match_endpoint_port(Some("")), Some(&single.ports[0]));

        let multi = svc(vec![port("http", 80), port("grpc", 81)]);
        assert_eq!(multi.match_endpoint_port(None), None);
        assert_eq!(multi.match_endpoint_port(Some("")), None);
    }

    #[test]
    fn named_endpoint_port_matches_by_name() {
        let multi = svc(vec![port("http", 80), port("grpc", 81)]);
        assert_eq!(multi.match_endpoint_port(Some("grpc")), Some(&multi.ports[1]));
        assert_eq!(multi.match_endpoint_port(Some("admin")), None);
    }
}
