use std::collections::BTreeMap;

use crate::ids::{FEPortName, Scope};

/// L4 descriptor for one named port on a `Service`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortConfig {
    pub port: u16,
    pub protocol: crate::ids::Protocol,
}

/// A single node-port binding: the frontend it's exposed on and its scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodePortEntry {
    pub frontend: String,
    pub scope: Scope,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
    ExternalName,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TrafficPolicy {
    #[default]
    Cluster,
    Local,
}

/// One cluster service: a virtual IP/port set fronting a pool of backends.
///
/// `PartialEq` is the deep-equality operator the cache uses to suppress
/// no-op upserts; it must never false-positive (see `correlate`'s `ready`
/// contract, which depends on state actually changing).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Service {
    pub frontend_ips: Vec<String>,
    pub ports: BTreeMap<FEPortName, PortConfig>,
    pub node_ports: BTreeMap<FEPortName, Vec<NodePortEntry>>,
    pub service_type: ServiceType,
    pub traffic_policy: TrafficPolicy,
    pub topology_aware: bool,
    pub include_external: bool,
    pub shared: bool,
}

impl Service {
    pub fn new(service_type: ServiceType) -> Self {
        Self {
            service_type,
            ..Default::default()
        }
    }

    pub fn with_frontend_ip(mut self, ip: impl Into<String>) -> Self {
        self.frontend_ips.push(ip.into());
        self
    }

    pub fn with_port(mut self, name: impl Into<String>, config: PortConfig) -> Self {
        self.ports.insert(FEPortName(name.into()), config);
        self
    }

    pub fn topology_aware(mut self, yes: bool) -> Self {
        self.topology_aware = yes;
        self
    }

    pub fn traffic_policy(mut self, policy: TrafficPolicy) -> Self {
        self.traffic_policy = policy;
        self
    }

    pub fn include_external(mut self, yes: bool) -> Self {
        self.include_external = yes;
        self
    }

    pub fn shared(mut self, yes: bool) -> Self {
        self.shared = yes;
        self
    }
}

/// A remote cluster's view of one of its own services, as federated inbound.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterService {
    pub cluster: String,
    pub namespace: String,
    pub name: String,
    pub backends: BTreeMap<String, crate::entities::Backend>,
    pub shared: bool,
    pub include_external: bool,
}

impl ClusterService {
    pub fn service_id(&self) -> crate::ids::ServiceID {
        crate::ids::ServiceID::new(self.namespace.clone(), self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_equal_services_with_same_fields_are_equal() {
        let a = Service::new(ServiceType::ClusterIP).with_frontend_ip("10.0.0.1");
        let b = Service::new(ServiceType::ClusterIP).with_frontend_ip("10.0.0.1");
        assert_eq!(a, b);
    }

    #[test]
    fn differing_topology_awareness_breaks_equality() {
        let a = Service::new(ServiceType::ClusterIP).topology_aware(true);
        let b = Service::new(ServiceType::ClusterIP).topology_aware(false);
        assert_ne!(a, b);
    }
}
