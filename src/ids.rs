//! Identifiers and addresses: the value types every other module keys off of.

use std::fmt;

/// Uniquely names a service within a cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceID {
    pub namespace: String,
    pub name: String,
}

impl ServiceID {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ServiceID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Names one endpoint slice belonging to a service.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointSliceID {
    pub service_id: ServiceID,
    pub slice_name: String,
}

impl EndpointSliceID {
    pub fn new(service_id: ServiceID, slice_name: impl Into<String>) -> Self {
        Self {
            service_id,
            slice_name: slice_name.into(),
        }
    }
}

impl fmt::Display for EndpointSliceID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service_id, self.slice_name)
    }
}

/// L4 transport protocol. `None` is used by [`FrontendList::loose_match`] to mean
/// "match any protocol known to this cache".
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
    /// Wildcard used only on the query side, never stored.
    None,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Sctp => "SCTP",
            Protocol::None => "*",
        };
        f.write_str(s)
    }
}

/// All protocols a frontend can concretely be stored under, in the fixed
/// probe order `loose_match` uses when the caller doesn't care which one hits.
pub const KNOWN_PROTOCOLS: [Protocol; 3] = [Protocol::Tcp, Protocol::Udp, Protocol::Sctp];

/// Where a frontend is reachable from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    External,
    Internal,
}

/// An (ip, port, protocol, scope) tuple through which a service is reached.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct L3n4Addr {
    pub ip: String,
    pub port: u16,
    pub protocol: Protocol,
    pub scope: Scope,
}

impl L3n4Addr {
    pub fn new(ip: impl Into<String>, port: u16, protocol: Protocol, scope: Scope) -> Self {
        Self {
            ip: ip.into(),
            port,
            protocol,
            scope,
        }
    }

    /// The string key a [`FrontendList`](crate::entities::FrontendList) stores frontends under:
    /// protocol-qualified so same-IP/port entries of different protocols don't collide.
    pub fn frontend_key(ip: &str, port: u16, protocol: Protocol) -> String {
        format!("{ip}:{port}/{protocol}")
    }
}

impl fmt::Display for L3n4Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.ip, self.port, self.protocol)
    }
}

/// The name of a port as declared on a `Service` (e.g. `"http"`), used to line up
/// `Service::ports`/`node_ports` entries with backend port entries in `Endpoints`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FEPortName(pub String);

impl From<&str> for FEPortName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for FEPortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
