use std::collections::{BTreeMap, BTreeSet};

use crate::ids::FEPortName;

/// One backend instance that can serve traffic for a service.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Backend {
    pub ports: BTreeMap<FEPortName, u16>,
    pub hints_for_zones: BTreeSet<String>,
    pub terminating: bool,
    pub node_name: Option<String>,
}

impl Backend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, name: impl Into<String>, port: u16) -> Self {
        self.ports.insert(FEPortName(name.into()), port);
        self
    }

    pub fn with_zone_hint(mut self, zone: impl Into<String>) -> Self {
        self.hints_for_zones.insert(zone.into());
        self
    }

    pub fn has_zone_hints(&self) -> bool {
        !self.hints_for_zones.is_empty()
    }

    pub fn hinted_for_zone(&self, zone: &str) -> bool {
        self.hints_for_zones.iter().any(|z| z == zone)
    }
}

/// The union of backends correlated for a service: what `correlate` produces
/// and what `ServiceEvent` carries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Endpoints {
    pub backends: BTreeMap<String, Backend>,
}

impl Endpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn insert(&mut self, ip: impl Into<String>, backend: Backend) {
        self.backends.insert(ip.into(), backend);
    }
}

/// Per-service bag of endpoint slices (one per `EndpointSliceID::slice_name`).
///
/// `get_endpoints` unions every slice's backends. Collisions across slices are
/// resolved deterministically by iterating slice names in sorted order, so the
/// slice that sorts last wins on an IP collision.
#[derive(Clone, Debug, Default)]
pub struct EndpointSlices {
    slices: BTreeMap<String, Endpoints>,
}

impl EndpointSlices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Inserts or replaces a slice. Returns `true` if the stored value actually
    /// changed, so the cache can suppress no-op upserts at the slice level too.
    pub fn upsert(&mut self, name: impl Into<String>, eps: Endpoints) -> bool {
        let name = name.into();
        match self.slices.get(&name) {
            Some(existing) if existing == &eps => false,
            _ => {
                self.slices.insert(name, eps);
                true
            }
        }
    }

    /// Removes a slice. Returns `true` if the per-service holder is now empty.
    pub fn delete(&mut self, name: &str) -> bool {
        self.slices.remove(name);
        self.slices.is_empty()
    }

    pub fn get_endpoints(&self) -> Endpoints {
        let mut result = Endpoints::new();
        for (_slice_name, eps) in self.slices.iter() {
            for (ip, backend) in eps.backends.iter() {
                result.insert(ip.clone(), backend.clone());
            }
        }
        result
    }
}
