//! The pure function at the heart of the cache: given the three input maps and
//! the local node's zone label, compute one service's correlated endpoint set.

use std::collections::BTreeMap;

use tracing::warn;

use crate::entities::{EndpointSlices, Endpoints, ExternalEndpoints, Service, TrafficPolicy};
use crate::ids::ServiceID;

/// Builds the correlated `Endpoints` for `id` and reports whether the service
/// is ready to be plumbed downstream.
///
/// A pure function of its arguments: no locks, no I/O besides the one
/// `tracing::warn!` the spec calls for on a cross-cluster IP conflict.
pub fn correlate(
    id: &ServiceID,
    services: &BTreeMap<ServiceID, Service>,
    endpoints: &BTreeMap<ServiceID, EndpointSlices>,
    external_endpoints: &BTreeMap<ServiceID, ExternalEndpoints>,
    topology_enabled: bool,
    self_node_zone_label: &str,
) -> (Endpoints, bool) {
    let svc = services.get(id);

    let local = endpoints.get(id).map(EndpointSlices::get_endpoints);
    let has_local = local.is_some();

    let mut result = match local {
        Some(local) => apply_topology_filter(local, svc, topology_enabled, self_node_zone_label),
        None => Endpoints::new(),
    };

    if let Some(svc) = svc {
        if svc.include_external {
            if let Some(ext) = external_endpoints.get(id) {
                for (cluster, backends) in ext.iter_sorted() {
                    for (ip, backend) in backends.backends.iter() {
                        if result.backends.contains_key(ip) {
                            warn!(
                                service = %id,
                                %cluster,
                                backend_ip = %ip,
                                "conflicting backend IP across clusters; keeping first-seen entry"
                            );
                            continue;
                        }
                        result.insert(ip.clone(), backend.clone());
                    }
                }
            }
        }
    }

    let ready = has_local || !result.is_empty();
    (result, ready)
}

/// Applies zone-aware topology filtering to a service's local (non-external)
/// endpoints. Returns the endpoints unfiltered whenever filtering doesn't
/// apply, any backend lacks zone hints, or the filtered set would be empty.
fn apply_topology_filter(
    local: Endpoints,
    svc: Option<&Service>,
    topology_enabled: bool,
    self_node_zone_label: &str,
) -> Endpoints {
    let applies = topology_enabled
        && !self_node_zone_label.is_empty()
        && svc.is_some_and(|s| s.topology_aware && !matches!(s.traffic_policy, TrafficPolicy::Local));

    if !applies {
        return local;
    }

    let mut filtered = Endpoints::new();
    for (ip, backend) in local.backends.iter() {
        if !backend.has_zone_hints() {
            // All-or-nothing: one hintless backend disables filtering entirely.
            return local;
        }
        if backend.hinted_for_zone(self_node_zone_label) {
            filtered.insert(ip.clone(), backend.clone());
        }
    }

    if filtered.is_empty() {
        // Don't black-hole traffic when nothing matches this zone.
        return local;
    }
    filtered
}
