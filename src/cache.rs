//! The cache engine: the public surface that mutates the three input maps
//! under one reader-writer lock and emits correlated `ServiceEvent`s.

use std::collections::BTreeMap;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, RwLock};

use crate::config::{Config, ZONE_LABEL};
use crate::correlator;
use crate::entities::{EndpointSlices, Endpoints, ExternalEndpoints, FrontendList, Service, ServiceType};
use crate::event::{Action, ServiceEvent, StoppableWaitGroup};
use crate::ids::{EndpointSliceID, FEPortName, L3n4Addr, ServiceID, Scope};
use crate::logging::{debug, info};

#[derive(Default)]
struct State {
    services: BTreeMap<ServiceID, Service>,
    endpoints: BTreeMap<ServiceID, EndpointSlices>,
    external_endpoints: BTreeMap<ServiceID, ExternalEndpoints>,
    self_node_zone_label: String,
}

/// The in-memory, concurrency-safe correlator described by the crate's design
/// notes. One instance is shared by every producer (service/endpoint-slice
/// watchers, the peer-cluster merger, the node-label subscriber) and by
/// whichever consumer drains `events`.
pub struct ServiceCache {
    state: RwLock<State>,
    events_tx: SyncSender<ServiceEvent>,
    config: Config,
}

impl ServiceCache {
    /// Builds a cache and its event receiver. The channel capacity is
    /// `config.k8s_service_cache_size`; a full channel blocks producers
    /// (intentional back-pressure — see `SPEC_FULL.md` §5).
    pub fn new(config: Config) -> (Self, Receiver<ServiceEvent>) {
        let capacity = config.k8s_service_cache_size.max(1);
        let (events_tx, events_rx) = sync_channel(capacity);
        (
            Self {
                state: RwLock::new(State::default()),
                events_tx,
                config,
            },
            events_rx,
        )
    }

    fn correlate_locked(&self, state: &State, id: &ServiceID) -> (Endpoints, bool) {
        correlator::correlate(
            id,
            &state.services,
            &state.endpoints,
            &state.external_endpoints,
            self.config.enable_service_topology,
            &state.self_node_zone_label,
        )
    }

    /// Calls `swg.add()` then blocks sending `event` onto the channel, all
    /// while the caller's lock guard is still held — matching the spec's
    /// "hold the write lock for the entire body, including emission".
    fn emit(
        &self,
        action: Action,
        service_snapshot: Service,
        old_service: Option<Service>,
        state: &State,
        id: &ServiceID,
        swg: &StoppableWaitGroup,
    ) {
        let (endpoints, _ready) = self.correlate_locked(state, id);
        swg.add();
        let event = ServiceEvent {
            action,
            id: id.clone(),
            service: Arc::new(service_snapshot),
            old_service: old_service.map(Arc::new),
            endpoints: Arc::new(endpoints),
            swg: swg.clone(),
        };
        debug!(service = %id, action = ?event.action, "emitting service event");
        // An Err here means every receiver has been dropped; there's nobody
        // left to deliver to, so there's nothing more useful to do than drop
        // the event on the floor rather than poison the critical section.
        let _ = self.events_tx.send(event);
    }

    // ---- mutating operations -------------------------------------------------

    pub fn update_service(&self, id: ServiceID, svc: Service, swg: &StoppableWaitGroup) -> ServiceID {
        let mut state = self.state.write().unwrap();
        if state.services.get(&id) == Some(&svc) {
            debug!(service = %id, "update_service: no-op, deep-equal to previous");
            return id;
        }
        let old = state.services.insert(id.clone(), svc.clone());
        let (_, ready) = self.correlate_locked(&state, &id);
        if ready {
            self.emit(Action::UpdateService, svc, old, &state, &id, swg);
        }
        id
    }

    pub fn delete_service(&self, id: &ServiceID, swg: &StoppableWaitGroup) {
        let mut state = self.state.write().unwrap();
        if let Some(removed) = state.services.remove(id) {
            self.emit(Action::DeleteService, removed, None, &state, id, swg);
        }
    }

    /// Re-emits the current correlated state for `id` without mutating
    /// anything. Takes the read lock only.
    pub fn ensure_service(&self, id: &ServiceID, swg: &StoppableWaitGroup) {
        let state = self.state.read().unwrap();
        if let Some(svc) = state.services.get(id) {
            let (_, ready) = self.correlate_locked(&state, id);
            if ready {
                self.emit(Action::UpdateService, svc.clone(), Some(svc.clone()), &state, id, swg);
            }
        }
    }

    pub fn update_endpoints(
        &self,
        slice_id: EndpointSliceID,
        eps: Endpoints,
        swg: &StoppableWaitGroup,
    ) -> EndpointSliceID {
        let mut state = self.state.write().unwrap();
        let service_id = slice_id.service_id.clone();
        let holder = state.endpoints.entry(service_id.clone()).or_default();
        let changed = holder.upsert(slice_id.slice_name.clone(), eps);
        if !changed {
            debug!(slice = %slice_id, "update_endpoints: no-op, deep-equal to previous");
            return slice_id;
        }

        if let Some(svc) = state.services.get(&service_id).cloned() {
            let (_, ready) = self.correlate_locked(&state, &service_id);
            if ready {
                self.emit(Action::UpdateService, svc, None, &state, &service_id, swg);
            }
        }
        slice_id
    }

    pub fn delete_endpoints(&self, slice_id: &EndpointSliceID, swg: &StoppableWaitGroup) {
        let mut state = self.state.write().unwrap();
        let service_id = slice_id.service_id.clone();

        let mut now_empty = false;
        if let Some(holder) = state.endpoints.get_mut(&service_id) {
            if holder.delete(&slice_id.slice_name) {
                now_empty = true;
            }
        }
        if now_empty {
            state.endpoints.remove(&service_id);
        }

        // Unlike update_endpoints, this fires whenever the service still
        // exists, even if the correlated set is now empty: that transition
        // (Correlated -> ServiceOnly) still needs to reach the datapath.
        if let Some(svc) = state.services.get(&service_id).cloned() {
            self.emit(Action::UpdateService, svc, None, &state, &service_id, swg);
        }
    }

    pub fn merge_external_service_update(
        &self,
        cluster_service: crate::entities::ClusterService,
        swg: &StoppableWaitGroup,
    ) -> ServiceID {
        let id = cluster_service.service_id();
        if cluster_service.cluster == self.config.cluster_name {
            return id;
        }
        let mut state = self.state.write().unwrap();
        let backends = backends_from_cluster_service(&cluster_service);
        let holder = state.external_endpoints.entry(id.clone()).or_default();
        let changed = holder.upsert(cluster_service.cluster.clone(), backends);
        if !changed {
            return id;
        }

        if let Some(svc) = state.services.get(&id).cloned() {
            if svc.shared {
                let (_, ready) = self.correlate_locked(&state, &id);
                if ready {
                    self.emit(Action::UpdateService, svc, None, &state, &id, swg);
                }
            }
        }
        id
    }

    pub fn merge_external_service_delete(
        &self,
        cluster_service: &crate::entities::ClusterService,
        swg: &StoppableWaitGroup,
    ) -> ServiceID {
        let id = cluster_service.service_id();
        if cluster_service.cluster == self.config.cluster_name {
            return id;
        }
        let mut state = self.state.write().unwrap();
        if let Some(holder) = state.external_endpoints.get_mut(&id) {
            if holder.delete(&cluster_service.cluster) {
                state.external_endpoints.remove(&id);
            }
        }

        if let Some(svc) = state.services.get(&id).cloned() {
            if svc.shared {
                let (_, ready) = self.correlate_locked(&state, &id);
                if ready {
                    self.emit(Action::UpdateService, svc, None, &state, &id, swg);
                } else {
                    self.emit(Action::DeleteService, svc, None, &state, &id, swg);
                }
            }
        }
        id
    }

    pub fn merge_cluster_service_update(
        &self,
        cluster_service: crate::entities::ClusterService,
        swg: &StoppableWaitGroup,
    ) -> ServiceID {
        let id = cluster_service.service_id();
        if cluster_service.cluster == self.config.cluster_name {
            return id;
        }
        let mut state = self.state.write().unwrap();

        let projected = project_service(&cluster_service);
        let existing = state.services.get(&id).cloned();
        let service_changed = existing.as_ref() != Some(&projected);
        let old_service = if service_changed { existing } else { None };
        if service_changed {
            state.services.insert(id.clone(), projected.clone());
        }

        let backends = backends_from_cluster_service(&cluster_service);
        let holder = state.external_endpoints.entry(id.clone()).or_default();
        let ext_changed = holder.upsert(cluster_service.cluster.clone(), backends);

        if !service_changed && !ext_changed {
            return id;
        }

        if let Some(svc) = state.services.get(&id).cloned() {
            if svc.shared {
                let (_, ready) = self.correlate_locked(&state, &id);
                if ready {
                    self.emit(Action::UpdateService, svc, old_service, &state, &id, swg);
                }
            }
        }
        id
    }

    pub fn merge_cluster_service_delete(
        &self,
        cluster_service: &crate::entities::ClusterService,
        swg: &StoppableWaitGroup,
    ) -> ServiceID {
        let id = cluster_service.service_id();
        if cluster_service.cluster == self.config.cluster_name {
            return id;
        }
        let mut state = self.state.write().unwrap();
        if let Some(holder) = state.external_endpoints.get_mut(&id) {
            if holder.delete(&cluster_service.cluster) {
                state.external_endpoints.remove(&id);
            }
        }
        if let Some(removed) = state.services.remove(&id) {
            self.emit(Action::DeleteService, removed, None, &state, &id, swg);
        }
        id
    }

    /// Node-label callbacks assume the caller has already filtered events
    /// down to the node this process itself runs on; the cache only ever
    /// tracks one zone label.
    pub fn on_add_node(&self, labels: &BTreeMap<String, String>, swg: &StoppableWaitGroup) {
        self.update_node_zone(labels, swg);
    }

    pub fn on_update_node(&self, labels: &BTreeMap<String, String>, swg: &StoppableWaitGroup) {
        self.update_node_zone(labels, swg);
    }

    pub fn on_delete_node(&self, swg: &StoppableWaitGroup) {
        self.update_node_zone(&BTreeMap::new(), swg);
    }

    fn update_node_zone(&self, labels: &BTreeMap<String, String>, swg: &StoppableWaitGroup) {
        if !self.config.enable_service_topology {
            return;
        }
        let new_zone = labels.get(ZONE_LABEL).cloned().unwrap_or_default();

        let mut state = self.state.write().unwrap();
        if state.self_node_zone_label == new_zone {
            return;
        }
        info!(from = %state.self_node_zone_label, to = %new_zone, "self node zone changed");
        state.self_node_zone_label = new_zone;

        let topology_aware_ids: Vec<ServiceID> = state
            .services
            .iter()
            .filter(|(_, svc)| svc.topology_aware)
            .map(|(id, _)| id.clone())
            .collect();

        for id in topology_aware_ids {
            let svc = state.services.get(&id).cloned().unwrap();
            let (_, ready) = self.correlate_locked(&state, &id);
            if ready {
                self.emit(Action::UpdateService, svc, None, &state, &id, swg);
            }
        }
    }

    // ---- query operations -----------------------------------------------------

    pub fn get_service_ip(&self, id: &ServiceID) -> Option<L3n4Addr> {
        let state = self.state.read().unwrap();
        let svc = state.services.get(id)?;
        self.pick_frontend(svc)
    }

    pub fn get_service_frontend_ip(&self, id: &ServiceID, service_type: ServiceType) -> Option<L3n4Addr> {
        let state = self.state.read().unwrap();
        let svc = state.services.get(id)?;
        if svc.service_type != service_type {
            return None;
        }
        self.pick_frontend(svc)
    }

    fn pick_frontend(&self, svc: &Service) -> Option<L3n4Addr> {
        let ip = svc.frontend_ips.iter().find(|ip| self.matches_family(ip))?;
        let (_name, port_config) = svc.ports.iter().next()?;
        Some(L3n4Addr::new(ip.clone(), port_config.port, port_config.protocol, Scope::External))
    }

    pub fn get_service_addrs_with_type(
        &self,
        id: &ServiceID,
        service_type: ServiceType,
    ) -> (BTreeMap<FEPortName, Vec<L3n4Addr>>, usize) {
        let state = self.state.read().unwrap();
        let Some(svc) = state.services.get(id) else {
            return (BTreeMap::new(), 0);
        };
        if svc.service_type != service_type {
            return (BTreeMap::new(), 0);
        }

        let valid_frontends: Vec<&String> =
            svc.frontend_ips.iter().filter(|ip| self.matches_family(ip)).collect();

        let mut result: BTreeMap<FEPortName, Vec<L3n4Addr>> = BTreeMap::new();
        for (name, port_config) in svc.ports.iter() {
            let addrs = valid_frontends
                .iter()
                .map(|ip| L3n4Addr::new((*ip).clone(), port_config.port, port_config.protocol, Scope::External))
                .collect();
            result.insert(name.clone(), addrs);
        }
        (result, valid_frontends.len())
    }

    pub fn get_endpoints_of_service(&self, id: &ServiceID) -> Endpoints {
        let state = self.state.read().unwrap();
        state.endpoints.get(id).map(EndpointSlices::get_endpoints).unwrap_or_default()
    }

    /// Enumerates every externally-scoped frontend and node-port entry
    /// across all services. Test/debug helper, as in the spec.
    pub fn unique_service_frontends(&self) -> FrontendList {
        let state = self.state.read().unwrap();
        let mut list = FrontendList::new();
        for svc in state.services.values() {
            for ip in svc.frontend_ips.iter().filter(|ip| self.matches_family(ip)) {
                for port_config in svc.ports.values() {
                    list.insert(&L3n4Addr::new(ip.clone(), port_config.port, port_config.protocol, Scope::External));
                }
            }
            for (port_name, entries) in svc.node_ports.iter() {
                let Some(port_config) = svc.ports.get(port_name) else {
                    continue;
                };
                for entry in entries {
                    if matches!(entry.scope, Scope::External) && self.matches_family(&entry.frontend) {
                        list.insert(&L3n4Addr::new(
                            entry.frontend.clone(),
                            port_config.port,
                            port_config.protocol,
                            Scope::External,
                        ));
                    }
                }
            }
        }
        list
    }

    pub fn debug_status(&self) -> String {
        let state = self.state.read().unwrap();
        let mut out = String::new();
        out.push_str(&format!("services: {}\n", state.services.len()));
        for (id, svc) in state.services.iter() {
            let (eps, ready) = self.correlate_locked(&state, id);
            out.push_str(&format!(
                "  {id}: type={:?} shared={} ready={ready} backends={}\n",
                svc.service_type,
                svc.shared,
                eps.len()
            ));
        }
        let pending = state
            .endpoints
            .keys()
            .filter(|id| !state.services.contains_key(id))
            .count();
        out.push_str(&format!("pending endpoint holders (no matching service): {pending}\n"));
        out.push_str(&format!("self_node_zone_label: {:?}\n", state.self_node_zone_label));
        out
    }

    fn matches_family(&self, ip: &str) -> bool {
        match ip.parse::<std::net::IpAddr>() {
            Ok(std::net::IpAddr::V4(_)) => self.config.enable_ipv4,
            Ok(std::net::IpAddr::V6(_)) => self.config.enable_ipv6,
            Err(_) => false,
        }
    }

    #[cfg(test)]
    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap()
    }
}

fn backends_from_cluster_service(cs: &crate::entities::ClusterService) -> Endpoints {
    let mut eps = Endpoints::new();
    for (ip, backend) in cs.backends.iter() {
        eps.insert(ip.clone(), backend.clone());
    }
    eps
}

fn project_service(cs: &crate::entities::ClusterService) -> Service {
    Service {
        shared: cs.shared,
        include_external: cs.include_external,
        ..Service::default()
    }
}
