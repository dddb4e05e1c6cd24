//! End-to-end scenarios against the public `ServiceCache` surface, exercising
//! the full service/endpoint-slice/external-cluster/node-label input space.

use std::time::Duration;

use svcmesh_cache::{
    Backend, ClusterService, Config, EndpointSliceID, Endpoints, PortConfig, Protocol, Service,
    ServiceCache, ServiceEvent, ServiceID, ServiceType, StoppableWaitGroup, TrafficPolicy,
    ZONE_LABEL,
};

fn cache_with(topology: bool) -> (ServiceCache, std::sync::mpsc::Receiver<ServiceEvent>) {
    ServiceCache::new(Config {
        enable_ipv4: true,
        enable_ipv6: false,
        enable_service_topology: topology,
        k8s_service_cache_size: 32,
        cluster_name: "home".into(),
    })
}

fn recv(rx: &std::sync::mpsc::Receiver<ServiceEvent>) -> ServiceEvent {
    rx.recv_timeout(Duration::from_secs(1)).expect("expected an event")
}

fn assert_quiet(rx: &std::sync::mpsc::Receiver<ServiceEvent>) {
    assert!(rx.recv_timeout(Duration::from_millis(20)).is_err(), "expected no event");
}

fn web_service() -> Service {
    Service::new(ServiceType::ClusterIP)
        .with_frontend_ip("10.96.1.1")
        .with_port("http", PortConfig { port: 80, protocol: Protocol::Tcp })
}

#[test]
fn service_alone_is_not_ready() {
    let (cache, rx) = cache_with(false);
    let swg = StoppableWaitGroup::new();
    let id = ServiceID::new("shop", "web");

    cache.update_service(id, web_service(), &swg);
    assert_quiet(&rx);
}

#[test]
fn endpoints_arriving_before_the_service_wait_quietly() {
    let (cache, rx) = cache_with(false);
    let swg = StoppableWaitGroup::new();
    let id = ServiceID::new("shop", "web");
    let slice = EndpointSliceID::new(id.clone(), "web-x1");

    let mut eps = Endpoints::new();
    eps.insert("10.244.0.1", Backend::new().with_port("http", 8080));
    cache.update_endpoints(slice, eps, &swg);
    assert_quiet(&rx);

    cache.update_service(id, web_service(), &swg);
    let event = recv(&rx);
    assert_eq!(event.endpoints.len(), 1);
}

#[test]
fn deleting_the_service_emits_delete_and_forgets_it() {
    let (cache, rx) = cache_with(false);
    let swg = StoppableWaitGroup::new();
    let id = ServiceID::new("shop", "web");
    let slice = EndpointSliceID::new(id.clone(), "web-x1");

    cache.update_service(id.clone(), web_service(), &swg);
    let mut eps = Endpoints::new();
    eps.insert("10.244.0.1", Backend::new().with_port("http", 8080));
    cache.update_endpoints(slice, eps, &swg);
    recv(&rx);

    cache.delete_service(&id, &swg);
    let event = recv(&rx);
    assert_eq!(event.action, svcmesh_cache::Action::DeleteService);

    // gone for good: re-deleting is a silent no-op
    cache.delete_service(&id, &swg);
    assert_quiet(&rx);
}

#[test]
fn last_slice_removed_still_updates_a_surviving_service() {
    let (cache, rx) = cache_with(false);
    let swg = StoppableWaitGroup::new();
    let id = ServiceID::new("shop", "web");
    let slice = EndpointSliceID::new(id.clone(), "web-x1");

    cache.update_service(id, web_service(), &swg);
    let mut eps = Endpoints::new();
    eps.insert("10.244.0.1", Backend::new().with_port("http", 8080));
    cache.update_endpoints(slice.clone(), eps, &swg);
    recv(&rx);

    cache.delete_endpoints(&slice, &swg);
    let event = recv(&rx);
    assert_eq!(event.action, svcmesh_cache::Action::UpdateService);
    assert!(event.endpoints.is_empty());
}

#[test]
fn external_only_service_losing_its_last_cluster_deletes() {
    let (cache, rx) = cache_with(false);
    let swg = StoppableWaitGroup::new();
    let id = ServiceID::new("shop", "web");

    let svc = web_service().include_external(true).shared(true);
    cache.update_service(id.clone(), svc, &swg);

    let mut backends = std::collections::BTreeMap::new();
    backends.insert("172.16.0.1".to_string(), Backend::new().with_port("http", 80));
    let cs = ClusterService {
        cluster: "away".into(),
        namespace: "shop".into(),
        name: "web".into(),
        backends,
        shared: true,
        include_external: true,
    };
    let event = {
        cache.merge_external_service_update(cs.clone(), &swg);
        recv(&rx)
    };
    assert_eq!(event.action, svcmesh_cache::Action::UpdateService);

    cache.merge_external_service_delete(&cs, &swg);
    let event = recv(&rx);
    assert_eq!(event.action, svcmesh_cache::Action::DeleteService);
}

#[test]
fn local_and_external_service_losing_external_only_updates() {
    let (cache, rx) = cache_with(false);
    let swg = StoppableWaitGroup::new();
    let id = ServiceID::new("shop", "web");
    let slice = EndpointSliceID::new(id.clone(), "web-x1");

    let svc = web_service().include_external(true).shared(true);
    cache.update_service(id.clone(), svc, &swg);
    let mut eps = Endpoints::new();
    eps.insert("10.244.0.1", Backend::new().with_port("http", 8080));
    cache.update_endpoints(slice, eps, &swg);
    recv(&rx);

    let mut backends = std::collections::BTreeMap::new();
    backends.insert("172.16.0.1".to_string(), Backend::new().with_port("http", 80));
    let cs = ClusterService {
        cluster: "away".into(),
        namespace: "shop".into(),
        name: "web".into(),
        backends,
        shared: true,
        include_external: true,
    };
    cache.merge_external_service_update(cs.clone(), &swg);
    let event = recv(&rx);
    assert_eq!(event.endpoints.len(), 2);

    cache.merge_external_service_delete(&cs, &swg);
    let event = recv(&rx);
    assert_eq!(event.action, svcmesh_cache::Action::UpdateService);
    assert_eq!(event.endpoints.len(), 1);
    assert!(event.endpoints.backends.contains_key("10.244.0.1"));
}

#[test]
fn topology_aware_service_reacts_to_node_zone_changes() {
    let (cache, rx) = cache_with(true);
    let swg = StoppableWaitGroup::new();
    let id = ServiceID::new("shop", "web");
    let slice = EndpointSliceID::new(id.clone(), "web-x1");

    let mut labels = std::collections::BTreeMap::new();
    labels.insert(ZONE_LABEL.to_string(), "us-east-1a".to_string());
    cache.on_add_node(&labels, &swg);

    let svc = web_service().topology_aware(true).traffic_policy(TrafficPolicy::Cluster);
    cache.update_service(id, svc, &swg);

    let mut eps = Endpoints::new();
    eps.insert("10.244.0.1", Backend::new().with_zone_hint("us-east-1a"));
    eps.insert("10.244.0.2", Backend::new().with_zone_hint("us-east-1b"));
    cache.update_endpoints(slice, eps, &swg);

    let event = recv(&rx);
    assert_eq!(event.endpoints.len(), 1);
    assert!(event.endpoints.backends.contains_key("10.244.0.1"));

    cache.on_delete_node(&swg);
    let event = recv(&rx);
    assert_eq!(event.endpoints.len(), 2, "losing the zone label falls back to the unfiltered set");
}

#[test]
fn own_cluster_federated_updates_are_ignored() {
    let (cache, rx) = cache_with(false);
    let swg = StoppableWaitGroup::new();
    let id = ServiceID::new("shop", "web");

    let svc = web_service().include_external(true).shared(true);
    cache.update_service(id, svc, &swg);

    let mut backends = std::collections::BTreeMap::new();
    backends.insert("172.16.0.1".to_string(), Backend::new().with_port("http", 80));
    let cs = ClusterService {
        cluster: "home".into(), // matches cache_with's cluster_name
        namespace: "shop".into(),
        name: "web".into(),
        backends,
        shared: true,
        include_external: true,
    };
    cache.merge_external_service_update(cs, &swg);
    assert_quiet(&rx);
}

#[test]
fn repeated_identical_inputs_never_double_emit() {
    let (cache, rx) = cache_with(false);
    let swg = StoppableWaitGroup::new();
    let id = ServiceID::new("shop", "web");
    let slice = EndpointSliceID::new(id.clone(), "web-x1");

    let mut eps = Endpoints::new();
    eps.insert("10.244.0.1", Backend::new().with_port("http", 8080));
    cache.update_endpoints(slice.clone(), eps.clone(), &swg);
    cache.update_service(id.clone(), web_service(), &swg);
    recv(&rx);

    cache.update_service(id, web_service(), &swg);
    cache.update_endpoints(slice, eps, &swg);
    assert_quiet(&rx);
}

#[test]
fn not_shared_services_never_merge_federated_backends() {
    let (cache, rx) = cache_with(false);
    let swg = StoppableWaitGroup::new();
    let id = ServiceID::new("shop", "web");
    let slice = EndpointSliceID::new(id.clone(), "web-x1");

    let svc = web_service().include_external(true).shared(false);
    cache.update_service(id.clone(), svc, &swg);
    let mut eps = Endpoints::new();
    eps.insert("10.244.0.1", Backend::new().with_port("http", 8080));
    cache.update_endpoints(slice, eps, &swg);
    recv(&rx);

    let mut backends = std::collections::BTreeMap::new();
    backends.insert("172.16.0.1".to_string(), Backend::new().with_port("http", 80));
    cache.merge_external_service_update(
        ClusterService {
            cluster: "away".into(),
            namespace: "shop".into(),
            name: "web".into(),
            backends,
            shared: false,
            include_external: true,
        },
        &swg,
    );
    assert_quiet(&rx);
}

#[tokio::test]
async fn stoppable_wait_group_tracks_emitted_events_to_completion() {
    let (cache, rx) = cache_with(false);
    let swg = StoppableWaitGroup::new();
    let id = ServiceID::new("shop", "web");
    let slice = EndpointSliceID::new(id.clone(), "web-x1");

    cache.update_service(id, web_service(), &swg);
    let mut eps = Endpoints::new();
    eps.insert("10.244.0.1", Backend::new().with_port("http", 8080));
    cache.update_endpoints(slice, eps, &swg);

    let event = recv(&rx);
    assert_eq!(swg.count(), 1);

    swg.stop();
    let waiter = swg.clone();
    let handle = tokio::spawn(async move { waiter.wait().await });
    tokio::task::yield_now().await;
    assert!(!handle.is_finished());

    event.swg.done();
    handle.await.unwrap();
}
