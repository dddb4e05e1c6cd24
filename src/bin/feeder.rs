//! Demo harness: seeds a `ServiceCache` with a handful of service and
//! endpoint-slice updates and prints every correlated event it emits.
//!
//! Stands in for the real watchers (Kubernetes informers, the cluster-mesh
//! gRPC client) that would drive a cache like this in production; see
//! `SPEC_FULL.md` for what's out of scope here.

use anyhow::Context;
use clap::Parser;

use svcmesh_cache::{
    initialize_logging, validate_config, Backend, Config, EndpointSliceID, Endpoints, PortConfig,
    Protocol, Service, ServiceCache, ServiceID, ServiceType, StoppableWaitGroup,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    initialize_logging("CACHE_LOG_LEVEL");

    let config = Config::parse();
    validate_config(&config).context("invalid configuration")?;
    svcmesh_cache::info!(cluster = %config.cluster_name, "starting service cache demo feeder");

    let (cache, events) = ServiceCache::new(config);

    // The channel is a blocking std::sync::mpsc; draining it is pushed onto a
    // blocking-pool thread so it doesn't tie up an async worker, the same way
    // the reference operator keeps blocking, OS-level work off the executor.
    let drain = tokio::task::spawn_blocking(move || {
        for event in events {
            svcmesh_cache::info!(
                action = ?event.action,
                service = %event.id,
                backends = event.endpoints.len(),
                "received service event"
            );
            event.swg.done();
        }
    });

    let swg = StoppableWaitGroup::new();
    feed_demo_traffic(&cache, &swg);

    svcmesh_cache::info!("{}", cache.debug_status());

    swg.stop();
    swg.wait().await;
    drop(cache); // last sender drops here, which ends the drain thread's iterator
    drain.await.expect("drain task panicked");
    Ok(())
}

fn feed_demo_traffic(cache: &ServiceCache, swg: &StoppableWaitGroup) {
    let id = ServiceID::new("default", "checkout");
    let svc = Service::new(ServiceType::ClusterIP)
        .with_frontend_ip("10.96.0.10")
        .with_port("http", PortConfig { port: 80, protocol: Protocol::Tcp });
    cache.update_service(id.clone(), svc, swg);

    let slice_id = EndpointSliceID::new(id, "checkout-abcde");
    let mut eps = Endpoints::new();
    eps.insert("10.244.1.5", Backend::new().with_port("http", 8080));
    eps.insert("10.244.2.9", Backend::new().with_port("http", 8080));
    cache.update_endpoints(slice_id, eps, swg);
}
