//! Typed cache configuration, injected into the constructor instead of read
//! from process-global state (see Design Notes in `SPEC_FULL.md`).
//!
//! Mirrors the reference operator's `Opts`: a `clap::Parser` struct with
//! `env` fallbacks, so the ambient binary can parse it straight off the CLI
//! while library callers can just build one with [`Config::default`] tweaks.

use clap::Parser;

pub const ZONE_LABEL: &str = "topology.kubernetes.io/zone";

#[derive(Parser, Clone, Debug)]
#[clap(about = "Cluster-mesh service cache", author = "Rareș Cosma - rares@getbetter.ro")]
pub struct Config {
    /// Prefer IPv4 frontends when resolving a service's address.
    #[clap(long, env = "CACHE_ENABLE_IPV4", default_value = "true")]
    pub enable_ipv4: bool,

    /// Prefer IPv6 frontends when resolving a service's address.
    #[clap(long, env = "CACHE_ENABLE_IPV6", default_value = "false")]
    pub enable_ipv6: bool,

    /// Gate zone-aware topology filtering and node-label tracking.
    #[clap(long, env = "CACHE_ENABLE_SERVICE_TOPOLOGY", default_value = "false")]
    pub enable_service_topology: bool,

    /// Capacity of the bounded event channel.
    #[clap(long, env = "CACHE_K8S_SERVICE_CACHE_SIZE", default_value = "128")]
    pub k8s_service_cache_size: usize,

    /// This cluster's own name; external merges carrying this name are ignored.
    #[clap(long, env = "CACHE_CLUSTER_NAME", default_value = "default")]
    pub cluster_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_ipv4: true,
            enable_ipv6: false,
            enable_service_topology: false,
            k8s_service_cache_size: 128,
            cluster_name: "default".to_owned(),
        }
    }
}
