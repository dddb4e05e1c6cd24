//! The cache's entity types: services, endpoints, and the per-service
//! holders that bag them up (`EndpointSlices`, `ExternalEndpoints`).

mod endpoints;
mod external;
mod frontends;
mod service;

pub use endpoints::{Backend, EndpointSlices, Endpoints};
pub use external::ExternalEndpoints;
pub use frontends::FrontendList;
pub use service::{ClusterService, NodePortEntry, PortConfig, Service, ServiceType, TrafficPolicy};
