pub mod cache;
pub mod config;
pub mod correlator;
pub mod entities;
pub mod error;
pub mod event;
pub mod ids;
pub mod logging;

pub use cache::ServiceCache;
pub use config::{Config, ZONE_LABEL};
pub use correlator::correlate;
pub use entities::{
    Backend, ClusterService, EndpointSlices, Endpoints, ExternalEndpoints, FrontendList,
    NodePortEntry, PortConfig, Service, ServiceType, TrafficPolicy,
};
pub use error::{validate_config, CacheError};
pub use event::{Action, ServiceEvent, StoppableWaitGroup};
pub use ids::{EndpointSliceID, FEPortName, L3n4Addr, Protocol, Scope, ServiceID, KNOWN_PROTOCOLS};
pub use logging::*;
