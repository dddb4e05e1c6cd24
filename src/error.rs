//! The crate's one typed error boundary: the cache engine itself is
//! infallible by construction (see `SPEC_FULL.md` §7), so these variants only
//! surface at the CLI/config edge of the ambient demo binary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("invalid cluster name {name:?}: must be non-empty")]
    InvalidClusterName { name: String },

    #[error("event channel capacity must be non-zero")]
    ZeroChannelCapacity,
}

pub fn validate_config(config: &crate::config::Config) -> Result<(), CacheError> {
    if config.cluster_name.trim().is_empty() {
        return Err(CacheError::InvalidClusterName {
            name: config.cluster_name.clone(),
        });
    }
    if config.k8s_service_cache_size == 0 {
        return Err(CacheError::ZeroChannelCapacity);
    }
    Ok(())
}
