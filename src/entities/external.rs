use std::collections::BTreeMap;

use crate::entities::Endpoints;

/// Per-service, per-remote-cluster bag of federated backends.
///
/// Iteration for conflict resolution MUST happen in sorted cluster-name order
/// (see `correlator::correlate`); `BTreeMap` gives us that for free.
#[derive(Clone, Debug, Default)]
pub struct ExternalEndpoints {
    by_cluster: BTreeMap<String, Endpoints>,
}

impl ExternalEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_cluster.is_empty()
    }

    /// Replaces a cluster's contribution. Returns `true` if anything changed.
    pub fn upsert(&mut self, cluster: impl Into<String>, eps: Endpoints) -> bool {
        let cluster = cluster.into();
        match self.by_cluster.get(&cluster) {
            Some(existing) if existing == &eps => false,
            _ => {
                self.by_cluster.insert(cluster, eps);
                true
            }
        }
    }

    /// Removes a cluster's contribution. Returns `true` if the holder is now empty.
    pub fn delete(&mut self, cluster: &str) -> bool {
        self.by_cluster.remove(cluster);
        self.by_cluster.is_empty()
    }

    /// Iterates clusters in sorted name order, as `correlate` requires for
    /// reproducible conflict resolution.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&str, &Endpoints)> {
        self.by_cluster.iter().map(|(k, v)| (k.as_str(), v))
    }
}
