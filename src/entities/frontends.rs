use std::collections::BTreeSet;

use crate::ids::{L3n4Addr, Protocol, KNOWN_PROTOCOLS};

/// A set of protocol-qualified frontend strings, as produced by
/// `ServiceCache::unique_service_frontends`.
#[derive(Clone, Debug, Default)]
pub struct FrontendList {
    entries: BTreeSet<String>,
}

impl FrontendList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, addr: &L3n4Addr) {
        self.entries
            .insert(L3n4Addr::frontend_key(&addr.ip, addr.port, addr.protocol));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Membership test that treats `Protocol::None` as "any known protocol":
    /// probes `KNOWN_PROTOCOLS` in order and returns on the first hit.
    /// Any other protocol is an exact, protocol-qualified membership test.
    pub fn loose_match(&self, addr: &L3n4Addr) -> bool {
        if matches!(addr.protocol, Protocol::None) {
            return KNOWN_PROTOCOLS.iter().any(|proto| {
                let key = L3n4Addr::frontend_key(&addr.ip, addr.port, *proto);
                self.entries.contains(&key)
            });
        }
        let key = L3n4Addr::frontend_key(&addr.ip, addr.port, addr.protocol);
        self.entries.contains(&key)
    }
}
