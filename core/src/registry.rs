use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::VulnerabilityId;
use crate::model::ProbeFinding;

/// A single vulnerability check against a target URL.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn invoke(&self, url: &str) -> Result<ProbeFinding>;
}

/// Read-only lookup from vulnerability id to probe. Built once at startup and
/// shared behind an `Arc`.
#[derive(Default, Clone)]
pub struct ProbeRegistry {
    probes: HashMap<VulnerabilityId, Arc<dyn Probe>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: Probe + 'static>(&mut self, id: VulnerabilityId, probe: P) {
        self.probes.insert(id, Arc::new(probe));
    }

    pub fn register_arc(&mut self, id: VulnerabilityId, probe: Arc<dyn Probe>) {
        self.probes.insert(id, probe);
    }

    /// Resolve a requested id. Unknown names and known names without a probe both
    /// yield `None`.
    pub fn lookup(&self, requested: &str) -> Option<(VulnerabilityId, Arc<dyn Probe>)> {
        let id: VulnerabilityId = requested.parse().ok()?;
        self.probes.get(&id).map(|p| (id, p.clone()))
    }

    pub fn contains(&self, id: VulnerabilityId) -> bool {
        self.probes.contains_key(&id)
    }

    /// Registered ids in catalog order.
    pub fn ids(&self) -> Vec<VulnerabilityId> {
        VulnerabilityId::ALL.iter().copied().filter(|id| self.contains(*id)).collect()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl std::fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeRegistry").field("ids", &self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always(bool);

    #[async_trait]
    impl Probe for Always {
        async fn invoke(&self, _url: &str) -> Result<ProbeFinding> {
            Ok(ProbeFinding { vulnerable: self.0, ..Default::default() })
        }
    }

    #[tokio::test]
    async fn lookup_resolves_registered_ids() {
        let mut reg = ProbeRegistry::new();
        reg.register(VulnerabilityId::Xss, Always(true));
        let (id, probe) = reg.lookup("xss").unwrap();
        assert_eq!(id, VulnerabilityId::Xss);
        assert!(probe.invoke("http://example.com").await.unwrap().vulnerable);
    }

    #[test]
    fn unknown_and_unregistered_ids_are_absent() {
        let mut reg = ProbeRegistry::new();
        reg.register(VulnerabilityId::Xss, Always(false));
        assert!(reg.lookup("unknown_check").is_none());
        assert!(reg.lookup("csrf").is_none());
    }

    #[test]
    fn ids_follow_catalog_order() {
        let mut reg = ProbeRegistry::new();
        reg.register(VulnerabilityId::Csrf, Always(false));
        reg.register(VulnerabilityId::SqlInjection, Always(false));
        assert_eq!(reg.ids(), vec![VulnerabilityId::SqlInjection, VulnerabilityId::Csrf]);
        assert_eq!(reg.len(), 2);
    }
}
