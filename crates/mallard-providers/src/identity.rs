//! Pluggable browser identity.
//!
//! The upstream provider fingerprints clients, so every request carries a
//! plausible browser User-Agent. Selection is behind a trait so tests (and
//! deployments that pin an identity) can inject a deterministic one.

use rand::seq::SliceRandom;

/// Supplies the User-Agent for outbound upstream requests.
pub trait IdentityProvider: Send + Sync {
    fn user_agent(&self) -> String;
}

/// Picks uniformly from a pool of browser User-Agent strings on every call.
pub struct BrowserPool {
    agents: Vec<String>,
}

impl BrowserPool {
    pub fn new(agents: Vec<String>) -> Self {
        Self { agents }
    }
}

impl IdentityProvider for BrowserPool {
    fn user_agent(&self) -> String {
        self.agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default()
    }
}

/// Always returns the same User-Agent. Used in tests and pinned deployments.
pub struct FixedIdentity(pub String);

impl IdentityProvider for FixedIdentity {
    fn user_agent(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_picks_from_members() {
        let pool = BrowserPool::new(vec!["a".into(), "b".into()]);
        for _ in 0..32 {
            let ua = pool.user_agent();
            assert!(ua == "a" || ua == "b");
        }
    }

    #[test]
    fn test_fixed_identity_is_deterministic() {
        let identity = FixedIdentity("test-agent".into());
        assert_eq!(identity.user_agent(), "test-agent");
        assert_eq!(identity.user_agent(), "test-agent");
    }
}
