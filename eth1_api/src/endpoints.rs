use derive_more::Debug;
use types::redacting_url::RedactingUrl;

use crate::messages::BeaconNodeStats;

#[derive(Clone, Copy, Debug)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum EndpointStatus {
    Online,
    Offline,
}

impl EndpointStatus {
    const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Endpoint {
    index: usize,
    status: EndpointStatus,
    consecutive_failures: u32,
    url: RedactingUrl,
}

impl Endpoint {
    #[must_use]
    pub const fn url(&self) -> &RedactingUrl {
        &self.url
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn status(&self) -> EndpointStatus {
        self.status
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.index > 0
    }
}

/// Ordered endpoint list. The first endpoint is the primary one.
pub struct Endpoints {
    current: usize,
    endpoints: Vec<Endpoint>,
}

impl Endpoints {
    pub fn new(urls: impl IntoIterator<Item = RedactingUrl>) -> Self {
        let endpoints = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| Endpoint {
                index,
                status: EndpointStatus::Online,
                consecutive_failures: 0,
                url,
            })
            .collect();

        Self {
            current: 0,
            endpoints,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Endpoint> {
        self.endpoints.get(self.current)
    }

    #[must_use]
    pub fn primary(&self) -> Option<&Endpoint> {
        self.endpoints.first()
    }

    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.current == 0
    }

    #[must_use]
    pub fn sync_fallback_configured(&self) -> bool {
        self.endpoints.len() > 1
    }

    #[must_use]
    pub fn el_offline(&self) -> bool {
        !self
            .endpoints
            .iter()
            .any(|endpoint| endpoint.status.is_online())
    }

    /// Advances to the next endpoint, wrapping around to the primary one.
    ///
    /// Returns `false` if there is nothing to fall back to.
    pub fn fallback_to_next(&mut self) -> bool {
        if !self.sync_fallback_configured() {
            return false;
        }

        self.current = (self.current + 1) % self.endpoints.len();

        if let Some(endpoint) = self.current_mut() {
            endpoint.consecutive_failures = 0;
        }

        true
    }

    pub fn reset_to_primary(&mut self) {
        self.current = 0;

        if let Some(endpoint) = self.current_mut() {
            endpoint.status = EndpointStatus::Online;
            endpoint.consecutive_failures = 0;
        }
    }

    pub fn record_success(&mut self) {
        if let Some(endpoint) = self.current_mut() {
            endpoint.status = EndpointStatus::Online;
            endpoint.consecutive_failures = 0;
        }
    }

    /// Marks the current endpoint offline and returns its consecutive failure count.
    pub fn record_failure(&mut self) -> u32 {
        self.current_mut().map_or(0, |endpoint| {
            endpoint.status = EndpointStatus::Offline;
            endpoint.consecutive_failures = endpoint.consecutive_failures.saturating_add(1);
            endpoint.consecutive_failures
        })
    }

    #[must_use]
    pub fn stats(&self) -> BeaconNodeStats {
        let current = self.current();

        BeaconNodeStats {
            sync_eth1_fallback_configured: self.sync_fallback_configured(),
            sync_eth1_fallback_connected: current
                .is_some_and(|endpoint| endpoint.is_fallback() && endpoint.status.is_online()),
            sync_eth1_connected: current.is_some_and(|endpoint| endpoint.status.is_online()),
        }
    }

    fn current_mut(&mut self) -> Option<&mut Endpoint> {
        self.endpoints.get_mut(self.current)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    fn three_endpoints() -> Result<Endpoints> {
        Ok(Endpoints::new([
            "https://a.example.net".parse()?,
            "https://b.example.net".parse()?,
            "https://c.example.net".parse()?,
        ]))
    }

    fn current_url(endpoints: &Endpoints) -> Option<String> {
        endpoints
            .current()
            .map(|endpoint| endpoint.url().expose().to_string())
    }

    #[test]
    fn empty_endpoints_are_offline() {
        let mut endpoints = Endpoints::new([]);

        assert!(endpoints.is_empty());
        assert!(endpoints.el_offline());
        assert!(!endpoints.fallback_to_next());
        assert_eq!(endpoints.current(), None);
        assert_eq!(endpoints.record_failure(), 0);
        assert_eq!(endpoints.stats(), BeaconNodeStats::default());
    }

    #[test]
    fn fallback_cycles_through_endpoints() -> Result<()> {
        let mut endpoints = three_endpoints()?;

        assert!(endpoints.is_primary());
        assert!(endpoints.sync_fallback_configured());
        assert_eq!(current_url(&endpoints).as_deref(), Some("https://a.example.net/"));

        assert!(endpoints.fallback_to_next());
        assert_eq!(current_url(&endpoints).as_deref(), Some("https://b.example.net/"));

        assert!(endpoints.fallback_to_next());
        assert_eq!(current_url(&endpoints).as_deref(), Some("https://c.example.net/"));

        assert!(endpoints.fallback_to_next());
        assert_eq!(current_url(&endpoints).as_deref(), Some("https://a.example.net/"));
        assert!(endpoints.is_primary());

        Ok(())
    }

    #[test]
    fn fallback_with_single_endpoint_is_a_no_op() -> Result<()> {
        let mut endpoints = Endpoints::new(["https://a.example.net".parse()?]);

        assert!(!endpoints.sync_fallback_configured());
        assert!(!endpoints.fallback_to_next());
        assert!(endpoints.is_primary());
        assert_eq!(current_url(&endpoints).as_deref(), Some("https://a.example.net/"));

        Ok(())
    }

    #[test]
    fn failures_are_counted_per_endpoint() -> Result<()> {
        let mut endpoints = three_endpoints()?;

        assert_eq!(endpoints.record_failure(), 1);
        assert_eq!(endpoints.record_failure(), 2);

        assert_eq!(
            endpoints.current().map(Endpoint::status),
            Some(EndpointStatus::Offline),
        );

        endpoints.fallback_to_next();

        assert_eq!(endpoints.current().map(Endpoint::consecutive_failures), Some(0));
        assert!(!endpoints.el_offline());

        endpoints.record_success();

        assert_eq!(
            endpoints.stats(),
            BeaconNodeStats {
                sync_eth1_fallback_configured: true,
                sync_eth1_fallback_connected: true,
                sync_eth1_connected: true,
            },
        );

        endpoints.reset_to_primary();

        assert!(endpoints.is_primary());
        assert_eq!(
            endpoints.primary().map(Endpoint::status),
            Some(EndpointStatus::Online),
        );
        assert!(!endpoints.stats().sync_eth1_fallback_connected);

        Ok(())
    }
}
