use std::time::Duration;

/// Default UDP port both peers agree to use for discovery traffic.
pub const DEFAULT_DISCOVERY_PORT: u16 = 40000;
/// Default wall-clock window the sender spends collecting `HERE` replies.
pub const DEFAULT_DISCOVERY_WINDOW: Duration = Duration::from_millis(1000);

/// Tunables for the discovery handshake.
///
/// The spec treats the discovery port and window as fixed constants; this
/// implementation exposes them as configuration so operators can run
/// multiple instances on one LAN or shorten the discovery window in tests,
/// per the spec's own recommendation that such constants be configurable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// UDP port both peers bind/send to for `DISCOVER`/`HERE`/`CHOSEN`.
    pub port: u16,
    /// How long the sender waits for `HERE` replies before presenting the
    /// discovered set to the user.
    pub window: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DISCOVERY_PORT,
            window: DEFAULT_DISCOVERY_WINDOW,
        }
    }
}
