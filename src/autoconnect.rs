// ABOUTME: Auto-connect policy (component H): chooses a server from discovery, drives F
// ABOUTME: Distinguishes AUTO (connect to the first discovered server, once) from MANUAL mode

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::discovery::DiscoveryListener;
use crate::model::ServerInfo;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Auto,
    Manual,
}

/// Bridges discovery events to the session state machine.
///
/// Holds a unidirectional handle to [`Session`] rather than a back-reference
/// from F, per the message-passing redesign of the original's cyclic
/// observer wiring (§9).
pub struct AutoConnectPolicy {
    session: Arc<Session>,
    mode: Mutex<Mode>,
    has_auto_connected: AtomicBool,
    secure: bool,
}

impl AutoConnectPolicy {
    pub fn new(session: Arc<Session>, secure: bool) -> Self {
        Self {
            session,
            mode: Mutex::new(Mode::Auto),
            has_auto_connected: AtomicBool::new(false),
            secure,
        }
    }

    /// Transitions to MANUAL and connects to `server`, regardless of the
    /// previous mode (§4.8).
    pub async fn connect_manually(&self, server: &ServerInfo) {
        *self.mode.lock().expect("mode mutex poisoned") = Mode::Manual;
        let _ = self.session.connect(&server.url(self.secure)).await;
    }

    /// Transitions to MANUAL and disconnects.
    pub async fn disconnect(&self) {
        *self.mode.lock().expect("mode mutex poisoned") = Mode::Manual;
        self.session.disconnect().await;
    }

    fn is_auto(&self) -> bool {
        *self.mode.lock().expect("mode mutex poisoned") == Mode::Auto
    }
}

impl DiscoveryListener for AutoConnectPolicy {
    /// On the first discovery while still AUTO, connects once and latches
    /// `has_auto_connected`. Does nothing afterward, including for
    /// subsequently discovered servers (§4.8, scenario S6): a connected
    /// session's reconnection is F's responsibility alone.
    fn on_discovered(&self, server: ServerInfo) {
        if !self.is_auto() {
            return;
        }
        if self
            .has_auto_connected
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let session = self.session.clone();
        let url = server.url(self.secure);
        tokio::spawn(async move {
            let _ = session.connect(&url).await;
        });
    }

    fn on_lost(&self, _name: &str) {
        // Server loss while connected must not trigger auto-reconnect to a
        // different server; only F's own backoff reconnects (§4.8).
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::NullOutput;
    use crate::config::RuntimeConfig;
    use crate::recent_servers::InMemoryRecentServers;
    use crate::sync::filter::FilterParams;
    use crate::sync::SharedTimeFilter;
    use std::sync::atomic::Ordering;

    fn test_policy() -> AutoConnectPolicy {
        let clock = Arc::new(SharedTimeFilter::new(FilterParams::default()));
        let session = Session::new(
            RuntimeConfig::default(),
            clock,
            Box::new(NullOutput::default()),
            Arc::new(InMemoryRecentServers::new()),
        );
        AutoConnectPolicy::new(session, false)
    }

    fn server(name: &str) -> ServerInfo {
        ServerInfo {
            name: name.to_string(),
            address: format!("{name}.local:4411"),
            path: "/sendspin".to_string(),
        }
    }

    #[tokio::test]
    async fn scenario_s6_manual_override_blocks_further_auto_connects() {
        let policy = test_policy();
        policy.on_discovered(server("a"));
        assert!(policy.has_auto_connected.load(Ordering::SeqCst));

        policy.connect_manually(&server("b")).await;
        assert!(!policy.is_auto());

        // Subsequent discovery must not trigger another connect attempt;
        // has_auto_connected stays latched and mode stays MANUAL.
        policy.on_discovered(server("c"));
        assert!(!policy.is_auto());
    }

    #[tokio::test]
    async fn second_discovery_while_auto_is_ignored() {
        let policy = test_policy();
        policy.on_discovered(server("a"));
        policy.on_discovered(server("b"));
        assert!(policy.has_auto_connected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn disconnect_switches_to_manual() {
        let policy = test_policy();
        policy.disconnect().await;
        assert!(!policy.is_auto());
    }
}
