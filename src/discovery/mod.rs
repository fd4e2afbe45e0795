// ABOUTME: Service discovery adapter boundary (component G, §4.7)
// ABOUTME: Platform mDNS stacks are out of scope; this module specifies the interface only

use crate::model::ServerInfo;

/// Service type Sendspin servers advertise over mDNS.
pub const SERVICE_TYPE: &str = "_sendspin-server._tcp.";
/// Default WebSocket-style path when the TXT record omits `path`.
pub const DEFAULT_PATH: &str = "/sendspin";

/// Emits discovery events from the platform's service-discovery facility.
///
/// The concrete mDNS browse/resolve implementation is a platform internal
/// out of scope for this core (§1); this trait is the seam H consumes.
pub trait DiscoveryAdapter: Send + Sync {
    /// Begins browsing for [`SERVICE_TYPE`]. Implementations call the
    /// listener's `on_discovered`/`on_lost` as services resolve or expire.
    fn start(&mut self, listener: Box<dyn DiscoveryListener>);
    fn stop(&mut self);
}

pub trait DiscoveryListener: Send + Sync {
    fn on_discovered(&self, server: ServerInfo);
    fn on_lost(&self, name: &str);
}

/// In-memory adapter for tests: discovery/loss events are injected directly
/// rather than resolved from real mDNS traffic.
#[derive(Default)]
pub struct FakeDiscovery {
    listener: Option<Box<dyn DiscoveryListener>>,
}

impl FakeDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discover(&self, server: ServerInfo) {
        if let Some(listener) = &self.listener {
            listener.on_discovered(server);
        }
    }

    pub fn lose(&self, name: &str) {
        if let Some(listener) = &self.listener {
            listener.on_lost(name);
        }
    }
}

impl DiscoveryAdapter for FakeDiscovery {
    fn start(&mut self, listener: Box<dyn DiscoveryListener>) {
        self.listener = Some(listener);
    }

    fn stop(&mut self) {
        self.listener = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingListener {
        discovered: Arc<Mutex<Vec<ServerInfo>>>,
        lost: Arc<Mutex<Vec<String>>>,
    }

    impl DiscoveryListener for RecordingListener {
        fn on_discovered(&self, server: ServerInfo) {
            self.discovered.lock().unwrap().push(server);
        }

        fn on_lost(&self, name: &str) {
            self.lost.lock().unwrap().push(name.to_string());
        }
    }

    #[test]
    fn fake_discovery_forwards_events_to_listener() {
        let discovered = Arc::new(Mutex::new(Vec::new()));
        let lost = Arc::new(Mutex::new(Vec::new()));
        let mut adapter = FakeDiscovery::new();
        adapter.start(Box::new(RecordingListener {
            discovered: discovered.clone(),
            lost: lost.clone(),
        }));

        adapter.discover(ServerInfo {
            name: "living-room".to_string(),
            address: "192.168.1.10:4411".to_string(),
            path: DEFAULT_PATH.to_string(),
        });
        adapter.lose("living-room");

        assert_eq!(discovered.lock().unwrap().len(), 1);
        assert_eq!(lost.lock().unwrap()[0], "living-room");
    }
}
