// ABOUTME: Recent-servers adapter boundary (§6): persistent storage is an external collaborator
// ABOUTME: An in-memory default is provided; real persistence is out of scope for this core

use std::sync::Mutex;

use crate::model::ServerInfo;

const MAX_RECENT: usize = 10;

/// Narrow adapter to a persistent "recent servers" list.
///
/// Modeled as an explicit collaborator passed by reference at construction
/// rather than process-wide global state (§9).
pub trait RecentServersStore: Send + Sync {
    fn load(&self) -> Vec<ServerInfo>;
    fn add(&self, server: ServerInfo);
}

/// In-memory store, most-recently-added first, bounded to the last
/// [`MAX_RECENT`] entries. Suitable for tests and as a default when no
/// platform persistence layer is wired in.
#[derive(Default)]
pub struct InMemoryRecentServers {
    entries: Mutex<Vec<ServerInfo>>,
}

impl InMemoryRecentServers {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecentServersStore for InMemoryRecentServers {
    fn load(&self) -> Vec<ServerInfo> {
        self.entries.lock().expect("recent servers mutex poisoned").clone()
    }

    fn add(&self, server: ServerInfo) {
        let mut entries = self.entries.lock().expect("recent servers mutex poisoned");
        entries.retain(|existing| existing.name != server.name || existing.address != server.address);
        entries.insert(0, server);
        entries.truncate(MAX_RECENT);
    }
}
