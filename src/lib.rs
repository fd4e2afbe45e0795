// ABOUTME: Sendspin client runtime: clock sync, jitter-buffered playout, and session management
// ABOUTME: for a multi-room synchronized audio streaming protocol

pub mod audio;
pub mod autoconnect;
pub mod config;
pub mod decoder;
pub mod discovery;
pub mod error;
pub mod jitter;
pub mod model;
pub mod observable;
pub mod protocol;
pub mod recent_servers;
pub mod scheduler;
pub mod session;
pub mod sync;

pub use autoconnect::AutoConnectPolicy;
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use session::Session;
