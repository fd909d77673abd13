// Tunnelkeeper - lifecycle control and log access for the cloudflared tunnel service
// Library root

pub mod config;
pub mod error;
pub mod journal;
pub mod systemd;
pub mod tunnel_config;
pub mod version;

pub use error::{ErrorKind, Result, TunnelError};

// Test modules (only compiled during tests)
#[cfg(test)]
mod config_tests;
