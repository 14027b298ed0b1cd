//! Error types for the VLAN tenancy controller.

use thiserror::Error;

/// All possible errors that can occur within the VLAN tenancy controller.
#[derive(Error, Debug)]
pub enum Error {
    /// The payload is too short to hold the headers the classifier needs.
    #[error("malformed frame: captured {captured} bytes, need at least {required}")]
    MalformedFrame { captured: usize, required: usize },

    /// A MAC address string could not be parsed.
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    /// A VLAN id outside the tenant range.
    #[error("invalid VLAN id {0} (expected 1..=4094)")]
    InvalidVlan(u16),

    /// A port number that cannot name a physical port.
    #[error("invalid port {port} on switch {switch}")]
    InvalidPort { switch: String, port: u32 },

    /// The same host is assigned more than once.
    #[error("host {0} is assigned more than once")]
    DuplicateHost(String),

    /// Any other configuration problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// The switch session is no longer accepting events.
    #[error("session closed for switch {0}")]
    SessionClosed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
