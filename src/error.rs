use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Fewer bytes than the smallest decodable header.
    #[error("Insufficient bytes for {kind}; Runt frame ({len} < {min}).")]
    Truncated {
        kind: &'static str,
        len: usize,
        min: usize,
    },

    #[error("Frame already carries a VLAN tag")]
    AlreadyTagged,

    #[error("Frame carries no VLAN tag")]
    Untagged,

    #[error("Invalid VLAN ID {0}; must be between 0 and 4094")]
    InvalidVlan(u16),

    #[error("Configuration error at line {line}: {reason}")]
    Config { line: usize, reason: String },

    #[error("Unknown port {0}")]
    UnknownPort(usize),

    #[error("Invalid link '{0}'; expected <bridge>:<port>-<bridge>:<port>")]
    InvalidLink(String),

    /// The task owning the bridge state is gone.
    #[error("Bridge task stopped")]
    BridgeStopped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config<S: Into<String>>(line: usize, reason: S) -> Self {
        Error::Config {
            line,
            reason: reason.into(),
        }
    }
}
