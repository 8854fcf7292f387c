use crate::model::{CommandResult, ParsedValue, NO_PARSER_AVAILABLE};
use thiserror::Error;

pub const CONNECT_FAILURE_MESSAGE: &str = "Could not connect to device.";
pub const UNSUPPORTED_COMMAND_MESSAGE: &str =
    "There was an error: Only 'show' commands are supported.";
pub const DEVICE_REJECTED_MESSAGE: &str = "Invalid command sent to the device.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("timed out connecting to {host}")]
    Timeout { host: String },
    #[error("authentication failed for {host}")]
    AuthFailure { host: String },
    #[error("{host} unreachable: {reason}")]
    Unreachable { host: String, reason: String },
    #[error("could not determine device type of {host}")]
    Unrecognized { host: String },
    #[error("connection setup failed: {0}")]
    Setup(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("command timed out after {0}s")]
    Timeout(u64),
    #[error("session closed by device")]
    Closed,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("connect failure: {0}")]
    Connect(#[from] ConnectError),
    #[error("only 'show' commands are supported")]
    UnsupportedCommand,
    #[error("device rejected the command")]
    DeviceRejected,
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

impl DispatchError {
    /// The result shown to the user for this failure.
    pub fn to_command_result(&self) -> CommandResult {
        match self {
            DispatchError::Connect(_) => {
                CommandResult::new(CONNECT_FAILURE_MESSAGE, ParsedValue::NotAvailable)
            }
            DispatchError::UnsupportedCommand => {
                CommandResult::new(UNSUPPORTED_COMMAND_MESSAGE, ParsedValue::NotAvailable)
            }
            DispatchError::DeviceRejected => CommandResult::new(
                DEVICE_REJECTED_MESSAGE,
                ParsedValue::Text(NO_PARSER_AVAILABLE.to_string()),
            ),
            DispatchError::Device(err) => CommandResult::new(
                format!("There was an error: {err}"),
                ParsedValue::NotAvailable,
            ),
        }
    }

    pub fn display_pair(&self) -> (String, String) {
        self.to_command_result().display_pair()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceRequestError {
    #[error("unauthorized ({status})")]
    Unauthorized { status: u16 },
    #[error("rate limited")]
    RateLimited,
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid sync input: {0}")]
    InvalidInput(String),
    #[error("source request failed: {0}")]
    Source(#[from] SourceRequestError),
    #[error("source reported no devices")]
    EmptyInventory,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("inventory file missing after write: {0}")]
    NotPersisted(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("failed to render config: {0}")]
    Render(String),
}
