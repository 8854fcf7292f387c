use crate::connector::{DeviceConnector, DeviceTypeDetector};
use crate::error::DispatchError;
use crate::model::{CommandResult, Credentials, DeviceType, ParsedValue, NO_PARSER_AVAILABLE};
use tracing::{debug, info, warn};

pub const SHOW_VERB: &str = "show";
pub const INVALID_INPUT_MARKER: &str = "Invalid input detected";

/// `<host> show <args...>` split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub host: String,
    pub arguments: String,
}

impl CommandLine {
    pub fn parse(input: &str) -> Result<Self, DispatchError> {
        let mut tokens = input.split_whitespace();
        let host = tokens.next().ok_or(DispatchError::UnsupportedCommand)?;
        let verb = tokens.next().ok_or(DispatchError::UnsupportedCommand)?;
        if verb != SHOW_VERB {
            return Err(DispatchError::UnsupportedCommand);
        }
        Ok(Self {
            host: host.to_string(),
            arguments: tokens.collect::<Vec<_>>().join(" "),
        })
    }

    /// Command line sent to the device.
    pub fn device_command(&self) -> String {
        if self.arguments.is_empty() {
            SHOW_VERB.to_string()
        } else {
            format!("{SHOW_VERB} {}", self.arguments)
        }
    }
}

pub struct CommandDispatcher<D, C> {
    detector: D,
    connector: C,
    credentials: Credentials,
    device_type: Option<DeviceType>,
}

impl<D, C> CommandDispatcher<D, C>
where
    D: DeviceTypeDetector,
    C: DeviceConnector,
{
    pub fn new(detector: D, connector: C, credentials: Credentials) -> Self {
        Self {
            detector,
            connector,
            credentials,
            device_type: None,
        }
    }

    /// Skips autodetection and always connects as `device_type`.
    pub fn with_device_type(mut self, device_type: Option<DeviceType>) -> Self {
        self.device_type = device_type.filter(|kind| !kind.is_autodetect());
        self
    }

    /// Runs a command line and always returns something displayable.
    pub fn execute(&self, input: &str) -> CommandResult {
        match self.try_execute(input) {
            Ok(result) => result,
            Err(err) => {
                warn!(input = input.trim(), error = %err, "command dispatch failed");
                err.to_command_result()
            }
        }
    }

    pub fn try_execute(&self, input: &str) -> Result<CommandResult, DispatchError> {
        let line = CommandLine::parse(input)?;
        let device_type = self.resolve_device_type(&line.host)?;
        let command = line.device_command();
        info!(host = %line.host, %device_type, %command, "dispatching command");

        let mut connection = self
            .connector
            .connect(&line.host, &self.credentials, &device_type)?;

        let raw = connection.run(&command, false)?.display_text();
        let structured = connection.run(&command, true);
        drop(connection);
        debug!(host = %line.host, "connection released");

        if raw.contains(INVALID_INPUT_MARKER) {
            return Err(DispatchError::DeviceRejected);
        }
        Ok(normalize(raw, structured?))
    }

    fn resolve_device_type(&self, host: &str) -> Result<DeviceType, DispatchError> {
        if let Some(device_type) = &self.device_type {
            return Ok(device_type.clone());
        }
        let detected = self.detector.detect_type(host, &self.credentials)?;
        debug!(host, device_type = %detected, "autodetected device type");
        Ok(detected)
    }
}

/// Classifies a successful `(raw, parsed)` pair.
pub fn normalize(raw: String, parsed: ParsedValue) -> CommandResult {
    if raw.contains(INVALID_INPUT_MARKER) {
        return DispatchError::DeviceRejected.to_command_result();
    }
    let parsed = match parsed {
        ParsedValue::NotAvailable => ParsedValue::NotAvailable,
        other if other.rendered().contains('\n') => {
            ParsedValue::Text(NO_PARSER_AVAILABLE.to_string())
        }
        other => other,
    };
    CommandResult::new(raw, parsed)
}
