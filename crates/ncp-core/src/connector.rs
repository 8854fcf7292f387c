use crate::error::{ConnectError, DeviceError};
use crate::model::{Credentials, DeviceType, ParsedValue};

/// Probes a host to infer its command-syntax family.
pub trait DeviceTypeDetector {
    fn detect_type(&self, host: &str, credentials: &Credentials)
        -> Result<DeviceType, ConnectError>;
}

pub trait DeviceConnector {
    fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
        device_type: &DeviceType,
    ) -> Result<Box<dyn Connection>, ConnectError>;
}

/// A live device session. Dropping it releases the session.
pub trait Connection {
    fn device_type(&self) -> &DeviceType;

    /// Raw mode always yields `ParsedValue::Text`. Structured mode yields
    /// `Structured` when a parser matched, the raw `Text` when none did, and
    /// `NotAvailable` when the device returned nothing.
    fn run(&mut self, command: &str, structured: bool) -> Result<ParsedValue, DeviceError>;
}
