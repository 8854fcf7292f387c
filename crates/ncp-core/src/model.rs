use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const USERNAME_ENV: &str = "NCP_USERNAME";
pub const PASSWORD_ENV: &str = "NCP_PASSWORD";
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";

/// Placeholder written when an upstream attribute is absent.
pub const MISSING_VALUE: &str = "None";

pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_PARSER_AVAILABLE: &str = "No parser available.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    pub primary_ip: String,
    pub device_type: String,
}

impl DeviceRecord {
    /// Address part of `primary_ip` with any prefix length removed.
    pub fn address(&self) -> &str {
        self.primary_ip
            .split_once('/')
            .map(|(addr, _)| addr)
            .unwrap_or(&self.primary_ip)
    }
}

/// A device as reported by a source of truth, before filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDevice {
    pub name: Option<String>,
    pub primary_ip: Option<String>,
    pub device_type: Option<String>,
}

impl SourceDevice {
    pub fn into_record(self) -> Option<DeviceRecord> {
        let name = self.name?;
        let primary_ip = self.primary_ip?;
        Some(DeviceRecord {
            name,
            primary_ip,
            device_type: self
                .device_type
                .unwrap_or_else(|| MISSING_VALUE.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Text(String),
    Structured(Value),
    NotAvailable,
}

impl ParsedValue {
    /// Text used to decide whether a parser matched.
    pub fn rendered(&self) -> String {
        match self {
            ParsedValue::Text(text) => text.clone(),
            ParsedValue::Structured(value) => value.to_string(),
            ParsedValue::NotAvailable => NOT_AVAILABLE.to_string(),
        }
    }

    pub fn display_text(&self) -> String {
        match self {
            ParsedValue::Text(text) => text.clone(),
            ParsedValue::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            ParsedValue::NotAvailable => NOT_AVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub raw: String,
    pub parsed: ParsedValue,
}

impl CommandResult {
    pub fn new(raw: impl Into<String>, parsed: ParsedValue) -> Self {
        Self {
            raw: raw.into(),
            parsed,
        }
    }

    pub fn display_pair(&self) -> (String, String) {
        (self.raw.clone(), self.parsed.display_text())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads `NCP_USERNAME` / `NCP_PASSWORD`, falling back to the lab defaults.
    pub fn from_env() -> Self {
        let username = non_empty_env(USERNAME_ENV);
        let password = non_empty_env(PASSWORD_ENV);
        if username.is_none() || password.is_none() {
            tracing::warn!(
                "device credentials not fully set in {USERNAME_ENV}/{PASSWORD_ENV}; using lab defaults"
            );
        }
        Self {
            username: username.unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password: password.unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Netbox,
    Nautobot,
    Dnac,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Netbox, SourceKind::Nautobot, SourceKind::Dnac];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Netbox => "netbox",
            SourceKind::Nautobot => "nautobot",
            SourceKind::Dnac => "dnac",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Netbox => "Netbox",
            SourceKind::Nautobot => "Nautobot",
            SourceKind::Dnac => "Cisco DNAC",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SourceKind::Netbox => SourceKind::Nautobot,
            SourceKind::Nautobot => SourceKind::Dnac,
            SourceKind::Dnac => SourceKind::Netbox,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "netbox" => Ok(SourceKind::Netbox),
            "nautobot" => Ok(SourceKind::Nautobot),
            "dnac" | "catalyst-center" => Ok(SourceKind::Dnac),
            other => Err(format!("Unknown source kind: {other}")),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub source: SourceKind,
    pub url: String,
    pub token: String,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("source", &self.source)
            .field("url", &self.url)
            .field("token", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub source: SourceKind,
    pub records_written: usize,
    pub skipped: usize,
    pub pages_fetched: usize,
    pub finished_at: DateTime<Utc>,
}

/// Platform identifier understood by the connector (`cisco_ios`, `arista_eos`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceType(String);

impl DeviceType {
    pub const AUTODETECT: &'static str = "autodetect";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_autodetect(&self) -> bool {
        self.0 == Self::AUTODETECT || self.0.is_empty()
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
