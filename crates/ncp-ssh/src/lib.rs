//! SSH transport for device commands.
//!
//! Drives the system `ssh` client on a pseudo terminal, the way an operator
//! would: answer the password prompt, learn the device prompt, turn paging
//! off, then send commands and read until the prompt comes back.

pub mod output;
pub mod platform;
pub mod session;

use ncp_core::config::SshSettings;
use ncp_core::{
    Connection, ConnectError, Credentials, DeviceConnector, DeviceError, DeviceType,
    DeviceTypeDetector, ParsedValue,
};
use ncp_textfsm::{TemplateError, TemplateIndex};
use output::{classify_login, clean_command_output, ends_with_prompt, LoginEvent};
use serde_json::Value;
use session::{PtySession, SshError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const PROBE_PLATFORM: &str = "generic";

#[derive(Debug, Clone)]
pub struct SshConnector {
    settings: SshSettings,
    templates: Arc<TemplateIndex>,
}

impl SshConnector {
    /// Uses the built-in template index for structured output.
    pub fn new(settings: SshSettings) -> Result<Self, TemplateError> {
        Ok(Self::with_templates(settings, TemplateIndex::builtin()?))
    }

    pub fn with_templates(settings: SshSettings, templates: TemplateIndex) -> Self {
        Self {
            settings,
            templates: Arc::new(templates),
        }
    }

    pub fn ssh_args(&self, host: &str, username: &str) -> Vec<String> {
        let mut args = vec![
            "-tt".to_string(),
            "-p".to_string(),
            self.settings.port.to_string(),
            "-l".to_string(),
            username.to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.settings.connect_timeout_secs.max(1)),
            "-o".to_string(),
            "PreferredAuthentications=password,keyboard-interactive".to_string(),
            "-o".to_string(),
            "NumberOfPasswordPrompts=1".to_string(),
        ];
        if self.settings.strict_host_key_checking {
            args.extend(["-o".to_string(), "StrictHostKeyChecking=yes".to_string()]);
        } else {
            args.extend([
                "-o".to_string(),
                "StrictHostKeyChecking=no".to_string(),
                "-o".to_string(),
                "UserKnownHostsFile=/dev/null".to_string(),
            ]);
        }
        args.push(host.to_string());
        args
    }

    fn login_timeout(&self) -> Duration {
        // connect plus the password exchange
        Duration::from_secs(self.settings.connect_timeout_secs.max(1) * 2)
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.command_timeout_secs.max(1))
    }

    fn open(
        &self,
        host: &str,
        credentials: &Credentials,
        platform: &str,
    ) -> Result<(PtySession, String), ConnectError> {
        let args = self.ssh_args(host, &credentials.username);
        debug!(host, binary = %self.settings.binary, "opening ssh session");
        let mut session = PtySession::spawn(&self.settings.binary, &args)
            .map_err(|err| ConnectError::Setup(err.to_string()))?;

        let prompt = self.login(&mut session, host, credentials)?;
        debug!(host, prompt = %prompt, "device prompt learned");

        for command in platform::session_preparation(platform) {
            session
                .send_line(command)
                .map_err(|err| ConnectError::Setup(err.to_string()))?;
            session
                .wait_for(self.command_timeout(), |buf| ends_with_prompt(buf, &prompt))
                .map_err(|err| login_failure(host, err))?;
        }
        Ok((session, prompt))
    }

    fn login(
        &self,
        session: &mut PtySession,
        host: &str,
        credentials: &Credentials,
    ) -> Result<String, ConnectError> {
        let mut password_sent = false;
        loop {
            let text = session
                .wait_for(self.login_timeout(), |buf| classify_login(buf).is_some())
                .map_err(|err| login_failure(host, err))?;
            match classify_login(&text) {
                Some(LoginEvent::PasswordPrompt) if !password_sent => {
                    session
                        .send_line(&credentials.password)
                        .map_err(|err| ConnectError::Setup(err.to_string()))?;
                    password_sent = true;
                }
                Some(LoginEvent::PasswordPrompt) | Some(LoginEvent::Denied) => {
                    return Err(ConnectError::AuthFailure {
                        host: host.to_string(),
                    });
                }
                Some(LoginEvent::HostKeyPrompt) => {
                    session
                        .send_line("yes")
                        .map_err(|err| ConnectError::Setup(err.to_string()))?;
                }
                Some(LoginEvent::TimedOut) => {
                    return Err(ConnectError::Timeout {
                        host: host.to_string(),
                    });
                }
                Some(LoginEvent::Unreachable(reason)) => {
                    return Err(ConnectError::Unreachable {
                        host: host.to_string(),
                        reason,
                    });
                }
                Some(LoginEvent::Prompt(prompt)) => return Ok(prompt),
                None => {
                    return Err(ConnectError::Setup(format!(
                        "unexpected login output from {host}"
                    )))
                }
            }
        }
    }
}

fn login_failure(host: &str, err: SshError) -> ConnectError {
    match err {
        SshError::Timeout { .. } => ConnectError::Timeout {
            host: host.to_string(),
        },
        SshError::Closed { output } => match classify_login(&output) {
            Some(LoginEvent::Denied) | Some(LoginEvent::PasswordPrompt) => {
                ConnectError::AuthFailure {
                    host: host.to_string(),
                }
            }
            Some(LoginEvent::TimedOut) => ConnectError::Timeout {
                host: host.to_string(),
            },
            Some(LoginEvent::Unreachable(reason)) => ConnectError::Unreachable {
                host: host.to_string(),
                reason,
            },
            _ => ConnectError::Unreachable {
                host: host.to_string(),
                reason: last_meaningful_line(&output)
                    .unwrap_or("connection closed")
                    .to_string(),
            },
        },
        other => ConnectError::Setup(other.to_string()),
    }
}

fn last_meaningful_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

impl DeviceTypeDetector for SshConnector {
    fn detect_type(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<DeviceType, ConnectError> {
        let (session, prompt) = self.open(host, credentials, PROBE_PLATFORM)?;
        let mut probe = SshConnection::new(
            session,
            prompt,
            DeviceType::new(PROBE_PLATFORM),
            self.command_timeout(),
            self.templates.clone(),
        );
        let output = probe
            .read_command(platform::PROBE_COMMAND)
            .map_err(|err| match err {
                DeviceError::Timeout(_) => ConnectError::Timeout {
                    host: host.to_string(),
                },
                other => ConnectError::Setup(other.to_string()),
            })?;
        let detected = platform::match_signature(&output).ok_or_else(|| {
            ConnectError::Unrecognized {
                host: host.to_string(),
            }
        })?;
        info!(host, device_type = %detected, "device type detected");
        Ok(detected)
    }
}

impl DeviceConnector for SshConnector {
    fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
        device_type: &DeviceType,
    ) -> Result<Box<dyn Connection>, ConnectError> {
        if !platform::is_known(device_type.as_str()) {
            return Err(ConnectError::Setup(format!(
                "unsupported device type: {device_type}"
            )));
        }
        let (session, prompt) = self.open(host, credentials, device_type.as_str())?;
        Ok(Box::new(SshConnection::new(
            session,
            prompt,
            device_type.clone(),
            self.command_timeout(),
            self.templates.clone(),
        )))
    }
}

/// A logged-in session. The last command's output is kept so a raw read and
/// a structured read of the same command cost one round trip.
pub struct SshConnection {
    session: PtySession,
    prompt: String,
    device_type: DeviceType,
    command_timeout: Duration,
    templates: Arc<TemplateIndex>,
    last: Option<(String, String)>,
}

impl SshConnection {
    fn new(
        session: PtySession,
        prompt: String,
        device_type: DeviceType,
        command_timeout: Duration,
        templates: Arc<TemplateIndex>,
    ) -> Self {
        Self {
            session,
            prompt,
            device_type,
            command_timeout,
            templates,
            last: None,
        }
    }

    fn read_command(&mut self, command: &str) -> Result<String, DeviceError> {
        if let Some((previous, output)) = &self.last {
            if previous == command {
                return Ok(output.clone());
            }
        }
        self.session.discard_pending();
        self.session
            .send_line(command)
            .map_err(|err| DeviceError::Other(err.to_string()))?;
        let prompt = self.prompt.clone();
        let text = self
            .session
            .wait_for(self.command_timeout, |buf| ends_with_prompt(buf, &prompt))
            .map_err(|err| match err {
                SshError::Timeout { .. } => {
                    DeviceError::Timeout(self.command_timeout.as_secs())
                }
                SshError::Closed { .. } => DeviceError::Closed,
                other => DeviceError::Other(other.to_string()),
            })?;
        let output = clean_command_output(&text, command, &self.prompt);
        self.last = Some((command.to_string(), output.clone()));
        Ok(output)
    }
}

/// Structured output for `command`, falling back to the raw text when no
/// template applies or the template yields nothing.
pub fn structure_output(
    templates: &TemplateIndex,
    platform: &str,
    command: &str,
    output: String,
) -> ParsedValue {
    if output.trim().is_empty() {
        return ParsedValue::NotAvailable;
    }
    match templates.parse_output(platform, command, &output) {
        Some(Ok(rows)) if !rows.is_empty() => {
            ParsedValue::Structured(Value::Array(rows.into_iter().map(Value::Object).collect()))
        }
        Some(Ok(_)) | None => ParsedValue::Text(output),
        Some(Err(err)) => {
            warn!(platform, command, error = %err, "template parse failed");
            ParsedValue::Text(output)
        }
    }
}

impl Connection for SshConnection {
    fn device_type(&self) -> &DeviceType {
        &self.device_type
    }

    fn run(&mut self, command: &str, structured: bool) -> Result<ParsedValue, DeviceError> {
        let output = self.read_command(command)?;
        if !structured {
            return Ok(ParsedValue::Text(output));
        }
        Ok(structure_output(
            &self.templates,
            self.device_type.as_str(),
            command,
            output,
        ))
    }
}
