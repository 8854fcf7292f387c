use regex::Regex;
use std::sync::OnceLock;

fn ansi_regex() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07]*\x07|\x1b[()][AB012]|\x1b[=>]")
            .expect("valid regex")
    })
}

fn prompt_regex() -> &'static Regex {
    static PROMPT: OnceLock<Regex> = OnceLock::new();
    PROMPT.get_or_init(|| {
        Regex::new(r"^[\w.\-@/:()~\[\]]{1,64}(?: ?\([\w.\-]+\))?[>#$%]\s*$")
            .expect("valid regex")
    })
}

/// Removes terminal escapes and carriage returns.
pub fn sanitize(text: &str) -> String {
    let stripped = ansi_regex().replace_all(text, "");
    stripped.replace("\r\n", "\n").replace('\r', "")
}

pub fn last_line(text: &str) -> &str {
    text.rsplit('\n').next().unwrap_or(text)
}

/// The trailing device prompt, if the text currently ends with one.
pub fn trailing_prompt(text: &str) -> Option<String> {
    let line = last_line(text).trim();
    if prompt_regex().is_match(line) {
        Some(line.to_string())
    } else {
        None
    }
}

/// Only the last raw line is sanitized, so this stays cheap on long output.
pub fn ends_with_prompt(text: &str, prompt: &str) -> bool {
    sanitize(last_line(text)).trim_end().ends_with(prompt.trim_end())
}

/// Drops the echoed command line and the trailing prompt from command output.
pub fn clean_command_output(text: &str, command: &str, prompt: &str) -> String {
    let text = sanitize(text);
    let mut lines: Vec<&str> = text.split('\n').collect();

    if let Some(first) = lines.first() {
        if first.trim_end().ends_with(command.trim()) {
            lines.remove(0);
        }
    }
    if let Some(last) = lines.last() {
        if last.trim_end().ends_with(prompt.trim_end()) {
            lines.pop();
        }
    }

    let joined = lines.join("\n");
    joined.trim_end().trim_start_matches('\n').to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginEvent {
    PasswordPrompt,
    HostKeyPrompt,
    Denied,
    TimedOut,
    Unreachable(String),
    Prompt(String),
}

/// Classifies what the ssh client is waiting on, or `None` if it needs more output.
pub fn classify_login(text: &str) -> Option<LoginEvent> {
    let text = sanitize(text);
    if text.contains("Permission denied") || text.contains("Authentication failed") {
        return Some(LoginEvent::Denied);
    }
    if text.contains("Connection timed out") || text.contains("Operation timed out") {
        return Some(LoginEvent::TimedOut);
    }
    for marker in [
        "Could not resolve hostname",
        "No route to host",
        "Connection refused",
        "Network is unreachable",
        "Connection closed by",
        "Host key verification failed",
    ] {
        if let Some(line) = text.lines().find(|line| line.contains(marker)) {
            return Some(LoginEvent::Unreachable(line.trim().to_string()));
        }
    }
    let tail = last_line(&text).trim_end();
    if tail.contains("(yes/no") {
        return Some(LoginEvent::HostKeyPrompt);
    }
    if tail.to_lowercase().ends_with("password:") {
        return Some(LoginEvent::PasswordPrompt);
    }
    trailing_prompt(&text).map(LoginEvent::Prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_escapes_and_carriage_returns() {
        assert_eq!(sanitize("\x1b[?2004hrouter#\r\n\x1b[0mok\r"), "router#\nok");
    }

    #[test]
    fn prompt_detection_covers_common_platforms() {
        for prompt in [
            "edge-rtr-01#",
            "edge-rtr-01>",
            "leaf1(config)#",
            "netops@mx480-re0> ",
            "RP/0/RSP0/CPU0:xr1#",
            "[admin@vyos]$ ",
        ] {
            assert_eq!(
                trailing_prompt(&format!("banner\n{prompt}")).as_deref(),
                Some(prompt.trim())
            );
        }
        assert!(trailing_prompt("Cisco IOS Software, Version 15.2").is_none());
        assert!(trailing_prompt("").is_none());
    }

    #[test]
    fn command_echo_and_prompt_are_removed() {
        let text = "show clock\r\n*12:01:02.345 UTC Mon Oct 5 2026\r\nedge-rtr-01#";
        assert_eq!(
            clean_command_output(text, "show clock", "edge-rtr-01#"),
            "*12:01:02.345 UTC Mon Oct 5 2026"
        );
    }

    #[test]
    fn multi_line_output_keeps_inner_lines() {
        let text = "show ip int brief\nInterface  IP-Address\nGi0/0      10.0.0.1\n\nr1#";
        assert_eq!(
            clean_command_output(text, "show ip int brief", "r1#"),
            "Interface  IP-Address\nGi0/0      10.0.0.1"
        );
    }

    #[test]
    fn prompt_wait_ignores_echo_in_progress() {
        assert!(!ends_with_prompt("r1#show ver", "r1#"));
        assert!(ends_with_prompt("r1#show ver\r\nCisco IOS\r\nr1#", "r1#"));
        assert!(ends_with_prompt("out\r\n\x1b[0mnetops@mx1> ", "netops@mx1>"));
    }

    #[test]
    fn login_events_are_classified() {
        assert_eq!(
            classify_login("admin@10.0.0.5's password: "),
            Some(LoginEvent::PasswordPrompt)
        );
        assert_eq!(
            classify_login("Password:"),
            Some(LoginEvent::PasswordPrompt)
        );
        assert_eq!(
            classify_login("Are you sure you want to continue connecting (yes/no/[fingerprint])? "),
            Some(LoginEvent::HostKeyPrompt)
        );
        assert_eq!(
            classify_login("Permission denied, please try again.\r\n"),
            Some(LoginEvent::Denied)
        );
        assert_eq!(
            classify_login("ssh: connect to host 10.0.0.9 port 22: Connection timed out\r\n"),
            Some(LoginEvent::TimedOut)
        );
        assert_eq!(
            classify_login("ssh: Could not resolve hostname nope: Name or service not known\r\n"),
            Some(LoginEvent::Unreachable(
                "ssh: Could not resolve hostname nope: Name or service not known".to_string()
            ))
        );
        assert_eq!(
            classify_login("\r\nUnauthorized access prohibited\r\nedge-rtr-01#"),
            Some(LoginEvent::Prompt("edge-rtr-01#".to_string()))
        );
        assert_eq!(classify_login("Last login: Mon Oct"), None);
    }
}
