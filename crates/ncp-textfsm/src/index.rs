use crate::{Row, Template, TemplateError};
use regex::Regex;

const BUILTIN_INDEX: &str = include_str!("../templates/index");

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (
        "cisco_ios_show_version.textfsm",
        include_str!("../templates/cisco_ios_show_version.textfsm"),
    ),
    (
        "cisco_ios_show_ip_interface_brief.textfsm",
        include_str!("../templates/cisco_ios_show_ip_interface_brief.textfsm"),
    ),
    (
        "cisco_nxos_show_version.textfsm",
        include_str!("../templates/cisco_nxos_show_version.textfsm"),
    ),
    (
        "arista_eos_show_version.textfsm",
        include_str!("../templates/arista_eos_show_version.textfsm"),
    ),
    (
        "juniper_junos_show_version.textfsm",
        include_str!("../templates/juniper_junos_show_version.textfsm"),
    ),
];

#[derive(Debug, Clone)]
struct IndexEntry {
    template: String,
    platform: String,
    command: Regex,
}

/// Maps `(platform, command)` to a template, ntc-templates style.
#[derive(Debug, Clone)]
pub struct TemplateIndex {
    entries: Vec<IndexEntry>,
    sources: Vec<(String, String)>,
}

impl TemplateIndex {
    pub fn builtin() -> Result<Self, TemplateError> {
        let sources = BUILTIN_TEMPLATES
            .iter()
            .map(|(name, body)| (name.to_string(), body.to_string()))
            .collect();
        Self::from_parts(BUILTIN_INDEX, sources)
    }

    /// `index` rows are `Template, Hostname, Platform, Command`; the first
    /// non-comment row is the header.
    pub fn from_parts(index: &str, sources: Vec<(String, String)>) -> Result<Self, TemplateError> {
        let mut entries = Vec::new();
        let mut seen_header = false;
        for (idx, line) in index.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if !seen_header {
                seen_header = true;
                continue;
            }
            let columns: Vec<&str> = trimmed.split(',').map(str::trim).collect();
            if columns.len() != 4 {
                return Err(TemplateError::Syntax {
                    line: idx + 1,
                    reason: format!("expected 4 index columns, found {}", columns.len()),
                });
            }
            let pattern = format!(r"^{}\s*$", expand_completion(columns[3]));
            let command = Regex::new(&pattern).map_err(|err| TemplateError::Regex {
                line: idx + 1,
                reason: err.to_string(),
            })?;
            for template in columns[0].split(':') {
                if !sources.iter().any(|(name, _)| name == template) {
                    return Err(TemplateError::UnknownTemplate(template.to_string()));
                }
            }
            entries.push(IndexEntry {
                template: columns[0].to_string(),
                platform: columns[2].to_string(),
                command,
            });
        }
        Ok(Self { entries, sources })
    }

    pub fn find(&self, platform: &str, command: &str) -> Option<&str> {
        let command = normalize_command(command);
        self.entries
            .iter()
            .find(|entry| entry.platform == platform && entry.command.is_match(&command))
            .map(|entry| entry.template.as_str())
    }

    /// Parses `output` with the template registered for the command, if any.
    pub fn parse_output(
        &self,
        platform: &str,
        command: &str,
        output: &str,
    ) -> Option<Result<Vec<Row>, TemplateError>> {
        let names = self.find(platform, command)?;
        Some(self.run_templates(names, output))
    }

    fn run_templates(&self, names: &str, output: &str) -> Result<Vec<Row>, TemplateError> {
        let mut rows = Vec::new();
        for name in names.split(':') {
            let source = self
                .sources
                .iter()
                .find(|(candidate, _)| candidate == name)
                .map(|(_, body)| body.as_str())
                .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))?;
            rows.extend(Template::parse(source)?.parse_text(output)?);
        }
        Ok(rows)
    }
}

fn normalize_command(command: &str) -> String {
    command.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `sh[[ow]]` becomes `sh(o(w)?)?`.
pub fn expand_completion(command: &str) -> String {
    let mut out = String::new();
    let mut rest = command;
    while let Some(start) = rest.find("[[") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("]]") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let optional = &after[..end];
        for ch in optional.chars() {
            out.push('(');
            out.push(ch);
        }
        for _ in optional.chars() {
            out.push_str(")?");
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completion_expands_nested_optionals() {
        assert_eq!(expand_completion("sh[[ow]] ver[[sion]]"), "sh(o(w)?)? ver(s(i(o(n)?)?)?)?");
        assert_eq!(expand_completion("show clock"), "show clock");
    }

    #[test]
    fn builtin_index_resolves_abbreviations() {
        let index = TemplateIndex::builtin().expect("index");
        assert_eq!(
            index.find("cisco_ios", "sh ver"),
            Some("cisco_ios_show_version.textfsm")
        );
        assert_eq!(
            index.find("cisco_ios", "show   ip int brief"),
            Some("cisco_ios_show_ip_interface_brief.textfsm")
        );
        assert_eq!(index.find("cisco_ios", "show running-config"), None);
        assert_eq!(index.find("linux", "show version"), None);
    }

    #[test]
    fn every_builtin_template_compiles() {
        for (name, body) in BUILTIN_TEMPLATES {
            assert!(Template::parse(body).is_ok(), "{name} failed to compile");
        }
    }

    #[test]
    fn ios_show_version_is_parsed() {
        let output = "\
Cisco IOS Software, C2900 Software (C2900-UNIVERSALK9-M), Version 15.2(4)M6, RELEASE SOFTWARE (fc2)
Technical Support: http://www.cisco.com/techsupport
ROM: System Bootstrap, Version 15.0(1r)M16, RELEASE SOFTWARE (fc1)

edge-rtr-01 uptime is 2 weeks, 3 days, 4 hours, 12 minutes
System returned to ROM by power-on
System image file is \"flash0:c2900-universalk9-mz.SPA.152-4.M6.bin\"
cisco CISCO2901/K9 (revision 1.0) with 483328K/40960K bytes of memory.
Processor board ID FTX1840ABCD
Configuration register is 0x2102
";
        let index = TemplateIndex::builtin().expect("index");
        let rows = index
            .parse_output("cisco_ios", "show version", output)
            .expect("template")
            .expect("parse");
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["version"], json!("15.2(4)M6"));
        assert_eq!(row["hostname"], json!("edge-rtr-01"));
        assert_eq!(row["uptime"], json!("2 weeks, 3 days, 4 hours, 12 minutes"));
        assert_eq!(row["running_image"], json!("c2900-universalk9-mz.SPA.152-4.M6.bin"));
        assert_eq!(row["hardware"], json!(["CISCO2901/K9"]));
        assert_eq!(row["serial"], json!(["FTX1840ABCD"]));
        assert_eq!(row["config_register"], json!("0x2102"));
    }

    #[test]
    fn ios_interface_brief_yields_row_per_interface() {
        let output = "\
Interface              IP-Address      OK? Method Status                Protocol
GigabitEthernet0/0     10.0.0.1        YES NVRAM  up                    up
GigabitEthernet0/1     unassigned      YES NVRAM  administratively down down
Loopback0              192.0.2.1       YES manual up                    up
";
        let index = TemplateIndex::builtin().expect("index");
        let rows = index
            .parse_output("cisco_ios", "sh ip int br", output)
            .expect("template")
            .expect("parse");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1]["interface"], json!("GigabitEthernet0/1"));
        assert_eq!(rows[1]["status"], json!("administratively down"));
        assert_eq!(rows[2]["ip_address"], json!("192.0.2.1"));
    }

    #[test]
    fn eos_show_version_is_parsed() {
        let output = "\
Arista DCS-7050SX-64-F
Hardware version:    01.11
Serial number:       JPE12345678
System MAC address:  001c.7300.0001

Software image version: 4.28.3M
Architecture:           i686
Internal build version: 4.28.3M-29094146.4283M
Internal build ID:      4b8a13d9-23c0-4d5e-9f1a-aaaaaaaaaaaa

Uptime:                 6 weeks, 1 day, 2 hours and 41 minutes
Total memory:           3982512 kB
Free memory:            2335640 kB
";
        let index = TemplateIndex::builtin().expect("index");
        let rows = index
            .parse_output("arista_eos", "show version", output)
            .expect("template")
            .expect("parse");
        assert_eq!(rows[0]["model"], json!("DCS-7050SX-64-F"));
        assert_eq!(rows[0]["image"], json!("4.28.3M"));
        assert_eq!(rows[0]["total_memory"], json!("3982512"));
    }

    #[test]
    fn index_rejects_unknown_templates() {
        let err = TemplateIndex::from_parts(
            "Template, Hostname, Platform, Command\nmissing.textfsm, .*, cisco_ios, show clock\n",
            Vec::new(),
        )
        .expect_err("unknown");
        assert_eq!(err, TemplateError::UnknownTemplate("missing.textfsm".to_string()));
    }
}
