use ncp_core::DeviceType;

/// Platforms the connector knows how to prepare a session for.
pub const KNOWN_PLATFORMS: &[&str] = &[
    "cisco_ios",
    "cisco_xe",
    "cisco_xr",
    "cisco_nxos",
    "arista_eos",
    "juniper_junos",
    "linux",
];

/// `show version` substrings, checked in order. IOS XE prints both its own
/// banner and the classic IOS one, so it must be checked before `cisco_ios`.
const SIGNATURES: &[(&str, &[&str])] = &[
    ("cisco_xr", &["Cisco IOS XR Software", "IOS-XR"]),
    ("cisco_nxos", &["Cisco Nexus Operating System", "NX-OS"]),
    ("cisco_xe", &["Cisco IOS XE Software", "IOS-XE Software"]),
    (
        "cisco_ios",
        &[
            "Cisco IOS Software",
            "Cisco Internetwork Operating System Software",
        ],
    ),
    ("arista_eos", &["Arista"]),
    ("juniper_junos", &["JUNOS", "Junos:"]),
];

pub const PROBE_COMMAND: &str = "show version";

/// Commands that turn off output paging for a platform.
pub fn session_preparation(device_type: &str) -> &'static [&'static str] {
    match device_type {
        "cisco_ios" | "cisco_xe" => &["terminal length 0", "terminal width 511"],
        "cisco_xr" | "cisco_nxos" | "arista_eos" => &["terminal length 0"],
        "juniper_junos" => &["set cli screen-length 0"],
        "linux" => &[],
        _ => &["terminal length 0"],
    }
}

/// Matches probe output against the known banners.
pub fn match_signature(output: &str) -> Option<DeviceType> {
    SIGNATURES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| output.contains(needle)))
        .map(|(platform, _)| DeviceType::new(*platform))
}

pub fn is_known(device_type: &str) -> bool {
    KNOWN_PLATFORMS.contains(&device_type)
}
