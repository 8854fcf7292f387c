use crate::http::{endpoint, get_json};
use ncp_core::{InventorySource, SourceDevice, SourceKind, SourceRequestError};
use reqwest::blocking::Client;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

const DEVICES_PATH: &str = "api/dcim/devices/";
/// Nautobot 2.x returns related objects as bare references at depth 0.
const NAUTOBOT_DEPTH: &str = "1";

/// Netbox and Nautobot share the `dcim/devices` REST shape and token auth.
pub struct NautobotLikeClient {
    kind: SourceKind,
    client: Client,
    base: Url,
    token: String,
    page_size: u64,
}

impl NautobotLikeClient {
    pub fn new(kind: SourceKind, client: Client, base: Url, token: &str, page_size: u64) -> Self {
        Self {
            kind,
            client,
            base,
            token: token.to_string(),
            page_size: page_size.max(1),
        }
    }

    fn first_page(&self) -> Result<Url, SourceRequestError> {
        let mut url = endpoint(&self.base, DEVICES_PATH)?;
        url.query_pairs_mut()
            .append_pair("limit", &self.page_size.to_string());
        if self.kind == SourceKind::Nautobot {
            url.query_pairs_mut().append_pair("depth", NAUTOBOT_DEPTH);
        }
        Ok(url)
    }
}

impl InventorySource for NautobotLikeClient {
    fn list_devices(&self) -> Result<Vec<SourceDevice>, SourceRequestError> {
        let auth = format!("Token {}", self.token);
        let mut devices = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(self.first_page()?);

        while let Some(url) = next.take() {
            if !seen.insert(url.to_string()) {
                return Err(SourceRequestError::Malformed(format!(
                    "pagination loops back to {url}"
                )));
            }
            let body = get_json(&self.client, &url, "Authorization", &auth)?;
            let (page, next_link) = parse_device_page(&body)?;
            debug!(source = %self.kind, count = page.len(), "device page fetched");
            devices.extend(page);
            next = match next_link {
                Some(link) => Some(Url::parse(&link).or_else(|_| endpoint(&self.base, &link))?),
                None => None,
            };
        }
        Ok(devices)
    }
}

/// Splits a paginated response into devices and the `next` link.
pub fn parse_device_page(
    body: &Value,
) -> Result<(Vec<SourceDevice>, Option<String>), SourceRequestError> {
    let results = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceRequestError::Malformed("missing results array".to_string()))?;
    let next = body
        .get("next")
        .and_then(Value::as_str)
        .filter(|link| !link.is_empty())
        .map(str::to_string);
    Ok((results.iter().map(project_device).collect(), next))
}

pub fn project_device(device: &Value) -> SourceDevice {
    let primary_ip = ["primary_ip", "primary_ip4"]
        .iter()
        .find_map(|field| string_at(device, &[*field, "address"]));
    let device_type = ["display", "model", "name"]
        .iter()
        .find_map(|field| string_at(device, &["device_type", *field]));
    SourceDevice {
        name: string_at(device, &["name"]),
        primary_ip,
        device_type,
    }
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn netbox_device_projects_nested_fields() {
        let device = json!({
            "id": 7,
            "name": "nyc-core-01",
            "device_type": {"id": 3, "display": "Catalyst 9500-48Y4C", "model": "C9500-48Y4C"},
            "primary_ip": {"id": 12, "address": "10.10.0.1/32"},
        });
        assert_eq!(
            project_device(&device),
            SourceDevice {
                name: Some("nyc-core-01".to_string()),
                primary_ip: Some("10.10.0.1/32".to_string()),
                device_type: Some("Catalyst 9500-48Y4C".to_string()),
            }
        );
    }

    #[test]
    fn missing_primary_ip_falls_back_to_ipv4_field() {
        let device = json!({
            "name": "lab-sw",
            "device_type": {"model": "EX4300"},
            "primary_ip": null,
            "primary_ip4": {"address": "192.0.2.44/24"},
        });
        let projected = project_device(&device);
        assert_eq!(projected.primary_ip.as_deref(), Some("192.0.2.44/24"));
        assert_eq!(projected.device_type.as_deref(), Some("EX4300"));
    }

    #[test]
    fn unnamed_devices_keep_none() {
        let projected = project_device(&json!({"name": null, "primary_ip": null}));
        assert_eq!(projected, SourceDevice::default());
        assert!(projected.into_record().is_none());
    }

    #[test]
    fn page_exposes_next_link() {
        let body = json!({
            "count": 3,
            "next": "https://nb.example/api/dcim/devices/?limit=2&offset=2",
            "previous": null,
            "results": [{"name": "a"}, {"name": "b"}],
        });
        let (devices, next) = parse_device_page(&body).expect("page");
        assert_eq!(devices.len(), 2);
        assert_eq!(
            next.as_deref(),
            Some("https://nb.example/api/dcim/devices/?limit=2&offset=2")
        );

        let (_, next) = parse_device_page(&json!({"next": null, "results": []})).expect("last");
        assert!(next.is_none());
    }

    fn client(kind: SourceKind) -> NautobotLikeClient {
        NautobotLikeClient::new(
            kind,
            Client::new(),
            Url::parse("https://sot.example/").expect("base"),
            "tok",
            100,
        )
    }

    #[test]
    fn nautobot_asks_for_nested_objects() {
        assert_eq!(
            client(SourceKind::Nautobot).first_page().expect("url").as_str(),
            "https://sot.example/api/dcim/devices/?limit=100&depth=1"
        );
        assert_eq!(
            client(SourceKind::Netbox).first_page().expect("url").as_str(),
            "https://sot.example/api/dcim/devices/?limit=100"
        );
    }

    #[test]
    fn bare_references_carry_no_address_or_model() {
        let device = json!({
            "name": "core1",
            "device_type": {"id": "5b1c", "object_type": "dcim.devicetype", "url": "https://sot.example/api/dcim/device-types/5b1c/"},
            "primary_ip4": {"id": "9a2f", "object_type": "ipam.ipaddress", "url": "https://sot.example/api/ipam/ip-addresses/9a2f/"},
        });
        let projected = project_device(&device);
        assert_eq!(projected.primary_ip, None);
        assert_eq!(projected.device_type, None);
    }

    #[test]
    fn page_without_results_is_malformed() {
        assert!(matches!(
            parse_device_page(&json!({"detail": "Invalid token"})),
            Err(SourceRequestError::Malformed(_))
        ));
    }
}
