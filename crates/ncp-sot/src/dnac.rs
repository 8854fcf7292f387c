use crate::http::{endpoint, get_json};
use ncp_core::{DnacSource, SourceRequestError};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

const DEVICES_PATH: &str = "dna/intent/api/v1/network-device";
const COUNT_PATH: &str = "dna/intent/api/v1/network-device/count";
const AUTH_HEADER: &str = "X-Auth-Token";

/// Cisco DNA Center intent API client.
pub struct DnacClient {
    client: Client,
    base: Url,
    token: String,
}

impl DnacClient {
    pub fn new(client: Client, base: Url, token: &str) -> Self {
        Self {
            client,
            base,
            token: token.to_string(),
        }
    }

    pub fn page_url(&self, limit: u64, offset: Option<u64>) -> Result<Url, SourceRequestError> {
        let mut url = endpoint(&self.base, DEVICES_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(offset) = offset {
                query.append_pair("offset", &offset.to_string());
            }
        }
        Ok(url)
    }
}

impl DnacSource for DnacClient {
    fn count_devices(&self) -> Result<u64, SourceRequestError> {
        let url = endpoint(&self.base, COUNT_PATH)?;
        let body = get_json(&self.client, &url, AUTH_HEADER, &self.token)?;
        parse_count(&body)
    }

    fn list_devices_page(
        &self,
        limit: u64,
        offset: Option<u64>,
    ) -> Result<Vec<Value>, SourceRequestError> {
        let url = self.page_url(limit, offset)?;
        let body = get_json(&self.client, &url, AUTH_HEADER, &self.token)?;
        let devices = parse_page(body)?;
        debug!(limit, offset = ?offset, count = devices.len(), "dnac page fetched");
        Ok(devices)
    }
}

pub fn parse_count(body: &Value) -> Result<u64, SourceRequestError> {
    body.get("response")
        .and_then(Value::as_u64)
        .ok_or_else(|| SourceRequestError::Malformed("count response is not a number".to_string()))
}

pub fn parse_page(body: Value) -> Result<Vec<Value>, SourceRequestError> {
    match body {
        Value::Object(mut map) => match map.remove("response") {
            Some(Value::Array(devices)) => Ok(devices),
            _ => Err(SourceRequestError::Malformed(
                "missing response array".to_string(),
            )),
        },
        _ => Err(SourceRequestError::Malformed(
            "device page is not an object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{build_client, parse_base};
    use ncp_core::config::SotSettings;
    use serde_json::json;

    #[test]
    fn first_page_omits_offset() {
        let client = DnacClient::new(
            build_client(&SotSettings::default()).expect("client"),
            parse_base("https://dnac.example").expect("base"),
            "tok",
        );
        assert_eq!(
            client.page_url(500, None).expect("url").as_str(),
            "https://dnac.example/dna/intent/api/v1/network-device?limit=500"
        );
        assert_eq!(
            client.page_url(500, Some(1000)).expect("url").as_str(),
            "https://dnac.example/dna/intent/api/v1/network-device?limit=500&offset=1000"
        );
    }

    #[test]
    fn count_and_page_bodies_are_decoded() {
        assert_eq!(parse_count(&json!({"response": 1203, "version": "1.0"})), Ok(1203));
        assert!(parse_count(&json!({"response": "many"})).is_err());

        let devices = parse_page(json!({
            "response": [{"hostname": "c9k-1", "managementIpAddress": "10.0.0.1"}],
            "version": "1.0"
        }))
        .expect("page");
        assert_eq!(devices[0]["hostname"], json!("c9k-1"));
        assert!(parse_page(json!({"error": "expired"})).is_err());
    }
}
