use ncp_core::config::SotSettings;
use ncp_core::SourceRequestError;
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub fn build_client(settings: &SotSettings) -> Result<Client, SourceRequestError> {
    Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
        .danger_accept_invalid_certs(settings.insecure)
        .user_agent(concat!("netcockpit/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| SourceRequestError::Transport(err.to_string()))
}

/// Normalizes a user supplied base URL so relative API paths join under it.
pub fn parse_base(raw: &str) -> Result<Url, SourceRequestError> {
    let trimmed = raw.trim();
    let mut url = Url::parse(trimmed)
        .map_err(|err| SourceRequestError::InvalidEndpoint(format!("{trimmed}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SourceRequestError::InvalidEndpoint(format!(
            "{trimmed}: unsupported scheme {}",
            url.scheme()
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

pub fn endpoint(base: &Url, path: &str) -> Result<Url, SourceRequestError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|err| SourceRequestError::InvalidEndpoint(format!("{path}: {err}")))
}

pub fn classify_status(status: u16, body: &str) -> Result<(), SourceRequestError> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(SourceRequestError::Unauthorized { status }),
        429 => Err(SourceRequestError::RateLimited),
        _ => Err(SourceRequestError::Status {
            status,
            body: truncate(body, 200),
        }),
    }
}

fn truncate(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max).collect();
    out.push_str("...");
    out
}

/// GET `url` with one auth header and decode the JSON body.
pub fn get_json(
    client: &Client,
    url: &Url,
    auth_header: &str,
    auth_value: &str,
) -> Result<Value, SourceRequestError> {
    debug!(url = %url, "sot request");
    let resp = client
        .get(url.clone())
        .header(auth_header, auth_value)
        .header("Accept", "application/json")
        .send()
        .map_err(|err| SourceRequestError::Transport(err.to_string()))?;

    let status = resp.status();
    let text = resp
        .text()
        .map_err(|err| SourceRequestError::Transport(err.to_string()))?;
    classify_status(status.as_u16(), &text)?;

    serde_json::from_str(&text)
        .map_err(|err| SourceRequestError::Malformed(format!("{url}: {err}")))
}
