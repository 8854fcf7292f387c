use ncp_core::config::SotSettings;
use ncp_core::{
    load_persisted_inventory, InventorySync, JsonFileStore, SourceClientFactory, SourceKind,
    SourceRequestError,
};
use ncp_sot::HttpSourceFactory;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

#[derive(Debug, Clone)]
struct Seen {
    target: String,
    headers: Vec<String>,
}

struct Route {
    target: String,
    status: u16,
    body: String,
}

fn route(target: impl Into<String>, status: u16, body: serde_json::Value) -> Route {
    Route {
        target: target.into(),
        status,
        body: body.to_string(),
    }
}

/// Serves canned JSON per request target; records every request it sees.
fn serve(build: impl FnOnce(&str) -> Vec<Route>) -> (String, Arc<Mutex<Vec<Seen>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let routes = build(&base);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
                    break;
                }
                headers.push(line.trim().to_string());
            }
            let target = request_line
                .split_whitespace()
                .nth(1)
                .unwrap_or_default()
                .to_string();
            log.lock().expect("log").push(Seen {
                target: target.clone(),
                headers,
            });

            let (status, body) = routes
                .iter()
                .find(|route| route.target == target)
                .map(|route| (route.status, route.body.clone()))
                .unwrap_or((404, "{\"detail\":\"Not found.\"}".to_string()));
            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    (base, seen)
}

fn factory() -> HttpSourceFactory {
    HttpSourceFactory::new(SotSettings {
        request_timeout_secs: 5,
        page_size: 2,
        insecure: false,
    })
}

#[test]
fn netbox_client_follows_next_links_with_token_auth() {
    let (base, seen) = serve(|base| {
        vec![
            route(
                "/api/dcim/devices/?limit=2",
                200,
                json!({
                    "count": 3,
                    "next": format!("{base}/api/dcim/devices/?limit=2&offset=2"),
                    "results": [
                        {"name": "r1", "primary_ip": {"address": "10.0.0.1/32"}, "device_type": {"display": "ISR4331"}},
                        {"name": "r2", "primary_ip": null, "device_type": {"display": "ISR4331"}}
                    ]
                }),
            ),
            route(
                "/api/dcim/devices/?limit=2&offset=2",
                200,
                json!({
                    "count": 3,
                    "next": null,
                    "results": [
                        {"name": "r3", "primary_ip": {"address": "10.0.0.3/32"}, "device_type": {"model": "C8300"}}
                    ]
                }),
            ),
        ]
    });

    let source = factory()
        .inventory_source(SourceKind::Netbox, &base, "0123abcd")
        .expect("source");
    let devices = source.list_devices().expect("devices");
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[2].device_type.as_deref(), Some("C8300"));

    let seen = seen.lock().expect("seen");
    assert_eq!(seen.len(), 2);
    assert!(seen[0]
        .headers
        .iter()
        .any(|header| header.eq_ignore_ascii_case("authorization: Token 0123abcd")));
}

#[test]
fn unauthorized_netbox_maps_to_request_error() {
    let (base, _) = serve(|_| {
        vec![route(
            "/api/dcim/devices/?limit=2",
            403,
            json!({"detail": "Invalid token"}),
        )]
    });
    let source = factory()
        .inventory_source(SourceKind::Netbox, &base, "bad")
        .expect("source");
    assert_eq!(
        source.list_devices(),
        Err(SourceRequestError::Unauthorized { status: 403 })
    );
}

#[test]
fn nautobot_devices_are_fetched_with_nested_objects() {
    let (base, seen) = serve(|base| {
        vec![
            route(
                "/api/dcim/devices/?limit=2",
                200,
                json!({
                    "next": null,
                    "results": [{
                        "name": "core1",
                        "device_type": {"id": "5b1c", "object_type": "dcim.devicetype", "url": format!("{base}/api/dcim/device-types/5b1c/")},
                        "primary_ip4": {"id": "9a2f", "object_type": "ipam.ipaddress", "url": format!("{base}/api/ipam/ip-addresses/9a2f/")}
                    }]
                }),
            ),
            route(
                "/api/dcim/devices/?limit=2&depth=1",
                200,
                json!({
                    "next": null,
                    "results": [{
                        "name": "core1",
                        "device_type": {"id": "5b1c", "display": "Cisco C9500-48Y4C", "model": "C9500-48Y4C"},
                        "primary_ip4": {"id": "9a2f", "address": "10.20.0.1/32"}
                    }]
                }),
            ),
        ]
    });

    let source = factory()
        .inventory_source(SourceKind::Nautobot, &base, "tok")
        .expect("source");
    let devices = source.list_devices().expect("devices");
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].primary_ip.as_deref(), Some("10.20.0.1/32"));
    assert_eq!(devices[0].device_type.as_deref(), Some("Cisco C9500-48Y4C"));
    assert_eq!(
        seen.lock().expect("seen")[0].target,
        "/api/dcim/devices/?limit=2&depth=1"
    );
}

#[test]
fn dnac_sync_pages_through_every_device() {
    let devices: Vec<_> = (0..3)
        .map(|idx| {
            json!({
                "hostname": format!("c9k-{idx}"),
                "managementIpAddress": format!("10.1.0.{idx}"),
                "platformId": "C9300-48P"
            })
        })
        .collect();
    let (base, seen) = serve(move |_| {
        vec![
            route(
                "/dna/intent/api/v1/network-device/count",
                200,
                json!({"response": 3, "version": "1.0"}),
            ),
            route(
                "/dna/intent/api/v1/network-device?limit=500",
                200,
                json!({"response": devices, "version": "1.0"}),
            ),
        ]
    });

    let dir = TempDir::new().expect("tempdir");
    let store = JsonFileStore::new(dir.path().join("inventory.json"));
    let sync = InventorySync::new(factory(), store.clone());
    assert!(sync.sync("dnac", &base, "dnac-token"));

    let records = load_persisted_inventory(&store);
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].name, "c9k-1");
    assert_eq!(records[1].primary_ip, "10.1.0.1");

    let seen = seen.lock().expect("seen");
    assert!(seen.iter().all(|request| request
        .headers
        .iter()
        .any(|header| header.eq_ignore_ascii_case("x-auth-token: dnac-token"))));
}

#[test]
fn rate_limited_dnac_count_fails_sync_without_writing() {
    let (base, _) = serve(|_| {
        vec![route(
            "/dna/intent/api/v1/network-device/count",
            429,
            json!({"error": "slow down"}),
        )]
    });
    let dir = TempDir::new().expect("tempdir");
    let store = JsonFileStore::new(dir.path().join("inventory.json"));
    let sync = InventorySync::new(factory(), store.clone());

    assert!(!sync.sync("dnac", &base, "tok"));
    assert!(!store.path().exists());
}
