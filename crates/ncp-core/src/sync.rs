use crate::error::SyncError;
use crate::model::{DeviceRecord, SourceKind, SyncConfig, SyncReport, MISSING_VALUE};
use crate::source::{DnacSource, SourceClientFactory};
use crate::store::InventoryStore;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

pub const DNAC_PAGE_SIZE: u64 = 500;

pub struct InventorySync<F, S> {
    factory: F,
    store: S,
}

impl<F, S> InventorySync<F, S>
where
    F: SourceClientFactory,
    S: InventoryStore,
{
    pub fn new(factory: F, store: S) -> Self {
        Self { factory, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Syncs from the named source; `true` only when the inventory was persisted.
    pub fn sync(&self, source_kind: &str, url: &str, token: &str) -> bool {
        let outcome = validate(source_kind, url, token).and_then(|config| self.run(&config));
        match outcome {
            Ok(report) => {
                info!(
                    source = %report.source,
                    records = report.records_written,
                    skipped = report.skipped,
                    pages = report.pages_fetched,
                    "inventory sync complete"
                );
                true
            }
            Err(err) => {
                warn!(source = source_kind, error = %err, "inventory sync failed");
                false
            }
        }
    }

    pub fn run(&self, config: &SyncConfig) -> Result<SyncReport, SyncError> {
        let (records, skipped, pages_fetched) = match config.source {
            SourceKind::Netbox | SourceKind::Nautobot => {
                let source =
                    self.factory
                        .inventory_source(config.source, &config.url, &config.token)?;
                let devices = source.list_devices()?;
                let total = devices.len();
                let records: Vec<DeviceRecord> = devices
                    .into_iter()
                    .filter_map(|device| device.into_record())
                    .collect();
                let skipped = total - records.len();
                (records, skipped, 1)
            }
            SourceKind::Dnac => {
                let source = self.factory.dnac_source(&config.url, &config.token)?;
                let (raw, pages) = fetch_dnac_devices(source.as_ref())?;
                let records: Vec<DeviceRecord> = raw.iter().map(project_dnac_device).collect();
                (records, 0, pages)
            }
        };

        self.store.replace(&records)?;
        if !self.store.exists() {
            return Err(SyncError::NotPersisted(self.store.location()));
        }

        Ok(SyncReport {
            source: config.source,
            records_written: records.len(),
            skipped,
            pages_fetched,
            finished_at: Utc::now(),
        })
    }
}

pub fn validate(source_kind: &str, url: &str, token: &str) -> Result<SyncConfig, SyncError> {
    let source = source_kind
        .parse::<SourceKind>()
        .map_err(SyncError::InvalidInput)?;
    let url = url.trim();
    if url.is_empty() {
        return Err(SyncError::InvalidInput("url is empty".to_string()));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(SyncError::InvalidInput("token is empty".to_string()));
    }
    Ok(SyncConfig {
        source,
        url: url.to_string(),
        token: token.to_string(),
    })
}

pub fn page_count(total: u64) -> u64 {
    total.div_ceil(DNAC_PAGE_SIZE)
}

/// Collects every page before returning; nothing is persisted per page.
fn fetch_dnac_devices(source: &dyn DnacSource) -> Result<(Vec<Value>, usize), SyncError> {
    let total = source.count_devices()?;
    if total == 0 {
        return Err(SyncError::EmptyInventory);
    }

    let pages = page_count(total);
    let mut devices = Vec::new();
    for page in 0..pages {
        let offset = (page > 0).then_some(page * DNAC_PAGE_SIZE);
        let batch = source.list_devices_page(DNAC_PAGE_SIZE, offset)?;
        tracing::debug!(page, fetched = batch.len(), "dnac page fetched");
        devices.extend(batch);
    }
    Ok((devices, pages as usize))
}

pub fn project_dnac_device(device: &Value) -> DeviceRecord {
    DeviceRecord {
        name: stringify_field(device, "hostname"),
        primary_ip: stringify_field(device, "managementIpAddress"),
        device_type: stringify_field(device, "platformId"),
    }
}

fn stringify_field(device: &Value, key: &str) -> String {
    match device.get(key) {
        Some(Value::String(text)) => text.clone(),
        None | Some(Value::Null) => MISSING_VALUE.to_string(),
        Some(other) => other.to_string(),
    }
}
