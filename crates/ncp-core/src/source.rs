use crate::error::SourceRequestError;
use crate::model::{SourceDevice, SourceKind};
use serde_json::Value;

/// Netbox / Nautobot style source returning the whole device collection.
pub trait InventorySource {
    fn list_devices(&self) -> Result<Vec<SourceDevice>, SourceRequestError>;
}

/// Cisco DNAC style source paged by limit/offset.
pub trait DnacSource {
    fn count_devices(&self) -> Result<u64, SourceRequestError>;
    fn list_devices_page(
        &self,
        limit: u64,
        offset: Option<u64>,
    ) -> Result<Vec<Value>, SourceRequestError>;
}

pub trait SourceClientFactory {
    fn inventory_source(
        &self,
        kind: SourceKind,
        url: &str,
        token: &str,
    ) -> Result<Box<dyn InventorySource>, SourceRequestError>;

    fn dnac_source(&self, url: &str, token: &str)
        -> Result<Box<dyn DnacSource>, SourceRequestError>;
}
