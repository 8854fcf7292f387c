//! HTTP clients for the source-of-truth systems an inventory is synced from.

pub mod dnac;
pub mod http;
pub mod nautobot;

use ncp_core::config::SotSettings;
use ncp_core::{
    DnacSource, InventorySource, SourceClientFactory, SourceKind, SourceRequestError,
};

pub use dnac::DnacClient;
pub use nautobot::NautobotLikeClient;

/// Builds blocking HTTP clients for each source kind.
#[derive(Debug, Clone, Default)]
pub struct HttpSourceFactory {
    settings: SotSettings,
}

impl HttpSourceFactory {
    pub fn new(settings: SotSettings) -> Self {
        Self { settings }
    }
}

impl SourceClientFactory for HttpSourceFactory {
    fn inventory_source(
        &self,
        kind: SourceKind,
        url: &str,
        token: &str,
    ) -> Result<Box<dyn InventorySource>, SourceRequestError> {
        if kind == SourceKind::Dnac {
            return Err(SourceRequestError::InvalidEndpoint(
                "dnac inventories are paged; use the dnac client".to_string(),
            ));
        }
        let base = http::parse_base(url)?;
        let client = http::build_client(&self.settings)?;
        Ok(Box::new(NautobotLikeClient::new(
            kind,
            client,
            base,
            token,
            self.settings.page_size,
        )))
    }

    fn dnac_source(
        &self,
        url: &str,
        token: &str,
    ) -> Result<Box<dyn DnacSource>, SourceRequestError> {
        let base = http::parse_base(url)?;
        let client = http::build_client(&self.settings)?;
        Ok(Box::new(DnacClient::new(client, base, token)))
    }
}
